// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/model.rs - 模型
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  bbox::BoxMapping,
  config::{ConfigError, DataConfig},
  detection::{DetectError, DetectResult},
  engine::{BatchGuard, InferenceEngine, InferenceParams, NmsKind},
  frame::Image,
  labels::ClassNames,
  network::{declared_classes, derive_detect_cfg},
  postprocess::{filter_candidates, rank, rank_scores},
  weights::{WeightsError, latest_weights},
};

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("权重错误: {0}")]
  Weights(#[from] WeightsError),
  #[error("无法生成推理网络文件 {path}: {source}")]
  Network {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("无法读取类别名称文件 {path}: {source}")]
  Names {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("数据配置缺少 names 项")]
  MissingNames,
  #[error("{origin} 声明了 {declared} 个类别，而名称文件中有 {names} 个")]
  ClassCountMismatch {
    origin: &'static str,
    declared: usize,
    names: usize,
  },
}

/// 从数据配置解析出的模型文件
#[derive(Debug, Clone)]
pub struct ModelFiles {
  pub config: DataConfig,
  /// 推理用网络结构文件（detect-*.cfg）
  pub network_cfg: PathBuf,
  pub weights: PathBuf,
  pub names: ClassNames,
}

impl ModelFiles {
  pub fn resolve<P: AsRef<Path>>(data_config: P) -> Result<Self, ModelLoadError> {
    let config = DataConfig::from_file(data_config)?;
    Self::from_config(config)
  }

  pub fn from_config(config: DataConfig) -> Result<Self, ModelLoadError> {
    let weights = latest_weights(&config.backup)?;

    let network_cfg =
      derive_detect_cfg(&config.network).map_err(|source| ModelLoadError::Network {
        path: config.network.clone(),
        source,
      })?;

    let names_path = config.names.clone().ok_or(ModelLoadError::MissingNames)?;
    let names = ClassNames::from_file(&names_path).map_err(|source| ModelLoadError::Names {
      path: names_path.clone(),
      source,
    })?;

    // 类别数会直接交给原生库，不一致时拒绝加载
    let mismatch = |origin, declared| ModelLoadError::ClassCountMismatch {
      origin,
      declared,
      names: names.len(),
    };
    if let Some(classes) = config.classes
      && classes != names.len()
    {
      return Err(mismatch("数据配置", classes));
    }
    let network = std::fs::read_to_string(&network_cfg).map_err(|source| {
      ModelLoadError::Network {
        path: network_cfg.clone(),
        source,
      }
    })?;
    if let Some(&declared) = declared_classes(&network)
      .iter()
      .find(|&&declared| declared != names.len())
    {
      return Err(mismatch("网络结构", declared));
    }

    debug!("加载网络文件: {}", network_cfg.display());
    debug!("加载权重文件: {}", weights.display());

    Ok(Self {
      config,
      network_cfg,
      weights,
      names,
    })
  }
}

/// 单次检测的参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectOptions {
  pub confidence: f32,
  pub hier_threshold: f32,
  /// 为 0 时跳过重叠抑制
  pub iou_threshold: f32,
  pub nms_kind: NmsKind,
  pub mapping: BoxMapping,
  pub relative: bool,
}

impl Default for DetectOptions {
  fn default() -> Self {
    Self {
      confidence: 0.5,
      hier_threshold: 0.5,
      iou_threshold: 0.45,
      nms_kind: NmsKind::Objectness,
      mapping: BoxMapping::Letterbox,
      relative: false,
    }
  }
}

impl DetectOptions {
  pub fn inference_params(&self) -> InferenceParams {
    InferenceParams {
      confidence: self.confidence,
      hier_threshold: self.hier_threshold,
      mapping: self.mapping,
      relative: self.relative,
    }
  }
}

/// 持有推理引擎与类别名称的模型
///
/// 引擎随模型一起释放；推理调用需要 `&mut self`，同一模型不会被并发使用。
pub struct Model<E: InferenceEngine> {
  engine: E,
  names: ClassNames,
}

impl<E: InferenceEngine> Model<E> {
  pub fn new(engine: E, names: ClassNames) -> Self {
    let (w, h) = engine.input_size();
    info!("模型就绪: 输入 {}x{}, {} 个类别", w, h, names.len());
    Self { engine, names }
  }

  pub fn names(&self) -> &ClassNames {
    &self.names
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  /// 检测：推理 -> 重叠抑制 -> 展平 -> 排序
  ///
  /// 检测批次在任何返回路径上都只归还一次。
  pub fn run_detection(
    &mut self,
    image: &Image,
    options: &DetectOptions,
  ) -> Result<DetectResult, DetectError> {
    let batch = self
      .engine
      .run_inference(image, &options.inference_params())
      .map_err(DetectError::engine)?;
    let mut guard = BatchGuard::new(&mut self.engine, batch);

    if options.iou_threshold > 0.0 {
      guard
        .suppress(self.names.len(), options.iou_threshold, options.nms_kind)
        .map_err(DetectError::engine)?;
    }

    let results = rank(filter_candidates(guard.batch(), &self.names)?);
    debug!("检测到 {} 个结果", results.len());
    Ok(DetectResult::from(results))
  }

  /// 分类：按得分降序返回 (类别名称, 得分)
  pub fn classify(&mut self, image: &Image) -> Result<Vec<(String, f32)>, DetectError> {
    let scores = self
      .engine
      .predict_scores(image)
      .map_err(DetectError::engine)?;
    rank_scores(&scores, &self.names)
  }
}
