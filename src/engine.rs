// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/engine.rs - 推理引擎接口
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

use tracing::debug;

use crate::{bbox::BoxMapping, detection::DetectionBatch, frame::Image};

/// 重叠抑制方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NmsKind {
  /// 按 objectness 排序，整体抑制（do_nms_obj）
  #[default]
  Objectness,
  /// 逐类别排序抑制（do_nms_sort）
  PerClass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
  pub confidence: f32,
  pub hier_threshold: f32,
  pub mapping: BoxMapping,
  /// 为 true 时输出归一化坐标，否则输出像素坐标
  pub relative: bool,
}

impl Default for InferenceParams {
  fn default() -> Self {
    Self {
      confidence: 0.5,
      hier_threshold: 0.5,
      mapping: BoxMapping::Letterbox,
      relative: false,
    }
  }
}

/// 推理引擎能力接口
///
/// `run_inference` 产生的批次归调用方所有，必须且只能通过
/// `release_batch` 归还一次。使用 [`BatchGuard`] 可以保证这一点。
pub trait InferenceEngine {
  type Batch: DetectionBatch;
  type Error: std::error::Error + Send + Sync + 'static;

  /// 网络输入尺寸 (宽, 高)
  fn input_size(&self) -> (u32, u32);

  /// 分类网络的原始输出
  fn predict_scores(&mut self, image: &Image) -> Result<Vec<f32>, Self::Error>;

  fn run_inference(
    &mut self,
    image: &Image,
    params: &InferenceParams,
  ) -> Result<Self::Batch, Self::Error>;

  fn suppress_overlaps(
    &mut self,
    batch: &mut Self::Batch,
    classes: usize,
    iou_threshold: f32,
    kind: NmsKind,
  ) -> Result<(), Self::Error>;

  fn release_batch(&mut self, batch: Self::Batch);
}

/// 持有一个检测批次，离开作用域时归还给引擎
pub struct BatchGuard<'e, E: InferenceEngine> {
  engine: &'e mut E,
  // 只在 drop 时取出
  batch: Option<E::Batch>,
}

impl<'e, E: InferenceEngine> BatchGuard<'e, E> {
  pub fn new(engine: &'e mut E, batch: E::Batch) -> Self {
    Self {
      engine,
      batch: Some(batch),
    }
  }

  pub fn batch(&self) -> &E::Batch {
    match &self.batch {
      Some(batch) => batch,
      None => unreachable!("检测批次已归还"),
    }
  }

  pub fn suppress(
    &mut self,
    classes: usize,
    iou_threshold: f32,
    kind: NmsKind,
  ) -> Result<(), E::Error> {
    match self.batch.as_mut() {
      Some(batch) => self
        .engine
        .suppress_overlaps(batch, classes, iou_threshold, kind),
      None => Ok(()),
    }
  }
}

impl<E: InferenceEngine> Drop for BatchGuard<'_, E> {
  fn drop(&mut self) {
    if let Some(batch) = self.batch.take() {
      debug!("归还检测批次 ({} 个候选框)", batch.len());
      self.engine.release_batch(batch);
    }
  }
}

pub mod replay;
pub use self::replay::{ReplayEngine, ReplayError, ReplayFrame, ReplayRecording};

#[cfg(feature = "darknet")]
pub mod darknet;
#[cfg(feature = "darknet")]
pub use self::darknet::{DarknetEngine, DarknetError};
