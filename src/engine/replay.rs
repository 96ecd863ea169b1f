// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/engine/replay.rs - 回放已记录的引擎输出
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  bbox::{BoundingBox, correct_boxes},
  detection::Detection,
  engine::{InferenceEngine, InferenceParams, NmsKind},
  frame::Image,
  nms::{do_nms_obj, do_nms_sort},
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("无法读取回放文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("回放文件格式错误: {0}")]
  Format(#[from] serde_json::Error),
  #[error("网络输入尺寸无效: {0}x{1}")]
  InvalidInputSize(u32, u32),
}

/// 一帧记录：候选框坐标为网络输入空间中的归一化坐标
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayFrame {
  #[serde(default)]
  pub detections: Vec<Detection>,
  #[serde(default)]
  pub scores: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayRecording {
  /// 网络输入尺寸 (宽, 高)
  pub input_size: (u32, u32),
  #[serde(default)]
  pub names: Vec<String>,
  #[serde(default)]
  pub frames: Vec<ReplayFrame>,
}

/// 按顺序循环回放记录帧的引擎
///
/// 阈值、坐标映射与重叠抑制在 Rust 中按 darknet 的语义完成。
#[derive(Debug)]
pub struct ReplayEngine {
  recording: ReplayRecording,
  cursor: usize,
  outstanding: usize,
}

impl ReplayEngine {
  pub fn new(recording: ReplayRecording) -> Result<Self, ReplayError> {
    let (w, h) = recording.input_size;
    if w == 0 || h == 0 {
      return Err(ReplayError::InvalidInputSize(w, h));
    }
    Ok(Self {
      recording,
      cursor: 0,
      outstanding: 0,
    })
  }

  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let recording: ReplayRecording = serde_json::from_str(&content)?;
    info!(
      "加载回放文件 {}: {} 帧",
      path.display(),
      recording.frames.len()
    );
    Self::new(recording)
  }

  pub fn names(&self) -> &[String] {
    &self.recording.names
  }

  /// 尚未归还的批次数量
  pub fn outstanding(&self) -> usize {
    self.outstanding
  }

  fn next_frame(&mut self) -> Option<&ReplayFrame> {
    let frames = &self.recording.frames;
    if frames.is_empty() {
      return None;
    }
    let frame = &frames[self.cursor % frames.len()];
    self.cursor = self.cursor.wrapping_add(1);
    Some(frame)
  }
}

impl InferenceEngine for ReplayEngine {
  type Batch = Vec<Detection>;
  type Error = ReplayError;

  fn input_size(&self) -> (u32, u32) {
    self.recording.input_size
  }

  fn predict_scores(&mut self, _image: &Image) -> Result<Vec<f32>, Self::Error> {
    Ok(self.next_frame().map(|f| f.scores.clone()).unwrap_or_default())
  }

  fn run_inference(
    &mut self,
    image: &Image,
    params: &InferenceParams,
  ) -> Result<Self::Batch, Self::Error> {
    let (net_w, net_h) = self.recording.input_size;
    let threshold = params.confidence;

    // objectness 不超过阈值的候选框不输出，类别概率不超过阈值的清零
    let mut dets: Vec<Detection> = self
      .next_frame()
      .map(|f| f.detections.as_slice())
      .unwrap_or_default()
      .iter()
      .filter(|d| d.objectness > threshold)
      .map(|d| {
        let prob = d
          .prob
          .iter()
          .map(|&p| if p > threshold { p } else { 0.0 })
          .collect();
        Detection::new(d.bbox, prob, d.objectness)
      })
      .collect();

    let mut boxes: Vec<BoundingBox> = dets.iter().map(|d| d.bbox).collect();
    correct_boxes(
      &mut boxes,
      image.width(),
      image.height(),
      net_w,
      net_h,
      params.mapping,
      params.relative,
    );
    for (det, bbox) in dets.iter_mut().zip(boxes) {
      det.bbox = bbox;
    }

    self.outstanding += 1;
    debug!("回放 {} 个候选框", dets.len());
    Ok(dets)
  }

  fn suppress_overlaps(
    &mut self,
    batch: &mut Self::Batch,
    classes: usize,
    iou_threshold: f32,
    kind: NmsKind,
  ) -> Result<(), Self::Error> {
    match kind {
      NmsKind::Objectness => do_nms_obj(batch, classes, iou_threshold),
      NmsKind::PerClass => do_nms_sort(batch, classes, iou_threshold),
    }
    Ok(())
  }

  fn release_batch(&mut self, batch: Self::Batch) {
    match self.outstanding.checked_sub(1) {
      Some(n) => self.outstanding = n,
      None => warn!("归还了未借出的批次"),
    }
    drop(batch);
  }
}
