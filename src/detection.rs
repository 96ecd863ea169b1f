// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/detection.rs - 检测候选与检测结果
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bbox::BoundingBox;

/// 推理引擎输出的一个候选框
///
/// `prob` 为逐类别的独立概率（多标签），`sort_class` 只在重叠抑制时使用：
/// `None` 表示按 objectness 排序。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub bbox: BoundingBox,
  pub prob: Vec<f32>,
  pub objectness: f32,
  #[serde(skip)]
  pub sort_class: Option<usize>,
}

impl Detection {
  pub fn new(bbox: BoundingBox, prob: Vec<f32>, objectness: f32) -> Self {
    Self {
      bbox,
      prob,
      objectness,
      sort_class: None,
    }
  }

  pub fn as_view(&self) -> DetectionRef<'_> {
    DetectionRef {
      bbox: self.bbox,
      prob: &self.prob,
      objectness: self.objectness,
    }
  }
}

/// 候选框的只读视图，可指向 Rust 内存或原生库内存
#[derive(Debug, Clone, Copy)]
pub struct DetectionRef<'a> {
  pub bbox: BoundingBox,
  pub prob: &'a [f32],
  pub objectness: f32,
}

/// 一次推理产生的候选框批次
pub trait DetectionBatch {
  fn len(&self) -> usize;

  fn get(&self, index: usize) -> Option<DetectionRef<'_>>;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn iter(&self) -> impl Iterator<Item = DetectionRef<'_>> {
    (0..self.len()).filter_map(move |i| self.get(i))
  }
}

impl DetectionBatch for [Detection] {
  fn len(&self) -> usize {
    <[Detection]>::len(self)
  }

  fn get(&self, index: usize) -> Option<DetectionRef<'_>> {
    <[Detection]>::get(self, index).map(Detection::as_view)
  }
}

impl DetectionBatch for Vec<Detection> {
  fn len(&self) -> usize {
    self.as_slice().len()
  }

  fn get(&self, index: usize) -> Option<DetectionRef<'_>> {
    self.as_slice().get(index).map(Detection::as_view)
  }
}

/// 展平后的一条检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
  pub label: String,
  pub class_id: usize,
  pub prob: f32,
  pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  pub items: Box<[RankedResult]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, RankedResult> {
    self.items.iter()
  }
}

impl From<Vec<RankedResult>> for DetectResult {
  fn from(items: Vec<RankedResult>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("检测批次无效: {0}")]
  InvalidDetectionBatch(String),
  #[error("推理引擎错误: {0}")]
  Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DetectError {
  pub fn invalid(msg: impl Into<String>) -> Self {
    DetectError::InvalidDetectionBatch(msg.into())
  }

  pub fn engine<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    DetectError::Engine(Box::new(err))
  }
}
