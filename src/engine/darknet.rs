// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/engine/darknet.rs - darknet 原生库适配
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

use std::{
  ffi::{CString, c_char, c_int, c_void},
  path::Path,
  ptr::NonNull,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  bbox::{BoundingBox, BoxMapping, correct_boxes},
  detection::{DetectionBatch, DetectionRef},
  engine::{InferenceEngine, InferenceParams, NmsKind},
  frame::Image,
};

mod ffi {
  use super::*;

  #[repr(C)]
  #[derive(Debug, Clone, Copy)]
  pub struct RawBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
  }

  #[repr(C)]
  #[derive(Debug)]
  pub struct RawDetection {
    pub bbox: RawBox,
    pub classes: c_int,
    pub prob: *mut f32,
    pub mask: *mut f32,
    pub objectness: f32,
    pub sort_class: c_int,
  }

  #[repr(C)]
  #[derive(Debug, Clone, Copy)]
  pub struct RawImage {
    pub w: c_int,
    pub h: c_int,
    pub c: c_int,
    pub data: *mut f32,
  }

  #[link(name = "darknet")]
  unsafe extern "C" {
    pub fn load_network(cfg: *const c_char, weights: *const c_char, clear: c_int) -> *mut c_void;
    pub fn free_network(net: *mut c_void);
    pub fn network_width(net: *mut c_void) -> c_int;
    pub fn network_height(net: *mut c_void) -> c_int;
    pub fn network_predict(net: *mut c_void, input: *mut f32) -> *mut f32;
    pub fn network_predict_image(net: *mut c_void, im: RawImage) -> *mut f32;
    pub fn letterbox_image(im: RawImage, w: c_int, h: c_int) -> RawImage;
    pub fn resize_image(im: RawImage, w: c_int, h: c_int) -> RawImage;
    pub fn free_image(im: RawImage);
    pub fn get_network_boxes(
      net: *mut c_void,
      w: c_int,
      h: c_int,
      thresh: f32,
      hier: f32,
      map: *mut c_int,
      relative: c_int,
      num: *mut c_int,
    ) -> *mut RawDetection;
    pub fn do_nms_obj(dets: *mut RawDetection, total: c_int, classes: c_int, thresh: f32);
    pub fn do_nms_sort(dets: *mut RawDetection, total: c_int, classes: c_int, thresh: f32);
    pub fn free_detections(dets: *mut RawDetection, n: c_int);
    #[cfg(feature = "darknet-gpu")]
    pub fn cuda_set_device(n: c_int);
  }
}

#[derive(Error, Debug)]
pub enum DarknetError {
  #[error("路径包含无效字符: {0}")]
  InvalidPath(String),
  #[error("网络加载失败: {0}")]
  LoadFailed(String),
  #[error("图像尺寸无效: {0}x{1}x{2}")]
  InvalidImage(u32, u32, u32),
  #[error("推理未返回结果")]
  NullOutput,
}

fn c_path(path: &Path) -> Result<CString, DarknetError> {
  CString::new(path.to_string_lossy().as_bytes())
    .map_err(|_| DarknetError::InvalidPath(path.display().to_string()))
}

/// 原生库分配的检测数组
#[derive(Debug)]
pub struct DarknetBatch {
  dets: *mut ffi::RawDetection,
  num: c_int,
  classes: usize,
}

impl DarknetBatch {
  fn raw(&self, index: usize) -> Option<&ffi::RawDetection> {
    if self.dets.is_null() || index >= self.num.max(0) as usize {
      return None;
    }
    // SAFETY: index < num，数组在 release 之前一直有效
    Some(unsafe { &*self.dets.add(index) })
  }

  fn raw_mut(&mut self, index: usize) -> Option<&mut ffi::RawDetection> {
    if self.dets.is_null() || index >= self.num.max(0) as usize {
      return None;
    }
    // SAFETY: 同上，且 &mut self 保证独占
    Some(unsafe { &mut *self.dets.add(index) })
  }

  /// 可安全交给原生 NMS 的类别数：不超过任何候选框实际分配的概率个数
  fn nms_classes(&self, requested: usize) -> c_int {
    (0..self.len())
      .filter_map(|index| self.raw(index))
      .map(|raw| raw.classes.max(0) as usize)
      .fold(requested, usize::min)
      .min(c_int::MAX as usize) as c_int
  }
}

impl DetectionBatch for DarknetBatch {
  fn len(&self) -> usize {
    if self.dets.is_null() { 0 } else { self.num.max(0) as usize }
  }

  fn get(&self, index: usize) -> Option<DetectionRef<'_>> {
    let raw = self.raw(index)?;
    let n = self.classes.min(raw.classes.max(0) as usize);
    let prob: &[f32] = if raw.prob.is_null() {
      &[]
    } else {
      // SAFETY: prob 指向 raw.classes 个 float
      unsafe { std::slice::from_raw_parts(raw.prob, n) }
    };
    Some(DetectionRef {
      bbox: BoundingBox::new(raw.bbox.x, raw.bbox.y, raw.bbox.w, raw.bbox.h),
      prob,
      objectness: raw.objectness,
    })
  }
}

/// darknet 网络句柄，drop 时释放
pub struct DarknetEngine {
  net: NonNull<c_void>,
  classes: usize,
  width: u32,
  height: u32,
}

impl DarknetEngine {
  /// 加载网络结构与权重，`gpu` 仅在启用 `darknet-gpu` 时生效
  ///
  /// `classes` 必须等于网络输出层的类别数，通常来自 [`ModelFiles`](crate::model::ModelFiles)。
  pub fn load(
    cfg: &Path,
    weights: &Path,
    classes: usize,
    gpu: Option<i32>,
  ) -> Result<Self, DarknetError> {
    let cfg_c = c_path(cfg)?;
    let weights_c = c_path(weights)?;

    #[cfg(feature = "darknet-gpu")]
    if let Some(device) = gpu {
      info!("选择 GPU 设备: {}", device);
      // SAFETY: 纯设置调用
      unsafe { ffi::cuda_set_device(device) };
    }
    #[cfg(not(feature = "darknet-gpu"))]
    if let Some(device) = gpu {
      debug!("未启用 GPU 支持，忽略设备 {}", device);
    }

    info!("加载网络: {} / {}", cfg.display(), weights.display());
    // SAFETY: 字符串在调用期间有效
    let net = unsafe { ffi::load_network(cfg_c.as_ptr(), weights_c.as_ptr(), 0) };
    let net = NonNull::new(net).ok_or_else(|| DarknetError::LoadFailed(cfg.display().to_string()))?;

    // SAFETY: net 非空
    let (width, height) = unsafe {
      (
        ffi::network_width(net.as_ptr()),
        ffi::network_height(net.as_ptr()),
      )
    };
    debug!("网络输入尺寸: {}x{}", width, height);

    Ok(Self {
      net,
      classes,
      width: width.max(0) as u32,
      height: height.max(0) as u32,
    })
  }

  fn raw_image(image: &Image) -> Result<ffi::RawImage, DarknetError> {
    if image.width() == 0 || image.height() == 0 || image.channels() == 0 {
      return Err(DarknetError::InvalidImage(
        image.width(),
        image.height(),
        image.channels(),
      ));
    }
    Ok(ffi::RawImage {
      w: image.width() as c_int,
      h: image.height() as c_int,
      c: image.channels() as c_int,
      // darknet 只读取输入图像
      data: image.as_planar().as_ptr() as *mut f32,
    })
  }
}

impl Drop for DarknetEngine {
  fn drop(&mut self) {
    debug!("释放 darknet 网络");
    // SAFETY: net 由 load_network 创建，只释放一次
    unsafe { ffi::free_network(self.net.as_ptr()) };
  }
}

impl InferenceEngine for DarknetEngine {
  type Batch = DarknetBatch;
  type Error = DarknetError;

  fn input_size(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn predict_scores(&mut self, image: &Image) -> Result<Vec<f32>, Self::Error> {
    let raw = Self::raw_image(image)?;
    // SAFETY: raw 指向有效图像，返回值指向网络内部缓冲区
    let out = unsafe { ffi::network_predict_image(self.net.as_ptr(), raw) };
    if out.is_null() {
      return Err(DarknetError::NullOutput);
    }
    // SAFETY: classes 在加载时已与网络结构声明的类别数核对
    Ok(unsafe { std::slice::from_raw_parts(out, self.classes) }.to_vec())
  }

  fn run_inference(
    &mut self,
    image: &Image,
    params: &InferenceParams,
  ) -> Result<Self::Batch, Self::Error> {
    let raw = Self::raw_image(image)?;
    let (w, h) = (self.width as c_int, self.height as c_int);
    let net = self.net.as_ptr();

    // 预处理由调用方选择，而不是由原生库隐式决定
    let sized = unsafe {
      match params.mapping {
        BoxMapping::Letterbox => ffi::letterbox_image(raw, w, h),
        BoxMapping::Stretch => ffi::resize_image(raw, w, h),
      }
    };
    let out = unsafe { ffi::network_predict(net, sized.data) };
    unsafe { ffi::free_image(sized) };
    if out.is_null() {
      return Err(DarknetError::NullOutput);
    }

    // 以网络尺寸取回归一化框，坐标映射在 Rust 中完成
    let mut num: c_int = 0;
    let dets = unsafe {
      ffi::get_network_boxes(
        net,
        w,
        h,
        params.confidence,
        params.hier_threshold,
        std::ptr::null_mut(),
        1,
        &mut num,
      )
    };
    let mut batch = DarknetBatch {
      dets,
      num,
      classes: self.classes,
    };

    let mut boxes: Vec<BoundingBox> = batch.iter().map(|d| d.bbox).collect();
    correct_boxes(
      &mut boxes,
      image.width(),
      image.height(),
      self.width,
      self.height,
      params.mapping,
      params.relative,
    );
    for (index, b) in boxes.into_iter().enumerate() {
      if let Some(raw) = batch.raw_mut(index) {
        raw.bbox = ffi::RawBox {
          x: b.x,
          y: b.y,
          w: b.w,
          h: b.h,
        };
      }
    }

    debug!("darknet 返回 {} 个候选框", batch.len());
    Ok(batch)
  }

  fn suppress_overlaps(
    &mut self,
    batch: &mut Self::Batch,
    classes: usize,
    iou_threshold: f32,
    kind: NmsKind,
  ) -> Result<(), Self::Error> {
    if batch.is_empty() {
      return Ok(());
    }
    let nms_classes = batch.nms_classes(classes);
    if nms_classes as usize != classes {
      warn!(
        "请求 {} 个类别，但候选框只有 {} 个概率，按后者做重叠抑制",
        classes, nms_classes
      );
    }
    // SAFETY: batch 由 get_network_boxes 创建且尚未释放，
    // nms_classes 不超过每个候选框的 prob 长度
    unsafe {
      match kind {
        NmsKind::Objectness => {
          ffi::do_nms_obj(batch.dets, batch.num, nms_classes, iou_threshold)
        }
        NmsKind::PerClass => {
          ffi::do_nms_sort(batch.dets, batch.num, nms_classes, iou_threshold)
        }
      }
    }
    Ok(())
  }

  fn release_batch(&mut self, batch: Self::Batch) {
    if batch.dets.is_null() {
      return;
    }
    // SAFETY: 每个批次只会归还一次
    unsafe { ffi::free_detections(batch.dets, batch.num) };
  }
}
