// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/bbox.rs - 边界框与坐标映射
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

/// 中心点格式的边界框
///
/// `x`, `y` 为中心坐标，`w`, `h` 为宽高。同一条流水线内单位必须一致
/// （像素或归一化坐标）。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub w: f32,
  pub h: f32,
}

/// 一维区间重叠长度，可能为负
fn overlap(c1: f32, len1: f32, c2: f32, len2: f32) -> f32 {
  let left = (c1 - len1 / 2.0).max(c2 - len2 / 2.0);
  let right = (c1 + len1 / 2.0).min(c2 + len2 / 2.0);
  right - left
}

impl BoundingBox {
  pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
    Self { x, y, w, h }
  }

  /// 转为 [x_min, y_min, x_max, y_max]
  pub fn to_corners(&self) -> [f32; 4] {
    [
      self.x - self.w / 2.0,
      self.y - self.h / 2.0,
      self.x + self.w / 2.0,
      self.y + self.h / 2.0,
    ]
  }

  pub fn area(&self) -> f32 {
    self.w * self.h
  }

  pub fn intersection(&self, other: &Self) -> f32 {
    let w = overlap(self.x, self.w, other.x, other.w);
    let h = overlap(self.y, self.h, other.y, other.h);
    if w < 0.0 || h < 0.0 {
      return 0.0;
    }
    w * h
  }

  pub fn union(&self, other: &Self) -> f32 {
    self.area() + other.area() - self.intersection(other)
  }

  /// 计算两个边界框的 IoU
  pub fn iou(&self, other: &Self) -> f32 {
    let union = self.union(other);
    if union > 0.0 {
      self.intersection(other) / union
    } else {
      0.0
    }
  }
}

/// 网络输入与原图之间的映射方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxMapping {
  /// 保持宽高比缩放后填充
  #[default]
  Letterbox,
  /// 直接拉伸到网络输入尺寸
  Stretch,
}

/// 将网络输入空间中的归一化框映射回原图
///
/// `relative` 为 true 时输出仍为归一化坐标，否则输出像素坐标。
/// 图像或网络尺寸为 0 时不做任何修改。
pub fn correct_boxes(
  boxes: &mut [BoundingBox],
  image_w: u32,
  image_h: u32,
  net_w: u32,
  net_h: u32,
  mapping: BoxMapping,
  relative: bool,
) {
  if image_w == 0 || image_h == 0 || net_w == 0 || net_h == 0 {
    return;
  }

  let (iw, ih, nw, nh) = (
    image_w as u64,
    image_h as u64,
    net_w as u64,
    net_h as u64,
  );

  // 整数除法与 darknet 保持一致
  let (new_w, new_h) = match mapping {
    BoxMapping::Letterbox => {
      if (net_w as f32 / image_w as f32) < (net_h as f32 / image_h as f32) {
        (nw, ih * nw / iw)
      } else {
        (iw * nh / ih, nh)
      }
    }
    BoxMapping::Stretch => (nw, nh),
  };

  let (net_w, net_h) = (nw as f32, nh as f32);
  let (new_w, new_h) = (new_w as f32, new_h as f32);

  for b in boxes.iter_mut() {
    b.x = (b.x - (net_w - new_w) / 2.0 / net_w) / (new_w / net_w);
    b.y = (b.y - (net_h - new_h) / 2.0 / net_h) / (new_h / net_h);
    b.w *= net_w / new_w;
    b.h *= net_h / new_h;

    if !relative {
      b.x *= image_w as f32;
      b.w *= image_w as f32;
      b.y *= image_h as f32;
      b.h *= image_h as f32;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = BoundingBox::new(10.0, 10.0, 4.0, 4.0);
    assert!(approx(a.iou(&a), 1.0));
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
    let b = BoundingBox::new(10.0, 10.0, 2.0, 2.0);
    assert_eq!(a.intersection(&b), 0.0);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn iou_of_half_shifted_boxes() {
    // 交集 1x2=2, 并集 4+4-2=6
    let a = BoundingBox::new(1.0, 1.0, 2.0, 2.0);
    let b = BoundingBox::new(2.0, 1.0, 2.0, 2.0);
    assert!(approx(a.iou(&b), 2.0 / 6.0));
  }

  #[test]
  fn degenerate_boxes_have_zero_iou() {
    let a = BoundingBox::new(1.0, 1.0, 0.0, 0.0);
    assert_eq!(a.iou(&a), 0.0);
  }

  #[test]
  fn corners_from_center() {
    let a = BoundingBox::new(5.0, 4.0, 2.0, 6.0);
    assert_eq!(a.to_corners(), [4.0, 1.0, 6.0, 7.0]);
  }

  #[test]
  fn letterbox_removes_padding() {
    // 1280x640 -> 416x416: 有效区域 416x208，上下各填充 104
    let mut boxes = [BoundingBox::new(0.5, 0.5, 0.5, 0.25)];
    correct_boxes(&mut boxes, 1280, 640, 416, 416, BoxMapping::Letterbox, false);
    let b = boxes[0];
    assert!(approx(b.x, 640.0));
    assert!(approx(b.y, 320.0));
    assert!(approx(b.w, 640.0));
    assert!(approx(b.h, 320.0));
  }

  #[test]
  fn stretch_keeps_normalized_geometry() {
    let mut boxes = [BoundingBox::new(0.5, 0.5, 0.5, 0.25)];
    correct_boxes(&mut boxes, 1280, 640, 416, 416, BoxMapping::Stretch, false);
    let b = boxes[0];
    assert!(approx(b.x, 640.0));
    assert!(approx(b.y, 320.0));
    assert!(approx(b.w, 640.0));
    assert!(approx(b.h, 160.0));
  }

  #[test]
  fn relative_output_stays_normalized() {
    let mut boxes = [BoundingBox::new(0.5, 0.25, 0.5, 0.25)];
    correct_boxes(&mut boxes, 640, 1280, 416, 416, BoxMapping::Letterbox, true);
    let b = boxes[0];
    // 有效区域 208x416，左右各填充 104
    assert!(approx(b.x, 0.5));
    assert!(approx(b.y, 0.25));
    assert!(approx(b.w, 1.0));
    assert!(approx(b.h, 0.25));
  }

  #[test]
  fn zero_sized_image_is_ignored() {
    let mut boxes = [BoundingBox::new(0.5, 0.5, 0.1, 0.1)];
    correct_boxes(&mut boxes, 0, 100, 416, 416, BoxMapping::Letterbox, false);
    assert_eq!(boxes[0], BoundingBox::new(0.5, 0.5, 0.1, 0.1));
  }
}
