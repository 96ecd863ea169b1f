// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{bbox::BoundingBox, detection::DetectResult};

const BOX_THICKNESS: i32 = 2;

// 按类别循环使用的颜色
const PALETTE: [[u8; 3]; 6] = [
  [255, 0, 255],
  [0, 0, 255],
  [0, 255, 255],
  [0, 255, 0],
  [255, 255, 0],
  [255, 0, 0],
];

pub struct Draw {
  thickness: i32,
  /// 结果坐标是否为归一化坐标
  relative: bool,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      relative: false,
    }
  }
}

impl Draw {
  pub fn relative(mut self, relative: bool) -> Self {
    self.relative = relative;
    self
  }

  /// 中心格式框转为裁剪到图像内的像素角点，完全在图像外时返回 None
  fn pixel_corners(&self, image: &RgbImage, bbox: &BoundingBox) -> Option<(i32, i32, i32, i32)> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let [mut x_min, mut y_min, mut x_max, mut y_max] = bbox.to_corners();
    if self.relative {
      x_min *= w;
      x_max *= w;
      y_min *= h;
      y_max *= h;
    }

    let x_min = (x_min.floor() as i32).clamp(0, w as i32 - 1);
    let y_min = (y_min.floor() as i32).clamp(0, h as i32 - 1);
    let x_max = (x_max.ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = (y_max.ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return None;
    }
    Some((x_min, y_min, x_max, y_max))
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }

    for item in result.iter() {
      let Some((x_min, y_min, x_max, y_max)) = self.pixel_corners(image, &item.bbox) else {
        continue;
      };
      let color = Rgb(PALETTE[item.class_id % PALETTE.len()]);

      // 向内逐像素加粗
      for t in 0..self.thickness {
        let width = x_max - x_min - 2 * t;
        let height = y_max - y_min - 2 * t;
        if width <= 0 || height <= 0 {
          break;
        }
        let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
        draw_hollow_rect_mut(image, rect, color);
      }
    }
  }
}
