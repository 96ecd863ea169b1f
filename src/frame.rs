// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/frame.rs - 平面浮点图像
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

use thiserror::Error;

#[cfg(feature = "image")]
const RGB_CHANNELS: u32 = 3;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
pub struct FrameSizeError {
  pub expected: usize,
  pub actual: usize,
}

/// CHW 平面排列、取值 [0, 1] 的浮点图像，与 darknet `image` 布局一致
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
  width: u32,
  height: u32,
  channels: u32,
  data: Box<[f32]>,
}

impl Image {
  pub fn with_shape(width: u32, height: u32, channels: u32) -> Self {
    let size = (width as usize) * (height as usize) * (channels as usize);
    Self {
      width,
      height,
      channels,
      data: vec![0.0; size].into_boxed_slice(),
    }
  }

  pub fn from_planar(
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<f32>,
  ) -> Result<Self, FrameSizeError> {
    let expected = (width as usize) * (height as usize) * (channels as usize);
    if data.len() != expected {
      return Err(FrameSizeError {
        expected,
        actual: data.len(),
      });
    }
    Ok(Self {
      width,
      height,
      channels,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> u32 {
    self.channels
  }

  pub fn as_planar(&self) -> &[f32] {
    &self.data
  }

  pub fn as_planar_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }

  fn index(&self, c: u32, y: u32, x: u32) -> usize {
    (c as usize) * (self.height as usize) * (self.width as usize)
      + (y as usize) * (self.width as usize)
      + (x as usize)
  }

  pub fn pixel(&self, c: u32, y: u32, x: u32) -> Option<f32> {
    if c >= self.channels || y >= self.height || x >= self.width {
      return None;
    }
    Some(self.data[self.index(c, y, x)])
  }
}

#[cfg(feature = "image")]
impl From<&image::RgbImage> for Image {
  fn from(image: &image::RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let mut frame = Image::with_shape(width, height, RGB_CHANNELS);
    let plane = (width as usize) * (height as usize);
    let slice = frame.as_planar_mut();

    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = (y as usize) * (width as usize) + (x as usize);
      for c in 0..RGB_CHANNELS as usize {
        slice[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }
    frame
  }
}

#[cfg(feature = "image")]
impl Image {
  /// 转回 RGB8 图像，单通道图像复制为灰度
  pub fn to_rgb_image(&self) -> image::RgbImage {
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    image::RgbImage::from_fn(self.width, self.height, |x, y| {
      let mut rgb = [0u8; 3];
      for (c, value) in rgb.iter_mut().enumerate() {
        let channel = (c as u32).min(self.channels.saturating_sub(1));
        *value = self.pixel(channel, y, x).map(to_u8).unwrap_or(0);
      }
      image::Rgb(rgb)
    })
  }
}
