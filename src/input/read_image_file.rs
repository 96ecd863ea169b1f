// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error};

use crate::{frame::Image, input::list_jpg_files};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 读取图像文件并转为 RGB 平面浮点图像
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image, ImageFileInputError> {
  let path = path.as_ref();
  let image = ImageReader::open(path)?.decode()?.to_rgb8();
  debug!(
    "读取图像 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(Image::from(&image))
}

/// 依次读取一组图像文件
pub struct ImageFileInput {
  paths: std::vec::IntoIter<PathBuf>,
}

impl ImageFileInput {
  /// 目录下所有 `.jpg` 文件
  pub fn directory<P: AsRef<Path>>(dir: P) -> Result<Self, ImageFileInputError> {
    let paths = list_jpg_files(dir.as_ref()).inspect_err(|e| {
      error!("无法读取图像目录 {}: {}", dir.as_ref().display(), e);
    })?;
    debug!("目录 {} 中有 {} 张图像", dir.as_ref().display(), paths.len());
    Ok(Self {
      paths: paths.into_iter(),
    })
  }

  pub fn remaining(&self) -> usize {
    self.paths.len()
  }
}

impl Iterator for ImageFileInput {
  type Item = (PathBuf, Result<Image, ImageFileInputError>);

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.paths.next()?;
    let image = load_image(&path);
    Some((path, image))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn loads_written_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pixel.png");
    let mut rgb = image::RgbImage::new(3, 2);
    rgb.put_pixel(2, 1, image::Rgb([255, 255, 255]));
    rgb.save(&path).unwrap();

    let image = load_image(&path).unwrap();
    assert_eq!((image.width(), image.height(), image.channels()), (3, 2, 3));
    assert_eq!(image.pixel(1, 1, 2), Some(1.0));
  }

  #[test]
  fn directory_input_yields_errors_per_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();

    let mut input = ImageFileInput::directory(dir.path()).unwrap();
    assert_eq!(input.remaining(), 1);
    let (path, image) = input.next().unwrap();
    assert_eq!(path, dir.path().join("broken.jpg"));
    assert!(image.is_err());
    assert!(input.next().is_none());
  }
}
