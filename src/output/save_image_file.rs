// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像
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
use tracing::info;

use crate::{
  detection::DetectResult,
  frame::Image,
  output::{Render, draw::Draw},
};

const DETECT_PREFIX: &str = "detect_";

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("无效的输入路径: {0}")]
  InvalidPath(PathBuf),
}

/// `dir/dog.jpg` -> `dir/detect_dog.jpg`
pub fn detect_output_path(source: &Path) -> Option<PathBuf> {
  let name = source.file_name()?.to_str()?;
  Some(source.with_file_name(format!("{}{}", DETECT_PREFIX, name)))
}

/// 在输入图像旁保存 `detect_` 前缀的标注图像
#[derive(Default)]
pub struct SaveImageFileOutput {
  draw: Draw,
}

impl SaveImageFileOutput {
  pub fn new(relative: bool) -> Self {
    Self {
      draw: Draw::default().relative(relative),
    }
  }
}

impl Render for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(
    &self,
    source: &Path,
    image: &Image,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    let path =
      detect_output_path(source).ok_or_else(|| SaveImageFileError::InvalidPath(source.into()))?;

    let mut canvas = image.to_rgb_image();
    self.draw.draw_detections(&mut canvas, result);
    canvas.save(&path)?;

    info!("保存标注图像: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn output_path_gets_prefix() {
    assert_eq!(
      detect_output_path(Path::new("/data/img/dog.jpg")),
      Some(PathBuf::from("/data/img/detect_dog.jpg"))
    );
    assert_eq!(detect_output_path(Path::new("/")), None);
  }

  #[test]
  fn saves_annotated_copy() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("frame.png");
    let image = Image::with_shape(16, 16, 3);

    SaveImageFileOutput::new(false)
      .render_result(&source, &image, &DetectResult::default())
      .unwrap();
    assert!(dir.path().join("detect_frame.png").exists());
  }
}
