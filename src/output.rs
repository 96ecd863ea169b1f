// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/output.rs - 输出定义
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

use std::path::Path;

use thiserror::Error;

use crate::{detection::DetectResult, frame::Image};

pub trait Render {
  type Error;
  fn render_result(
    &self,
    source: &Path,
    image: &Image,
    result: &DetectResult,
  ) -> Result<(), Self::Error>;
}

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput, detect_output_path};

mod json_record;
pub use self::json_record::JsonRecordOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("JSON 记录错误: {0}")]
  JsonRecordError(#[from] std::io::Error),
}

/// 终端打印检测结果
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

impl Render for ConsoleOutput {
  type Error = std::convert::Infallible;

  fn render_result(
    &self,
    source: &Path,
    _image: &Image,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    println!("{}: 检测到 {} 个对象", source.display(), result.len());
    for item in result.iter() {
      println!(
        "  - {}: {:.2}% at ({:.1}, {:.1}, {:.1}x{:.1})",
        item.label,
        item.prob * 100.0,
        item.bbox.x,
        item.bbox.y,
        item.bbox.w,
        item.bbox.h
      );
    }
    Ok(())
  }
}

/// 组合输出：终端、标注图像与 JSON 记录
#[derive(Default)]
pub struct OutputSet {
  pub console: Option<ConsoleOutput>,
  #[cfg(feature = "save_image_file")]
  pub image: Option<SaveImageFileOutput>,
  pub json: Option<JsonRecordOutput>,
}

impl Render for OutputSet {
  type Error = OutputError;

  fn render_result(
    &self,
    source: &Path,
    image: &Image,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    if let Some(console) = &self.console {
      let Ok(()) = console.render_result(source, image, result);
    }
    #[cfg(feature = "save_image_file")]
    if let Some(output) = &self.image {
      output.render_result(source, image, result)?;
    }
    if let Some(output) = &self.json {
      output.render_result(source, image, result)?;
    }
    Ok(())
  }
}
