// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/input.rs - 图像输入
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

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError, load_image};

/// 目录下所有 `.jpg` 文件（不区分大小写），按文件名排序
pub fn list_jpg_files<P: AsRef<Path>>(dir: P) -> std::io::Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for entry in std::fs::read_dir(dir)? {
    let path = entry?.path();
    let is_jpg = path
      .file_name()
      .and_then(|n| n.to_str())
      .is_some_and(|n| n.to_ascii_lowercase().ends_with(".jpg"));
    if is_jpg && path.is_file() {
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}
