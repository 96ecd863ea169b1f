// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/weights.rs - 权重文件查找
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
  path::{Path, PathBuf},
  time::SystemTime,
};

use thiserror::Error;
use tracing::{debug, warn};

const WEIGHTS_EXTENSION: &str = "weights";

#[derive(Error, Debug)]
pub enum WeightsError {
  #[error("无法读取权重目录 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("目录 {0} 中没有 .weights 文件")]
  NotFound(PathBuf),
}

/// 取时间最新的一项，时间相同时保留先出现的
fn pick_newest<I>(candidates: I) -> Option<PathBuf>
where
  I: IntoIterator<Item = (PathBuf, SystemTime)>,
{
  let mut newest: Option<(PathBuf, SystemTime)> = None;
  for (path, time) in candidates {
    match &newest {
      Some((_, best)) if time <= *best => {}
      _ => newest = Some((path, time)),
    }
  }
  newest.map(|(path, _)| path)
}

/// 查找目录中创建时间最新的 `.weights` 文件
///
/// 平台不支持创建时间时退回到修改时间。
pub fn latest_weights<P: AsRef<Path>>(backup: P) -> Result<PathBuf, WeightsError> {
  let backup = backup.as_ref();
  let io_err = |source| WeightsError::Io {
    path: backup.to_path_buf(),
    source,
  };

  let mut candidates = Vec::new();
  for entry in std::fs::read_dir(backup).map_err(io_err)? {
    let entry = entry.map_err(io_err)?;
    let path = entry.path();
    if path.extension().and_then(|e| e.to_str()) != Some(WEIGHTS_EXTENSION) {
      continue;
    }
    let metadata = match entry.metadata() {
      Ok(m) if m.is_file() => m,
      Ok(_) => continue,
      Err(e) => {
        warn!("无法读取 {} 的元数据: {}", path.display(), e);
        continue;
      }
    };
    let time = metadata
      .created()
      .or_else(|_| metadata.modified())
      .unwrap_or(SystemTime::UNIX_EPOCH);
    candidates.push((path, time));
  }

  let weights = pick_newest(candidates).ok_or_else(|| WeightsError::NotFound(backup.to_path_buf()))?;
  debug!("选用权重文件: {}", weights.display());
  Ok(weights)
}
