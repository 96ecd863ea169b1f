// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/logging.rs - 日志初始化
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

use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};

use chrono::Local;
use thiserror::Error;
use tracing_subscriber::{
  EnvFilter,
  fmt::{format::Writer, time::FormatTime},
  layer::SubscriberExt,
  util::SubscriberInitExt,
};

#[derive(Error, Debug)]
pub enum LoggingError {
  #[error("无法打开日志文件 {path}: {source}")]
  File {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("日志系统初始化失败: {0}")]
  Init(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
  /// 未设置 RUST_LOG 时使用 debug 级别
  pub debug: bool,
  /// 追加写入的日志文件
  pub file: Option<PathBuf>,
}

/// 日志文件的时间戳，附带进程号以区分多次运行追加到同一文件的记录
#[derive(Debug, Clone, Copy, Default)]
pub struct PidTimer;

impl FormatTime for PidTimer {
  fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
    write!(
      w,
      "{} [{}]",
      Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
      std::process::id()
    )
  }
}

/// 初始化全局日志：彩色终端输出，可选追加到日志文件
pub fn init(options: &LogOptions) -> Result<(), LoggingError> {
  let default_level = if options.debug { "debug" } else { "info" };
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

  let file_layer = match &options.file {
    Some(path) => {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::File {
          path: path.clone(),
          source,
        })?;
      Some(
        tracing_subscriber::fmt::layer()
          .with_ansi(false)
          .with_timer(PidTimer)
          .with_writer(Mutex::new(file)),
      )
    }
    None => None,
  };

  tracing_subscriber::registry()
    .with(env_filter)
    .with(tracing_subscriber::fmt::layer().with_ansi(true))
    .with(file_layer)
    .try_init()?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_timestamp_carries_process_id() {
    let mut line = String::new();
    PidTimer.format_time(&mut Writer::new(&mut line)).unwrap();
    assert!(line.ends_with(&format!("[{}]", std::process::id())));
    assert!(line.starts_with(&Local::now().format("%Y-").to_string()));
  }

  #[test]
  fn unwritable_log_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let options = LogOptions {
      debug: false,
      file: Some(dir.path().join("missing").join("detect.log")),
    };
    assert!(matches!(init(&options), Err(LoggingError::File { .. })));
  }
}
