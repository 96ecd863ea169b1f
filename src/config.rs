// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/config.rs - 数据配置文件（voc.data）
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
  collections::BTreeMap,
  path::{Path, PathBuf},
  str::FromStr,
};

use thiserror::Error;
use tracing::debug;

const DEFAULT_NUM_WORKERS: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("无法读取配置文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("第 {line} 行格式错误: {content}")]
  MalformedLine { line: usize, content: String },
  #[error("缺少配置项: {0}")]
  MissingKey(&'static str),
  #[error("配置项 {key} 的值无效: {value}")]
  InvalidValue { key: &'static str, value: String },
}

/// darknet 数据配置
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
  /// 权重文件目录
  pub backup: PathBuf,
  /// 网络结构文件
  pub network: PathBuf,
  /// 日志文件
  pub detect_log: Option<PathBuf>,
  pub gpus: Vec<i32>,
  pub num_workers: usize,
  pub classes: Option<usize>,
  /// 类别名称文件
  pub names: Option<PathBuf>,
  /// 未识别的配置项（train、valid 等）
  pub extras: BTreeMap<String, String>,
}

impl DataConfig {
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    debug!("读取数据配置: {}", path.display());
    content.parse()
  }
}

fn parse_usize(key: &'static str, value: &str) -> Result<usize, ConfigError> {
  value.parse().map_err(|_| ConfigError::InvalidValue {
    key,
    value: value.to_string(),
  })
}

fn parse_gpus(value: &str) -> Result<Vec<i32>, ConfigError> {
  value
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| {
      s.parse().map_err(|_| ConfigError::InvalidValue {
        key: "gpus",
        value: value.to_string(),
      })
    })
    .collect()
}

fn non_empty_path(value: String) -> Option<PathBuf> {
  (!value.is_empty()).then(|| PathBuf::from(value))
}

impl FromStr for DataConfig {
  type Err = ConfigError;

  fn from_str(content: &str) -> Result<Self, Self::Err> {
    let mut options = BTreeMap::new();

    for (index, raw) in content.lines().enumerate() {
      let line = raw.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::MalformedLine {
        line: index + 1,
        content: raw.to_string(),
      })?;
      options.insert(key.trim().to_string(), value.trim().to_string());
    }

    let backup = options
      .remove("backup")
      .and_then(non_empty_path)
      .ok_or(ConfigError::MissingKey("backup"))?;
    let network = options
      .remove("network")
      .and_then(non_empty_path)
      .ok_or(ConfigError::MissingKey("network"))?;
    let detect_log = options.remove("detect_log").and_then(non_empty_path);
    let gpus = match options.remove("gpus") {
      Some(v) => parse_gpus(&v)?,
      None => Vec::new(),
    };
    let num_workers = match options.remove("num_workers") {
      Some(v) => parse_usize("num_workers", &v)?,
      None => DEFAULT_NUM_WORKERS,
    };
    let classes = options
      .remove("classes")
      .map(|v| parse_usize("classes", &v))
      .transpose()?;
    let names = options.remove("names").and_then(non_empty_path);

    for key in options.keys() {
      debug!("忽略未识别的配置项: {}", key);
    }

    Ok(DataConfig {
      backup,
      network,
      detect_log,
      gpus,
      num_workers,
      classes,
      names,
      extras: options,
    })
  }
}
