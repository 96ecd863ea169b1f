// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/network.rs - 推理用网络结构文件
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

use tracing::{debug, info};

const DETECT_CFG_PREFIX: &str = "detect-";

/// 把训练用的 batch/subdivisions 改为 1，其余行原样保留
pub fn rewrite_for_inference(content: &str) -> String {
  let mut out = String::with_capacity(content.len());
  for line in content.split_inclusive('\n') {
    let key = line.split('=').next().unwrap_or("").trim().to_ascii_lowercase();
    let has_value = line.contains('=');
    match key.as_str() {
      "batch" if has_value => out.push_str("batch=1\n"),
      "subdivisions" if has_value => out.push_str("subdivisions=1\n"),
      _ => out.push_str(line),
    }
  }
  out
}

/// 网络结构中各输出层声明的 `classes=` 值，按出现顺序
pub fn declared_classes(content: &str) -> Vec<usize> {
  content
    .lines()
    .map(str::trim)
    .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
    .filter_map(|line| line.split_once('='))
    .filter(|(key, _)| key.trim().eq_ignore_ascii_case("classes"))
    .filter_map(|(_, value)| value.trim().parse().ok())
    .collect()
}

/// `cfg/yolov3.cfg` -> `cfg/detect-yolov3.cfg`
pub fn detect_cfg_path(network: &Path) -> PathBuf {
  let name = network
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  network.with_file_name(format!("{}{}", DETECT_CFG_PREFIX, name))
}

/// 生成推理用网络结构文件，已存在时直接复用
pub fn derive_detect_cfg<P: AsRef<Path>>(network: P) -> std::io::Result<PathBuf> {
  let network = network.as_ref();
  let detect_cfg = detect_cfg_path(network);
  if detect_cfg.exists() {
    debug!("复用推理网络文件: {}", detect_cfg.display());
    return Ok(detect_cfg);
  }

  let content = std::fs::read_to_string(network)?;
  std::fs::write(&detect_cfg, rewrite_for_inference(&content))?;
  info!("生成推理网络文件: {}", detect_cfg.display());
  Ok(detect_cfg)
}
