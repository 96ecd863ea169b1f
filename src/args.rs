// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};

use darkdet::{bbox::BoxMapping, engine::NmsKind, model::DetectOptions};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NmsKindArg {
  /// 按 objectness 整体抑制
  #[default]
  Objectness,
  /// 逐类别抑制
  PerClass,
}

impl From<NmsKindArg> for NmsKind {
  fn from(value: NmsKindArg) -> Self {
    match value {
      NmsKindArg::Objectness => NmsKind::Objectness,
      NmsKindArg::PerClass => NmsKind::PerClass,
    }
  }
}

/// Darkdet 目标检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["image", "path"])))]
pub struct Args {
  /// darknet 数据配置文件（*.data）
  #[arg(value_name = "DATA_CONFIG")]
  pub data_config: PathBuf,

  /// 检测单张图像
  #[arg(short, long, value_name = "FILE")]
  pub image: Option<PathBuf>,

  /// 检测目录下所有 jpg 图像
  #[arg(short, long, value_name = "DIR")]
  pub path: Option<PathBuf>,

  /// 输出调试日志
  #[arg(short, long)]
  pub debug: bool,

  /// 反复扫描目录直到 Ctrl-C
  #[arg(short, long, requires = "path")]
  pub forever: bool,

  /// 反复扫描的轮数上限
  #[arg(long, value_name = "COUNT", requires = "forever")]
  pub rounds: Option<usize>,

  /// 置信度阈值
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub thresh: f32,

  /// 层级分类阈值（darknet hier_thresh），用于类别树的逐级判定
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub hier_thresh: f32,

  /// NMS IoU 阈值，0 表示不做抑制
  #[arg(long, default_value_t = 0.45, value_name = "THRESHOLD")]
  pub nms: f32,

  /// NMS 方式
  #[arg(long, value_enum, default_value_t = NmsKindArg::Objectness)]
  pub nms_kind: NmsKindArg,

  /// 直接拉伸而非 letterbox 缩放
  #[arg(long)]
  pub no_letterbox: bool,

  /// 输出归一化坐标
  #[arg(long)]
  pub relative: bool,

  /// 使用回放文件代替 darknet 推理
  #[arg(long, value_name = "FILE")]
  pub replay: Option<PathBuf>,

  /// 追加 JSON 结果记录
  #[arg(long, value_name = "FILE")]
  pub json: Option<PathBuf>,
}

impl Args {
  pub fn detect_options(&self) -> DetectOptions {
    DetectOptions {
      confidence: self.thresh,
      hier_threshold: self.hier_thresh,
      iou_threshold: self.nms,
      nms_kind: self.nms_kind.into(),
      mapping: if self.no_letterbox {
        BoxMapping::Stretch
      } else {
        BoxMapping::Letterbox
      },
      relative: self.relative,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn parses_image_run() {
    let args = Args::try_parse_from(["darkdet", "voc.data", "-i", "dog.jpg", "--thresh", "0.3"]).unwrap();
    assert_eq!(args.image, Some(PathBuf::from("dog.jpg")));
    let options = args.detect_options();
    assert_eq!(options.confidence, 0.3);
    assert_eq!(options.mapping, BoxMapping::Letterbox);
    assert_eq!(options.nms_kind, NmsKind::Objectness);
  }

  #[test]
  fn parses_forever_directory_run() {
    let args = Args::try_parse_from([
      "darkdet",
      "voc.data",
      "-p",
      "imgs",
      "-f",
      "--nms-kind",
      "per-class",
      "--no-letterbox",
    ])
    .unwrap();
    assert!(args.forever);
    let options = args.detect_options();
    assert_eq!(options.nms_kind, NmsKind::PerClass);
    assert_eq!(options.mapping, BoxMapping::Stretch);
  }

  #[test]
  fn requires_a_source() {
    assert!(Args::try_parse_from(["darkdet", "voc.data"]).is_err());
    assert!(Args::try_parse_from(["darkdet", "voc.data", "-i", "a.jpg", "-p", "dir"]).is_err());
  }

  #[test]
  fn hier_thresh_is_passed_through() {
    let args = Args::try_parse_from(["darkdet", "voc.data", "-i", "a.jpg", "--hier-thresh", "0.25"]).unwrap();
    assert_eq!(args.detect_options().hier_threshold, 0.25);

    let command = Args::command();
    let help = command
      .get_arguments()
      .find(|a| a.get_id() == "hier_thresh")
      .and_then(|a| a.get_help())
      .unwrap()
      .to_string();
    assert!(help.contains("层级"));
    assert!(!help.contains("objectness"));
  }

  #[test]
  fn forever_needs_directory() {
    assert!(Args::try_parse_from(["darkdet", "voc.data", "-i", "a.jpg", "-f"]).is_err());
  }
}
