// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/output/json_record.rs - JSON 结果记录
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
  fs::{File, OpenOptions},
  io::{BufWriter, Write},
  path::Path,
  sync::Mutex,
};

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::{
  detection::{DetectResult, RankedResult},
  frame::Image,
  output::Render,
};

#[derive(Serialize)]
struct Record<'a> {
  image: &'a Path,
  timestamp: String,
  width: u32,
  height: u32,
  detections: &'a [RankedResult],
}

/// 每张图像追加一行 JSON
pub struct JsonRecordOutput {
  writer: Mutex<BufWriter<File>>,
}

impl JsonRecordOutput {
  pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(path.as_ref())?;
    debug!("JSON 记录写入 {}", path.as_ref().display());
    Ok(Self {
      writer: Mutex::new(BufWriter::new(file)),
    })
  }
}

impl Render for JsonRecordOutput {
  type Error = std::io::Error;

  fn render_result(
    &self,
    source: &Path,
    image: &Image,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    let record = Record {
      image: source,
      timestamp: Utc::now().to_rfc3339(),
      width: image.width(),
      height: image.height(),
      detections: &result.items,
    };
    let line = serde_json::to_string(&record)?;

    let mut writer = self
      .writer
      .lock()
      .map_err(|_| std::io::Error::other("JSON 记录写入锁已损坏"))?;
    writeln!(writer, "{}", line)?;
    writer.flush()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bbox::BoundingBox;

  #[test]
  fn appends_one_line_per_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.jsonl");
    let output = JsonRecordOutput::create(&path).unwrap();
    let image = Image::with_shape(8, 4, 3);
    let result = DetectResult::from(vec![RankedResult {
      label: "cat".into(),
      class_id: 0,
      prob: 0.75,
      bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
    }]);

    output.render_result(Path::new("a.jpg"), &image, &result).unwrap();
    output
      .render_result(Path::new("b.jpg"), &image, &DetectResult::default())
      .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = content
      .lines()
      .map(|l| serde_json::from_str(l).unwrap())
      .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["image"], "a.jpg");
    assert_eq!(lines[0]["width"], 8);
    assert_eq!(lines[0]["detections"][0]["label"], "cat");
    assert_eq!(lines[0]["detections"][0]["bbox"]["w"], 3.0);
    assert!(lines[1]["detections"].as_array().unwrap().is_empty());
  }
}
