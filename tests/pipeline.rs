// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// tests/pipeline.rs - 检测流水线集成测试
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

use std::{cell::Cell, path::Path, rc::Rc};

use darkdet::{
  bbox::BoundingBox,
  detection::{DetectError, Detection},
  engine::{InferenceEngine, InferenceParams, NmsKind, ReplayEngine},
  frame::Image,
  labels::ClassNames,
  model::{DetectOptions, Model},
  output::{JsonRecordOutput, Render},
  postprocess::{filter_candidates, rank},
};

#[derive(Debug, thiserror::Error)]
#[error("模拟引擎失败")]
struct StubError;

/// 记录归还次数的引擎
struct StubEngine {
  batch: Vec<Detection>,
  fail_suppress: bool,
  released: Rc<Cell<usize>>,
}

impl InferenceEngine for StubEngine {
  type Batch = Vec<Detection>;
  type Error = StubError;

  fn input_size(&self) -> (u32, u32) {
    (32, 32)
  }

  fn predict_scores(&mut self, _image: &Image) -> Result<Vec<f32>, Self::Error> {
    Err(StubError)
  }

  fn run_inference(
    &mut self,
    _image: &Image,
    _params: &InferenceParams,
  ) -> Result<Self::Batch, Self::Error> {
    Ok(self.batch.clone())
  }

  fn suppress_overlaps(
    &mut self,
    _batch: &mut Self::Batch,
    _classes: usize,
    _iou_threshold: f32,
    _kind: NmsKind,
  ) -> Result<(), Self::Error> {
    if self.fail_suppress {
      Err(StubError)
    } else {
      Ok(())
    }
  }

  fn release_batch(&mut self, _batch: Self::Batch) {
    self.released.set(self.released.get() + 1);
  }
}

fn stub_model(batch: Vec<Detection>, fail_suppress: bool) -> (Model<StubEngine>, Rc<Cell<usize>>) {
  let released = Rc::new(Cell::new(0));
  let engine = StubEngine {
    batch,
    fail_suppress,
    released: released.clone(),
  };
  let names: ClassNames = ["a", "b", "c"].into_iter().collect();
  (Model::new(engine, names), released)
}

fn det(prob: Vec<f32>, x: f32) -> Detection {
  Detection::new(BoundingBox::new(x, 0.5, 0.1, 0.1), prob, 0.9)
}

#[test]
fn filter_then_rank_keeps_darknet_order() {
  let batch = vec![det(vec![0.9, 0.0, 0.2], 0.1), det(vec![0.0, 0.0, 0.05], 0.7)];
  let names: ClassNames = ["class0", "class1", "class2"].into_iter().collect();

  let ranked = rank(filter_candidates(&batch, &names).unwrap());
  let got: Vec<(&str, f32, f32)> = ranked
    .iter()
    .map(|r| (r.label.as_str(), r.prob, r.bbox.x))
    .collect();
  assert_eq!(
    got,
    vec![("class0", 0.9, 0.1), ("class2", 0.2, 0.1), ("class2", 0.05, 0.7)]
  );
}

#[test]
fn empty_batch_gives_empty_result() {
  let (mut model, released) = stub_model(Vec::new(), false);
  let result = model
    .run_detection(&Image::with_shape(32, 32, 3), &DetectOptions::default())
    .unwrap();
  assert!(result.is_empty());
  assert_eq!(released.get(), 1);
}

#[test]
fn batch_is_released_once_per_call() {
  let (mut model, released) = stub_model(vec![det(vec![0.8, 0.0, 0.0], 0.5)], false);
  let image = Image::with_shape(32, 32, 3);
  for _ in 0..3 {
    let result = model.run_detection(&image, &DetectOptions::default()).unwrap();
    assert_eq!(result.len(), 1);
  }
  assert_eq!(released.get(), 3);
}

#[test]
fn suppression_failure_releases_batch() {
  let (mut model, released) = stub_model(vec![det(vec![0.8, 0.0, 0.0], 0.5)], true);
  let err = model
    .run_detection(&Image::with_shape(32, 32, 3), &DetectOptions::default())
    .unwrap_err();
  assert!(matches!(err, DetectError::Engine(_)));
  assert_eq!(released.get(), 1);
}

#[test]
fn malformed_batch_releases_batch() {
  let (mut model, released) = stub_model(vec![det(vec![0.8], 0.5)], false);
  let err = model
    .run_detection(&Image::with_shape(32, 32, 3), &DetectOptions::default())
    .unwrap_err();
  assert!(matches!(err, DetectError::InvalidDetectionBatch(_)));
  assert_eq!(released.get(), 1);
}

#[test]
fn classify_failure_is_an_engine_error() {
  let (mut model, released) = stub_model(Vec::new(), false);
  let err = model.classify(&Image::with_shape(8, 8, 3)).unwrap_err();
  assert!(matches!(err, DetectError::Engine(_)));
  assert_eq!(released.get(), 0);
}

const RECORDING: &str = r#"{
  "input_size": [100, 100],
  "names": ["cat", "dog"],
  "frames": [
    {
      "detections": [
        { "bbox": { "x": 0.5, "y": 0.5, "w": 0.2, "h": 0.2 }, "prob": [0.9, 0.0], "objectness": 0.9 },
        { "bbox": { "x": 0.51, "y": 0.5, "w": 0.2, "h": 0.2 }, "prob": [0.7, 0.0], "objectness": 0.8 },
        { "bbox": { "x": 0.1, "y": 0.1, "w": 0.1, "h": 0.1 }, "prob": [0.0, 0.6], "objectness": 0.95 }
      ]
    }
  ]
}"#;

fn replay_model(dir: &Path) -> Model<ReplayEngine> {
  let path = dir.join("recording.json");
  std::fs::write(&path, RECORDING).unwrap();
  let engine = ReplayEngine::from_file(&path).unwrap();
  let names = engine.names().iter().cloned().collect();
  Model::new(engine, names)
}

#[test]
fn replayed_frame_is_suppressed_and_recorded() {
  let dir = tempfile::tempdir().unwrap();
  let mut model = replay_model(dir.path());
  let image = Image::with_shape(100, 100, 3);

  let result = model.run_detection(&image, &DetectOptions::default()).unwrap();
  let labels: Vec<&str> = result.iter().map(|r| r.label.as_str()).collect();
  assert_eq!(labels, vec!["cat", "dog"]);
  let cat = &result.iter().next().unwrap().bbox;
  assert!((cat.x - 50.0).abs() < 1e-3);
  assert!((cat.w - 20.0).abs() < 1e-3);
  assert_eq!(model.engine().outstanding(), 0);

  let record = dir.path().join("results.jsonl");
  let output = JsonRecordOutput::create(&record).unwrap();
  output
    .render_result(Path::new("frame.jpg"), &image, &result)
    .unwrap();
  let line: serde_json::Value =
    serde_json::from_str(std::fs::read_to_string(&record).unwrap().trim()).unwrap();
  assert_eq!(line["image"], "frame.jpg");
  assert_eq!(line["detections"].as_array().unwrap().len(), 2);
  assert_eq!(line["detections"][0]["label"], "cat");
}

#[test]
fn zero_iou_threshold_disables_suppression() {
  let dir = tempfile::tempdir().unwrap();
  let mut model = replay_model(dir.path());
  let options = DetectOptions {
    iou_threshold: 0.0,
    ..DetectOptions::default()
  };

  let result = model
    .run_detection(&Image::with_shape(100, 100, 3), &options)
    .unwrap();
  let probs: Vec<f32> = result.iter().map(|r| r.prob).collect();
  assert_eq!(probs, vec![0.9, 0.7, 0.6]);
}

#[test]
fn per_class_suppression_matches_objectness_here() {
  let dir = tempfile::tempdir().unwrap();
  let mut model = replay_model(dir.path());
  let options = DetectOptions {
    nms_kind: NmsKind::PerClass,
    ..DetectOptions::default()
  };

  let result = model
    .run_detection(&Image::with_shape(100, 100, 3), &options)
    .unwrap();
  assert_eq!(result.len(), 2);
}
