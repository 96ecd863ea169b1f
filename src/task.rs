// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/task.rs - 检测任务
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};

use tracing::{info, warn};

use crate::{
  engine::InferenceEngine,
  frame::Image,
  input::ImageFileInput,
  model::{DetectOptions, Model},
  output::Render,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
  pub images: usize,
  pub failed: usize,
  pub detections: usize,
}

pub trait Task<E: InferenceEngine, O: Render> {
  type Error;
  fn run_task(
    self,
    model: &mut Model<E>,
    output: &O,
    options: &DetectOptions,
  ) -> Result<TaskSummary, Self::Error>;
}

fn detect_one<E, O>(
  model: &mut Model<E>,
  output: &O,
  options: &DetectOptions,
  path: &Path,
  image: &Image,
) -> anyhow::Result<usize>
where
  E: InferenceEngine,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  let now = std::time::Instant::now();
  let result = model.run_detection(image, options)?;
  info!(
    "{}: 检测到 {} 个对象，耗时 {:.2?}",
    path.display(),
    result.len(),
    now.elapsed()
  );
  output.render_result(path, image, &result)?;
  Ok(result.len())
}

/// 逐张检测，单张失败只记录警告
fn run_input<E, O>(
  input: ImageFileInput,
  model: &mut Model<E>,
  output: &O,
  options: &DetectOptions,
  summary: &mut TaskSummary,
) where
  E: InferenceEngine,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  for (path, image) in input {
    summary.images += 1;
    let outcome = match image {
      Ok(image) => detect_one(model, output, options, &path, &image),
      Err(e) => Err(e.into()),
    };
    match outcome {
      Ok(n) => summary.detections += n,
      Err(e) => {
        summary.failed += 1;
        warn!("{} 处理失败: {:#}", path.display(), e);
      }
    }
  }
}

/// 检测单张图像，失败直接返回错误
pub struct OneShotTask {
  path: PathBuf,
}

impl OneShotTask {
  pub fn new<P: Into<PathBuf>>(path: P) -> Self {
    Self { path: path.into() }
  }
}

impl<E, O> Task<E, O> for OneShotTask
where
  E: InferenceEngine,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    model: &mut Model<E>,
    output: &O,
    options: &DetectOptions,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始检测图像: {}", self.path.display());
    let image = crate::input::load_image(&self.path)?;
    let detections = detect_one(model, output, options, &self.path, &image)?;
    Ok(TaskSummary {
      images: 1,
      failed: 0,
      detections,
    })
  }
}

/// 检测目录下所有 `.jpg` 图像一次
pub struct DirectoryTask {
  dir: PathBuf,
}

impl DirectoryTask {
  pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
    Self { dir: dir.into() }
  }
}

impl<E, O> Task<E, O> for DirectoryTask
where
  E: InferenceEngine,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    model: &mut Model<E>,
    output: &O,
    options: &DetectOptions,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始检测目录: {}", self.dir.display());
    let mut summary = TaskSummary::default();
    let input = ImageFileInput::directory(&self.dir)?;
    run_input(input, model, output, options, &mut summary);
    info!(
      "目录检测完成: {} 张图像, {} 张失败, {} 个对象",
      summary.images, summary.failed, summary.detections
    );
    Ok(summary)
  }
}

/// 反复扫描目录并检测，直到收到中断信号或达到轮数上限
#[derive(Debug)]
pub struct ContinuousTask {
  dir: PathBuf,
  rounds: Option<usize>,
  interval: Duration,
}

impl ContinuousTask {
  pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
    Self {
      dir: dir.into(),
      rounds: None,
      interval: Duration::from_secs(1),
    }
  }

  pub fn with_rounds(mut self, rounds: Option<usize>) -> Self {
    self.rounds = rounds;
    self
  }

  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  fn run_until<E, O>(
    self,
    stop: &AtomicBool,
    model: &mut Model<E>,
    output: &O,
    options: &DetectOptions,
  ) -> anyhow::Result<TaskSummary>
  where
    E: InferenceEngine,
    O: Render,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    let mut summary = TaskSummary::default();
    let mut round = 0usize;
    while !stop.load(Ordering::SeqCst) {
      round += 1;
      info!("第 {} 轮扫描: {}", round, self.dir.display());
      let input = ImageFileInput::directory(&self.dir)?;
      run_input(input, model, output, options, &mut summary);

      if self.rounds.is_some_and(|n| round >= n) {
        info!("达到指定轮数 {}, 退出任务循环", round);
        break;
      }
      if stop.load(Ordering::SeqCst) {
        break;
      }
      thread::sleep(self.interval);
    }
    info!(
      "任务完成: {} 轮, {} 张图像, {} 个对象",
      round, summary.images, summary.detections
    );
    Ok(summary)
  }
}

impl<E, O> Task<E, O> for ContinuousTask
where
  E: InferenceEngine,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    model: &mut Model<E>,
    output: &O,
    options: &DetectOptions,
  ) -> Result<TaskSummary, Self::Error> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      handler_stop.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    self.run_until(&stop, model, output, options)
  }
}
