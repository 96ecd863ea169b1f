// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::info;

use darkdet::{
  config::DataConfig,
  engine::{InferenceEngine, ReplayEngine},
  labels::ClassNames,
  logging::{self, LogOptions},
  model::Model,
  output::{ConsoleOutput, JsonRecordOutput, OutputSet, SaveImageFileOutput},
  task::{ContinuousTask, DirectoryTask, OneShotTask, Task, TaskSummary},
};

use args::Args;

fn main() -> Result<()> {
  let args = Args::parse();

  let config = DataConfig::from_file(&args.data_config)?;
  logging::init(&LogOptions {
    debug: args.debug,
    file: config.detect_log.clone(),
  })?;

  info!("Darkdet 目标检测");
  info!("数据配置: {}", args.data_config.display());
  info!(
    "阈值: thresh={} hier_thresh={} nms={}",
    args.thresh, args.hier_thresh, args.nms
  );

  let summary = match &args.replay {
    Some(replay) => {
      let engine = ReplayEngine::from_file(replay)?;
      let names = if engine.names().is_empty() {
        let path = config
          .names
          .as_ref()
          .context("回放文件与数据配置均未提供类别名称")?;
        ClassNames::from_file(path)
          .with_context(|| format!("无法读取类别名称文件 {}", path.display()))?
      } else {
        engine.names().iter().cloned().collect()
      };
      run(&args, Model::new(engine, names))?
    }
    None => run(&args, load_darknet(config)?)?,
  };

  info!(
    "处理完成: {} 张图像, {} 张失败, {} 个对象",
    summary.images, summary.failed, summary.detections
  );
  info!("结束时间: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
  Ok(())
}

#[cfg(feature = "darknet")]
fn load_darknet(config: DataConfig) -> Result<Model<darkdet::engine::DarknetEngine>> {
  use darkdet::{engine::DarknetEngine, model::ModelFiles};

  let files = ModelFiles::from_config(config)?;
  info!("网络文件: {}", files.network_cfg.display());
  info!("权重文件: {}", files.weights.display());
  let engine = DarknetEngine::load(
    &files.network_cfg,
    &files.weights,
    files.names.len(),
    files.config.gpus.first().copied(),
  )?;
  Ok(Model::new(engine, files.names))
}

#[cfg(not(feature = "darknet"))]
fn load_darknet(_config: DataConfig) -> Result<Model<ReplayEngine>> {
  anyhow::bail!("未启用 darknet 特性，请使用 --replay 或以 --features darknet 重新编译")
}

fn run<E: InferenceEngine>(args: &Args, mut model: Model<E>) -> Result<TaskSummary> {
  let output = OutputSet {
    console: Some(ConsoleOutput),
    image: args.image.is_some().then(|| SaveImageFileOutput::new(args.relative)),
    json: args
      .json
      .as_ref()
      .map(JsonRecordOutput::create)
      .transpose()
      .context("无法创建 JSON 记录文件")?,
  };
  let options = args.detect_options();

  if let Some(image) = &args.image {
    return OneShotTask::new(image).run_task(&mut model, &output, &options);
  }
  // clap 保证 image 与 path 二者必有其一
  let dir = args.path.as_ref().context("缺少输入")?;
  if args.forever {
    ContinuousTask::new(dir)
      .with_rounds(args.rounds)
      .run_task(&mut model, &output, &options)
  } else {
    DirectoryTask::new(dir).run_task(&mut model, &output, &options)
  }
}
