// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/postprocess.rs - 候选过滤与结果排序
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

//! 重叠抑制之后的后处理。
//!
//! 几何重叠抑制由推理引擎在展平之前完成；这里只负责把每个候选框按类别
//! 展平，并按概率全局排序。

use tracing::debug;

use crate::{
  detection::{DetectError, DetectionBatch, RankedResult},
  labels::ClassNames,
};

/// 展平候选框
///
/// 对每个候选框的每个类别，只要 `prob > 0` 就输出一条结果。输出顺序为
/// 候选框顺序，其次类别顺序。空批次直接返回空结果。
pub fn filter_candidates<B>(
  batch: &B,
  names: &ClassNames,
) -> Result<Vec<RankedResult>, DetectError>
where
  B: DetectionBatch + ?Sized,
{
  if batch.is_empty() {
    return Ok(Vec::new());
  }

  let classes = names.len();
  if classes == 0 {
    return Err(DetectError::invalid("类别数量为 0"));
  }

  let mut results = Vec::new();
  for (index, det) in batch.iter().enumerate() {
    if det.prob.len() < classes {
      return Err(DetectError::invalid(format!(
        "第 {} 个候选框的概率向量长度为 {}, 期望至少 {}",
        index,
        det.prob.len(),
        classes
      )));
    }

    for (class_id, (&prob, label)) in det.prob.iter().zip(names.iter()).enumerate() {
      if prob > 0.0 {
        results.push(RankedResult {
          label: label.to_string(),
          class_id,
          prob,
          bbox: det.bbox,
        });
      }
    }
  }

  debug!("{} 个候选框展平为 {} 条结果", batch.len(), results.len());
  Ok(results)
}

/// 按概率降序排序，概率相同时保持输入顺序
pub fn rank(mut results: Vec<RankedResult>) -> Vec<RankedResult> {
  results.sort_by(|a, b| b.prob.total_cmp(&a.prob));
  results
}

/// 分类结果: (类别名称, 得分)，按得分降序
pub fn rank_scores(
  scores: &[f32],
  names: &ClassNames,
) -> Result<Vec<(String, f32)>, DetectError> {
  if names.is_empty() {
    return Err(DetectError::invalid("类别数量为 0"));
  }
  if scores.len() < names.len() {
    return Err(DetectError::invalid(format!(
      "分类输出长度为 {}, 期望至少 {}",
      scores.len(),
      names.len()
    )));
  }

  let mut ranked: Vec<(String, f32)> = names
    .iter()
    .zip(scores)
    .map(|(name, &score)| (name.to_string(), score))
    .collect();
  ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
  Ok(ranked)
}
