// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/sample.rs - 离散概率采样
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

use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
  #[error("概率向量为空")]
  Empty,
  #[error("第 {0} 项权重为负")]
  NegativeWeight(usize),
  #[error("概率总和无效: {0}")]
  ZeroMass(f64),
}

/// 按累积减法从离散分布中抽取一个索引
///
/// 输入无需归一化。浮点舍入导致遍历结束仍未命中时返回最后一个索引。
pub fn sample<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> Result<usize, SampleError> {
  if probs.is_empty() {
    return Err(SampleError::Empty);
  }
  if let Some(index) = probs.iter().position(|&p| p < 0.0) {
    return Err(SampleError::NegativeWeight(index));
  }

  let total: f64 = probs.iter().map(|&p| p as f64).sum();
  if !(total.is_finite() && total > 0.0) {
    return Err(SampleError::ZeroMass(total));
  }

  let mut remainder: f64 = rng.random::<f64>();
  for (index, &p) in probs.iter().enumerate() {
    remainder -= p as f64 / total;
    if remainder <= 0.0 {
      return Ok(index);
    }
  }
  Ok(probs.len() - 1)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{SeedableRng, rngs::StdRng};

  #[test]
  fn two_equal_weights_split_evenly() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut counts = [0usize; 2];
    for _ in 0..10_000 {
      counts[sample(&[0.5, 0.5], &mut rng).unwrap()] += 1;
    }
    assert!((4_800..=5_200).contains(&counts[0]), "{:?}", counts);
    assert_eq!(counts[0] + counts[1], 10_000);
  }

  #[test]
  fn frequencies_follow_unnormalized_weights() {
    let mut rng = StdRng::seed_from_u64(42);
    let weights = [1.0, 3.0, 0.0, 4.0];
    let mut counts = [0usize; 4];
    let draws = 20_000;
    for _ in 0..draws {
      counts[sample(&weights, &mut rng).unwrap()] += 1;
    }
    assert_eq!(counts[2], 0);
    for (k, &w) in weights.iter().enumerate() {
      let freq = counts[k] as f64 / draws as f64;
      assert!((freq - w as f64 / 8.0).abs() < 0.02, "index {}: {}", k, freq);
    }
  }

  #[test]
  fn single_positive_weight_is_always_chosen() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..100 {
      assert_eq!(sample(&[0.0, 0.0, 5.0], &mut rng), Ok(2));
    }
  }

  #[test]
  fn rejects_invalid_vectors() {
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(sample(&[], &mut rng), Err(SampleError::Empty));
    assert_eq!(sample(&[0.0, 0.0], &mut rng), Err(SampleError::ZeroMass(0.0)));
    assert_eq!(
      sample(&[0.5, -0.1], &mut rng),
      Err(SampleError::NegativeWeight(1))
    );
    assert!(matches!(
      sample(&[f32::INFINITY], &mut rng),
      Err(SampleError::ZeroMass(_))
    ));
  }
}
