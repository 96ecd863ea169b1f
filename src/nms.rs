// 该文件是 Darkdet （暗夜检测） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

//! 与 darknet `do_nms_obj` / `do_nms_sort` 语义一致的原地抑制。
//!
//! 被抑制的候选框不会被删除，只是把对应概率（以及 objectness）清零，
//! 之后由候选过滤丢弃。排序使用稳定排序。

use tracing::debug;

use crate::detection::Detection;

/// 把 objectness 为 0 的候选框移到尾部，返回有效数量
fn partition_live(dets: &mut [Detection]) -> usize {
  let mut end = dets.len();
  let mut i = 0;
  while i < end {
    if dets[i].objectness == 0.0 {
      end -= 1;
      dets.swap(i, end);
    } else {
      i += 1;
    }
  }
  end
}

fn sort_key(det: &Detection) -> f32 {
  match det.sort_class {
    Some(class) => det.prob.get(class).copied().unwrap_or(0.0),
    None => det.objectness,
  }
}

fn sort_descending(dets: &mut [Detection]) {
  dets.sort_by(|a, b| sort_key(b).total_cmp(&sort_key(a)));
}

/// 基于 objectness 的抑制：重叠超过阈值的低分框整体清零
pub fn do_nms_obj(dets: &mut [Detection], classes: usize, threshold: f32) {
  let total = partition_live(dets);
  let live = &mut dets[..total];

  for det in live.iter_mut() {
    det.sort_class = None;
  }
  sort_descending(live);

  let mut suppressed = 0usize;
  for i in 0..total {
    if live[i].objectness == 0.0 {
      continue;
    }
    let a = live[i].bbox;
    for j in (i + 1)..total {
      if live[j].objectness == 0.0 {
        continue;
      }
      if a.iou(&live[j].bbox) > threshold {
        let det = &mut live[j];
        det.objectness = 0.0;
        let n = classes.min(det.prob.len());
        det.prob[..n].fill(0.0);
        suppressed += 1;
      }
    }
  }

  debug!("objectness NMS: {} 个候选框, 抑制 {} 个", total, suppressed);
}

/// 逐类别抑制：每个类别独立排序，重叠超过阈值的低分框只清零该类别概率
pub fn do_nms_sort(dets: &mut [Detection], classes: usize, threshold: f32) {
  let total = partition_live(dets);
  let live = &mut dets[..total];

  let mut suppressed = 0usize;
  for class in 0..classes {
    for det in live.iter_mut() {
      det.sort_class = Some(class);
    }
    sort_descending(live);

    for i in 0..total {
      if live[i].prob.get(class).copied().unwrap_or(0.0) == 0.0 {
        continue;
      }
      let a = live[i].bbox;
      for j in (i + 1)..total {
        if a.iou(&live[j].bbox) > threshold
          && let Some(p) = live[j].prob.get_mut(class)
        {
          if *p != 0.0 {
            suppressed += 1;
          }
          *p = 0.0;
        }
      }
    }
  }

  debug!("逐类别 NMS: {} 个候选框, 抑制 {} 项", total, suppressed);
}
