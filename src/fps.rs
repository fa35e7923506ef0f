// 该文件是 Lanshan （岚山） 项目的一部分。
// src/fps.rs - 帧率测量
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

use std::time::{Duration, Instant};

/// 单帧瞬时帧率：`1 / (end - start)`，不做平滑。
///
/// 耗时为零时返回 `f64::INFINITY`，由调用方决定如何显示。
pub fn measure_fps(start: Instant, end: Instant) -> f64 {
  fps_from_duration(end.saturating_duration_since(start))
}

pub fn fps_from_duration(elapsed: Duration) -> f64 {
  1.0 / elapsed.as_secs_f64()
}

/// 一帧的起止时刻，只用于计算帧率
#[derive(Debug, Clone, Copy)]
pub struct FrameTiming {
  pub start: Instant,
  pub end: Instant,
}

impl FrameTiming {
  pub fn start() -> Self {
    let now = Instant::now();
    Self {
      start: now,
      end: now,
    }
  }

  pub fn finish(mut self) -> Self {
    self.end = Instant::now();
    self
  }

  pub fn elapsed(&self) -> Duration {
    self.end.saturating_duration_since(self.start)
  }

  pub fn fps(&self) -> f64 {
    measure_fps(self.start, self.end)
  }
}
