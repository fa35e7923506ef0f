// 该文件是 Lanshan （岚山） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{FrameReport, Render},
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 将检测结果写入日志，`log://?quiet` 时只输出帧摘要
pub struct LogOutput {
  quiet: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(LogOutput {
      quiet: uri.query_pairs().any(|(k, _)| k == "quiet"),
    })
  }
}

impl<Frame> Render<Frame, FrameReport> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, _frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    info!(
      "帧 {}: 检测到 {} 个对象, fps: {:.2}",
      result.index,
      result.detections.len(),
      result.fps
    );
    if self.quiet {
      return Ok(());
    }
    for det in &result.detections {
      info!(
        "  - {}: {:.2}% at ({:.3}, {:.3}, {:.3}x{:.3})",
        det.label,
        det.confidence * 100.0,
        det.bbox.x,
        det.bbox.y,
        det.bbox.width,
        det.bbox.height
      );
    }
    Ok(())
  }
}
