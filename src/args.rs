// 该文件是 Lanshan （岚山） 项目的一部分。
// src/args.rs - 解码相关的公共参数
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

use clap::Args;
use tracing::info;

use crate::{
  config::ConfidenceFilter,
  decode::DetectionDecoder,
  labels::{ClassLabelTable, LabelError},
  task::FrameProcessor,
};

/// 解码参数，由各个可执行程序展开使用
#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
  /// 标签文件（每行一个或 JSON 数组），缺省使用 COCO 80 类
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)，缺省时输出全部检测槽
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f64>,

  /// 不做纵轴翻转，输出左上角原点坐标
  #[arg(long)]
  pub no_flip: bool,
}

impl DecodeArgs {
  pub fn label_table(&self) -> Result<ClassLabelTable, LabelError> {
    match &self.labels {
      Some(path) => ClassLabelTable::from_file(path),
      None => Ok(ClassLabelTable::coco()),
    }
  }

  pub fn frame_processor(&self) -> Result<FrameProcessor, LabelError> {
    let labels = self.label_table()?;
    info!("标签数量: {}", labels.len());
    if let Some(threshold) = self.confidence {
      info!("置信度阈值: {}", threshold);
    }

    let decoder = DetectionDecoder::new(labels).with_vertical_flip(!self.no_flip);
    Ok(FrameProcessor::new(decoder).with_filter(self.confidence.map(ConfidenceFilter::new)))
  }
}
