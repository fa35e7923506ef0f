// 该文件是 Lanshan （岚山） 项目的一部分。
// src/bin/simple_oneshot.rs - 单帧推理
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use lanshan::{
  FromUrl,
  args::DecodeArgs,
  frame::RgbNhwcFrame,
  input::InputWrapper,
  model::TensorReplay,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

/// Lanshan 单帧推理参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型来源，例如 tensor:///path/to/output.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[command(flatten)]
  pub decode: DecodeArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型来源: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let processor = args.decode.frame_processor()?;
  let input_image = InputWrapper::from_url(&args.input)?;
  let model = TensorReplay::<RgbNhwcFrame>::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let summary = OneShotTask::new(processor).run_task(input_image.into_nhwc(), model, output)?;
  info!("检测结果数量: {}", summary.detections);

  Ok(())
}
