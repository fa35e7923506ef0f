// 该文件是 Lanshan （岚山） 项目的一部分。
// src/model.rs - 推理模型接口
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

use std::marker::PhantomData;

use crate::decode::RawTensorOutput;

/// 推理协作方：对一帧图像执行模型，返回未经处理的原始张量。
///
/// 模型加载、编译与加速器相关的错误都应在这里报告，
/// 解码器只接收形状合法的输出。
pub trait Model {
  type Input;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<RawTensorOutput, Self::Error>;
}

/// 将闭包包装为模型
pub struct PredictFn<Frame, P> {
  predict: P,
  _phantom: PhantomData<fn(&Frame)>,
}

impl<Frame, P> PredictFn<Frame, P> {
  pub fn new(predict: P) -> Self {
    Self {
      predict,
      _phantom: PhantomData,
    }
  }
}

impl<Frame, E, P> Model for PredictFn<Frame, P>
where
  P: Fn(&Frame) -> Result<RawTensorOutput, E>,
{
  type Input = Frame;
  type Error = E;

  fn infer(&self, input: &Self::Input) -> Result<RawTensorOutput, Self::Error> {
    (self.predict)(input)
  }
}

mod tensor_replay;
pub use self::tensor_replay::{TensorRecord, TensorReplay, TensorReplayError};
