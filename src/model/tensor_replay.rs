// 该文件是 Lanshan （岚山） 项目的一部分。
// src/model/tensor_replay.rs - 回放录制的原始张量
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
  marker::PhantomData,
  path::{Path, PathBuf},
  sync::atomic::{AtomicUsize, Ordering},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  decode::{BOX_COMPONENTS, DecodeError, RawTensorOutput},
  model::Model,
};

#[derive(Error, Debug)]
pub enum TensorReplayError {
  #[error("模型路径必须使用 {0} 方案")]
  SchemeMismatch(&'static str),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("张量文件解析错误 {0}: {1}")]
  JsonError(PathBuf, serde_json::Error),
  #[error("张量文件 {0} 形状错误: {1}")]
  ShapeError(PathBuf, DecodeError),
  #[error("没有可回放的张量文件: {0}")]
  Empty(PathBuf),
}

/// 张量文件格式，与模型输出名一致
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorRecord {
  pub coordinates: Vec<[f64; BOX_COMPONENTS]>,
  pub confidence: Vec<Vec<f64>>,
}

impl TryFrom<TensorRecord> for RawTensorOutput {
  type Error = DecodeError;

  fn try_from(record: TensorRecord) -> Result<Self, Self::Error> {
    RawTensorOutput::from_rows(record.coordinates, record.confidence)
  }
}

/// 按顺序循环回放一组录制好的原始输出，输入帧只用于驱动节奏。
pub struct TensorReplay<Frame> {
  records: Box<[RawTensorOutput]>,
  cursor: AtomicUsize,
  _phantom: PhantomData<fn(&Frame)>,
}

impl<Frame> FromUrlWithScheme for TensorReplay<Frame> {
  const SCHEME: &'static str = "tensor";
}

impl<Frame> FromUrl for TensorReplay<Frame> {
  type Error = TensorReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!("URI 方案不匹配: 期望 '{}', 实际 '{}'", Self::SCHEME, url.scheme());
      return Err(TensorReplayError::SchemeMismatch(Self::SCHEME));
    }
    Self::open(url.path())
  }
}

impl<Frame> TensorReplay<Frame> {
  pub fn new(records: Vec<RawTensorOutput>) -> Self {
    Self {
      records: records.into_boxed_slice(),
      cursor: AtomicUsize::new(0),
      _phantom: PhantomData,
    }
  }

  /// 打开单个 `.json` 文件，或目录下按文件名排序的全部 `.json` 文件
  pub fn open(path: impl AsRef<Path>) -> Result<Self, TensorReplayError> {
    let path = path.as_ref();
    info!("加载张量文件: {}", path.display());

    let files = if path.is_dir() {
      let mut files = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
          p.extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
        })
        .collect::<Vec<_>>();
      files.sort();
      files
    } else {
      vec![path.to_path_buf()]
    };

    let mut records = Vec::with_capacity(files.len());
    for file in files {
      records.push(Self::load_record(&file)?);
    }
    if records.is_empty() {
      return Err(TensorReplayError::Empty(path.to_path_buf()));
    }

    debug!("张量记录数量: {}", records.len());
    Ok(Self::new(records))
  }

  fn load_record(path: &Path) -> Result<RawTensorOutput, TensorReplayError> {
    let content = std::fs::read_to_string(path)?;
    let record: TensorRecord = serde_json::from_str(&content)
      .map_err(|e| TensorReplayError::JsonError(path.to_path_buf(), e))?;
    RawTensorOutput::try_from(record)
      .map_err(|e| TensorReplayError::ShapeError(path.to_path_buf(), e))
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

impl<Frame> Model for TensorReplay<Frame> {
  type Input = Frame;
  type Error = TensorReplayError;

  fn infer(&self, _input: &Self::Input) -> Result<RawTensorOutput, Self::Error> {
    let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.records.len();
    debug!("回放第 {} 个张量记录", idx);
    Ok(self.records[idx].clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_record(dir: &Path, name: &str, cy: f64) {
    let record = TensorRecord {
      coordinates: vec![[0.5, cy, 0.1, 0.1]],
      confidence: vec![vec![0.2, 0.8]],
    };
    std::fs::write(dir.join(name), serde_json::to_string(&record).unwrap()).unwrap();
  }

  #[test]
  fn replays_directory_in_name_order_and_cycles() {
    let dir = tempfile::tempdir().unwrap();
    write_record(dir.path(), "b.json", 0.2);
    write_record(dir.path(), "a.json", 0.1);
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let replay = TensorReplay::<()>::open(dir.path()).unwrap();
    assert_eq!(replay.len(), 2);

    let cys: Vec<f64> = (0..3)
      .map(|_| replay.infer(&()).unwrap().coordinates()[[0, 1]])
      .collect();
    assert_eq!(cys, vec![0.1, 0.2, 0.1]);
  }

  #[test]
  fn from_url_requires_tensor_scheme() {
    let url = Url::parse("image:///tmp/x.json").unwrap();
    assert!(matches!(
      TensorReplay::<()>::from_url(&url),
      Err(TensorReplayError::SchemeMismatch("tensor"))
    ));
  }

  #[test]
  fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      TensorReplay::<()>::open(dir.path()),
      Err(TensorReplayError::Empty(_))
    ));
  }

  #[test]
  fn ragged_confidence_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(
      &path,
      r#"{"coordinates": [[0.5,0.5,0.1,0.1],[0.5,0.5,0.1,0.1]], "confidence": [[0.1,0.2],[0.3]]}"#,
    )
    .unwrap();
    assert!(matches!(
      TensorReplay::<()>::open(&path),
      Err(TensorReplayError::ShapeError(_, _))
    ));
  }
}
