// 该文件是 Lanshan （岚山） 项目的一部分。
// src/labels.rs - 类别标签表
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

use std::{path::Path, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("标签表为空")]
  Empty,
}

/// 类别标签表，索引即模型输出的类别编号。
///
/// 构造后不可修改，克隆只增加引用计数，可以在线程之间共享。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelTable {
  names: Arc<[String]>,
}

impl ClassLabelTable {
  pub fn new<I, S>(names: I) -> Result<Self, LabelError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    if names.is_empty() {
      return Err(LabelError::Empty);
    }
    Ok(Self {
      names: names.into(),
    })
  }

  pub fn coco() -> Self {
    Self {
      names: COCO_CLASSES.iter().map(|name| name.to_string()).collect(),
    }
  }

  /// 从文件加载标签表：`.json` 文件为字符串数组，其余按行读取，忽略空行。
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;

    let is_json = path
      .extension()
      .map(|ext| ext.eq_ignore_ascii_case("json"))
      .unwrap_or(false);

    let table = if is_json {
      let names: Vec<String> = serde_json::from_str(&content)?;
      Self::new(names)?
    } else {
      Self::new(
        content
          .lines()
          .map(str::trim)
          .filter(|line| !line.is_empty()),
      )?
    };

    debug!("标签数量: {}", table.len());
    Ok(table)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

impl Default for ClassLabelTable {
  fn default() -> Self {
    Self::coco()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn coco_table_has_80_classes_in_order() {
    let table = ClassLabelTable::coco();
    assert_eq!(table.len(), 80);
    assert_eq!(table.get(0), Some("person"));
    assert_eq!(table.get(79), Some("toothbrush"));
    assert_eq!(table.get(80), None);
  }

  #[test]
  fn empty_table_is_rejected() {
    let names: Vec<String> = Vec::new();
    assert!(matches!(ClassLabelTable::new(names), Err(LabelError::Empty)));
  }

  #[test]
  fn loads_line_file_skipping_blank_lines() {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(file, "cat\n\n  dog  \nbird").unwrap();

    let table = ClassLabelTable::from_file(file.path()).unwrap();
    assert_eq!(table.iter().collect::<Vec<_>>(), vec!["cat", "dog", "bird"]);
  }

  #[test]
  fn loads_json_array_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"["a", "b"]"#).unwrap();

    let table = ClassLabelTable::from_file(file.path()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1), Some("b"));
  }

  #[test]
  fn empty_json_array_is_rejected() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, "[]").unwrap();

    assert!(matches!(
      ClassLabelTable::from_file(file.path()),
      Err(LabelError::Empty)
    ));
  }
}
