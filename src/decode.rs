// 该文件是 Lanshan （岚山） 项目的一部分。
// src/decode.rs - 原始张量检测结果解码
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

use ndarray::{Array2, ArrayView1};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::labels::ClassLabelTable;

/// 每个检测框的坐标分量数：(cx, cy, w, h)
pub const BOX_COMPONENTS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("张量形状不匹配: {tensor} 期望 {expected}, 实际 {actual}")]
  ShapeMismatch {
    tensor: &'static str,
    expected: usize,
    actual: usize,
  },
}

impl DecodeError {
  fn shape(tensor: &'static str, expected: usize, actual: usize) -> Self {
    DecodeError::ShapeMismatch {
      tensor,
      expected,
      actual,
    }
  }
}

/// 归一化矩形的纵轴原点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerticalOrigin {
  /// 纵轴自下而上，经过 `1 - cy` 翻转后的坐标
  #[default]
  BottomLeft,
  /// 纵轴自上而下，与模型输出及栅格图像一致
  TopLeft,
}

/// 以画面宽高为单位的矩形，`(x, y)` 为原点所在角
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NormalizedRect {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

impl NormalizedRect {
  pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn min_x(&self) -> f64 {
    self.x
  }

  pub fn min_y(&self) -> f64 {
    self.y
  }

  pub fn max_x(&self) -> f64 {
    self.x + self.width
  }

  pub fn max_y(&self) -> f64 {
    self.y + self.height
  }

  pub fn center(&self) -> (f64, f64) {
    (self.x + self.width / 2.0, self.y + self.height / 2.0)
  }

  pub fn half_extents(&self) -> (f64, f64) {
    (self.width / 2.0, self.height / 2.0)
  }

  /// 将矩形转换到左上角原点
  pub fn to_top_left(&self, origin: VerticalOrigin) -> Self {
    match origin {
      VerticalOrigin::TopLeft => *self,
      VerticalOrigin::BottomLeft => Self {
        y: 1.0 - self.y - self.height,
        ..*self
      },
    }
  }

  /// 按渲染目标的像素尺寸缩放，不做裁剪
  pub fn to_pixel_rect(&self, width: u32, height: u32) -> PixelRect {
    let (w, h) = (width as f64, height as f64);
    PixelRect {
      x: self.x * w,
      y: self.y * h,
      width: self.width * w,
      height: self.height * h,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PixelRect {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

impl PixelRect {
  pub fn mid_x(&self) -> f64 {
    self.x + self.width / 2.0
  }

  pub fn mid_y(&self) -> f64 {
    self.y + self.height / 2.0
  }
}

/// 检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  /// 类别索引
  pub class_id: usize,
  /// 类别名称
  pub label: String,
  /// 置信度，按模型输出原样保留
  pub confidence: f64,
  /// 归一化边界框
  pub bbox: NormalizedRect,
}

/// 一次推理得到的原始输出：坐标 `[N, 4]` 与各类别置信度 `[N, C]`
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensorOutput {
  coordinates: Array2<f64>,
  confidences: Array2<f64>,
}

impl RawTensorOutput {
  pub fn new(coordinates: Array2<f64>, confidences: Array2<f64>) -> Self {
    Self {
      coordinates,
      confidences,
    }
  }

  pub fn empty(num_classes: usize) -> Self {
    Self {
      coordinates: Array2::zeros((0, BOX_COMPONENTS)),
      confidences: Array2::zeros((0, num_classes)),
    }
  }

  /// 由逐行数据构造，置信度各行长度必须一致
  pub fn from_rows(
    coordinates: Vec<[f64; BOX_COMPONENTS]>,
    confidences: Vec<Vec<f64>>,
  ) -> Result<Self, DecodeError> {
    let rows = coordinates.len();
    let coordinates = Array2::from_shape_vec(
      (rows, BOX_COMPONENTS),
      coordinates.into_iter().flatten().collect(),
    )
    .map_err(|_| DecodeError::shape("coordinates", rows * BOX_COMPONENTS, 0))?;

    let width = confidences.first().map(Vec::len).unwrap_or(0);
    if let Some(row) = confidences.iter().find(|row| row.len() != width) {
      return Err(DecodeError::shape("confidence", width, row.len()));
    }
    let conf_rows = confidences.len();
    let confidences = Array2::from_shape_vec(
      (conf_rows, width),
      confidences.into_iter().flatten().collect(),
    )
    .map_err(|_| DecodeError::shape("confidence", conf_rows * width, 0))?;

    Ok(Self::new(coordinates, confidences))
  }

  /// 由模型给出的连续缓冲区构造
  pub fn from_flat(
    rows: usize,
    num_classes: usize,
    coordinates: Vec<f64>,
    confidences: Vec<f64>,
  ) -> Result<Self, DecodeError> {
    let coord_len = coordinates.len();
    let coordinates = Array2::from_shape_vec((rows, BOX_COMPONENTS), coordinates)
      .map_err(|_| DecodeError::shape("coordinates", rows * BOX_COMPONENTS, coord_len))?;
    let conf_len = confidences.len();
    let confidences = Array2::from_shape_vec((rows, num_classes), confidences)
      .map_err(|_| DecodeError::shape("confidence", rows * num_classes, conf_len))?;
    Ok(Self::new(coordinates, confidences))
  }

  /// 检测槽数量 N，取自坐标张量的第一维
  pub fn rows(&self) -> usize {
    self.coordinates.nrows()
  }

  pub fn num_classes(&self) -> usize {
    self.confidences.ncols()
  }

  pub fn coordinates(&self) -> &Array2<f64> {
    &self.coordinates
  }

  pub fn confidences(&self) -> &Array2<f64> {
    &self.confidences
  }
}

/// 返回最大值及其索引；并列时取最靠前的一个。
///
/// NaN 小于任何数值，只有整行都是 NaN 时才会返回 NaN。
pub fn argmax(values: ArrayView1<'_, f64>) -> Option<(usize, f64)> {
  let mut iter = values.iter().copied().enumerate();
  let first = iter.next()?;
  Some(iter.fold(first, |best, (idx, value)| {
    if value > best.1 || (best.1.is_nan() && !value.is_nan()) {
      (idx, value)
    } else {
      best
    }
  }))
}

/// 原始张量解码器
#[derive(Debug, Clone)]
pub struct DetectionDecoder {
  labels: ClassLabelTable,
  flip_vertical: bool,
}

impl DetectionDecoder {
  pub fn new(labels: ClassLabelTable) -> Self {
    Self {
      labels,
      flip_vertical: true,
    }
  }

  /// 是否对纵轴做 `1 - cy` 翻转，默认开启
  pub fn with_vertical_flip(mut self, flip_vertical: bool) -> Self {
    self.flip_vertical = flip_vertical;
    self
  }

  pub fn labels(&self) -> &ClassLabelTable {
    &self.labels
  }

  pub fn origin(&self) -> VerticalOrigin {
    if self.flip_vertical {
      VerticalOrigin::BottomLeft
    } else {
      VerticalOrigin::TopLeft
    }
  }

  /// 逐行解码，每个检测槽输出一个结果，不做置信度过滤。
  pub fn decode(&self, raw: &RawTensorOutput) -> Result<Vec<Detection>, DecodeError> {
    let rows = raw.rows();
    if rows == 0 {
      return Ok(Vec::new());
    }

    if raw.coordinates.ncols() != BOX_COMPONENTS {
      return Err(DecodeError::shape(
        "coordinates",
        BOX_COMPONENTS,
        raw.coordinates.ncols(),
      ));
    }
    if raw.confidences.nrows() != rows {
      return Err(DecodeError::shape("confidence", rows, raw.confidences.nrows()));
    }
    if raw.num_classes() != self.labels.len() {
      return Err(DecodeError::shape(
        "confidence",
        self.labels.len(),
        raw.num_classes(),
      ));
    }

    let mut detections = Vec::with_capacity(rows);
    for (coords, scores) in raw.coordinates.rows().into_iter().zip(raw.confidences.rows()) {
      let (cx, cy, w, h) = (coords[0], coords[1], coords[2], coords[3]);
      let cy = if self.flip_vertical { 1.0 - cy } else { cy };
      let bbox = NormalizedRect::new(cx - w / 2.0, cy - h / 2.0, w, h);

      let (class_id, confidence) =
        argmax(scores).ok_or_else(|| DecodeError::shape("confidence", self.labels.len(), 0))?;
      let label = self
        .labels
        .get(class_id)
        .ok_or_else(|| DecodeError::shape("confidence", self.labels.len(), class_id + 1))?
        .to_string();

      detections.push(Detection {
        class_id,
        label,
        confidence,
        bbox,
      });
    }

    debug!("解码得到 {} 个检测结果", detections.len());
    Ok(detections)
  }
}

/// 使用默认纵轴翻转解码
pub fn decode(
  raw: &RawTensorOutput,
  labels: &ClassLabelTable,
) -> Result<Vec<Detection>, DecodeError> {
  DetectionDecoder::new(labels.clone()).decode(raw)
}
