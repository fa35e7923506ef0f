// 该文件是 Lanshan （岚山） 项目的一部分。
// src/config.rs - 阈值常量与置信度过滤
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

use tracing::debug;

use crate::decode::Detection;

/// SSD 类检测器渲染前使用的置信度阈值
pub const SSD_CONFIDENCE_THRESHOLD: f64 = 0.3;
/// 分类结果的置信度阈值
pub const CLASSIFICATION_CONFIDENCE_THRESHOLD: f64 = 0.5;
/// YOLO 检测器内置 NMS 的 IoU 阈值
pub const YOLO_IOU_THRESHOLD: f64 = 0.5;

/// 按置信度过滤检测结果。原始张量解码路径默认不使用。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceFilter {
  threshold: f64,
}

impl ConfidenceFilter {
  pub fn new(threshold: f64) -> Self {
    Self { threshold }
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }

  pub fn accepts(&self, detection: &Detection) -> bool {
    detection.confidence >= self.threshold
  }

  pub fn apply(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
    let before = detections.len();
    detections.retain(|det| self.accepts(det));
    debug!(
      "置信度过滤 (>= {}): {} -> {}",
      self.threshold,
      before,
      detections.len()
    );
    detections
  }
}

impl Default for ConfidenceFilter {
  fn default() -> Self {
    Self::new(SSD_CONFIDENCE_THRESHOLD)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::NormalizedRect;

  fn det(confidence: f64) -> Detection {
    Detection {
      class_id: 0,
      label: "person".to_string(),
      confidence,
      bbox: NormalizedRect::default(),
    }
  }

  #[test]
  fn keeps_detections_at_or_above_threshold() {
    let kept = ConfidenceFilter::default().apply(vec![det(0.29), det(0.3), det(0.9)]);
    assert_eq!(kept.len(), 2);
    assert!(kept.iter().all(|d| d.confidence >= 0.3));
  }
}
