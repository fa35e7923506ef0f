// 该文件是 Lanshan （岚山） 项目的一部分。
// tests/decode_properties.rs - 解码器行为测试
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

use std::time::Instant;

use lanshan::{
  decode::{DecodeError, DetectionDecoder, RawTensorOutput, decode},
  fps::measure_fps,
  labels::ClassLabelTable,
};
use ndarray::{Array2, array};

fn labels(names: &[&str]) -> ClassLabelTable {
  ClassLabelTable::new(names.iter().copied()).unwrap()
}

fn close(a: f64, b: f64) -> bool {
  (a - b).abs() < 1e-9
}

#[test]
fn one_detection_per_row_in_row_order() {
  let raw = RawTensorOutput::new(
    array![
      [0.1, 0.1, 0.05, 0.05],
      [0.5, 0.5, 0.2, 0.2],
      [0.9, 0.9, 0.1, 0.1]
    ],
    array![[0.9, 0.1], [0.2, 0.8], [0.6, 0.4]],
  );
  let detections = decode(&raw, &labels(&["cat", "dog"])).unwrap();

  assert_eq!(detections.len(), 3);
  let ids: Vec<usize> = detections.iter().map(|d| d.class_id).collect();
  assert_eq!(ids, vec![0, 1, 0]);
  assert!(close(detections[0].bbox.x, 0.1 - 0.025));
  assert!(close(detections[2].bbox.x, 0.9 - 0.05));
}

#[test]
fn unique_maximum_selects_class_and_label() {
  let raw = RawTensorOutput::new(array![[0.5, 0.5, 0.1, 0.1]], array![[0.1, 0.2, 0.7]]);
  let detections = decode(&raw, &labels(&["a", "b", "c"])).unwrap();

  assert_eq!(detections[0].class_id, 2);
  assert_eq!(detections[0].label, "c");
  assert!(close(detections[0].confidence, 0.7));
}

#[test]
fn ties_resolve_to_lowest_index() {
  let raw = RawTensorOutput::new(array![[0.5, 0.5, 0.1, 0.1]], array![[0.2, 0.4, 0.4]]);
  let detections = decode(&raw, &labels(&["a", "b", "c"])).unwrap();

  assert_eq!(detections[0].class_id, 1);
  assert!(close(detections[0].confidence, 0.4));
}

#[test]
fn flips_vertical_axis_into_bottom_left_rect() {
  let raw = RawTensorOutput::new(array![[0.5, 0.5, 0.2, 0.4]], array![[1.0]]);
  let detections = decode(&raw, &labels(&["only"])).unwrap();
  let bbox = detections[0].bbox;

  assert!(close(bbox.x, 0.4));
  assert!(close(bbox.y, 0.3));
  assert!(close(bbox.width, 0.2));
  assert!(close(bbox.height, 0.4));
}

#[test]
fn vertical_flip_can_be_disabled() {
  let raw = RawTensorOutput::new(array![[0.5, 0.2, 0.2, 0.2]], array![[1.0]]);
  let decoder = DetectionDecoder::new(labels(&["only"])).with_vertical_flip(false);
  let detections = decoder.decode(&raw).unwrap();

  assert!(close(detections[0].bbox.y, 0.1));
}

#[test]
fn empty_tensors_decode_to_nothing() {
  let raw = RawTensorOutput::new(Array2::zeros((0, 4)), Array2::zeros((0, 3)));
  assert!(decode(&raw, &labels(&["a", "b", "c"])).unwrap().is_empty());

  let raw = RawTensorOutput::empty(3);
  assert!(decode(&raw, &labels(&["a", "b", "c"])).unwrap().is_empty());
}

#[test]
fn zero_elapsed_time_is_infinite_fps() {
  let t = Instant::now();
  let fps = measure_fps(t, t);
  assert!(fps.is_infinite() && fps.is_sign_positive());
}

#[test]
fn zero_confidence_is_still_reported() {
  let raw = RawTensorOutput::new(array![[0.5, 0.5, 0.1, 0.1]], array![[0.0, 0.0]]);
  let detections = decode(&raw, &labels(&["a", "b"])).unwrap();

  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].class_id, 0);
  assert_eq!(detections[0].confidence, 0.0);
}

#[test]
fn confidence_width_must_match_label_count() {
  let raw = RawTensorOutput::new(array![[0.5, 0.5, 0.1, 0.1]], array![[0.3, 0.7]]);
  let err = decode(&raw, &labels(&["a", "b", "c"])).unwrap_err();

  assert_eq!(
    err,
    DecodeError::ShapeMismatch {
      tensor: "confidence",
      expected: 3,
      actual: 2,
    }
  );
}

#[test]
fn row_counts_must_agree() {
  let raw = RawTensorOutput::new(
    array![[0.5, 0.5, 0.1, 0.1], [0.2, 0.2, 0.1, 0.1]],
    array![[0.3, 0.7]],
  );
  assert!(matches!(
    decode(&raw, &labels(&["a", "b"])),
    Err(DecodeError::ShapeMismatch { .. })
  ));
}

#[test]
fn nan_scores_never_win_the_argmax() {
  let raw = RawTensorOutput::new(
    array![[0.5, 0.5, 0.1, 0.1], [0.5, 0.5, 0.1, 0.1]],
    array![[f64::NAN, 0.9, 0.1], [0.2, f64::NAN, 0.5]],
  );
  let detections = decode(&raw, &labels(&["a", "b", "c"])).unwrap();

  assert_eq!(detections[0].class_id, 1);
  assert!(close(detections[0].confidence, 0.9));
  assert_eq!(detections[1].class_id, 2);
  assert!(close(detections[1].confidence, 0.5));
}
