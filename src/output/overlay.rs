// 该文件是 Lanshan （岚山） 项目的一部分。
// src/output/overlay.rs - 叠加层状态，由渲染端独占修改
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

//! 叠加层：一帧的所有检测框在锁外构建好，再一次性替换，
//! 读取方看到的总是某一帧的完整结果。

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::{
  decode::PixelRect,
  output::{FrameReport, Render},
};

#[derive(Error, Debug)]
pub enum OverlayError {
  #[error("叠加层锁已损坏")]
  Poisoned,
}

/// 叠加层与视图的适配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
  /// 完整显示画面，取两轴比例较小者
  Fit,
  /// 铺满视图，取两轴比例较大者
  Fill,
}

pub fn fit_scale(frame_w: f64, frame_h: f64, view_w: f64, view_h: f64, mode: FitMode) -> f64 {
  let scale_x = view_w / frame_w;
  let scale_y = view_h / frame_h;
  match mode {
    FitMode::Fit => scale_x.min(scale_y),
    FitMode::Fill => scale_x.max(scale_y),
  }
}

/// 叠加层在视图中的放置：缩放后居中
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
  pub scale: f64,
  pub offset_x: f64,
  pub offset_y: f64,
}

impl ViewTransform {
  pub fn apply(&self, rect: &PixelRect) -> PixelRect {
    PixelRect {
      x: rect.x * self.scale + self.offset_x,
      y: rect.y * self.scale + self.offset_y,
      width: rect.width * self.scale,
      height: rect.height * self.scale,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayShape {
  /// 左上角原点的像素矩形
  pub rect: PixelRect,
  pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Overlay {
  frame_index: Option<usize>,
  shapes: Vec<OverlayShape>,
  fps_text: String,
}

impl Overlay {
  pub fn frame_index(&self) -> Option<usize> {
    self.frame_index
  }

  pub fn shapes(&self) -> &[OverlayShape] {
    &self.shapes
  }

  pub fn fps_text(&self) -> &str {
    if self.fps_text.is_empty() {
      "fps: -"
    } else {
      &self.fps_text
    }
  }
}

/// 读取叠加层的句柄，可交给界面线程
#[derive(Debug, Clone)]
pub struct OverlayHandle {
  overlay: Arc<Mutex<Overlay>>,
}

impl OverlayHandle {
  pub fn snapshot(&self) -> Result<Overlay, OverlayError> {
    self
      .overlay
      .lock()
      .map(|overlay| overlay.clone())
      .map_err(|_| OverlayError::Poisoned)
  }
}

/// 渲染目标尺寸固定的叠加层输出
pub struct OverlayOutput {
  overlay: Arc<Mutex<Overlay>>,
  width: u32,
  height: u32,
}

impl OverlayOutput {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      overlay: Arc::new(Mutex::new(Overlay::default())),
      width,
      height,
    }
  }

  pub fn handle(&self) -> OverlayHandle {
    OverlayHandle {
      overlay: Arc::clone(&self.overlay),
    }
  }

  pub fn view_transform(&self, view_w: f64, view_h: f64, mode: FitMode) -> ViewTransform {
    let (w, h) = (self.width as f64, self.height as f64);
    let scale = fit_scale(w, h, view_w, view_h, mode);
    ViewTransform {
      scale,
      offset_x: (view_w - w * scale) / 2.0,
      offset_y: (view_h - h * scale) / 2.0,
    }
  }

  fn build(&self, result: &FrameReport) -> Overlay {
    let shapes = result
      .detections
      .iter()
      .map(|det| OverlayShape {
        rect: det
          .bbox
          .to_top_left(result.origin)
          .to_pixel_rect(self.width, self.height),
        caption: format!("{}: {}", det.label, det.confidence),
      })
      .collect();

    Overlay {
      frame_index: Some(result.index),
      shapes,
      fps_text: format!("fps: {:.2}", result.fps),
    }
  }
}

impl<Frame> Render<Frame, FrameReport> for OverlayOutput {
  type Error = OverlayError;

  fn render_result(&self, _frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    let next = self.build(result);
    let mut overlay = self.overlay.lock().map_err(|_| OverlayError::Poisoned)?;
    *overlay = next;
    debug!("叠加层更新: 帧 {}, {} 个框", result.index, overlay.shapes.len());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::{Detection, NormalizedRect, VerticalOrigin};

  fn report(index: usize, boxes: usize) -> FrameReport {
    FrameReport {
      index,
      detections: (0..boxes)
        .map(|i| Detection {
          class_id: i,
          label: format!("c{}", i),
          confidence: 0.5,
          bbox: NormalizedRect::new(0.25, 0.25, 0.5, 0.25),
        })
        .collect(),
      fps: 12.5,
      origin: VerticalOrigin::BottomLeft,
    }
  }

  #[test]
  fn new_batch_replaces_previous_one() {
    let output = OverlayOutput::new(100, 200);
    let handle = output.handle();

    output.render_result(&(), &report(1, 3)).unwrap();
    assert_eq!(handle.snapshot().unwrap().shapes().len(), 3);

    output.render_result(&(), &report(2, 1)).unwrap();
    let overlay = handle.snapshot().unwrap();
    assert_eq!(overlay.frame_index(), Some(2));
    assert_eq!(overlay.shapes().len(), 1);
    assert_eq!(overlay.fps_text(), "fps: 12.50");
  }

  #[test]
  fn shapes_are_mapped_to_top_left_pixels() {
    let output = OverlayOutput::new(100, 200);
    output.render_result(&(), &report(1, 1)).unwrap();

    let overlay = output.handle().snapshot().unwrap();
    let shape = &overlay.shapes()[0];
    // y = 1 - 0.25 - 0.25 = 0.5
    assert_eq!(shape.rect, PixelRect { x: 25.0, y: 100.0, width: 50.0, height: 50.0 });
    assert_eq!(shape.caption, "c0: 0.5");
  }

  #[test]
  fn empty_overlay_shows_placeholder_fps() {
    assert_eq!(Overlay::default().fps_text(), "fps: -");
  }

  #[test]
  fn fit_and_fill_pick_min_and_max_ratio() {
    assert_eq!(fit_scale(100.0, 50.0, 200.0, 200.0, FitMode::Fit), 2.0);
    assert_eq!(fit_scale(100.0, 50.0, 200.0, 200.0, FitMode::Fill), 4.0);
  }

  #[test]
  fn view_transform_centres_the_overlay() {
    let output = OverlayOutput::new(100, 50);
    let transform = output.view_transform(200.0, 200.0, FitMode::Fit);
    assert_eq!(transform.scale, 2.0);
    assert_eq!((transform.offset_x, transform.offset_y), (0.0, 50.0));

    let rect = transform.apply(&PixelRect { x: 10.0, y: 10.0, width: 5.0, height: 5.0 });
    assert_eq!(rect, PixelRect { x: 20.0, y: 70.0, width: 10.0, height: 10.0 });
  }
}
