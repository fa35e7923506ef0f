// 该文件是 Lanshan （岚山） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{decode::Detection, decode::VerticalOrigin, output::FrameReport};

const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_THICKNESS: i32 = 2;

/// 栅格图像上的检测框绘制，不包含文字说明
pub struct Draw {
  color: [u8; 3],
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: BOX_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = color;
    self
  }

  // 在图像上绘制一个矩形边框，超出图像的部分被裁掉
  fn draw_bbox(&self, image: &mut RgbImage, detection: &Detection, origin: VerticalOrigin) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let rect = detection
      .bbox
      .to_top_left(origin)
      .to_pixel_rect(image.width(), image.height());

    // 完全在画面外的框不画，否则会被压扁到边缘上
    if rect.x + rect.width < 0.0
      || rect.x >= w as f64
      || rect.y + rect.height < 0.0
      || rect.y >= h as f64
    {
      return;
    }

    let x_min = (rect.x.floor() as i32).clamp(0, w - 1);
    let y_min = (rect.y.floor() as i32).clamp(0, h - 1);
    let x_max = ((rect.x + rect.width).ceil() as i32).clamp(0, w - 1);
    let y_max = ((rect.y + rect.height).ceil() as i32).clamp(0, h - 1);

    for t in 0..self.thickness {
      let width = x_max - x_min - 2 * t + 1;
      let height = y_max - y_min - 2 * t + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &FrameReport) {
    for detection in &result.detections {
      self.draw_bbox(image, detection, result.origin);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::NormalizedRect;

  fn report(bbox: NormalizedRect, origin: VerticalOrigin) -> FrameReport {
    FrameReport {
      index: 1,
      detections: vec![Detection {
        class_id: 0,
        label: "person".to_string(),
        confidence: 0.9,
        bbox,
      }],
      fps: 30.0,
      origin,
    }
  }

  #[test]
  fn draws_border_in_top_left_space() {
    let mut image = RgbImage::new(10, 10);
    // 翻转后 y = 1 - 0.6 - 0.2 = 0.2
    let bbox = NormalizedRect::new(0.2, 0.6, 0.4, 0.2);
    Draw::default().draw_detections_on_image(&mut image, &report(bbox, VerticalOrigin::BottomLeft));

    assert_eq!(image.get_pixel(2, 2), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(6, 4), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(4, 3), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
    assert_eq!(image.get_pixel(2, 7), &Rgb([0, 0, 0]));
  }

  #[test]
  fn box_fully_off_frame_is_not_drawn() {
    let mut image = RgbImage::new(10, 10);
    let bbox = NormalizedRect::new(1.5, 0.2, 0.2, 0.2);
    Draw::default().draw_detections_on_image(&mut image, &report(bbox, VerticalOrigin::TopLeft));
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));

    let bbox = NormalizedRect::new(0.2, -0.5, 0.2, 0.2);
    Draw::default().draw_detections_on_image(&mut image, &report(bbox, VerticalOrigin::TopLeft));
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn box_outside_image_is_clamped() {
    let mut image = RgbImage::new(8, 8);
    let bbox = NormalizedRect::new(-0.5, -0.5, 2.0, 2.0);
    Draw::default().draw_detections_on_image(&mut image, &report(bbox, VerticalOrigin::TopLeft));
    assert_eq!(image.get_pixel(0, 0), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(7, 7), &Rgb(BOX_COLOR));
  }
}
