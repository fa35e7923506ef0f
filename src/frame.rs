// 该文件是 Lanshan （岚山） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

const RGB_CHANNELS: usize = 3;

pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

/// 帧的像素尺寸，渲染端用来把归一化坐标映射为像素
pub trait FrameSize {
  fn frame_width(&self) -> u32;
  fn frame_height(&self) -> u32;
}

/// 已解码的 RGB 帧，按 NHWC 排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbNhwcFrame {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl RgbNhwcFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    Self {
      width,
      height,
      data: vec![0u8; RGB_CHANNELS * width * height].into_boxed_slice(),
    }
  }

  /// 由像素数据构造，长度不符时返回 `None`
  pub fn from_raw(height: usize, width: usize, data: Vec<u8>) -> Option<Self> {
    if data.len() != RGB_CHANNELS * width * height {
      return None;
    }
    Some(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let idx = (y * self.width + x) * RGB_CHANNELS;
    Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
  }
}

impl AsMut<[u8]> for RgbNhwcFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl AsNhwcFrame for RgbNhwcFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

impl FrameSize for RgbNhwcFrame {
  fn frame_width(&self) -> u32 {
    self.width as u32
  }

  fn frame_height(&self) -> u32 {
    self.height as u32
  }
}

#[cfg(feature = "image")]
impl From<image::RgbImage> for RgbNhwcFrame {
  fn from(image: image::RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width: width as usize,
      height: height as usize,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

#[cfg(feature = "image")]
impl RgbNhwcFrame {
  pub fn to_rgb_image(&self) -> image::RgbImage {
    image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
      let idx = (y as usize * self.width + x as usize) * RGB_CHANNELS;
      image::Rgb([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    })
  }
}
