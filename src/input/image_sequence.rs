// 该文件是 Lanshan （岚山） 项目的一部分。
// src/input/image_sequence.rs - 图像序列输入，按固定帧间隔模拟摄像头
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
  path::PathBuf,
  thread,
  time::{Duration, Instant},
};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbNhwcFrame};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Error, Debug)]
pub enum ImageSequenceInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("目录中没有图像文件: {0}")]
  Empty(PathBuf),
  #[error("参数 {0} 无效: {1}")]
  InvalidParameter(String, String),
}

/// 目录中的图像按文件名排序依次作为帧输出。
///
/// URL 形如 `frames:///path/to/dir?fps=30&loop`：
/// - `fps` 帧间隔，缺省时不等待；
/// - `loop` 播放完后从头开始，直到外部停止。
pub struct ImageSequenceInput {
  files: Vec<PathBuf>,
  interval: Option<Duration>,
  looping: bool,
}

impl FromUrlWithScheme for ImageSequenceInput {
  const SCHEME: &'static str = "frames";
}

impl FromUrl for ImageSequenceInput {
  type Error = ImageSequenceInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageSequenceInputError::SchemeMismatch);
    }

    let mut interval = None;
    for (k, v) in url.query_pairs() {
      if k == "fps" {
        let fps: f64 = v
          .parse()
          .ok()
          .filter(|fps: &f64| *fps > 0.0)
          .ok_or_else(|| ImageSequenceInputError::InvalidParameter(k.to_string(), v.to_string()))?;
        interval = Some(Duration::from_secs_f64(1.0 / fps));
      }
    }
    let looping = url.query_pairs().any(|(k, _)| k == "loop");

    let input = Self::open(url.path())?;
    Ok(Self {
      interval,
      looping,
      ..input
    })
  }
}

impl ImageSequenceInput {
  pub fn open(directory: impl Into<PathBuf>) -> Result<Self, ImageSequenceInputError> {
    let directory = directory.into();
    info!("打开图像序列目录: {}", directory.display());

    let mut files = std::fs::read_dir(&directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|p| {
        p.extension()
          .and_then(|ext| ext.to_str())
          .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
          .unwrap_or(false)
      })
      .collect::<Vec<_>>();
    files.sort();

    if files.is_empty() {
      return Err(ImageSequenceInputError::Empty(directory));
    }
    debug!("图像数量: {}", files.len());

    Ok(Self {
      files,
      interval: None,
      looping: false,
    })
  }

  pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
    self.interval = interval;
    self
  }

  pub fn with_looping(mut self, looping: bool) -> Self {
    self.looping = looping;
    self
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn into_nhwc(self) -> ImageSequenceInputNhwc {
    ImageSequenceInputNhwc {
      inner: self,
      position: 0,
      last_emit: None,
    }
  }
}

pub struct ImageSequenceInputNhwc {
  inner: ImageSequenceInput,
  position: usize,
  last_emit: Option<Instant>,
}

impl ImageSequenceInputNhwc {
  fn pace(&mut self) {
    if let Some(interval) = self.inner.interval
      && let Some(last) = self.last_emit
    {
      let elapsed = last.elapsed();
      if elapsed < interval {
        thread::sleep(interval - elapsed);
      }
    }
    self.last_emit = Some(Instant::now());
  }
}

impl Iterator for ImageSequenceInputNhwc {
  type Item = RgbNhwcFrame;

  fn next(&mut self) -> Option<Self::Item> {
    // 连续读取失败整整一轮则结束，避免循环模式下空转
    let mut failures = 0;
    while failures < self.inner.files.len() {
      if self.position >= self.inner.files.len() {
        if !self.inner.looping {
          return None;
        }
        self.position = 0;
      }

      let path = &self.inner.files[self.position];
      self.position += 1;

      match ImageReader::open(path).map_err(image::ImageError::IoError).and_then(|r| r.decode()) {
        Ok(image) => {
          self.pace();
          return Some(RgbNhwcFrame::from(image.to_rgb8()));
        }
        Err(e) => {
          warn!("跳过无法读取的图像 {}: {}", path.display(), e);
          failures += 1;
        }
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::from_pixel(2, 2, Rgb([2, 0, 0]))
      .save(dir.path().join("002.png"))
      .unwrap();
    RgbImage::from_pixel(2, 2, Rgb([1, 0, 0]))
      .save(dir.path().join("001.png"))
      .unwrap();
    std::fs::write(dir.path().join("readme.txt"), "not an image").unwrap();
    dir
  }

  #[test]
  fn yields_images_in_name_order() {
    let dir = fixture();
    let input = ImageSequenceInput::open(dir.path()).unwrap();
    assert_eq!(input.len(), 2);

    let reds: Vec<u8> = input
      .into_nhwc()
      .map(|frame| frame.pixel(0, 0).unwrap()[0])
      .collect();
    assert_eq!(reds, vec![1, 2]);
  }

  #[test]
  fn looping_restarts_from_first_image() {
    let dir = fixture();
    let reds: Vec<u8> = ImageSequenceInput::open(dir.path())
      .unwrap()
      .with_looping(true)
      .into_nhwc()
      .take(5)
      .map(|frame| frame.pixel(0, 0).unwrap()[0])
      .collect();
    assert_eq!(reds, vec![1, 2, 1, 2, 1]);
  }

  #[test]
  fn broken_file_is_skipped() {
    let dir = fixture();
    std::fs::write(dir.path().join("000.png"), b"garbage").unwrap();
    let count = ImageSequenceInput::open(dir.path()).unwrap().into_nhwc().count();
    assert_eq!(count, 2);
  }

  #[test]
  fn url_parameters_are_parsed() {
    let dir = fixture();
    let url = Url::parse(&format!("frames://{}?fps=50&loop", dir.path().display())).unwrap();
    let input = ImageSequenceInput::from_url(&url).unwrap();
    assert!(input.looping);
    assert_eq!(input.interval, Some(Duration::from_millis(20)));
  }

  #[test]
  fn zero_fps_is_rejected() {
    let dir = fixture();
    let url = Url::parse(&format!("frames://{}?fps=0", dir.path().display())).unwrap();
    assert!(matches!(
      ImageSequenceInput::from_url(&url),
      Err(ImageSequenceInputError::InvalidParameter(_, _))
    ));
  }

  #[test]
  fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      ImageSequenceInput::open(dir.path()),
      Err(ImageSequenceInputError::Empty(_))
    ));
  }
}
