// 该文件是 Lanshan （岚山） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;

#[cfg(feature = "read_image_file")]
use crate::frame::RgbNhwcFrame;
use crate::FromUrl;

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError, ImageFileInputNhwc};

#[cfg(feature = "read_image_file")]
mod image_sequence;
#[cfg(feature = "read_image_file")]
pub use self::image_sequence::{
  ImageSequenceInput, ImageSequenceInputError, ImageSequenceInputNhwc,
};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "read_image_file")]
  #[error("Image sequence input error: {0}")]
  ImageSequenceInputError(#[from] ImageSequenceInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "read_image_file")]
  ImageSequence(ImageSequenceInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  #[cfg(feature = "read_image_file")]
  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    match url.scheme() {
      ImageFileInput::SCHEME => {
        let input = ImageFileInput::from_url(url)?;
        Ok(InputWrapper::ReadImageFile(input))
      }
      ImageSequenceInput::SCHEME => {
        let input = ImageSequenceInput::from_url(url)?;
        Ok(InputWrapper::ImageSequence(input))
      }
      _ => Err(InputError::SchemeMismatch),
    }
  }

  #[cfg(not(feature = "read_image_file"))]
  fn from_url(_url: &url::Url) -> Result<Self, Self::Error> {
    Err(InputError::SchemeMismatch)
  }
}

#[cfg(feature = "read_image_file")]
impl InputWrapper {
  pub fn into_nhwc(self) -> InputWrapperNhwcIter {
    match self {
      InputWrapper::ReadImageFile(input) => InputWrapperNhwcIter::ReadImageFile(input.into_nhwc()),
      InputWrapper::ImageSequence(input) => InputWrapperNhwcIter::ImageSequence(input.into_nhwc()),
    }
  }
}

#[cfg(feature = "read_image_file")]
pub enum InputWrapperNhwcIter {
  ReadImageFile(ImageFileInputNhwc),
  ImageSequence(ImageSequenceInputNhwc),
}

#[cfg(feature = "read_image_file")]
impl Iterator for InputWrapperNhwcIter {
  type Item = RgbNhwcFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapperNhwcIter::ReadImageFile(input) => input.next(),
      InputWrapperNhwcIter::ImageSequence(input) => input.next(),
    }
  }
}
