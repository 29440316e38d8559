// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/input/read_image_file.rs - 图像文件读取
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

use std::path::Path;

use image::{ColorType, DynamicImage, ImageBuffer, ImageDecoder, ImageReader};
use thiserror::Error;
use tracing::{debug, warn};

use crate::frame::RgbNhwcFrame;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("I/O error ({path}): {source}")]
  IoError {
    path: String,
    source: std::io::Error,
  },
  #[error("Image loading error ({path}): {source}")]
  ImageLoadError {
    path: String,
    source: image::ImageError,
  },
  #[error("不支持的像素格式 ({path}): {color:?}")]
  UnsupportedColor { path: String, color: ColorType },
}

type FileReader = ImageReader<std::io::BufReader<std::fs::File>>;

fn open_reader(path: &Path) -> Result<FileReader, ImageFileInputError> {
  ImageReader::open(path)
    .and_then(|reader| reader.with_guessed_format())
    .map_err(|source| ImageFileInputError::IoError {
      path: path.display().to_string(),
      source,
    })
}

/// 读取并解码图像为 RGB 帧。
///
/// 截断或损坏的图像尽量解码：解码中途出错时记录警告，
/// 保留已解码的像素，其余部分为黑色；文件头无法读取时才报错。
pub fn load_image(path: &Path) -> Result<RgbNhwcFrame, ImageFileInputError> {
  let load_error = |source| ImageFileInputError::ImageLoadError {
    path: path.display().to_string(),
    source,
  };

  let decoder = open_reader(path)?.into_decoder().map_err(load_error)?;
  let (width, height) = decoder.dimensions();
  let color = decoder.color_type();
  let mut buf = vec![0u8; decoder.total_bytes() as usize];
  if let Err(e) = decoder.read_image(&mut buf) {
    warn!(
      "图像 {} 解码不完整 ({}), 以已解码部分 {}x{} 继续",
      path.display(),
      e,
      width,
      height
    );
  }

  let image = to_dynamic(color, width, height, buf)
    .ok_or_else(|| ImageFileInputError::UnsupportedColor {
      path: path.display().to_string(),
      color,
    })?
    .to_rgb8();
  debug!(
    "图像解码完成: {} ({}x{})",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(RgbNhwcFrame::from(image))
}

fn to_dynamic(color: ColorType, width: u32, height: u32, buf: Vec<u8>) -> Option<DynamicImage> {
  match color {
    ColorType::L8 => ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLuma8),
    ColorType::La8 => ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8),
    ColorType::Rgb8 => ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb8),
    ColorType::Rgba8 => ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba8),
    ColorType::L16 => {
      ImageBuffer::from_raw(width, height, ne_u16(&buf)).map(DynamicImage::ImageLuma16)
    }
    ColorType::La16 => {
      ImageBuffer::from_raw(width, height, ne_u16(&buf)).map(DynamicImage::ImageLumaA16)
    }
    ColorType::Rgb16 => {
      ImageBuffer::from_raw(width, height, ne_u16(&buf)).map(DynamicImage::ImageRgb16)
    }
    ColorType::Rgba16 => {
      ImageBuffer::from_raw(width, height, ne_u16(&buf)).map(DynamicImage::ImageRgba16)
    }
    ColorType::Rgb32F => {
      ImageBuffer::from_raw(width, height, ne_f32(&buf)).map(DynamicImage::ImageRgb32F)
    }
    ColorType::Rgba32F => {
      ImageBuffer::from_raw(width, height, ne_f32(&buf)).map(DynamicImage::ImageRgba32F)
    }
    _ => None,
  }
}

fn ne_u16(buf: &[u8]) -> Vec<u16> {
  buf
    .chunks_exact(2)
    .map(|b| u16::from_ne_bytes([b[0], b[1]]))
    .collect()
}

fn ne_f32(buf: &[u8]) -> Vec<f32> {
  buf
    .chunks_exact(4)
    .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
    .collect()
}
