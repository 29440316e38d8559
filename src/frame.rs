// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/frame.rs - NHWC 帧定义与裁剪
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

use image::{ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

use crate::input::AsNhwcFrame;
use crate::model::NormalizedBox;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("裁剪区域为空: {0:?}")]
  EmptyCrop(CropRect),
}

/// 像素坐标下的裁剪矩形，左上角为原点，区间为 `[left, right) x [top, bottom)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
  pub left: i64,
  pub top: i64,
  pub right: i64,
  pub bottom: i64,
}

impl CropRect {
  /// 将归一化检测框换算为像素裁剪矩形。
  ///
  /// 左上取下整、右下取上整，向外取整以免丢失边界像素；不做越界截断，
  /// 坐标恰为 1.0 时边界等于整幅图像的尺寸。计算保持单精度。
  pub fn from_normalized(bbox: &NormalizedBox, width: usize, height: usize) -> Self {
    let (w, h) = (width as f32, height as f32);
    CropRect {
      left: (bbox.xmin * w).floor() as i64,
      top: (bbox.ymin * h).floor() as i64,
      right: (bbox.xmax * w).ceil() as i64,
      bottom: (bbox.ymax * h).ceil() as i64,
    }
  }

  pub fn width(&self) -> i64 {
    self.right - self.left
  }

  pub fn height(&self) -> i64 {
    self.bottom - self.top
  }

  pub fn is_empty(&self) -> bool {
    self.width() <= 0 || self.height() <= 0
  }
}

/// 任意尺寸的 RGB 帧，按 HWC 顺序存储
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbNhwcFrame {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl RgbNhwcFrame {
  /// 创建全黑帧
  pub fn with_shape(height: usize, width: usize) -> Self {
    let size = RGB_CHANNELS * width * height;
    Self {
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  pub fn from_raw(height: usize, width: usize, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * width * height;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
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

  #[cfg(test)]
  pub(crate) fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
    let idx = (y * self.width + x) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 按矩形裁剪。落在原图之外的像素填充为黑色。
  pub fn crop(&self, rect: CropRect) -> Result<RgbNhwcFrame, FrameError> {
    if rect.is_empty() {
      return Err(FrameError::EmptyCrop(rect));
    }

    let out_w = rect.width() as usize;
    let out_h = rect.height() as usize;
    let mut out = RgbNhwcFrame::with_shape(out_h, out_w);

    // 与原图相交的部分
    let x0 = rect.left.max(0);
    let y0 = rect.top.max(0);
    let x1 = rect.right.min(self.width as i64);
    let y1 = rect.bottom.min(self.height as i64);
    if x0 >= x1 || y0 >= y1 {
      return Ok(out);
    }

    let row_len = (x1 - x0) as usize * RGB_CHANNELS;
    for y in y0..y1 {
      let src = ((y as usize) * self.width + x0 as usize) * RGB_CHANNELS;
      let dst = (((y - rect.top) as usize) * out_w + (x0 - rect.left) as usize) * RGB_CHANNELS;
      out.data[dst..dst + row_len].copy_from_slice(&self.data[src..src + row_len]);
    }

    Ok(out)
  }

  pub fn crop_normalized(&self, bbox: &NormalizedBox) -> Result<RgbNhwcFrame, FrameError> {
    self.crop(CropRect::from_normalized(bbox, self.width, self.height))
  }
}

impl AsNhwcFrame for RgbNhwcFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

impl From<RgbImage> for RgbNhwcFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    RgbNhwcFrame {
      width: width as usize,
      height: height as usize,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for RgbNhwcFrame {
  fn to_rgb_image(&self) -> RgbImage {
    let width = self.width as u32;
    let data = self.as_nhwc();

    ImageBuffer::from_fn(width, self.height as u32, |x, y| {
      let idx = (y as usize * self.width + x as usize) * RGB_CHANNELS;
      Rgb([data[idx], data[idx + 1], data[idx + 2]])
    })
  }
}
