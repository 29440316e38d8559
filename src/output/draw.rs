// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/output/draw.rs - 入选检测框可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use tracing::debug;

use crate::{
  frame::{CropRect, RgbNhwcFrame, ToRgbImage},
  model::NormalizedBox,
};

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: i64 = 2;

pub struct Draw {
  color: [u8; 3],
  thickness: i64,
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
  /// 按裁剪时使用的同一矩形绘制边框，截断到图像范围内
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &NormalizedBox) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let rect = CropRect::from_normalized(bbox, w as usize, h as usize);

    let x_min = rect.left.clamp(0, w - 1);
    let y_min = rect.top.clamp(0, h - 1);
    let x_max = (rect.right - 1).clamp(0, w - 1);
    let y_max = (rect.bottom - 1).clamp(0, h - 1);
    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for t in 0..self.thickness {
      let width = x_max - x_min + 1 - 2 * t;
      let height = y_max - y_min + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let r = Rect::at((x_min + t) as i32, (y_min + t) as i32).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, r, Rgb(self.color));
    }
  }

  pub fn draw_boxes(&self, frame: &RgbNhwcFrame, boxes: &[NormalizedBox]) -> RgbImage {
    let mut image = frame.to_rgb_image();
    if image.width() == 0 || image.height() == 0 {
      return image;
    }
    for bbox in boxes {
      self.draw_bbox(&mut image, bbox);
    }
    image
  }

  pub fn save_boxes(
    &self,
    path: &Path,
    frame: &RgbNhwcFrame,
    boxes: &[NormalizedBox],
  ) -> Result<(), image::ImageError> {
    self.draw_boxes(frame, boxes).save(path)?;
    debug!("保存可视化图像: {} ({} 个检测框)", path.display(), boxes.len());
    Ok(())
  }
}
