// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/input.rs - 图像输入
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

pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

mod image_list;
pub use self::image_list::{ImageEntry, ImageList};

mod read_image_file;
pub use self::read_image_file::{ImageFileInputError, load_image};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像名称与图像路径数量不一致: 名称 {names} 个, 路径 {paths} 个")]
  LengthMismatch { names: usize, paths: usize },
  #[error("图像名称重复: {name} (第 {first} 张与第 {second} 张)")]
  DuplicateName {
    name: String,
    first: usize,
    second: usize,
  },
  #[error("图像列表读取错误: {0}")]
  ListIoError(#[from] std::io::Error),
  #[error("无法从路径推导图像名称: {0}")]
  InvalidImagePath(String),
}
