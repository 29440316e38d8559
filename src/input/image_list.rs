// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/input/image_list.rs - 待处理图像列表
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

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::InputError;

/// 列表中的一张图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry<'a> {
  /// 在列表中的序号，即清单中的 `index_image_id`
  pub index: usize,
  /// 用于组成输出文件名
  pub name: &'a str,
  pub path: &'a Path,
}

/// 名称与路径一一对应的图像列表
#[derive(Debug, Clone, Default)]
pub struct ImageList {
  names: Vec<String>,
  paths: Vec<PathBuf>,
}

impl ImageList {
  /// 两个列表长度必须一致且名称互不相同，否则在任何处理开始之前报错
  pub fn new(names: Vec<String>, paths: Vec<PathBuf>) -> Result<Self, InputError> {
    if names.len() != paths.len() {
      return Err(InputError::LengthMismatch {
        names: names.len(),
        paths: paths.len(),
      });
    }

    // 输出文件按名称命名，重名会复用另一张图像的结果
    let mut seen = HashMap::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
      if let Some(first) = seen.insert(name.as_str(), index) {
        return Err(InputError::DuplicateName {
          name: name.clone(),
          first,
          second: index,
        });
      }
    }
    Ok(Self { names, paths })
  }

  /// 读取每行一个路径的列表文件，图像名称取文件名（不含扩展名）。
  /// 相对路径拼接在 `images_dir` 之后。
  pub fn from_list_file(list: &Path, images_dir: Option<&Path>) -> Result<Self, InputError> {
    let content = std::fs::read_to_string(list)?;

    let mut names = Vec::new();
    let mut paths = Vec::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
      let path = match images_dir {
        Some(dir) if Path::new(line).is_relative() => dir.join(line),
        _ => PathBuf::from(line),
      };
      let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| InputError::InvalidImagePath(line.to_string()))?
        .to_string();
      names.push(name);
      paths.push(path);
    }

    debug!("从 {} 读取到 {} 张图像", list.display(), names.len());
    Self::new(names, paths)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = ImageEntry<'_>> {
    self
      .names
      .iter()
      .zip(self.paths.iter())
      .enumerate()
      .map(|(index, (name, path))| ImageEntry {
        index,
        name,
        path,
      })
  }
}
