// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/output.rs - 输出目录与命名
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::model::{BoxSet, FeatureSet};
use crate::record::Record;

pub mod manifest;
pub use self::manifest::{Manifest, ManifestError, ManifestRecord};

#[cfg(feature = "visualize")]
pub mod draw;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("无法创建输出目录 {path}: {source}")]
  CreateDirError {
    path: String,
    source: std::io::Error,
  },
}

/// 特征提取的区域：整幅图像，或第 k 个入选检测框
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
  WholeImage,
  Box(usize),
}

impl Region {
  /// 区域序号 r：0 为整图，k + 1 为第 k 个检测框
  pub fn from_index(r: usize) -> Self {
    match r {
      0 => Region::WholeImage,
      r => Region::Box(r - 1),
    }
  }

  /// 清单中的 `box_id`，整图为 -1
  pub fn box_id(&self) -> i64 {
    match self {
      Region::WholeImage => -1,
      Region::Box(k) => *k as i64,
    }
  }

  /// 输出名：整图为图像名，检测框为 `图像名_k`
  pub fn output_name(&self, image_name: &str) -> String {
    match self {
      Region::WholeImage => image_name.to_string(),
      Region::Box(k) => format!("{}_{}", image_name, k),
    }
  }
}

/// 一次运行的全部输出位置
#[derive(Debug, Clone)]
pub struct OutputLayout {
  features_dir: PathBuf,
  boxes_dir: PathBuf,
  mapping_path: PathBuf,
  viz_dir: Option<PathBuf>,
}

impl OutputLayout {
  pub fn new(
    features_dir: impl Into<PathBuf>,
    boxes_dir: impl Into<PathBuf>,
    mapping_path: impl Into<PathBuf>,
  ) -> Self {
    OutputLayout {
      features_dir: features_dir.into(),
      boxes_dir: boxes_dir.into(),
      mapping_path: mapping_path.into(),
      viz_dir: None,
    }
  }

  pub fn with_viz_dir(mut self, viz_dir: Option<PathBuf>) -> Self {
    self.viz_dir = viz_dir;
    self
  }

  pub fn mapping_path(&self) -> &Path {
    &self.mapping_path
  }

  /// 创建所有输出目录（已存在则跳过）
  pub fn ensure_dirs(&self) -> Result<(), OutputError> {
    let mapping_dir = self
      .mapping_path
      .parent()
      .filter(|p| !p.as_os_str().is_empty());

    let dirs = [
      Some(self.features_dir.as_path()),
      Some(self.boxes_dir.as_path()),
      mapping_dir,
      self.viz_dir.as_deref(),
    ];

    for dir in dirs.into_iter().flatten() {
      if !dir.exists() {
        info!("创建输出目录: {}", dir.display());
        std::fs::create_dir_all(dir).map_err(|source| OutputError::CreateDirError {
          path: dir.display().to_string(),
          source,
        })?;
      }
    }
    Ok(())
  }

  pub fn box_path(&self, image_name: &str) -> PathBuf {
    self
      .boxes_dir
      .join(format!("{}{}", image_name, BoxSet::EXTENSION))
  }

  pub fn feature_path(&self, output_name: &str) -> PathBuf {
    self
      .features_dir
      .join(format!("{}{}", output_name, FeatureSet::EXTENSION))
  }

  pub fn viz_path(&self, image_name: &str) -> Option<PathBuf> {
    self
      .viz_dir
      .as_ref()
      .map(|dir| dir.join(format!("{}.png", image_name)))
  }
}
