// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/output/manifest.rs - 特征文件清单
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ManifestError {
  #[error("CSV 错误 ({path}): {source}")]
  CsvError { path: String, source: csv::Error },
  #[error("I/O 错误 ({path}): {source}")]
  IoError {
    path: String,
    source: std::io::Error,
  },
}

/// 清单中的一行。字段名即 CSV 表头。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
  pub name: String,
  pub index_image_id: usize,
  /// -1 表示整图特征
  pub box_id: i64,
}

/// 按产生顺序记录的特征文件清单，运行期间只追加
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
  records: Vec<ManifestRecord>,
}

impl Manifest {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, name: String, index_image_id: usize, box_id: i64) {
    self.records.push(ManifestRecord {
      name,
      index_image_id,
      box_id,
    });
  }

  pub fn records(&self) -> &[ManifestRecord] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn write_to_file(&self, path: &Path) -> Result<(), ManifestError> {
    let csv_err = |source| ManifestError::CsvError {
      path: path.display().to_string(),
      source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    // 空清单也要写表头
    if self.records.is_empty() {
      writer
        .write_record(["name", "index_image_id", "box_id"])
        .map_err(csv_err)?;
    }
    for record in &self.records {
      writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ManifestError::IoError {
      path: path.display().to_string(),
      source,
    })?;

    info!("清单已写入 {} ({} 行)", path.display(), self.records.len());
    Ok(())
  }

  pub fn read_from_file(path: &Path) -> Result<Self, ManifestError> {
    let csv_err = |source| ManifestError::CsvError {
      path: path.display().to_string(),
      source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let records = reader
      .deserialize()
      .collect::<Result<Vec<ManifestRecord>, _>>()
      .map_err(csv_err)?;
    Ok(Manifest { records })
  }
}
