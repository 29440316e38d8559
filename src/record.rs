// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/record.rs - 检测框与局部特征文件的读写
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

//! 文件格式：8 字节魔数，小端 `u32` 格式版本，随后是 bincode 编码的数据。
//!
//! 写入先落到同目录下的临时文件，完整写完后再原子地改名到目标路径，
//! 因此目标路径存在即代表记录完整。已存在的文件不会被覆盖。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::model::{BoxSet, FeatureSet};

pub const RECORD_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum RecordError {
  #[error("I/O 错误 ({path}): {source}")]
  IoError {
    path: String,
    source: std::io::Error,
  },
  #[error("编码错误 ({path}): {source}")]
  CodecError {
    path: String,
    source: bincode::Error,
  },
  #[error("文件格式不匹配 ({path}): 期望 {expected}")]
  BadMagic { path: String, expected: &'static str },
  #[error("不支持的格式版本 ({path}): {version}")]
  UnsupportedVersion { path: String, version: u32 },
  #[error("目标文件已存在: {0}")]
  AlreadyExists(String),
}

impl RecordError {
  fn io(path: &Path, source: std::io::Error) -> Self {
    RecordError::IoError {
      path: path.display().to_string(),
      source,
    }
  }

  fn codec(path: &Path, source: bincode::Error) -> Self {
    RecordError::CodecError {
      path: path.display().to_string(),
      source,
    }
  }
}

/// 以单个文件持久化的推理结果
pub trait Record: Serialize + DeserializeOwned + Sized {
  /// 文件扩展名，包含前导点
  const EXTENSION: &'static str;
  const MAGIC: &'static [u8; 8];

  fn write_to_file(&self, path: &Path) -> Result<(), RecordError> {
    let dir = match path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent,
      _ => Path::new("."),
    };

    let temp = NamedTempFile::new_in(dir).map_err(|e| RecordError::io(path, e))?;
    {
      let mut writer = BufWriter::new(temp.as_file());
      writer
        .write_all(Self::MAGIC)
        .and_then(|_| writer.write_all(&RECORD_FORMAT_VERSION.to_le_bytes()))
        .map_err(|e| RecordError::io(path, e))?;
      bincode::serialize_into(&mut writer, self).map_err(|e| RecordError::codec(path, e))?;
      writer.flush().map_err(|e| RecordError::io(path, e))?;
    }
    temp
      .as_file()
      .sync_all()
      .map_err(|e| RecordError::io(path, e))?;

    temp.persist_noclobber(path).map_err(|e| {
      if e.error.kind() == std::io::ErrorKind::AlreadyExists {
        RecordError::AlreadyExists(path.display().to_string())
      } else {
        RecordError::io(path, e.error)
      }
    })?;

    debug!("写入记录文件: {}", path.display());
    Ok(())
  }

  fn read_from_file(path: &Path) -> Result<Self, RecordError> {
    let bytes = std::fs::read(path).map_err(|e| RecordError::io(path, e))?;
    Self::decode(path, &bytes)
  }

  fn decode(path: &Path, bytes: &[u8]) -> Result<Self, RecordError> {
    if bytes.len() < HEADER_LEN || &bytes[..8] != Self::MAGIC {
      return Err(RecordError::BadMagic {
        path: path.display().to_string(),
        expected: Self::EXTENSION,
      });
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[8..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != RECORD_FORMAT_VERSION {
      return Err(RecordError::UnsupportedVersion {
        path: path.display().to_string(),
        version,
      });
    }

    bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| RecordError::codec(path, e))
  }
}

impl Record for BoxSet {
  const EXTENSION: &'static str = ".boxes";
  const MAGIC: &'static [u8; 8] = b"SHBOXES\0";
}

impl Record for FeatureSet {
  const EXTENSION: &'static str = ".delf";
  const MAGIC: &'static [u8; 8] = b"SHDELF\0\0";
}

/// 判断文件是否为可读的记录文件，只检查文件头
pub fn has_record_header<R: Record>(path: &Path) -> bool {
  use std::io::Read;

  let mut header = [0u8; 8];
  File::open(path)
    .and_then(|mut f| f.read_exact(&mut header))
    .map(|_| &header == R::MAGIC)
    .unwrap_or(false)
}
