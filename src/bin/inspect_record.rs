// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/bin/inspect_record.rs - 记录文件查看工具
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

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;

use shanan_retrieval::{
  model::{BoxSet, FeatureSet},
  record::{Record, has_record_header},
};

/// 以 JSON 打印检测框（.boxes）或局部特征（.delf）文件
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 记录文件路径
  #[arg(value_name = "FILE")]
  pub file: PathBuf,

  /// 输出紧凑 JSON
  #[arg(long)]
  pub compact: bool,
}

fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
  if compact {
    serde_json::to_string(value)
  } else {
    serde_json::to_string_pretty(value)
  }
}

fn main() -> Result<()> {
  // JSON 走标准输出，日志写到标准错误
  tracing_subscriber::fmt().with_writer(std::io::stderr).init();

  let args = Args::parse();

  let json = if has_record_header::<BoxSet>(&args.file) {
    let boxes = BoxSet::read_from_file(&args.file)?;
    info!("检测框文件: {} 个检测框", boxes.len());
    to_json(&boxes, args.compact)?
  } else if has_record_header::<FeatureSet>(&args.file) {
    let features = FeatureSet::read_from_file(&args.file)?;
    info!("局部特征文件: {} 个特征点", features.len());
    to_json(&features, args.compact)?
  } else {
    bail!("无法识别的记录文件: {}", args.file.display());
  };

  println!("{}", json);
  Ok(())
}
