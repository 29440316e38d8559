// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

use shanan_retrieval::task::STATUS_CHECK_ITERATIONS;

fn parse_threshold(s: &str) -> Result<f32, String> {
  let value: f32 = s.parse().map_err(|e| format!("{}", e))?;
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(format!("阈值必须位于 [0, 1] 区间, 实际为 {}", value))
  }
}

/// 批量提取检测框与局部特征
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 图像列表文件，每行一个图像路径，图像名取文件名（不含扩展名）
  #[arg(long, value_name = "FILE")]
  pub image_list: PathBuf,

  /// 列表中相对路径的根目录
  #[arg(long, value_name = "DIR")]
  pub images_dir: Option<PathBuf>,

  /// 检测器引擎，例如 exec:///opt/delf/bin/detect
  #[arg(long, value_name = "URL")]
  pub detector: Url,

  /// 检测器模型目录，以 `--model <DIR>` 传给检测器
  #[arg(long, value_name = "DIR")]
  pub detector_model_dir: PathBuf,

  /// 局部特征提取器引擎
  #[arg(long, value_name = "URL")]
  pub extractor: Url,

  /// 提取器配置文件，以 `--config <FILE>` 传给提取器
  #[arg(long, value_name = "FILE")]
  pub extractor_config: PathBuf,

  /// 检测框置信度阈值 (0.0 - 1.0)，不低于该值的检测框会提取特征
  #[arg(long, default_value = "0.1", value_name = "THRESHOLD", value_parser = parse_threshold)]
  pub detector_thresh: f32,

  /// 局部特征输出目录
  #[arg(long, value_name = "DIR")]
  pub output_features_dir: PathBuf,

  /// 检测框输出目录
  #[arg(long, value_name = "DIR")]
  pub output_boxes_dir: PathBuf,

  /// 特征文件清单（CSV）
  #[arg(long, value_name = "FILE")]
  pub output_mapping: PathBuf,

  /// 可视化输出目录，绘制入选检测框
  #[arg(long, value_name = "DIR")]
  pub output_viz_dir: Option<PathBuf>,

  /// 进度输出间隔（图像数）
  #[arg(long, default_value_t = STATUS_CHECK_ITERATIONS, value_name = "COUNT")]
  pub status_interval: usize,
}
