// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use shanan_retrieval::{input::ImageList, output::OutputLayout, task::ExtractionTask};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("图像列表: {}", args.image_list.display());
  info!("检测器: {}", args.detector);
  info!("提取器: {}", args.extractor);
  info!("置信度阈值: {}", args.detector_thresh);
  info!("特征输出目录: {}", args.output_features_dir.display());
  info!("检测框输出目录: {}", args.output_boxes_dir.display());
  info!("清单文件: {}", args.output_mapping.display());

  let images = ImageList::from_list_file(&args.image_list, args.images_dir.as_deref())
    .with_context(|| format!("无法读取图像列表: {}", args.image_list.display()))?;
  info!("共 {} 张图像", images.len());

  // 配置内容由提取器解析，这里只确认可读
  let config = std::fs::read_to_string(&args.extractor_config).with_context(|| {
    format!(
      "无法读取提取器配置: {}",
      args.extractor_config.display()
    )
  })?;
  debug!("提取器配置 {} 字节", config.len());

  let layout = OutputLayout::new(
    &args.output_features_dir,
    &args.output_boxes_dir,
    &args.output_mapping,
  )
  .with_viz_dir(args.output_viz_dir.clone());

  let interrupt = Arc::new(AtomicBool::new(false));
  {
    let interrupt = interrupt.clone();
    ctrlc::set_handler(move || {
      warn!("收到中断信号，当前图像处理完成后退出...");
      interrupt.store(true, Ordering::SeqCst);
    })
    .context("无法设置 Ctrl-C 处理函数")?;
  }

  let (detector, extractor) = engines::create(&args)?;
  let task = ExtractionTask::new(detector, extractor, layout, args.detector_thresh)
    .with_status_interval(args.status_interval)
    .with_interrupt(interrupt);

  let now = std::time::Instant::now();
  let report = task.run_task(&images)?;

  info!("处理完成! 耗时 {:.2?}", now.elapsed());
  info!("图像数: {}", report.images);
  info!(
    "检测框: 新计算 {}, 复用 {}",
    report.computed_boxes, report.cached_boxes
  );
  info!(
    "特征: 新计算 {}, 复用 {}",
    report.computed_features, report.cached_features
  );
  info!("清单行数: {}", report.manifest.len());

  Ok(())
}

mod engines {
  use anyhow::{Context, Result};
  use shanan_retrieval::{
    FromUrl,
    model::{BoxSet, ExecModel, ExecModelBuilder, FeatureSet},
  };

  use crate::args::Args;

  pub fn create(args: &Args) -> Result<(ExecModel<BoxSet>, ExecModel<FeatureSet>)> {
    let detector = ExecModelBuilder::from_url(&args.detector)?
      .arg("--model")
      .arg(&args.detector_model_dir)
      .build::<BoxSet>()
      .context("无法创建检测器")?;
    let extractor = ExecModelBuilder::from_url(&args.extractor)?
      .arg("--config")
      .arg(&args.extractor_config)
      .build::<FeatureSet>()
      .context("无法创建提取器")?;
    Ok((detector, extractor))
  }
}
