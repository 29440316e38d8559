// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/task.rs - 检测框与局部特征批量提取任务
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
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  frame::{FrameError, RgbNhwcFrame},
  input::{ImageEntry, ImageFileInputError, ImageList, load_image},
  model::{BoxSet, FeatureSet, Model, NormalizedBox},
  output::{Manifest, ManifestError, OutputError, OutputLayout, Region},
  record::{Record, RecordError},
};

/// 每处理这么多张图像输出一次进度
pub const STATUS_CHECK_ITERATIONS: usize = 100;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("输出错误: {0}")]
  OutputError(#[from] OutputError),
  #[error("图像读取错误: {0}")]
  ImageError(#[from] ImageFileInputError),
  #[error("记录文件错误: {0}")]
  RecordError(#[from] RecordError),
  #[error("清单错误: {0}")]
  ManifestError(#[from] ManifestError),
  #[error("图像 {name} 的检测框 {box_index} 无法裁剪: {source}")]
  CropError {
    name: String,
    box_index: usize,
    source: FrameError,
  },
  #[error("图像 {name} 检测失败: {source}")]
  DetectorError { name: String, source: BoxError },
  #[error("{name} 特征提取失败: {source}")]
  ExtractorError { name: String, source: BoxError },
  #[cfg(feature = "visualize")]
  #[error("可视化图像保存失败 ({path}): {source}")]
  VisualizeError {
    path: String,
    source: image::ImageError,
  },
  #[error("任务被中断，已处理 {processed} 张图像")]
  Interrupted { processed: usize },
}

/// 一次运行的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
  pub manifest: Manifest,
  pub images: usize,
  pub computed_boxes: usize,
  pub cached_boxes: usize,
  pub computed_features: usize,
  pub cached_features: usize,
}

/// 检测框与局部特征的批量提取。
///
/// 对每张图像：得到检测框（已有文件则直接读取），按阈值选出检测框，
/// 再对整图和每个入选检测框提取局部特征（已有文件则跳过），
/// 全部图像处理完毕后一次性写出清单。
pub struct ExtractionTask<D, E> {
  detector: D,
  extractor: E,
  layout: OutputLayout,
  detector_thresh: f32,
  status_interval: usize,
  interrupt: Option<Arc<AtomicBool>>,
}

impl<D, E> ExtractionTask<D, E>
where
  D: Model<Input = RgbNhwcFrame, Output = BoxSet>,
  D::Error: std::error::Error + Send + Sync + 'static,
  E: Model<Input = RgbNhwcFrame, Output = FeatureSet>,
  E::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(detector: D, extractor: E, layout: OutputLayout, detector_thresh: f32) -> Self {
    ExtractionTask {
      detector,
      extractor,
      layout,
      detector_thresh,
      status_interval: STATUS_CHECK_ITERATIONS,
      interrupt: None,
    }
  }

  pub fn with_status_interval(mut self, status_interval: usize) -> Self {
    self.status_interval = status_interval.max(1);
    self
  }

  /// 每张图像开始前检查该标志，置位后停止任务且不写清单
  pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  pub fn run_task(&self, images: &ImageList) -> Result<ExtractionReport, TaskError> {
    self.layout.ensure_dirs()?;

    let num_images = images.len();
    let mut report = ExtractionReport::default();
    let mut start = Instant::now();

    for entry in images.iter() {
      let i = entry.index;
      if let Some(flag) = &self.interrupt
        && flag.load(Ordering::SeqCst)
      {
        warn!("收到中断信号，停止于第 {} 张图像", i);
        return Err(TaskError::Interrupted { processed: i });
      }

      if i == 0 {
        info!("开始提取检测框与特征...");
      } else if i % self.status_interval == 0 {
        info!(
          "正在处理第 {} / {} 张图像，最近 {} 张耗时 {:.2?}",
          i,
          num_images,
          self.status_interval,
          start.elapsed()
        );
        start = Instant::now();
      }

      self.process_image(&entry, &mut report)?;
      report.images += 1;
    }

    report.manifest.write_to_file(self.layout.mapping_path())?;
    Ok(report)
  }

  fn process_image(
    &self,
    entry: &ImageEntry<'_>,
    report: &mut ExtractionReport,
  ) -> Result<(), TaskError> {
    let name = entry.name;
    // 仅在需要推理时才解码图像
    let mut frame: Option<RgbNhwcFrame> = None;

    let box_path = self.layout.box_path(name);
    let boxes = if box_path.exists() {
      info!("跳过 {} 的检测框计算", name);
      report.cached_boxes += 1;
      BoxSet::read_from_file(&box_path)?
    } else {
      let image = decoded(&mut frame, entry.path)?;
      let boxes = self
        .detector
        .infer(image)
        .map_err(|e| TaskError::DetectorError {
          name: name.to_string(),
          source: Box::new(e),
        })?;
      boxes.write_to_file(&box_path)?;
      report.computed_boxes += 1;
      boxes
    };

    let selected = boxes.select(self.detector_thresh);
    debug!(
      "{}: {} 个检测框，{} 个不低于阈值 {}",
      name,
      boxes.len(),
      selected.len(),
      self.detector_thresh
    );

    self.visualize(entry, &mut frame, &selected)?;

    for r in 0..=selected.len() {
      let region = Region::from_index(r);
      let output_name = region.output_name(name);
      let feature_path = self.layout.feature_path(&output_name);

      report
        .manifest
        .push(output_name.clone(), entry.index, region.box_id());

      if feature_path.exists() {
        info!("跳过 {} 的特征计算", output_name);
        report.cached_features += 1;
        continue;
      }

      let image = decoded(&mut frame, entry.path)?;
      let features = match region {
        Region::WholeImage => self.extract(&output_name, image)?,
        Region::Box(k) => {
          let cropped = image
            .crop_normalized(&selected[k])
            .map_err(|source| TaskError::CropError {
              name: name.to_string(),
              box_index: k,
              source,
            })?;
          debug!(
            "{}: 裁剪区域 {}x{}",
            output_name,
            cropped.width(),
            cropped.height()
          );
          self.extract(&output_name, &cropped)?
        }
      };
      features.write_to_file(&feature_path)?;
      report.computed_features += 1;
    }

    Ok(())
  }

  fn extract(&self, output_name: &str, image: &RgbNhwcFrame) -> Result<FeatureSet, TaskError> {
    let features = self
      .extractor
      .infer(image)
      .map_err(|e| TaskError::ExtractorError {
        name: output_name.to_string(),
        source: Box::new(e),
      })?;
    debug!("{}: 提取到 {} 个局部特征", output_name, features.len());
    Ok(features)
  }

  #[cfg(feature = "visualize")]
  fn visualize(
    &self,
    entry: &ImageEntry<'_>,
    frame: &mut Option<RgbNhwcFrame>,
    selected: &[NormalizedBox],
  ) -> Result<(), TaskError> {
    let Some(path) = self.layout.viz_path(entry.name) else {
      return Ok(());
    };
    if path.exists() {
      return Ok(());
    }

    let image = decoded(frame, entry.path)?;
    crate::output::draw::Draw::default()
      .save_boxes(&path, image, selected)
      .map_err(|source| TaskError::VisualizeError {
        path: path.display().to_string(),
        source,
      })
  }

  #[cfg(not(feature = "visualize"))]
  fn visualize(
    &self,
    entry: &ImageEntry<'_>,
    _frame: &mut Option<RgbNhwcFrame>,
    _selected: &[NormalizedBox],
  ) -> Result<(), TaskError> {
    if self.layout.viz_path(entry.name).is_some() {
      warn!("未启用 visualize 特性，忽略可视化输出");
    }
    Ok(())
  }
}

/// 取得已解码的图像，第一次使用时才读取文件
fn decoded<'a>(
  slot: &'a mut Option<RgbNhwcFrame>,
  path: &Path,
) -> Result<&'a RgbNhwcFrame, TaskError> {
  let frame = match slot.take() {
    Some(frame) => frame,
    None => load_image(path)?,
  };
  Ok(slot.insert(frame))
}
