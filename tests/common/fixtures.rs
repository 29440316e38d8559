use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb};
use shanan_retrieval::{
  frame::RgbNhwcFrame,
  model::{BoxSet, DetectedBox, FeatureSet, LocalFeature, Model, NormalizedBox},
  output::OutputLayout,
};
use tempfile::TempDir;

/// 一次测试运行的临时目录：输入图像与全部输出都放在这里
pub struct Workspace {
  pub dir: TempDir,
}

impl Workspace {
  pub fn new() -> Self {
    Workspace {
      dir: TempDir::new().expect("Failed to create temp directory"),
    }
  }

  /// 写出一张纯色 PNG 测试图像并返回路径
  pub fn image(&self, name: &str, width: u32, height: u32) -> PathBuf {
    let images = self.dir.path().join("images");
    std::fs::create_dir_all(&images).expect("Failed to create image directory");
    let path = images.join(format!("{}.png", name));
    let img = ImageBuffer::from_fn(width, height, |x, y| {
      Rgb([(x % 256) as u8, (y % 256) as u8, 90u8])
    });
    img
      .save_with_format(&path, image::ImageFormat::Png)
      .expect("Failed to save test image");
    path
  }

  pub fn features_dir(&self) -> PathBuf {
    self.dir.path().join("out/features")
  }

  pub fn boxes_dir(&self) -> PathBuf {
    self.dir.path().join("out/boxes")
  }

  pub fn mapping_path(&self) -> PathBuf {
    self.dir.path().join("out/index/mapping.csv")
  }

  pub fn viz_dir(&self) -> PathBuf {
    self.dir.path().join("out/viz")
  }

  pub fn layout(&self) -> OutputLayout {
    OutputLayout::new(self.features_dir(), self.boxes_dir(), self.mapping_path())
  }

  pub fn feature_file(&self, name: &str) -> PathBuf {
    self.features_dir().join(format!("{}.delf", name))
  }

  pub fn box_file(&self, name: &str) -> PathBuf {
    self.boxes_dir().join(format!("{}.boxes", name))
  }

  /// 输出目录下所有文件名（相对 out/，排序）
  pub fn output_files(&self) -> Vec<String> {
    let root = self.dir.path().join("out");
    let mut files = Vec::new();
    collect_files(&root, &root, &mut files);
    files.sort();
    files
  }
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) {
  let Ok(entries) = std::fs::read_dir(dir) else {
    return;
  };
  for entry in entries.flatten() {
    let path = entry.path();
    if path.is_dir() {
      collect_files(root, &path, files);
    } else if let Ok(rel) = path.strip_prefix(root) {
      files.push(rel.to_string_lossy().replace('\\', "/"));
    }
  }
}

pub fn detected(score: f32, ymin: f32, xmin: f32, ymax: f32, xmax: f32) -> DetectedBox {
  DetectedBox {
    bbox: NormalizedBox {
      ymin,
      xmin,
      ymax,
      xmax,
    },
    score,
    class_index: 1,
  }
}

/// 按图像宽度返回预置检测结果的检测器，并记录调用次数
#[derive(Default)]
pub struct FakeDetector {
  by_width: HashMap<usize, BoxSet>,
  pub calls: Cell<usize>,
}

impl FakeDetector {
  pub fn with_boxes(mut self, width: usize, boxes: Vec<DetectedBox>) -> Self {
    self.by_width.insert(width, BoxSet { items: boxes });
    self
  }
}

impl Model for FakeDetector {
  type Input = RgbNhwcFrame;
  type Output = BoxSet;
  type Error = std::convert::Infallible;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.calls.set(self.calls.get() + 1);
    Ok(self.by_width.get(&input.width()).cloned().unwrap_or_default())
  }
}

/// 返回一个特征点的提取器，特征位置记录输入尺寸
#[derive(Default)]
pub struct FakeExtractor {
  pub calls: Cell<usize>,
  pub sizes: RefCell<Vec<(usize, usize)>>,
}

impl Model for FakeExtractor {
  type Input = RgbNhwcFrame;
  type Output = FeatureSet;
  type Error = std::convert::Infallible;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.calls.set(self.calls.get() + 1);
    self
      .sizes
      .borrow_mut()
      .push((input.width(), input.height()));
    Ok(FeatureSet {
      features: vec![LocalFeature {
        location: [input.height() as f32, input.width() as f32],
        scale: 1.0,
        descriptor: vec![0.5; 8],
        attention: 0.9,
      }],
    })
  }
}

/// 总是失败的提取器
pub struct FailingExtractor;

impl Model for FailingExtractor {
  type Input = RgbNhwcFrame;
  type Output = FeatureSet;
  type Error = std::io::Error;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Err(std::io::Error::other("extractor crashed"))
  }
}
