// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/model.rs - 模型
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

use serde::{Deserialize, Serialize};

/// 推理引擎。检测器与局部特征提取器都以此表示，
/// 运行前构造一次，之后对每张图像（或裁剪区域）重复调用。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<M: Model> Model for &M {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

/// 归一化检测框，坐标相对于图像高宽，取值 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
  pub ymin: f32,
  pub xmin: f32,
  pub ymax: f32,
  pub xmax: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedBox {
  pub bbox: NormalizedBox,
  pub score: f32,
  pub class_index: i32,
}

/// 一次检测的完整输出，保持检测器给出的顺序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxSet {
  pub items: Vec<DetectedBox>,
}

impl BoxSet {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// 得分不低于阈值的检测框，保持原顺序
  pub fn select(&self, threshold: f32) -> Vec<NormalizedBox> {
    self
      .items
      .iter()
      .filter(|item| item.score >= threshold)
      .map(|item| item.bbox)
      .collect()
  }
}

impl FromIterator<DetectedBox> for BoxSet {
  fn from_iter<T: IntoIterator<Item = DetectedBox>>(iter: T) -> Self {
    BoxSet {
      items: iter.into_iter().collect(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFeature {
  /// (y, x)
  pub location: [f32; 2],
  pub scale: f32,
  pub descriptor: Vec<f32>,
  pub attention: f32,
}

/// 一个区域（整图或某个检测框）上的局部特征，保持提取器给出的顺序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
  pub features: Vec<LocalFeature>,
}

impl FeatureSet {
  pub fn len(&self) -> usize {
    self.features.len()
  }

  pub fn is_empty(&self) -> bool {
    self.features.is_empty()
  }
}

impl FromIterator<LocalFeature> for FeatureSet {
  fn from_iter<T: IntoIterator<Item = LocalFeature>>(iter: T) -> Self {
    FeatureSet {
      features: iter.into_iter().collect(),
    }
  }
}

#[cfg(feature = "exec_model")]
mod exec;
#[cfg(feature = "exec_model")]
pub use self::exec::{ExecModel, ExecModelBuilder, ExecModelError};
