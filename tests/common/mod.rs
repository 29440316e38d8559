mod fixtures;
pub use fixtures::*;

// 测试中常用的类型
pub use shanan_retrieval::{
  frame::RgbNhwcFrame,
  input::ImageList,
  model::{BoxSet, DetectedBox, FeatureSet, LocalFeature, Model, NormalizedBox},
  output::{Manifest, ManifestRecord, OutputLayout},
  record::Record,
  task::{ExtractionReport, ExtractionTask, TaskError},
};
