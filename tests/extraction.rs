//! 批量提取任务的集成测试。
//!
//! 覆盖：
//! - 输出文件命名与清单行顺序
//! - 已有输出的复用（重复运行、断点续跑）
//! - 阈值筛选与裁剪区域
//! - 前置条件与失败时的行为

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use common::*;
use shanan_retrieval::input::InputError;

fn two_image_scenario(ws: &Workspace) -> ImageList {
  let a = ws.image("a", 100, 200);
  let b = ws.image("b", 50, 50);
  ImageList::new(vec!["a".to_string(), "b".to_string()], vec![a, b]).unwrap()
}

fn scenario_detector() -> FakeDetector {
  FakeDetector::default().with_boxes(
    100,
    vec![
      detected(0.9, 0.10, 0.20, 0.50, 0.80),
      detected(0.2, 0.0, 0.0, 1.0, 1.0),
    ],
  )
}

fn record(name: &str, index_image_id: usize, box_id: i64) -> ManifestRecord {
  ManifestRecord {
    name: name.to_string(),
    index_image_id,
    box_id,
  }
}

#[test]
fn scenario_writes_boxes_features_and_manifest() -> anyhow::Result<()> {
  let ws = Workspace::new();
  let images = two_image_scenario(&ws);
  let detector = scenario_detector();
  let extractor = FakeExtractor::default();

  let report = ExtractionTask::new(&detector, &extractor, ws.layout(), 0.5).run_task(&images)?;

  assert_eq!(
    ws.output_files(),
    vec![
      "boxes/a.boxes",
      "boxes/b.boxes",
      "features/a.delf",
      "features/a_0.delf",
      "features/b.delf",
      "index/mapping.csv",
    ]
  );

  let expected = vec![record("a", 0, -1), record("a_0", 0, 0), record("b", 1, -1)];
  assert_eq!(report.manifest.records(), expected.as_slice());
  assert_eq!(Manifest::read_from_file(&ws.mapping_path())?.records(), expected.as_slice());
  assert_eq!(
    std::fs::read_to_string(ws.mapping_path())?,
    "name,index_image_id,box_id\na,0,-1\na_0,0,0\nb,1,-1\n"
  );

  assert_eq!(detector.calls.get(), 2);
  assert_eq!(extractor.calls.get(), 3);
  // 整图 100x200，检测框裁剪 [20, 80) x [20, 100)，随后是整图 50x50
  assert_eq!(*extractor.sizes.borrow(), vec![(100, 200), (60, 80), (50, 50)]);

  let a_boxes = BoxSet::read_from_file(&ws.box_file("a"))?;
  assert_eq!(a_boxes.len(), 2);
  assert!(BoxSet::read_from_file(&ws.box_file("b"))?.is_empty());

  let a_0 = FeatureSet::read_from_file(&ws.feature_file("a_0"))?;
  assert_eq!(a_0.features[0].location, [80.0, 60.0]);

  assert_eq!(report.images, 2);
  assert_eq!((report.computed_boxes, report.cached_boxes), (2, 0));
  assert_eq!((report.computed_features, report.cached_features), (3, 0));
  Ok(())
}

#[test]
fn second_run_reuses_every_output() -> anyhow::Result<()> {
  let ws = Workspace::new();
  let images = two_image_scenario(&ws);

  let first = ExtractionTask::new(scenario_detector(), FakeExtractor::default(), ws.layout(), 0.5)
    .run_task(&images)?;
  let first_manifest = std::fs::read_to_string(ws.mapping_path())?;

  let detector = scenario_detector();
  let extractor = FakeExtractor::default();
  let second = ExtractionTask::new(&detector, &extractor, ws.layout(), 0.5).run_task(&images)?;

  assert_eq!(detector.calls.get(), 0);
  assert_eq!(extractor.calls.get(), 0);
  assert_eq!(second.manifest, first.manifest);
  assert_eq!(std::fs::read_to_string(ws.mapping_path())?, first_manifest);
  assert_eq!((second.computed_boxes, second.cached_boxes), (0, 2));
  assert_eq!((second.computed_features, second.cached_features), (0, 3));
  Ok(())
}

#[test]
fn interrupted_run_resumes_missing_outputs_only() -> anyhow::Result<()> {
  let ws = Workspace::new();
  let images = two_image_scenario(&ws);

  ExtractionTask::new(scenario_detector(), FakeExtractor::default(), ws.layout(), 0.5)
    .run_task(&images)?;
  std::fs::remove_file(ws.feature_file("a_0"))?;
  std::fs::remove_file(ws.box_file("b"))?;

  let detector = scenario_detector();
  let extractor = FakeExtractor::default();
  let report = ExtractionTask::new(&detector, &extractor, ws.layout(), 0.5).run_task(&images)?;

  assert_eq!(detector.calls.get(), 1);
  assert_eq!(extractor.calls.get(), 1);
  assert_eq!(*extractor.sizes.borrow(), vec![(60, 80)]);
  assert!(ws.feature_file("a_0").exists());
  assert!(ws.box_file("b").exists());
  assert_eq!(report.manifest.len(), 3);
  Ok(())
}

#[test]
fn feature_count_follows_threshold() -> anyhow::Result<()> {
  let ws = Workspace::new();
  let path = ws.image("multi", 40, 40);
  let images = ImageList::new(vec!["multi".to_string()], vec![path])?;

  let detector = FakeDetector::default().with_boxes(
    40,
    vec![
      detected(0.9, 0.0, 0.0, 0.5, 0.5),
      detected(0.5, 0.5, 0.5, 1.0, 1.0),
      detected(0.49, 0.0, 0.0, 1.0, 1.0),
      detected(0.7, 0.25, 0.0, 0.75, 1.0),
    ],
  );
  let extractor = FakeExtractor::default();
  let report = ExtractionTask::new(&detector, &extractor, ws.layout(), 0.5).run_task(&images)?;

  // 1 个整图 + 3 个得分不低于 0.5 的检测框
  assert_eq!(report.manifest.len(), 4);
  let names: Vec<&str> = report.manifest.records().iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, vec!["multi", "multi_0", "multi_1", "multi_2"]);
  let box_ids: Vec<i64> = report.manifest.records().iter().map(|r| r.box_id).collect();
  assert_eq!(box_ids, vec![-1, 0, 1, 2]);
  assert_eq!(
    *extractor.sizes.borrow(),
    vec![(40, 40), (20, 20), (20, 20), (40, 20)]
  );
  assert!(!ws.feature_file("multi_3").exists());
  Ok(())
}

#[test]
fn cached_boxes_drive_selection() -> anyhow::Result<()> {
  let ws = Workspace::new();
  let images = two_image_scenario(&ws);

  // 预先写入 b 的检测框，检测器对 b 本应返回空结果
  std::fs::create_dir_all(ws.boxes_dir())?;
  BoxSet {
    items: vec![detected(0.8, 0.0, 0.0, 0.5, 0.5)],
  }
  .write_to_file(&ws.box_file("b"))?;

  let detector = scenario_detector();
  let extractor = FakeExtractor::default();
  let report = ExtractionTask::new(&detector, &extractor, ws.layout(), 0.5).run_task(&images)?;

  assert_eq!(detector.calls.get(), 1);
  assert!(ws.feature_file("b_0").exists());
  assert_eq!(report.manifest.records().last(), Some(&record("b_0", 1, 0)));
  assert_eq!((report.computed_boxes, report.cached_boxes), (1, 1));
  Ok(())
}

#[test]
fn fully_cached_image_is_not_decoded() -> anyhow::Result<()> {
  let ws = Workspace::new();
  let images = two_image_scenario(&ws);
  ExtractionTask::new(scenario_detector(), FakeExtractor::default(), ws.layout(), 0.5)
    .run_task(&images)?;

  std::fs::remove_file(ws.dir.path().join("images/a.png"))?;
  let report = ExtractionTask::new(scenario_detector(), FakeExtractor::default(), ws.layout(), 0.5)
    .run_task(&images)?;
  assert_eq!(report.manifest.len(), 3);
  Ok(())
}

#[test]
fn mismatched_image_lists_fail_before_any_output() {
  let ws = Workspace::new();
  let err = ImageList::new(
    vec!["a".to_string(), "b".to_string()],
    vec![PathBuf::from("a.png")],
  )
  .unwrap_err();

  assert!(matches!(err, InputError::LengthMismatch { names: 2, paths: 1 }));
  assert!(ws.output_files().is_empty());
  assert!(!ws.features_dir().exists());
  assert!(!ws.boxes_dir().exists());
}

#[test]
fn images_sharing_a_file_stem_fail_before_any_output() {
  let ws = Workspace::new();
  let list_path = ws.dir.path().join("list.txt");
  std::fs::write(&list_path, "q/x.png\ni/x.png\n").unwrap();

  let images_dir = ws.dir.path().join("images");
  let err = ImageList::from_list_file(&list_path, Some(&images_dir)).unwrap_err();

  assert!(matches!(
    err,
    InputError::DuplicateName { ref name, first: 0, second: 1 } if name == "x"
  ));
  assert!(ws.output_files().is_empty());
}

#[test]
fn extractor_failure_aborts_without_manifest() {
  let ws = Workspace::new();
  let images = two_image_scenario(&ws);

  let err = ExtractionTask::new(scenario_detector(), FailingExtractor, ws.layout(), 0.5)
    .run_task(&images)
    .unwrap_err();

  assert!(matches!(err, TaskError::ExtractorError { ref name, .. } if name == "a"));
  assert!(ws.box_file("a").exists());
  assert!(!ws.feature_file("a").exists());
  assert!(!ws.mapping_path().exists());
}

#[test]
fn missing_image_aborts_the_run() {
  let ws = Workspace::new();
  let images = ImageList::new(
    vec!["ghost".to_string()],
    vec![ws.dir.path().join("images/ghost.png")],
  )
  .unwrap();

  let err = ExtractionTask::new(FakeDetector::default(), FakeExtractor::default(), ws.layout(), 0.5)
    .run_task(&images)
    .unwrap_err();
  assert!(matches!(err, TaskError::ImageError(_)));
  assert!(!ws.mapping_path().exists());
}

#[test]
fn interrupt_flag_stops_before_next_image() {
  let ws = Workspace::new();
  let images = two_image_scenario(&ws);
  let interrupt = Arc::new(AtomicBool::new(true));

  let extractor = FakeExtractor::default();
  let err = ExtractionTask::new(scenario_detector(), &extractor, ws.layout(), 0.5)
    .with_interrupt(interrupt)
    .run_task(&images)
    .unwrap_err();

  assert!(matches!(err, TaskError::Interrupted { processed: 0 }));
  assert_eq!(extractor.calls.get(), 0);
  assert!(!ws.mapping_path().exists());
}

#[test]
fn empty_image_list_writes_header_only_manifest() -> anyhow::Result<()> {
  let ws = Workspace::new();
  let images = ImageList::new(Vec::new(), Vec::new())?;

  let report = ExtractionTask::new(FakeDetector::default(), FakeExtractor::default(), ws.layout(), 0.5)
    .with_status_interval(1)
    .run_task(&images)?;

  assert!(report.manifest.is_empty());
  assert_eq!(
    std::fs::read_to_string(ws.mapping_path())?,
    "name,index_image_id,box_id\n"
  );
  Ok(())
}

#[cfg(feature = "visualize")]
#[test]
fn visualization_is_written_once_per_image() -> anyhow::Result<()> {
  let ws = Workspace::new();
  let images = two_image_scenario(&ws);
  let layout = ws.layout().with_viz_dir(Some(ws.viz_dir()));

  ExtractionTask::new(scenario_detector(), FakeExtractor::default(), layout, 0.5)
    .run_task(&images)?;

  let viz = image::open(ws.viz_dir().join("a.png"))?.to_rgb8();
  assert_eq!(viz.dimensions(), (100, 200));
  assert_eq!(viz.get_pixel(20, 20).0, [0, 0, 255]);
  assert!(ws.viz_dir().join("b.png").exists());
  Ok(())
}
