// 该文件是 Shanan Retrieval （山南西风·检索） 项目的一部分。
// src/model/exec.rs - 外部进程推理引擎
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

//! 通过外部程序完成推理。调用方式：
//!
//! ```text
//! <program> [url 中的 arg..] [附加参数..] <input.png> <output.ext>
//! ```
//!
//! 程序读取输入图像，并以本项目的记录格式写出结果文件。

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{RgbNhwcFrame, ToRgbImage},
  model::Model,
  record::{Record, RecordError},
};

#[derive(Error, Debug)]
pub enum ExecModelError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch {
    expected: &'static str,
    actual: String,
  },
  #[error("推理程序不存在: {0}")]
  ProgramNotFound(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("推理程序 {program} 异常退出: {status}")]
  ExitStatus { program: String, status: ExitStatus },
  #[error("推理结果读取错误: {0}")]
  RecordError(#[from] RecordError),
}

pub struct ExecModelBuilder {
  program: PathBuf,
  args: Vec<OsString>,
}

impl FromUrlWithScheme for ExecModelBuilder {
  const SCHEME: &'static str = "exec";
}

impl FromUrl for ExecModelBuilder {
  type Error = ExecModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ExecModelError::SchemeMismatch {
        expected: Self::SCHEME,
        actual: url.scheme().to_string(),
      });
    }

    let args = url
      .query_pairs()
      .filter(|(k, _)| k == "arg")
      .map(|(_, v)| OsString::from(v.into_owned()))
      .collect();

    Ok(ExecModelBuilder {
      program: PathBuf::from(url.path()),
      args,
    })
  }
}

impl ExecModelBuilder {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    ExecModelBuilder {
      program: program.into(),
      args: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn build<Output: Record>(self) -> Result<ExecModel<Output>, ExecModelError> {
    if !self.program.is_file() {
      return Err(ExecModelError::ProgramNotFound(
        self.program.display().to_string(),
      ));
    }

    info!(
      "推理程序: {} (参数 {:?}, 输出 {})",
      self.program.display(),
      self.args,
      Output::EXTENSION
    );

    Ok(ExecModel {
      program: self.program,
      args: self.args,
      _phantom: std::marker::PhantomData,
    })
  }
}

pub struct ExecModel<Output> {
  program: PathBuf,
  args: Vec<OsString>,
  _phantom: std::marker::PhantomData<fn() -> Output>,
}

impl<Output: Record> Model for ExecModel<Output> {
  type Input = RgbNhwcFrame;
  type Output = Output;
  type Error = ExecModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let workdir = tempfile::tempdir()?;
    let input_path = workdir.path().join("input.png");
    let output_path = workdir.path().join(format!("output{}", Output::EXTENSION));

    debug!(
      "写入推理输入 {}x{}: {}",
      input.width(),
      input.height(),
      input_path.display()
    );
    input.to_rgb_image().save(&input_path)?;

    let status = Command::new(&self.program)
      .args(&self.args)
      .arg(&input_path)
      .arg(&output_path)
      .status()?;

    if !status.success() {
      return Err(ExecModelError::ExitStatus {
        program: self.program.display().to_string(),
        status,
      });
    }

    Ok(Output::read_from_file(&output_path)?)
  }
}
