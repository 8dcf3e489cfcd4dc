// 该文件是 Lubiao （路标） 项目的一部分。
// src/engine.rs - 推理引擎边界
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Lu Wen <luwen@lubiao.dev>, Lubiao Group

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::tensor::Tensor;

pub mod stub;

#[derive(Error, Debug)]
pub enum ConfigurationError {
  #[error("模型目录不存在: {0:?}")]
  ModelDirMissing(PathBuf),
  #[error("模型目录 {0:?} 中没有 .{1} 文件")]
  ModelFileMissing(PathBuf, &'static str),
  #[error("预期模型输入数量为 1, 实际为 {0}")]
  InputCountMismatch(usize),
  #[error("预期模型输出数量为 1, 实际为 {0}")]
  OutputCountMismatch(usize),
  #[error("模型输出 {0:?} 缺失")]
  MissingOutput(String),
  #[error("模型输出形状无效: {0:?}")]
  BadOutputShape(Box<[usize]>),
  #[error("未知的推理设备: {0:?}")]
  UnknownDevice(String),
  #[error("后端错误: {0}")]
  Backend(String),
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
}

impl From<std::io::Error> for ConfigurationError {
  fn from(err: std::io::Error) -> Self {
    ConfigurationError::IoError(err)
  }
}

/// 推理设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
  Cpu,
  Gpu,
  Myriad,
}

/// 数值精度，仅用于算子选择与报告，不改变输入张量自身的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
  Fp32,
  Fp16,
}

/// 设备到首选数值精度的静态映射
pub const DEVICE_PRECISION: [(Device, Precision); 3] = [
  (Device::Cpu, Precision::Fp32),
  (Device::Gpu, Precision::Fp16),
  (Device::Myriad, Precision::Fp16),
];

impl Device {
  /// 查询该设备编译模型变体的首选精度
  pub fn preferred_precision(&self) -> Precision {
    DEVICE_PRECISION
      .iter()
      .find(|(device, _)| device == self)
      .map(|(_, precision)| *precision)
      .unwrap_or(Precision::Fp32)
  }
}

impl std::fmt::Display for Device {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Device::Cpu => write!(f, "CPU"),
      Device::Gpu => write!(f, "GPU"),
      Device::Myriad => write!(f, "MYRIAD"),
    }
  }
}

impl std::fmt::Display for Precision {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Precision::Fp32 => write!(f, "FP32"),
      Precision::Fp16 => write!(f, "FP16"),
    }
  }
}

impl std::str::FromStr for Device {
  type Err = ConfigurationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "CPU" => Ok(Device::Cpu),
      "GPU" => Ok(Device::Gpu),
      "MYRIAD" => Ok(Device::Myriad),
      other => Err(ConfigurationError::UnknownDevice(other.to_string())),
    }
  }
}

/// 编译模型的文件对：拓扑描述文件与权重文件
#[derive(Debug, Clone)]
pub struct ModelFiles {
  pub topology: PathBuf,
  pub weights: PathBuf,
}

impl ModelFiles {
  /// 在模型目录中查找拓扑描述文件 (.xml) 与权重文件 (.bin)
  ///
  /// 存在多个匹配时取排序后的最后一个。
  pub fn discover(dir: &Path) -> Result<Self, ConfigurationError> {
    if !dir.is_dir() {
      error!("模型目录不存在: {}", dir.display());
      return Err(ConfigurationError::ModelDirMissing(dir.to_path_buf()));
    }

    let topology = last_with_extension(dir, "xml")?;
    let weights = last_with_extension(dir, "bin")?;
    debug!(
      "模型文件: 拓扑 {}, 权重 {}",
      topology.display(),
      weights.display()
    );

    Ok(ModelFiles { topology, weights })
  }
}

fn last_with_extension(dir: &Path, ext: &'static str) -> Result<PathBuf, ConfigurationError> {
  let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)?
    .filter_map(|entry| entry.ok())
    .map(|entry| entry.path())
    .filter(|path| path.extension().map(|e| e == ext).unwrap_or(false))
    .collect();
  matches.sort();
  matches
    .pop()
    .ok_or(ConfigurationError::ModelFileMissing(dir.to_path_buf(), ext))
}

/// 已加载的可执行模型：按名称接收输入张量并返回命名输出张量
pub trait Executable {
  fn input_names(&self) -> Vec<String>;
  fn output_names(&self) -> Vec<String>;

  fn run(
    &self,
    inputs: &HashMap<String, Tensor<u8>>,
  ) -> Result<HashMap<String, Tensor<f32>>, ConfigurationError>;
}

/// 推理后端能力边界：加载编译模型并返回可执行对象
///
/// 任何满足单输入单输出约定的后端均可替换使用。
pub trait Backend {
  type Exec: Executable;

  fn load(&self, model: &ModelFiles, device: Device) -> Result<Self::Exec, ConfigurationError>;
}

/// 每次推理调用后收到本次耗时的观察钩子
///
/// 推理调用本身是阻塞且无内部超时的，上层可借此钩子实现超时策略。
pub type RunObserver = Box<dyn Fn(Duration)>;

/// 围绕后端可执行对象的核心包装
///
/// 加载时校验模型恰好暴露一个命名输入与一个命名输出，
/// 并缓存两者的名称。
pub struct Engine<E> {
  exec: E,
  input_name: String,
  output_name: String,
  observer: Option<RunObserver>,
}

impl<E: Executable> Engine<E> {
  pub fn load<B: Backend<Exec = E>>(
    backend: &B,
    model: &ModelFiles,
    device: Device,
  ) -> Result<Self, ConfigurationError> {
    info!("加载模型: {} ({})", model.topology.display(), device);
    let exec = backend.load(model, device)?;

    let mut inputs = exec.input_names();
    let mut outputs = exec.output_names();

    if inputs.len() != 1 {
      error!("预期模型输入数量为 1, 实际为 {}", inputs.len());
      return Err(ConfigurationError::InputCountMismatch(inputs.len()));
    }
    if outputs.len() != 1 {
      error!("预期模型输出数量为 1, 实际为 {}", outputs.len());
      return Err(ConfigurationError::OutputCountMismatch(outputs.len()));
    }

    let input_name = inputs.remove(0);
    let output_name = outputs.remove(0);
    debug!("模型输入: {}, 模型输出: {}", input_name, output_name);

    Ok(Self {
      exec,
      input_name,
      output_name,
      observer: None,
    })
  }

  /// 注入观察钩子，每次推理调用后收到本次耗时
  pub fn with_observer(mut self, observer: RunObserver) -> Self {
    self.observer = Some(observer);
    self
  }

  pub fn input_name(&self) -> &str {
    &self.input_name
  }

  pub fn output_name(&self) -> &str {
    &self.output_name
  }

  /// 将输入张量装入该模型的命名输入映射
  pub fn named_input(&self, tensor: Tensor<u8>) -> HashMap<String, Tensor<u8>> {
    let mut inputs = HashMap::new();
    inputs.insert(self.input_name.clone(), tensor);
    inputs
  }

  /// 执行一次阻塞推理调用
  pub fn infer(
    &self,
    inputs: &HashMap<String, Tensor<u8>>,
  ) -> Result<HashMap<String, Tensor<f32>>, ConfigurationError> {
    let now = Instant::now();
    let outputs = self.exec.run(inputs)?;
    let elapsed = now.elapsed();
    debug!("推理完成, 耗时: {:.2?}", elapsed);
    if let Some(observer) = &self.observer {
      observer(elapsed);
    }
    Ok(outputs)
  }

  /// 从命名输出映射中取出该模型唯一的输出张量
  pub fn single_output(
    &self,
    mut outputs: HashMap<String, Tensor<f32>>,
  ) -> Result<Tensor<f32>, ConfigurationError> {
    outputs
      .remove(&self.output_name)
      .ok_or_else(|| ConfigurationError::MissingOutput(self.output_name.clone()))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::stub::{FixedLatencyBackend, StubModel};
  use super::*;

  #[test]
  fn device_precision_table_is_static() {
    assert_eq!(Device::Cpu.preferred_precision(), Precision::Fp32);
    assert_eq!(Device::Gpu.preferred_precision(), Precision::Fp16);
    assert_eq!(Device::Myriad.preferred_precision(), Precision::Fp16);
  }

  #[test]
  fn device_parses_case_insensitively() {
    assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
    assert_eq!("MYRIAD".parse::<Device>().unwrap(), Device::Myriad);
    assert!(matches!(
      "TPU".parse::<Device>(),
      Err(ConfigurationError::UnknownDevice(_))
    ));
  }

  fn temp_model_dir(name: &str, files: &[&str]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lubiao-engine-{}", name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    for file in files {
      std::fs::write(dir.join(file), b"stub").unwrap();
    }
    dir
  }

  #[test]
  fn discover_finds_topology_and_weights() {
    let dir = temp_model_dir("pair", &["ssd.xml", "ssd.bin"]);
    let model = ModelFiles::discover(&dir).unwrap();
    assert_eq!(model.topology.file_name().unwrap(), "ssd.xml");
    assert_eq!(model.weights.file_name().unwrap(), "ssd.bin");
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn discover_picks_last_sorted_match() {
    let dir = temp_model_dir("multi", &["a.xml", "b.xml", "a.bin", "b.bin"]);
    let model = ModelFiles::discover(&dir).unwrap();
    assert_eq!(model.topology.file_name().unwrap(), "b.xml");
    assert_eq!(model.weights.file_name().unwrap(), "b.bin");
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn discover_rejects_missing_dir_and_files() {
    assert!(matches!(
      ModelFiles::discover(Path::new("/nonexistent/lubiao-models")),
      Err(ConfigurationError::ModelDirMissing(_))
    ));

    let dir = temp_model_dir("nobin", &["ssd.xml"]);
    assert!(matches!(
      ModelFiles::discover(&dir),
      Err(ConfigurationError::ModelFileMissing(_, "bin"))
    ));
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn load_rejects_multi_output_model() {
    let dir = temp_model_dir("twoout", &["ssd.xml", "ssd.bin"]);
    let model = ModelFiles::discover(&dir).unwrap();

    let backend = FixedLatencyBackend::new(StubModel {
      output_names: vec!["boxes".to_string(), "scores".to_string()],
      ..StubModel::default()
    });
    let result = Engine::load(&backend, &model, Device::Cpu);
    assert!(matches!(
      result,
      Err(ConfigurationError::OutputCountMismatch(2))
    ));
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn observer_hook_sees_every_call() {
    let dir = temp_model_dir("observer", &["ssd.xml", "ssd.bin"]);
    let model = ModelFiles::discover(&dir).unwrap();

    let backend = FixedLatencyBackend::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let engine = Engine::load(&backend, &model, Device::Cpu)
      .unwrap()
      .with_observer(Box::new(move |_elapsed| {
        seen.fetch_add(1, Ordering::Relaxed);
      }));

    let inputs = engine.named_input(Tensor::zeroed(vec![1, 3, 4, 4]));
    engine.infer(&inputs).unwrap();
    engine.infer(&inputs).unwrap();
    assert_eq!(calls.load(Ordering::Relaxed), 2);
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn single_output_extracts_by_cached_name() {
    let dir = temp_model_dir("single", &["ssd.xml", "ssd.bin"]);
    let model = ModelFiles::discover(&dir).unwrap();

    let backend = FixedLatencyBackend::default();
    let engine = Engine::load(&backend, &model, Device::Cpu).unwrap();
    let inputs = engine.named_input(Tensor::zeroed(vec![1, 3, 4, 4]));
    let outputs = engine.infer(&inputs).unwrap();
    let output = engine.single_output(outputs).unwrap();
    assert_eq!(output.shape()[3], 7);
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
