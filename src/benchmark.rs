// 该文件是 Lubiao （路标） 项目的一部分。
// src/benchmark.rs - 推理基准测试
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
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::ConfigurationError;
use crate::tensor::Tensor;

pub const DEFAULT_WARMUP: usize = 1;
pub const DEFAULT_ITERATIONS: usize = 20;

#[derive(Error, Debug)]
pub enum MeasurementError {
  #[error("没有可用的计时样本")]
  NoSamples,
  #[error("平均推理时间为零, 无法计算 FPS")]
  ZeroMeanLatency,
  #[error("基准测试被中断")]
  Cancelled,
  #[error("配置错误: {0}")]
  Configuration(ConfigurationError),
}

impl From<ConfigurationError> for MeasurementError {
  fn from(err: ConfigurationError) -> Self {
    MeasurementError::Configuration(err)
  }
}

/// 基准测试的聚合结果
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkResult {
  /// 单次推理的平均墙钟耗时（秒）
  pub mean_latency: f64,
  /// 吞吐量, `1 / mean_latency`
  pub fps: f64,
}

impl BenchmarkResult {
  /// 由有序耗时样本序列归约出平均延迟与 FPS
  ///
  /// 空样本集或平均值为零时返回错误，绝不产生无穷大的 FPS。
  pub fn from_samples(samples: &[Duration]) -> Result<Self, MeasurementError> {
    if samples.is_empty() {
      return Err(MeasurementError::NoSamples);
    }

    let total: Duration = samples.iter().sum();
    let mean_latency = total.as_secs_f64() / samples.len() as f64;
    if mean_latency <= 0.0 {
      return Err(MeasurementError::ZeroMeanLatency);
    }

    Ok(Self {
      mean_latency,
      fps: 1.0 / mean_latency,
    })
  }
}

/// 驱动重复推理调用并测量延迟与吞吐量
pub struct BenchmarkRunner {
  warmup: usize,
  iterations: usize,
  cancel: Option<Arc<AtomicBool>>,
}

impl Default for BenchmarkRunner {
  fn default() -> Self {
    Self::new()
  }
}

impl BenchmarkRunner {
  pub fn new() -> Self {
    Self {
      warmup: DEFAULT_WARMUP,
      iterations: DEFAULT_ITERATIONS,
      cancel: None,
    }
  }

  /// 预热次数，至少一次，预热结果会做健全性检查
  pub fn with_warmup(mut self, warmup: usize) -> Self {
    self.warmup = warmup.max(1);
    self
  }

  pub fn with_iterations(mut self, iterations: usize) -> Self {
    self.iterations = iterations;
    self
  }

  /// 注入取消标志，计时循环在每轮迭代之间检查该标志
  pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
    self.cancel = Some(cancel);
    self
  }

  /// 运行基准测试
  ///
  /// 先做预热推理并检查输出中存在预期的输出键且形状为四维，
  /// 再进入计时循环逐次记录墙钟耗时，最后归约为 [`BenchmarkResult`]。
  /// 出错或被取消时不返回任何部分结果。
  pub fn run<F>(&self, mut infer: F, expected_output: &str) -> Result<BenchmarkResult, MeasurementError>
  where
    F: FnMut() -> Result<HashMap<String, Tensor<f32>>, ConfigurationError>,
  {
    info!("预热 {} 次, 正式计时 {} 次", self.warmup, self.iterations);

    for i in 0..self.warmup.max(1) {
      let outputs = infer()?;
      let output = outputs.get(expected_output).ok_or_else(|| {
        MeasurementError::Configuration(ConfigurationError::MissingOutput(
          expected_output.to_string(),
        ))
      })?;
      if output.ndim() != 4 {
        return Err(MeasurementError::Configuration(
          ConfigurationError::BadOutputShape(output.shape().into()),
        ));
      }
      debug!("({}) 预热输出形状: {:?}", i, output.shape());
    }

    let mut samples = Vec::with_capacity(self.iterations);
    for i in 0..self.iterations {
      if let Some(cancel) = &self.cancel {
        if cancel.load(Ordering::Relaxed) {
          warn!("收到中断信号, 停止基准测试");
          return Err(MeasurementError::Cancelled);
        }
      }

      let now = Instant::now();
      let _ = infer()?;
      let elapsed = now.elapsed();
      debug!("({}) 推理耗时: {:.2?}", i, elapsed);
      samples.push(elapsed);
    }

    let result = BenchmarkResult::from_samples(&samples)?;
    info!(
      "平均推理时间: {:.3}s, FPS: {:.2}",
      result.mean_latency, result.fps
    );
    Ok(result)
  }
}
