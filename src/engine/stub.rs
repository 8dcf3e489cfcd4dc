// 该文件是 Lubiao （路标） 项目的一部分。
// src/engine/stub.rs - 确定性演示后端
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
use std::time::Duration;

use tracing::{debug, info};

use crate::detect::DETECTION_FIELDS;
use crate::engine::{Backend, ConfigurationError, Device, Executable, ModelFiles};
use crate::tensor::Tensor;

/// 演示后端回放的模型描述
///
/// 输入输出名称与检测行均可配置，用于确定性单元测试，
/// 也用于在没有真实后端时驱动整条流水线。
#[derive(Debug, Clone)]
pub struct StubModel {
  pub input_names: Vec<String>,
  pub output_names: Vec<String>,
  /// 每行为 [image_id, class_id, confidence, x_min, y_min, x_max, y_max]
  pub rows: Vec<[f32; DETECTION_FIELDS]>,
  /// 每次推理调用的固定延迟
  pub latency: Duration,
}

impl Default for StubModel {
  fn default() -> Self {
    Self {
      input_names: vec!["data".to_string()],
      output_names: vec!["DetectionOutput".to_string()],
      rows: vec![
        [0.0, 1.0, 0.87, 0.12, 0.10, 0.45, 0.52],
        [0.0, 2.0, 0.31, 0.55, 0.40, 0.80, 0.90],
      ],
      latency: Duration::ZERO,
    }
  }
}

/// 回放固定检测行的可执行模型
#[derive(Debug, Clone)]
pub struct FixedLatencyExec {
  model: StubModel,
}

impl Executable for FixedLatencyExec {
  fn input_names(&self) -> Vec<String> {
    self.model.input_names.clone()
  }

  fn output_names(&self) -> Vec<String> {
    self.model.output_names.clone()
  }

  fn run(
    &self,
    inputs: &HashMap<String, Tensor<u8>>,
  ) -> Result<HashMap<String, Tensor<f32>>, ConfigurationError> {
    for name in &self.model.input_names {
      if !inputs.contains_key(name) {
        return Err(ConfigurationError::Backend(format!(
          "缺少输入张量: {:?}",
          name
        )));
      }
    }

    if !self.model.latency.is_zero() {
      std::thread::sleep(self.model.latency);
    }

    let rows = self.model.rows.len();
    let data: Vec<f32> = self.model.rows.iter().flatten().copied().collect();
    let tensor = Tensor::new(vec![1, 1, rows, DETECTION_FIELDS], data)
      .map_err(|e| ConfigurationError::Backend(e.to_string()))?;
    debug!("演示后端返回 {} 行检测输出", rows);

    let mut outputs = HashMap::new();
    for name in &self.model.output_names {
      outputs.insert(name.clone(), tensor.clone());
    }
    Ok(outputs)
  }
}

/// 固定延迟演示后端
#[derive(Debug, Clone, Default)]
pub struct FixedLatencyBackend {
  model: StubModel,
}

impl FixedLatencyBackend {
  pub fn new(model: StubModel) -> Self {
    Self { model }
  }
}

impl Backend for FixedLatencyBackend {
  type Exec = FixedLatencyExec;

  fn load(&self, model: &ModelFiles, device: Device) -> Result<Self::Exec, ConfigurationError> {
    info!(
      "演示后端加载模型: {} / {} ({})",
      model.topology.display(),
      model.weights.display(),
      device
    );
    Ok(FixedLatencyExec {
      model: self.model.clone(),
    })
  }
}
