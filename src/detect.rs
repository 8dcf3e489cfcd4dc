// 该文件是 Lubiao （路标） 项目的一部分。
// src/detect.rs - 检测输出后处理
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

use tracing::debug;

use crate::engine::ConfigurationError;
use crate::tensor::Tensor;

/// 检测输出每行的字段数:
/// [image_id, class_id, confidence, x_min, y_min, x_max, y_max]
pub const DETECTION_FIELDS: usize = 7;

/// 基准测试流水线的默认置信度阈值
pub const BENCHMARK_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// 投票决策流水线的默认置信度阈值
pub const VOTE_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// 一个候选目标实例
#[derive(Debug, Clone)]
pub struct Detection {
  /// 类别索引
  pub class_id: u32,
  /// 置信度
  pub confidence: f32,
  /// 边界框 [x_min, y_min, x_max, y_max]
  pub bbox: [f32; 4],
}

/// 从检测输出张量中筛出超过置信度阈值的检测
///
/// 输出张量形状必须为 `[1, 1, K, 7]`。保留 `confidence > threshold`
/// 的行（严格大于），并保持后端的原始行序；没有任何行超过阈值时
/// 返回空序列，不是错误。
pub fn filter_detections(
  output: &Tensor<f32>,
  threshold: f32,
) -> Result<Vec<Detection>, ConfigurationError> {
  let shape = output.shape();
  if shape.len() != 4 || shape[0] != 1 || shape[1] != 1 || shape[3] != DETECTION_FIELDS {
    return Err(ConfigurationError::BadOutputShape(shape.into()));
  }

  let rows = shape[2];
  let data = output.data();
  let mut detections = Vec::new();

  for row in 0..rows {
    let base = row * DETECTION_FIELDS;
    let confidence = data[base + 2];
    if confidence > threshold {
      detections.push(Detection {
        class_id: data[base + 1] as u32,
        confidence,
        bbox: [
          data[base + 3],
          data[base + 4],
          data[base + 5],
          data[base + 6],
        ],
      });
    }
  }

  debug!(
    "检测到 {} 个超过阈值 {} 的目标 (共 {} 行)",
    detections.len(),
    threshold,
    rows
  );
  Ok(detections)
}
