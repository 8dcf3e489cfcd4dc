// 该文件是 Lubiao （路标） 项目的一部分。
// src/task.rs - 流水线任务
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

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::{debug, info};

use crate::benchmark::{BenchmarkResult, BenchmarkRunner};
use crate::detect::{BENCHMARK_CONFIDENCE_THRESHOLD, Detection, filter_detections};
use crate::engine::{Backend, Device, Engine, ModelFiles};
use crate::preprocess::preprocess_file;
use crate::vote::{ClassificationError, VoteWindow, map_label};

/// 编译模型的输入为固定尺寸, 样例图像宽高取同一值
pub const BENCH_INPUT_SIZE: u32 = 720;

/// 基准测试流水线的配置，由外部协作者（CLI）填充
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
  /// 包含拓扑描述文件与权重文件的模型目录
  pub model_dir: PathBuf,
  /// 推理设备
  pub device: Device,
  /// 用于推理的样例图像路径
  pub image: PathBuf,
}

/// 基准测试任务的完整产出
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
  /// 首次推理中超过置信度阈值的检测
  pub detections: Vec<Detection>,
  /// 计时循环的聚合结果
  pub result: BenchmarkResult,
}

/// 运行完整的基准测试流水线
///
/// 解析模型目录、经后端加载模型、预处理样例图像，先做一次
/// 推理并筛出超过阈值的检测，再进入计时循环归约出平均延迟
/// 与 FPS。任何一步失败都立即返回，不产生部分结果。
pub fn run_benchmark<B: Backend>(
  backend: &B,
  config: &BenchmarkConfig,
  cancel: Option<Arc<AtomicBool>>,
) -> anyhow::Result<BenchmarkReport> {
  info!("开始基准测试任务...");

  let model = ModelFiles::discover(&config.model_dir)?;
  let engine = Engine::load(backend, &model, config.device)?;
  info!(
    "设备 {} 首选精度: {}",
    config.device,
    config.device.preferred_precision()
  );

  let (tensor, _original) = preprocess_file(&config.image, BENCH_INPUT_SIZE, BENCH_INPUT_SIZE)?;
  info!("输入帧预处理完成, 形状: {:?}", tensor.shape());

  let inputs = engine.named_input(tensor);
  let outputs = engine.infer(&inputs)?;
  let output = engine.single_output(outputs)?;
  debug!("检测输出形状: {:?}", output.shape());

  let detections = filter_detections(&output, BENCHMARK_CONFIDENCE_THRESHOLD)?;
  for detection in &detections {
    info!(
      "Predict class label:{}, with probability: {}",
      detection.class_id, detection.confidence
    );
  }

  let mut runner = BenchmarkRunner::new();
  if let Some(cancel) = cancel {
    runner = runner.with_cancel_flag(cancel);
  }
  let result = runner.run(|| engine.infer(&inputs), engine.output_name())?;

  Ok(BenchmarkReport { detections, result })
}

/// 运行投票决策流水线
///
/// 从迭代器消耗恰好一个窗口的逐帧类别名称，经固定映射表
/// 转为标签填入新建的投票窗口，窗口填满后一次性归约为决策。
/// 帧数不足或出现未收录的名称都立即失败。
pub fn run_vote<I>(
  frames: I,
  window: usize,
  support_threshold: usize,
) -> Result<u8, ClassificationError>
where
  I: IntoIterator,
  I::Item: AsRef<str>,
{
  info!("开始投票决策任务...");

  let mut votes = VoteWindow::new(window);
  let mut frames = frames.into_iter();
  while !votes.is_full() {
    let Some(name) = frames.next() else {
      break;
    };
    let label = map_label(name.as_ref())?;
    debug!("帧类别 {:?} 映射为标签 {}", name.as_ref(), label);
    votes.push(label)?;
  }

  let decision = votes.decide(support_threshold)?;
  info!("投票结果: {}", decision);
  Ok(decision)
}
