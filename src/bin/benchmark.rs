// 该文件是 Lubiao （路标） 项目的一部分。
// src/bin/benchmark.rs - 推理速度基准测试程序
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
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use lubiao::engine::Device;
use lubiao::engine::stub::{FixedLatencyBackend, StubModel};
use lubiao::task::{BenchmarkConfig, run_benchmark};

/// Lubiao 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 编译模型目录 (需包含拓扑描述 .xml 与权重 .bin 文件)
  #[arg(long, value_name = "DIR")]
  pub model_dir: PathBuf,

  /// 推理设备: CPU, GPU 或 MYRIAD
  #[arg(long, default_value = "CPU", value_name = "DEVICE")]
  pub device: Device,

  /// 用于推理的样例图像路径
  #[arg(long, value_name = "FILE")]
  pub img: PathBuf,

  /// 演示后端每次推理的固定延迟（毫秒）
  #[arg(long, default_value = "10", value_name = "MS")]
  pub stub_latency_ms: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型目录: {}", args.model_dir.display());
  info!("推理设备: {}", args.device);
  info!("样例图像: {}", args.img.display());

  let cancel = Arc::new(AtomicBool::new(false));
  {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
      warn!("收到中断信号, 准备退出...");
      cancel.store(true, Ordering::Relaxed);
    })?;
  }

  // 真实后端按 engine::Backend 注入; 此处以内置演示后端驱动整条流水线
  let backend = FixedLatencyBackend::new(StubModel {
    latency: Duration::from_millis(args.stub_latency_ms),
    ..StubModel::default()
  });
  let config = BenchmarkConfig {
    model_dir: args.model_dir,
    device: args.device,
    image: args.img,
  };

  let report = run_benchmark(&backend, &config, Some(cancel))?;

  for detection in &report.detections {
    println!(
      "Predict class label:{}, with probability: {}",
      detection.class_id, detection.confidence
    );
  }
  println!(
    "average(sec):{:.3},fps:{:.2}",
    report.result.mean_latency, report.result.fps
  );

  Ok(())
}
