// 该文件是 Lubiao （路标） 项目的一部分。
// src/bin/vote_decide.rs - 逐帧投票决策程序
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use lubiao::task::run_vote;
use lubiao::vote::{DEFAULT_SUPPORT, DEFAULT_WINDOW};

/// Lubiao 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 逐帧分类结果的类别名称 (bicycle, child, const, bump, cross; 空串表示无检测)
  #[arg(long, value_name = "LABEL", num_args = 1.., required = true)]
  pub labels: Vec<String>,

  /// 投票窗口大小（帧数）
  #[arg(long, default_value_t = DEFAULT_WINDOW, value_name = "COUNT")]
  pub window: usize,

  /// 支持阈值（获胜所需的最少票数）
  #[arg(long, default_value_t = DEFAULT_SUPPORT, value_name = "COUNT")]
  pub support: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("投票窗口: {} 帧, 支持阈值: {}", args.window, args.support);
  info!("帧类别: {:?}", args.labels);

  let decision = run_vote(args.labels.iter(), args.window, args.support)?;
  println!("{}", decision);

  Ok(())
}
