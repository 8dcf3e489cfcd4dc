// 该文件是 Lubiao （路标） 项目的一部分。
// src/vote.rs - 逐帧投票决策
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

use thiserror::Error;
use tracing::debug;

/// 类别名称到小整数标签的固定映射表
///
/// `child` 与 `bump` 有意共享标签 2，这是需要保留的业务规则；
/// 空名称表示该帧没有检测结果。
pub const LABEL_TABLE: [(&str, u8); 6] = [
  ("bicycle", 1),
  ("child", 2),
  ("const", 3),
  ("bump", 2),
  ("cross", 4),
  ("", 0),
];

/// 无检测结果的中性标签
pub const NO_DETECTION: u8 = 0;

/// 仲裁时测试候选标签的固定优先级顺序
///
/// 按此顺序返回第一个得票达到支持阈值的标签，不比较票数大小；
/// 这是可观察、可复现的既有行为，必须原样保留。
pub const LABEL_PRIORITY: [u8; 4] = [1, 2, 3, 4];

/// 默认投票窗口大小（帧数）
pub const DEFAULT_WINDOW: usize = 5;

/// 默认支持阈值（获胜所需的最少票数）
pub const DEFAULT_SUPPORT: usize = 3;

#[derive(Error, Debug)]
pub enum ClassificationError {
  #[error("未知的类别名称: {0:?}")]
  UnknownLabel(String),
  #[error("投票窗口已满 (容量 {0})")]
  WindowFull(usize),
  #[error("投票窗口未填满: 需要 {expected} 帧, 实际 {actual} 帧")]
  WindowUnderfilled { expected: usize, actual: usize },
}

/// 将分类器输出的类别名称映射为小整数标签
///
/// 未收录的名称返回错误，绝不静默回退为 0。
pub fn map_label(name: &str) -> Result<u8, ClassificationError> {
  LABEL_TABLE
    .iter()
    .find(|(label, _)| *label == name)
    .map(|(_, value)| *value)
    .ok_or_else(|| ClassificationError::UnknownLabel(name.to_string()))
}

/// 对一个标签序列做固定优先级仲裁
///
/// 统计每个非零标签的出现次数，按 [`LABEL_PRIORITY`] 顺序
/// 返回第一个得票 `>= support_threshold` 的标签；都不满足时
/// 返回 [`NO_DETECTION`]。
pub fn decide(labels: &[u8], support_threshold: usize) -> u8 {
  for candidate in LABEL_PRIORITY {
    let count = labels.iter().filter(|&&label| label == candidate).count();
    if count >= support_threshold {
      debug!(
        "标签 {} 得票 {} 次, 达到阈值 {}",
        candidate, count, support_threshold
      );
      return candidate;
    }
  }
  debug!("没有标签达到阈值 {}", support_threshold);
  NO_DETECTION
}

/// 固定容量的逐帧标签窗口
///
/// 每次决策新建一个窗口，填满到容量后一次性归约并丢弃，
/// 不做滚动淘汰。长度不变式：绝不超过容量。
#[derive(Debug)]
pub struct VoteWindow {
  capacity: usize,
  labels: Vec<u8>,
}

impl VoteWindow {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      labels: Vec::with_capacity(capacity),
    }
  }

  /// 追加一帧标签，窗口已满时返回错误
  pub fn push(&mut self, label: u8) -> Result<(), ClassificationError> {
    if self.labels.len() >= self.capacity {
      return Err(ClassificationError::WindowFull(self.capacity));
    }
    self.labels.push(label);
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn is_full(&self) -> bool {
    self.labels.len() == self.capacity
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// 消耗整个窗口并归约出一个决策
  ///
  /// 窗口必须恰好填满到容量，否则返回错误（每次运行要么给出
  /// 完整决策，要么不给出结果）。
  pub fn decide(self, support_threshold: usize) -> Result<u8, ClassificationError> {
    if self.labels.len() != self.capacity {
      return Err(ClassificationError::WindowUnderfilled {
        expected: self.capacity,
        actual: self.labels.len(),
      });
    }
    Ok(decide(&self.labels, support_threshold))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decide_returns_label_meeting_support() {
    assert_eq!(decide(&[1, 1, 1, 2, 2], 3), 1);
    assert_eq!(decide(&[2, 2, 2, 2, 1], 3), 2);
  }

  #[test]
  fn decide_returns_neutral_when_no_label_qualifies() {
    assert_eq!(decide(&[1, 1, 2, 2, 0], 3), 0);
    assert_eq!(decide(&[0, 0, 0, 0, 0], 3), 0);
  }

  #[test]
  fn decide_uses_fixed_priority_not_count_magnitude() {
    // 标签 2 得 4 票, 标签 1 得 3 票; 标签 1 优先被测试且已达标
    let labels = [1, 1, 1, 2, 2, 2, 2];
    assert_eq!(decide(&labels, 3), 1);
  }

  #[test]
  fn decide_is_invariant_under_permutation() {
    let labels = [1, 2, 1, 2, 1];
    let permuted = [2, 1, 1, 1, 2];
    assert_eq!(decide(&labels, 3), decide(&permuted, 3));
    assert_eq!(decide(&labels, 3), 1);
  }

  #[test]
  fn map_label_follows_fixed_table() {
    assert_eq!(map_label("bicycle").unwrap(), 1);
    assert_eq!(map_label("child").unwrap(), 2);
    assert_eq!(map_label("const").unwrap(), 3);
    // bump 与 child 共享标签 2
    assert_eq!(map_label("bump").unwrap(), 2);
    assert_eq!(map_label("cross").unwrap(), 4);
    assert_eq!(map_label("").unwrap(), NO_DETECTION);
  }

  #[test]
  fn map_label_rejects_unknown_name() {
    assert!(matches!(
      map_label("pedestrian"),
      Err(ClassificationError::UnknownLabel(_))
    ));
  }

  #[test]
  fn window_never_exceeds_capacity() {
    let mut window = VoteWindow::new(2);
    window.push(1).unwrap();
    window.push(2).unwrap();
    assert!(window.is_full());
    assert!(matches!(
      window.push(3),
      Err(ClassificationError::WindowFull(2))
    ));
    assert_eq!(window.len(), 2);
  }

  #[test]
  fn window_decide_requires_full_window() {
    let mut window = VoteWindow::new(5);
    window.push(1).unwrap();
    window.push(1).unwrap();
    assert!(matches!(
      window.decide(3),
      Err(ClassificationError::WindowUnderfilled {
        expected: 5,
        actual: 2,
      })
    ));
  }

  #[test]
  fn window_decide_reduces_full_window() {
    let mut window = VoteWindow::new(DEFAULT_WINDOW);
    for label in [2, 2, 0, 2, 4] {
      window.push(label).unwrap();
    }
    assert_eq!(window.decide(DEFAULT_SUPPORT).unwrap(), 2);
  }
}
