// 该文件是 Lubiao （路标） 项目的一部分。
// src/tensor.rs - 张量缓冲区定义
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

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum TensorError {
  #[error("张量形状与数据长度不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际 {actual}")]
  ShapeMismatch {
    shape: Box<[usize]>,
    expected: usize,
    actual: usize,
  },
}

/// 定形数值缓冲区，作为推理后端的输入与输出。
///
/// 输入张量为 `[1, 3, H, W]` 的 `Tensor<u8>`；
/// 输出张量形状由后端决定，例如检测输出为 `[1, 1, K, 7]` 的 `Tensor<f32>`。
#[derive(Debug, Clone)]
pub struct Tensor<T> {
  shape: Box<[usize]>,
  data: Box<[T]>,
}

impl<T> Tensor<T> {
  /// 创建一个新的张量，数据长度必须与形状的元素积一致
  pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self, TensorError> {
    let expected: usize = shape.iter().product();
    if data.len() != expected {
      return Err(TensorError::ShapeMismatch {
        shape: shape.into_boxed_slice(),
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      shape: shape.into_boxed_slice(),
      data: data.into_boxed_slice(),
    })
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[T] {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn ndim(&self) -> usize {
    self.shape.len()
  }
}

impl<T: Copy + Default> Tensor<T> {
  /// 创建一个按形状填充默认值的张量
  pub fn zeroed(shape: Vec<usize>) -> Self {
    let size: usize = shape.iter().product();
    Self {
      shape: shape.into_boxed_slice(),
      data: vec![T::default(); size].into_boxed_slice(),
    }
  }
}
