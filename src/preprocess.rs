// 该文件是 Lubiao （路标） 项目的一部分。
// src/preprocess.rs - 图像预处理
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

use std::path::Path;

use image::{ImageReader, RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::tensor::{RGB_CHANNELS, Tensor, TensorError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("目标尺寸必须为正数: {0}x{1}")]
  InvalidTargetShape(u32, u32),
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(image::ImageError),
  #[error("张量构造错误: {0}")]
  TensorError(TensorError),
}

impl From<std::io::Error> for InputError {
  fn from(err: std::io::Error) -> Self {
    InputError::IoError(err)
  }
}

impl From<image::ImageError> for InputError {
  fn from(err: image::ImageError) -> Self {
    InputError::ImageLoadError(err)
  }
}

impl From<TensorError> for InputError {
  fn from(err: TensorError) -> Self {
    InputError::TensorError(err)
  }
}

/// 将 RGB 图像预处理为模型输入张量
///
/// 双线性插值缩放到目标尺寸，像素保持 8 位无符号整数，
/// 布局从 HWC 转置为 CHW，并补上批次维度，输出形状为
/// `[1, 3, target_height, target_width]`。
pub fn preprocess(
  image: &RgbImage,
  target_height: u32,
  target_width: u32,
) -> Result<Tensor<u8>, InputError> {
  if target_height == 0 || target_width == 0 {
    return Err(InputError::InvalidTargetShape(target_height, target_width));
  }

  debug!(
    "缩放图像: {}x{} -> {}x{}",
    image.width(),
    image.height(),
    target_width,
    target_height
  );
  let resized = imageops::resize(
    image,
    target_width,
    target_height,
    imageops::FilterType::Triangle,
  );

  let height = target_height as usize;
  let width = target_width as usize;
  let mut data = vec![0u8; RGB_CHANNELS * height * width];

  // HWC -> CHW
  for c in 0..RGB_CHANNELS {
    for h in 0..height {
      for w in 0..width {
        let pixel = resized.get_pixel(w as u32, h as u32);
        let index = c * height * width + h * width + w;
        data[index] = pixel[c];
      }
    }
  }

  Ok(Tensor::new(vec![1, RGB_CHANNELS, height, width], data)?)
}

/// 从文件加载图像并预处理
///
/// 返回输入张量与未缩放的原始图像，后者留给调用方做参考或可视化。
pub fn preprocess_file(
  path: &Path,
  target_height: u32,
  target_width: u32,
) -> Result<(Tensor<u8>, RgbImage), InputError> {
  let image: RgbImage = ImageReader::open(path)?.decode()?.into();
  let tensor = preprocess(&image, target_height, target_width)?;
  Ok((tensor, image))
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn solid_image(width: u32, height: u32, pixel: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(pixel))
  }

  #[test]
  fn preprocess_returns_nchw_shape() {
    let image = solid_image(64, 48, [10, 20, 30]);
    let tensor = preprocess(&image, 16, 24).unwrap();
    assert_eq!(tensor.shape(), &[1, 3, 16, 24]);
    assert_eq!(tensor.len(), 3 * 16 * 24);
  }

  #[test]
  fn preprocess_transposes_channels_to_planes() {
    let image = solid_image(8, 8, [200, 100, 50]);
    let tensor = preprocess(&image, 4, 4).unwrap();
    let plane = 4 * 4;
    let data = tensor.data();
    assert!(data[..plane].iter().all(|&v| v == 200));
    assert!(data[plane..2 * plane].iter().all(|&v| v == 100));
    assert!(data[2 * plane..].iter().all(|&v| v == 50));
  }

  #[test]
  fn preprocess_rejects_zero_target_shape() {
    let image = solid_image(8, 8, [0, 0, 0]);
    assert!(matches!(
      preprocess(&image, 0, 4),
      Err(InputError::InvalidTargetShape(0, 4))
    ));
    assert!(matches!(
      preprocess(&image, 4, 0),
      Err(InputError::InvalidTargetShape(4, 0))
    ));
  }

  #[test]
  fn preprocess_file_rejects_missing_path() {
    let result = preprocess_file(Path::new("/nonexistent/lubiao-test.jpg"), 4, 4);
    assert!(matches!(result, Err(InputError::IoError(_))));
  }

  #[test]
  fn preprocess_file_returns_original_image() {
    let dir = std::env::temp_dir().join("lubiao-preprocess-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("solid.png");
    solid_image(32, 16, [1, 2, 3]).save(&path).unwrap();

    let (tensor, original) = preprocess_file(&path, 8, 8).unwrap();
    assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
    assert_eq!((original.width(), original.height()), (32, 16));

    std::fs::remove_file(&path).unwrap();
  }
}
