//! OCR 前处理 - 生成二值化 / 反色等变体，提高叠加层小字的识别率

use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};

/// 自适应阈值的邻域大小（奇数）
pub const DEFAULT_BLOCK_SIZE: u32 = 11;
/// 从邻域加权均值中减去的常量
pub const DEFAULT_OFFSET: i16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Grayscale,
    Binarized,
    Inverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStrategy {
    /// 二值化 + 反色
    #[default]
    Standard,
    /// 额外附带原始灰度图
    Extended,
}

impl VariantStrategy {
    pub fn kinds(&self) -> &'static [VariantKind] {
        match self {
            VariantStrategy::Standard => &[VariantKind::Binarized, VariantKind::Inverted],
            VariantStrategy::Extended => &[
                VariantKind::Binarized,
                VariantKind::Inverted,
                VariantKind::Grayscale,
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub kind: VariantKind,
    pub image: GrayImage,
}

pub fn prepare_variants(gray: &GrayImage, strategy: VariantStrategy) -> Vec<ImageVariant> {
    let binarized = adaptive_threshold(gray, DEFAULT_BLOCK_SIZE, DEFAULT_OFFSET);

    strategy
        .kinds()
        .iter()
        .map(|&kind| {
            let image = match kind {
                VariantKind::Grayscale => gray.clone(),
                VariantKind::Binarized => binarized.clone(),
                VariantKind::Inverted => {
                    let mut inverted = binarized.clone();
                    imageops::invert(&mut inverted);
                    inverted
                }
            };
            ImageVariant { kind, image }
        })
        .collect()
}

/// 高斯加权的局部自适应阈值：像素亮于（邻域均值 - offset）即为白
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let local_mean = imageops::blur(gray, gaussian_sigma(block_size));

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let src = gray.get_pixel(x, y)[0] as i16;
        let threshold = local_mean.get_pixel(x, y)[0] as i16 - offset;
        pixel[0] = if src > threshold { 255 } else { 0 };
    }
    out
}

/// Sigma matching a Gaussian kernel of the given odd size.
fn gaussian_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size.max(3) as f32 - 1.0) * 0.5 - 1.0) + 0.8
}
