use std::time::Instant;

use image::{DynamicImage, GrayImage};

/// 单次采样得到的画面
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub image: DynamicImage,
    pub captured_at: Instant,
    pub frame_number: u64,
}

impl CaptureFrame {
    pub fn new(image: DynamicImage, captured_at: Instant, frame_number: u64) -> Self {
        Self {
            image,
            captured_at,
            frame_number,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_gray(&self) -> GrayImage {
        self.image.to_luma8()
    }
}

/// 帧元数据（轻量级，用于日志）
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
}

impl FrameInfo {
    pub fn from_frame(frame: &CaptureFrame) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            frame_number: frame.frame_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_frame_creation() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(100, 80));
        let frame = CaptureFrame::new(image, Instant::now(), 30);

        assert_eq!(frame.width(), 100);
        assert_eq!(frame.height(), 80);
        assert_eq!(frame.frame_number, 30);

        let info = FrameInfo::from_frame(&frame);
        assert_eq!(info.width, 100);
        assert_eq!(info.frame_number, 30);
    }
}
