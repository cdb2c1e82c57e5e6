use std::io::{Cursor, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::{GrayImage, ImageOutputFormat};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::ExtractError;
use super::frame::CaptureFrame;
use super::preprocess::{prepare_variants, ImageVariant, VariantStrategy};

/// Tesseract 页面分割模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMode {
    Auto,
    SingleBlock,
    /// 稀疏文字，适合页面叠加层上的零散标签
    #[default]
    SparseText,
    SparseTextOsd,
}

impl RecognitionMode {
    pub fn psm(&self) -> u8 {
        match self {
            RecognitionMode::Auto => 3,
            RecognitionMode::SingleBlock => 6,
            RecognitionMode::SparseText => 11,
            RecognitionMode::SparseTextOsd => 12,
        }
    }
}

pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage, mode: RecognitionMode) -> Result<String, ExtractError>;
}

/// 调用本地 `tesseract` 可执行文件，PNG 通过 stdin 传入
pub struct TesseractRecognizer {
    binary: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }

    fn encode_png(image: &GrayImage) -> Result<Vec<u8>, ExtractError> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageOutputFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &GrayImage, mode: RecognitionMode) -> Result<String, ExtractError> {
        let png = Self::encode_png(image)?;

        let mut child = Command::new(&self.binary)
            .arg("stdin")
            .arg("stdout")
            .arg("--psm")
            .arg(mode.psm().to_string())
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExtractError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&png) {
                // 识别进程提前退出导致管道断开，仍需回收子进程
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ExtractError::RecognizerFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).replace('\u{0000}', ""))
    }
}

/// 测试用识别器：按调用序号返回预设文字
pub struct MockRecognizer {
    responder: Box<dyn Fn(usize) -> Result<String, ExtractError> + Send + Sync>,
    calls: AtomicUsize,
    modes: Mutex<Vec<RecognitionMode>>,
}

impl MockRecognizer {
    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(usize) -> Result<String, ExtractError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(pattern),
            calls: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fixed_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::with_pattern(move |_| Ok(text.clone()))
    }

    pub fn failing() -> Self {
        Self::with_pattern(|_| Err(ExtractError::Other("mock failure".to_string())))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn modes_seen(&self) -> Vec<RecognitionMode> {
        self.modes.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize(&self, _image: &GrayImage, mode: RecognitionMode) -> Result<String, ExtractError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut modes) = self.modes.lock() {
            modes.push(mode);
        }
        (self.responder)(call)
    }
}

/// 提取适配器：生成变体 -> 逐个识别 -> 拼接
pub struct ExtractorAdapter {
    recognizer: Box<dyn TextRecognizer>,
    mode: RecognitionMode,
    strategy: VariantStrategy,
    parallel: bool,
}

impl ExtractorAdapter {
    pub fn new(recognizer: Box<dyn TextRecognizer>, mode: RecognitionMode) -> Self {
        Self::with_strategy(recognizer, mode, VariantStrategy::default())
    }

    pub fn with_strategy(
        recognizer: Box<dyn TextRecognizer>,
        mode: RecognitionMode,
        strategy: VariantStrategy,
    ) -> Self {
        Self {
            recognizer,
            mode,
            strategy,
            parallel: false,
        }
    }

    /// 变体并行识别（rayon），默认关闭：同一时刻只有一个识别进程
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn mode(&self) -> RecognitionMode {
        self.mode
    }

    pub fn extract(&self, frame: &CaptureFrame) -> Result<String, ExtractError> {
        let gray = frame.to_gray();
        let variants = prepare_variants(&gray, self.strategy);
        self.extract_variants(&variants)
    }

    pub fn extract_variants(&self, variants: &[ImageVariant]) -> Result<String, ExtractError> {
        let recognize = |variant: &ImageVariant| {
            self.recognizer
                .recognize(&variant.image, self.mode)
                .map_err(|e| {
                    warn!("Recognizer failed on {:?} variant: {}", variant.kind, e);
                    e
                })
        };

        // par_iter 保序，两种方式的拼接顺序都与变体顺序一致
        let texts = if self.parallel {
            variants
                .par_iter()
                .map(recognize)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            variants
                .iter()
                .map(recognize)
                .collect::<Result<Vec<_>, _>>()?
        };

        let combined: String = texts.concat();
        debug!(
            "Extracted {} chars from {} variants",
            combined.len(),
            variants.len()
        );
        Ok(combined)
    }
}
