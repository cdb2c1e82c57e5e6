//! 运行配置 - 构造时传入控制器，运行期间不可变

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::capture::extractor::RecognitionMode;
use crate::core::capture::preprocess::VariantStrategy;
use crate::core::capture::resolver::DEFAULT_LABEL;
use crate::core::capture::surface::SurfaceConfig;
use crate::core::integrity::IdentifierRange;

/// 单次运行可核对的最大编号数
pub const MAX_RANGE_LEN: usize = 1_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub binary: String,
    pub language: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub save_dir: PathBuf,
    pub range: IdentifierRange,
    /// Any of these literals marks the page to keep.
    pub target_phrases: Vec<String>,
    /// Positional markers ("10 of 20"), accepted on par with phrases.
    pub position_markers: Vec<String>,
    pub identifier_label: String,
    /// Forced advance once this many seconds pass without an advance.
    pub max_wait_secs: u64,
    pub poll_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub recognition_mode: RecognitionMode,
    pub variant_strategy: VariantStrategy,
    /// Recognize variants concurrently. Off: one recognizer process at a time.
    pub parallel_variants: bool,
    pub surface: SurfaceConfig,
    pub tesseract: TesseractConfig,
    pub log_file: PathBuf,
    /// Block on operator confirmation before the loop starts.
    pub manual_start: bool,
    pub report_json: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("data/scanned_booklets"),
            range: IdentifierRange::default(),
            target_phrases: vec!["Page 10".to_string()],
            position_markers: vec!["10 of 20".to_string()],
            identifier_label: DEFAULT_LABEL.to_string(),
            max_wait_secs: 60,
            poll_interval_ms: 2000,
            settle_delay_ms: 2500,
            recognition_mode: RecognitionMode::default(),
            variant_strategy: VariantStrategy::default(),
            parallel_variants: false,
            surface: SurfaceConfig::default(),
            tesseract: TesseractConfig::default(),
            log_file: PathBuf::from("automation.log"),
            manual_start: true,
            report_json: None,
        }
    }
}

impl CaptureConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.range.start > self.range.end {
            return Err(ConfigError::Invalid(format!(
                "range start {} is after end {}",
                self.range.start, self.range.end
            )));
        }
        if self.range.len() > MAX_RANGE_LEN {
            return Err(ConfigError::Invalid(format!(
                "range {} spans more than {} identifiers",
                self.range, MAX_RANGE_LEN
            )));
        }
        if self.max_wait_secs == 0 {
            return Err(ConfigError::Invalid(
                "max_wait_secs must be positive".to_string(),
            ));
        }
        let has_signal = self
            .target_phrases
            .iter()
            .chain(self.position_markers.iter())
            .any(|s| !s.trim().is_empty());
        if !has_signal {
            return Err(ConfigError::Invalid(
                "at least one target phrase or position marker is required".to_string(),
            ));
        }
        if self.identifier_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "identifier_label must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Only needed when the command-driven surface is used.
    pub fn validate_surface(&self) -> Result<(), ConfigError> {
        if self.surface.capture_command.is_empty() {
            return Err(ConfigError::Invalid(
                "surface.capture_command is required".to_string(),
            ));
        }
        if self.surface.advance_command.is_empty() {
            return Err(ConfigError::Invalid(
                "surface.advance_command is required".to_string(),
            ));
        }
        Ok(())
    }
}
