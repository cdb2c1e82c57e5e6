use std::path::PathBuf;

use thiserror::Error;

/// 渲染面（截图 / 标签 / 翻页）错误，均可恢复
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Command not configured: {0}")]
    NotConfigured(&'static str),
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
}

/// 文字提取错误，本轮跳过即可
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to spawn recognizer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Recognizer exited with {status}: {stderr}")]
    RecognizerFailed {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Variant encode error: {0}")]
    Encode(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Recognizer error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot create save directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot encode artifact for identifier {id}: {source}")]
    Encode {
        id: i64,
        #[source]
        source: image::ImageError,
    },
    #[error("Cannot scan save directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl CaptureError {
    /// Persistence failures end the run; everything else skips one cycle.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CaptureError::Persistence(_))
    }
}
