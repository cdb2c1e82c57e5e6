use std::process::Command;

use image::DynamicImage;
use log::debug;
use serde::{Deserialize, Serialize};

use super::error::SurfaceError;

/// 被采样的渲染面（浏览器视口、屏幕等）
pub trait RenderSurface {
    /// 当前画面
    fn capture(&mut self) -> Result<DynamicImage, SurfaceError>;

    /// 当前显示的编号标签文字；`Ok(None)` 表示该渲染面没有独立的标签通道
    fn label_text(&mut self) -> Result<Option<String>, SurfaceError> {
        Ok(None)
    }

    /// 切换到下一个单元
    fn advance(&mut self) -> Result<(), SurfaceError>;
}

/// Render-surface connection parameters. Each command is an argv list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Prints a PNG/JPEG screenshot on stdout, e.g. `["grim", "-"]`.
    pub capture_command: Vec<String>,
    /// Sends the "next" gesture, e.g. `["xdotool", "key", "shift+Right"]`.
    pub advance_command: Vec<String>,
    /// Prints the labeling text (e.g. "Booklet 933") on stdout.
    pub label_command: Option<Vec<String>>,
}

/// 通过外部命令驱动的渲染面
pub struct CommandSurface {
    config: SurfaceConfig,
}

impl CommandSurface {
    pub fn new(config: SurfaceConfig) -> Self {
        Self { config }
    }

    fn run(argv: &[String], what: &'static str) -> Result<Vec<u8>, SurfaceError> {
        let (program, args) = argv
            .split_first()
            .ok_or(SurfaceError::NotConfigured(what))?;

        debug!("Running {} command: {:?}", what, argv);
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| SurfaceError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SurfaceError::CommandFailed {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl RenderSurface for CommandSurface {
    fn capture(&mut self) -> Result<DynamicImage, SurfaceError> {
        let bytes = Self::run(&self.config.capture_command, "capture")?;
        Ok(image::load_from_memory(&bytes)?)
    }

    fn label_text(&mut self) -> Result<Option<String>, SurfaceError> {
        match &self.config.label_command {
            Some(argv) => {
                let bytes = Self::run(argv, "label")?;
                Ok(Some(String::from_utf8_lossy(&bytes).trim().to_string()))
            }
            None => Ok(None),
        }
    }

    fn advance(&mut self) -> Result<(), SurfaceError> {
        Self::run(&self.config.advance_command, "advance").map(|_| ())
    }
}
