//! 采集会话：手动开始 -> 采集循环 -> 完整性报告（任何退出路径都会执行）

use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use thiserror::Error;

use crate::core::capture::{
    ArtifactStore, CaptureController, CaptureError, CaptureStats, CommandSurface, DirectoryStore,
    ExtractorAdapter, RenderSurface, RunOutcome, ShutdownSignal, StoreError, TesseractRecognizer,
};
use crate::core::config::{CaptureConfig, ConfigError};
use crate::core::integrity::{generate_report, IdentifierRange, IntegrityReport};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Storage setup error: {0}")]
    Store(#[from] StoreError),
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Start gate error: {0}")]
    Gate(#[source] io::Error),
}

/// 中断检查粒度
const GATE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    Start,
    /// 等待期间收到中断，直接进入报告阶段
    Interrupted,
}

/// 阻塞直到操作员确认开始
pub trait StartGate {
    fn wait_for_start(&mut self) -> io::Result<GateSignal>;
}

/// 等待标准输入回车；读取放在辅助线程里，等待期间仍能响应中断
pub struct StdinGate {
    shutdown: ShutdownSignal,
}

impl StdinGate {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self { shutdown }
    }
}

impl StartGate for StdinGate {
    fn wait_for_start(&mut self) -> io::Result<GateSignal> {
        let mut stdout = io::stdout();
        write!(stdout, "Navigate to the portal and press Enter to start...")?;
        stdout.flush()?;

        wait_for_line(
            || {
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line)
            },
            &self.shutdown,
        )
    }
}

/// Runs `read_line` on a helper thread and returns as soon as it finishes or
/// the shutdown signal is raised. The reader thread is left behind on interrupt.
fn wait_for_line<F>(read_line: F, shutdown: &ShutdownSignal) -> io::Result<GateSignal>
where
    F: FnOnce() -> io::Result<usize> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("start-gate".to_string())
        .spawn(move || {
            let _ = tx.send(read_line());
        })?;

    loop {
        if shutdown.is_raised() {
            info!("Interrupted while waiting for manual start");
            return Ok(GateSignal::Interrupted);
        }
        match rx.recv_timeout(GATE_POLL) {
            Ok(Ok(0)) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stdin closed before start",
                ))
            }
            Ok(Ok(_)) => return Ok(GateSignal::Start),
            Ok(Err(e)) => return Err(e),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "start gate reader stopped",
                ))
            }
        }
    }
}

/// `--no-wait`
pub struct ImmediateStart;

impl StartGate for ImmediateStart {
    fn wait_for_start(&mut self) -> io::Result<GateSignal> {
        Ok(GateSignal::Start)
    }
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub result: Result<RunOutcome, SessionError>,
    pub report: IntegrityReport,
    pub stats: CaptureStats,
}

/// 用外部命令渲染面 + tesseract + 目录存储跑完整会话
pub fn run(
    config: &CaptureConfig,
    gate: &mut dyn StartGate,
    shutdown: ShutdownSignal,
) -> SessionOutcome {
    match build_controller(config, shutdown) {
        Ok(controller) => drive(controller, gate),
        Err(e) => {
            error!("❌ Setup failed: {}", e);
            SessionOutcome {
                result: Err(e),
                report: report_from_dir(config.range, &config.save_dir),
                stats: CaptureStats::default(),
            }
        }
    }
}

fn build_controller(
    config: &CaptureConfig,
    shutdown: ShutdownSignal,
) -> Result<CaptureController<CommandSurface, DirectoryStore>, SessionError> {
    config.validate_surface()?;
    let store = DirectoryStore::open(&config.save_dir)?;
    let recognizer = TesseractRecognizer::new(
        config.tesseract.binary.clone(),
        config.tesseract.language.clone(),
    );
    let extractor = ExtractorAdapter::with_strategy(
        Box::new(recognizer),
        config.recognition_mode,
        config.variant_strategy,
    )
    .with_parallel(config.parallel_variants);
    let surface = CommandSurface::new(config.surface.clone());

    Ok(CaptureController::new(config, surface, extractor, store)?.with_shutdown(shutdown))
}

/// Gate, loop, then the report phase, which runs whatever the loop returned.
pub fn drive<S: RenderSurface, A: ArtifactStore>(
    mut controller: CaptureController<S, A>,
    gate: &mut dyn StartGate,
) -> SessionOutcome {
    info!("EagleEye active. Ready for manual trigger...");

    let result = gate
        .wait_for_start()
        .map_err(SessionError::Gate)
        .and_then(|signal| match signal {
            GateSignal::Start => {
                controller.begin();
                controller.run().map_err(SessionError::from)
            }
            GateSignal::Interrupted => Ok(RunOutcome::Interrupted),
        });

    match &result {
        Ok(RunOutcome::Completed) => info!("Capture loop completed"),
        Ok(RunOutcome::Interrupted) => info!("Capture loop interrupted"),
        Err(e) => error!("❌ Capture loop aborted: {}", e),
    }

    info!("Running integrity verification...");
    let persisted = controller.store().saved_ids().unwrap_or_else(|e| {
        warn!("Cannot list saved artifacts: {}", e);
        BTreeSet::new()
    });
    let report = generate_report(controller.range(), &persisted);
    let stats = controller.stats().clone();
    info!("Run stats: {:?}", stats);

    SessionOutcome {
        result,
        report,
        stats,
    }
}

/// 启动失败时仍对磁盘上已有的产物出报告
pub fn report_from_dir(range: IdentifierRange, dir: &Path) -> IntegrityReport {
    let persisted = DirectoryStore::open(dir)
        .and_then(|store| store.saved_ids())
        .unwrap_or_else(|e| {
            warn!("Cannot list saved artifacts: {}", e);
            BTreeSet::new()
        });
    generate_report(range, &persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capture::{MockRecognizer, RecognitionMode, SurfaceError};
    use image::{DynamicImage, RgbaImage};
    use std::fs;

    struct LabelSurface {
        labels: Vec<Option<&'static str>>,
        index: usize,
    }

    impl RenderSurface for LabelSurface {
        fn capture(&mut self) -> Result<DynamicImage, SurfaceError> {
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(4, 4)))
        }

        fn label_text(&mut self) -> Result<Option<String>, SurfaceError> {
            Ok(self
                .labels
                .get(self.index)
                .copied()
                .flatten()
                .map(str::to_string))
        }

        fn advance(&mut self) -> Result<(), SurfaceError> {
            self.index += 1;
            Ok(())
        }
    }

    struct FailingGate;

    impl StartGate for FailingGate {
        fn wait_for_start(&mut self) -> io::Result<GateSignal> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "closed"))
        }
    }

    fn fast_config(dir: &Path, start: i64, end: i64) -> CaptureConfig {
        CaptureConfig {
            save_dir: dir.to_path_buf(),
            range: IdentifierRange::new(start, end),
            poll_interval_ms: 0,
            settle_delay_ms: 0,
            ..Default::default()
        }
    }

    fn controller_for(
        config: &CaptureConfig,
        labels: Vec<Option<&'static str>>,
    ) -> CaptureController<LabelSurface, DirectoryStore> {
        let store = DirectoryStore::open(&config.save_dir).unwrap();
        let extractor = ExtractorAdapter::new(
            Box::new(MockRecognizer::with_fixed_text("Page 10")),
            RecognitionMode::SparseText,
        );
        CaptureController::new(config, LabelSurface { labels, index: 0 }, extractor, store)
            .unwrap()
    }

    #[test]
    fn test_drive_completes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(dir.path(), 1, 2);
        let controller = controller_for(&config, vec![Some("Booklet 1"), Some("Booklet 2"), None]);

        let outcome = drive(controller, &mut ImmediateStart);
        assert!(matches!(outcome.result, Ok(RunOutcome::Completed)));
        assert!(outcome.report.is_complete());
        assert_eq!(outcome.stats.saved, 2);
        assert!(dir.path().join("1.png").is_file());
        assert!(dir.path().join("2.png").is_file());
    }

    #[test]
    fn test_gate_failure_still_reports_existing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("934.png"), b"old").unwrap();
        let config = fast_config(dir.path(), 933, 935);
        let controller = controller_for(&config, vec![Some("Booklet 933")]);

        let outcome = drive(controller, &mut FailingGate);
        assert!(matches!(outcome.result, Err(SessionError::Gate(_))));
        assert_eq!(outcome.report.missing, vec![933, 935]);
        assert_eq!(outcome.stats.cycles, 0);
    }

    #[test]
    fn test_setup_failure_reports_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2.png"), b"old").unwrap();
        // 未配置 capture/advance 命令
        let config = fast_config(dir.path(), 1, 3);

        let outcome = run(&config, &mut ImmediateStart, ShutdownSignal::new());
        assert!(matches!(outcome.result, Err(SessionError::Config(_))));
        assert_eq!(outcome.report.missing, vec![1, 3]);
    }

    /// 读取永远阻塞，直到测试结束释放 `_hold`
    fn blocked_reader() -> (mpsc::Sender<()>, impl FnOnce() -> io::Result<usize> + Send + 'static) {
        let (hold, release) = mpsc::channel::<()>();
        (hold, move || {
            let _ = release.recv();
            Ok(1)
        })
    }

    #[test]
    fn test_gate_returns_when_interrupted_while_blocked() {
        let shutdown = ShutdownSignal::new();
        let (_hold, read_line) = blocked_reader();

        let raiser = shutdown.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            raiser.raise();
        });

        let signal = wait_for_line(read_line, &shutdown).unwrap();
        handle.join().unwrap();
        assert_eq!(signal, GateSignal::Interrupted);
    }

    #[test]
    fn test_gate_line_and_eof() {
        let shutdown = ShutdownSignal::new();
        assert_eq!(
            wait_for_line(|| Ok(1), &shutdown).unwrap(),
            GateSignal::Start
        );
        let eof = wait_for_line(|| Ok(0), &shutdown).unwrap_err();
        assert_eq!(eof.kind(), io::ErrorKind::UnexpectedEof);
    }

    /// 在门口阻塞，直到中断信号出现
    struct BlockedGate {
        shutdown: ShutdownSignal,
        _hold: mpsc::Sender<()>,
        read_line: Option<Box<dyn FnOnce() -> io::Result<usize> + Send>>,
    }

    impl StartGate for BlockedGate {
        fn wait_for_start(&mut self) -> io::Result<GateSignal> {
            let read_line = self.read_line.take().unwrap();
            wait_for_line(read_line, &self.shutdown)
        }
    }

    #[test]
    fn test_interrupt_at_gate_skips_loop_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2.png"), b"old").unwrap();
        let config = fast_config(dir.path(), 1, 3);
        let shutdown = ShutdownSignal::new();
        let controller =
            controller_for(&config, vec![Some("Booklet 1")]).with_shutdown(shutdown.clone());

        let (hold, read_line) = blocked_reader();
        let mut gate = BlockedGate {
            shutdown: shutdown.clone(),
            _hold: hold,
            read_line: Some(Box::new(read_line)),
        };
        let raiser = shutdown.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            raiser.raise();
        });

        let outcome = drive(controller, &mut gate);
        handle.join().unwrap();
        assert!(matches!(outcome.result, Ok(RunOutcome::Interrupted)));
        assert_eq!(outcome.stats.cycles, 0);
        assert_eq!(outcome.report.missing, vec![1, 3]);
        assert!(!dir.path().join("1.png").exists());
    }

    #[test]
    fn test_interrupted_session_reports() {
        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(dir.path(), 1, 5);
        let shutdown = ShutdownSignal::new();
        shutdown.raise();
        let controller = controller_for(&config, vec![Some("Booklet 1")]).with_shutdown(shutdown);

        let outcome = drive(controller, &mut ImmediateStart);
        assert!(matches!(outcome.result, Ok(RunOutcome::Interrupted)));
        assert_eq!(outcome.report.missing, vec![1, 2, 3, 4, 5]);
    }
}
