use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info};

use eagle_eye::api::session::{self, ImmediateStart, StartGate, StdinGate};
use eagle_eye::core::capture::{RecognitionMode, ShutdownSignal};
use eagle_eye::core::config::CaptureConfig;
use eagle_eye::core::integrity::IntegrityReport;

#[derive(Parser, Debug)]
#[command(
    name = "eagle-eye",
    version,
    about = "Unattended booklet capture with OCR-based page detection and integrity report"
)]
struct Cli {
    /// JSON config file; every field is optional
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    save_dir: Option<PathBuf>,

    #[arg(long)]
    start: Option<i64>,

    #[arg(long)]
    end: Option<i64>,

    #[arg(long)]
    max_wait_secs: Option<u64>,

    #[arg(long, value_enum)]
    recognition_mode: Option<ModeArg>,

    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Skip the operator confirmation prompt
    #[arg(long, default_value_t = false)]
    no_wait: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ModeArg {
    Auto,
    SingleBlock,
    SparseText,
    SparseTextOsd,
}

impl From<ModeArg> for RecognitionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => RecognitionMode::Auto,
            ModeArg::SingleBlock => RecognitionMode::SingleBlock,
            ModeArg::SparseText => RecognitionMode::SparseText,
            ModeArg::SparseTextOsd => RecognitionMode::SparseTextOsd,
        }
    }
}

impl Cli {
    fn load_config(&self) -> Result<CaptureConfig> {
        let config = match &self.config {
            Some(path) => CaptureConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => CaptureConfig::default(),
        };
        Ok(self.apply_overrides(config))
    }

    fn apply_overrides(&self, mut config: CaptureConfig) -> CaptureConfig {
        if let Some(dir) = &self.save_dir {
            config.save_dir = dir.clone();
        }
        if let Some(start) = self.start {
            config.range.start = start;
        }
        if let Some(end) = self.end {
            config.range.end = end;
        }
        if let Some(secs) = self.max_wait_secs {
            config.max_wait_secs = secs;
        }
        if let Some(mode) = self.recognition_mode {
            config.recognition_mode = mode.into();
        }
        if let Some(path) = &self.log_file {
            config.log_file = path.clone();
        }
        if let Some(path) = &self.report_json {
            config.report_json = Some(path.clone());
        }
        if self.no_wait {
            config.manual_start = false;
        }
        config
    }
}

/// 配置文件无法使用时，以默认值加命令行参数作为报告依据
fn fallback_config(cli: &Cli) -> CaptureConfig {
    cli.apply_overrides(CaptureConfig::default())
}

/// 启动阶段失败：仍对磁盘上已有的产物出报告
fn setup_failure_report(config: &CaptureConfig) -> IntegrityReport {
    session::report_from_dir(config.range, &config.save_dir)
}

fn install(config: &CaptureConfig) -> Result<ShutdownSignal> {
    eagle_eye::init_logging(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;

    let shutdown = ShutdownSignal::new();
    let handler_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C, initiating shutdown...");
        handler_signal.raise();
    })
    .context("failed to install Ctrl+C handler")?;
    Ok(shutdown)
}

fn main() {
    if let Err(err) = run() {
        error!("{}", err);
        eprintln!("error: {}", err);
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            println!("{}", setup_failure_report(&fallback_config(&cli)));
            return Err(e);
        }
    };

    let shutdown = match install(&config) {
        Ok(shutdown) => shutdown,
        Err(e) => {
            println!("{}", setup_failure_report(&config));
            return Err(e);
        }
    };

    let mut gate: Box<dyn StartGate> = if config.manual_start {
        Box::new(StdinGate::new(shutdown.clone()))
    } else {
        Box::new(ImmediateStart)
    };

    let outcome = session::run(&config, gate.as_mut(), shutdown);

    println!("{}", outcome.report);

    if let Some(path) = &config.report_json {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "report": &outcome.report,
            "stats": &outcome.stats,
        }))?;
        fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    outcome.result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eagle_eye::core::integrity::IdentifierRange;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("eagle-eye").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "range": { "start": 10, "end": 20 }, "max_wait_secs": 5 }"#).unwrap();

        let cli = parse(&["--config", path.to_str().unwrap(), "--end", "30", "--no-wait"]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.range, IdentifierRange::new(10, 30));
        assert_eq!(config.max_wait_secs, 5);
        assert!(!config.manual_start);
    }

    #[test]
    fn test_unparsable_config_still_reports_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let save_dir = dir.path().join("out");
        fs::create_dir(&save_dir).unwrap();
        fs::write(save_dir.join("2.png"), b"old").unwrap();

        let cli = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--save-dir",
            save_dir.to_str().unwrap(),
            "--start",
            "1",
            "--end",
            "3",
        ]);
        assert!(cli.load_config().is_err());

        let report = setup_failure_report(&fallback_config(&cli));
        assert_eq!(report.range, IdentifierRange::new(1, 3));
        assert_eq!(report.missing, vec![1, 3]);
        assert!(report.found.contains(&2));
    }

    #[test]
    fn test_unopenable_log_file_still_reports_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("5.png"), b"old").unwrap();
        let config = CaptureConfig {
            save_dir: dir.path().to_path_buf(),
            range: IdentifierRange::new(5, 6),
            log_file: dir.path().join("missing-dir").join("automation.log"),
            ..Default::default()
        };

        assert!(install(&config).is_err());
        let report = setup_failure_report(&config);
        assert_eq!(report.missing, vec![6]);
    }
}
