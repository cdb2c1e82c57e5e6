//! 采集控制器 - 采样 / 判定 / 去重 / 保存 / 翻页，以及超时强制翻页

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::clock::{Clock, ShutdownSignal, SystemClock};
use super::deduplicator::DedupStore;
use super::detector::{Detection, TargetDetector};
use super::error::CaptureError;
use super::extractor::ExtractorAdapter;
use super::frame::{CaptureFrame, FrameInfo};
use super::resolver::IdentifierResolver;
use super::state_machine::{CaptureStats, ControllerEvent, ControllerState};
use super::store::ArtifactStore;
use super::surface::RenderSurface;
use crate::core::config::{CaptureConfig, ConfigError};
use crate::core::integrity::IdentifierRange;

/// 中断检查粒度
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 最后保存的编号到达区间末尾
    Completed,
    Interrupted,
}

struct PendingCapture {
    frame: CaptureFrame,
    text: String,
    detection: Detection,
}

pub struct CaptureController<S: RenderSurface, A: ArtifactStore> {
    state: ControllerState,
    range: IdentifierRange,
    max_wait: Duration,
    poll_interval: Duration,
    settle_delay: Duration,
    detector: TargetDetector,
    resolver: IdentifierResolver,
    dedup: DedupStore,
    extractor: ExtractorAdapter,
    surface: S,
    store: A,
    clock: Box<dyn Clock>,
    shutdown: ShutdownSignal,
    last_advance: Instant,
    pending: Option<PendingCapture>,
    pending_id: Option<i64>,
    frame_counter: u64,
    saved_ids: Vec<i64>,
    stats: CaptureStats,
}

impl<S: RenderSurface, A: ArtifactStore> CaptureController<S, A> {
    pub fn new(
        config: &CaptureConfig,
        surface: S,
        extractor: ExtractorAdapter,
        store: A,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = IdentifierResolver::new(&config.identifier_label)
            .map_err(|e| ConfigError::Invalid(format!("identifier_label: {}", e)))?;
        let clock: Box<dyn Clock> = Box::new(SystemClock);
        let last_advance = clock.now();

        Ok(Self {
            state: ControllerState::new(),
            range: config.range,
            max_wait: config.max_wait(),
            poll_interval: config.poll_interval(),
            settle_delay: config.settle_delay(),
            detector: TargetDetector::new(
                config.target_phrases.clone(),
                config.position_markers.clone(),
            ),
            resolver,
            dedup: DedupStore::new(),
            extractor,
            surface,
            store,
            clock,
            shutdown: ShutdownSignal::new(),
            last_advance,
            pending: None,
            pending_id: None,
            frame_counter: 0,
            saved_ids: Vec::new(),
            stats: CaptureStats::default(),
        })
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.last_advance = clock.now();
        self.clock = clock;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn range(&self) -> IdentifierRange {
        self.range
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn last_saved(&self) -> Option<i64> {
        self.dedup.last_saved()
    }

    /// Identifiers persisted during this run, in save order.
    pub fn saved_ids(&self) -> &[i64] {
        &self.saved_ids
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    pub fn into_store(self) -> A {
        self.store
    }

    /// 手动开始信号：启动计时并进入扫描
    pub fn begin(&mut self) {
        if self.state != ControllerState::AwaitingManualStart {
            return;
        }
        self.last_advance = self.clock.now();
        self.apply(ControllerEvent::Begin);
        info!("🦅 Capture loop started for range {}", self.range);
    }

    /// Runs until the range is complete or the shutdown signal is raised.
    /// Only persistence failures come back as errors.
    pub fn run(&mut self) -> Result<RunOutcome, CaptureError> {
        self.begin();

        loop {
            if self.shutdown.is_raised() {
                info!("Terminated by user.");
                return Ok(RunOutcome::Interrupted);
            }
            if self.step()?.is_terminal() {
                info!(
                    "✅ Reached end of range {} (last saved {:?})",
                    self.range,
                    self.last_saved()
                );
                return Ok(RunOutcome::Completed);
            }
        }
    }

    /// 执行当前状态对应的动作，返回新状态
    pub fn step(&mut self) -> Result<ControllerState, CaptureError> {
        let event = match self.state {
            ControllerState::AwaitingManualStart => return Ok(self.state),
            ControllerState::Scanning => self.scan(),
            ControllerState::TargetDetected => self.resolve(),
            ControllerState::Saved => self.persist()?,
            ControllerState::TimedOut => {
                self.stats.forced_advances += 1;
                ControllerEvent::TimeoutLogged
            }
            ControllerState::Advancing => self.advance(),
            ControllerState::Terminated => return Ok(self.state),
        };
        Ok(self.apply(event))
    }

    fn apply(&mut self, event: ControllerEvent) -> ControllerState {
        let next = self.state.transition(event);
        if next != self.state {
            debug!("{} --{:?}--> {}", self.state, event, next);
        }
        self.state = next;
        next
    }

    fn scan(&mut self) -> ControllerEvent {
        if self.dedup.last_saved().is_some_and(|id| id >= self.range.end) {
            return ControllerEvent::RangeComplete;
        }

        let elapsed = self
            .clock
            .now()
            .saturating_duration_since(self.last_advance);
        if elapsed > self.max_wait {
            warn!(
                "⏱ Timeout after {}s without progress: forcing navigation...",
                elapsed.as_secs()
            );
            return ControllerEvent::WaitExceeded;
        }

        self.stats.cycles += 1;
        let cycle = self.stats.cycles;

        match self.sample() {
            Ok(Some(pending)) => {
                info!(
                    "🎯 Cycle {}: target detected via {:?} on frame {:?}",
                    cycle,
                    pending.detection.literal(),
                    FrameInfo::from_frame(&pending.frame)
                );
                self.pending = Some(pending);
                ControllerEvent::TargetFound
            }
            Ok(None) => {
                info!("Scanning... Timer: {}s", elapsed.as_secs());
                self.pause(self.poll_interval);
                ControllerEvent::NoTarget
            }
            Err(e) => {
                self.stats.transient_failures += 1;
                warn!("Cycle {}: skipped after recoverable error: {}", cycle, e);
                self.pause(self.poll_interval);
                ControllerEvent::NoTarget
            }
        }
    }

    fn sample(&mut self) -> Result<Option<PendingCapture>, CaptureError> {
        let image = self.surface.capture()?;
        self.frame_counter += 1;
        let frame = CaptureFrame::new(image, self.clock.now(), self.frame_counter);

        let text = self.extractor.extract(&frame)?;
        Ok(self.detector.detect(&text).map(|detection| PendingCapture {
            frame,
            text,
            detection,
        }))
    }

    fn resolve(&mut self) -> ControllerEvent {
        let Some(pending) = self.pending.as_ref() else {
            return ControllerEvent::NoFreshIdentifier;
        };

        let label = match self.surface.label_text() {
            Ok(Some(label)) => label,
            Ok(None) => pending.text.clone(),
            Err(e) => {
                self.stats.transient_failures += 1;
                warn!(
                    "Cycle {}: label read failed, rescanning: {}",
                    self.stats.cycles, e
                );
                return self.discard_pending();
            }
        };

        match self.resolver.resolve_identifier(&label) {
            Some(id) if self.dedup.should_save(id) => {
                self.pending_id = Some(id);
                ControllerEvent::FreshIdentifier
            }
            Some(id) => {
                self.stats.duplicates_skipped += 1;
                debug!("Booklet {} already saved, skipping", id);
                self.discard_pending()
            }
            None => {
                self.stats.resolver_misses += 1;
                debug!("No identifier in label text {:?}", label);
                self.discard_pending()
            }
        }
    }

    fn discard_pending(&mut self) -> ControllerEvent {
        self.pending = None;
        self.pending_id = None;
        self.pause(self.poll_interval);
        ControllerEvent::NoFreshIdentifier
    }

    fn persist(&mut self) -> Result<ControllerEvent, CaptureError> {
        let (Some(pending), Some(id)) = (self.pending.take(), self.pending_id.take()) else {
            return Ok(ControllerEvent::NoFreshIdentifier);
        };

        // 写入成功后才推进去重游标
        let path = self.store.save(id, &pending.frame)?;
        self.dedup.mark_saved(id);
        self.saved_ids.push(id);
        self.stats.saved += 1;

        info!("✔ Saved Booklet {} -> {}", id, path.display());
        Ok(ControllerEvent::Persisted)
    }

    fn advance(&mut self) -> ControllerEvent {
        // 失败也记录尝试时间：下一次强制翻页至少间隔一个等待上限，期间继续扫描
        let attempted_at = self.clock.now();
        match self.surface.advance() {
            Ok(()) => self.stats.advances += 1,
            Err(e) => {
                self.stats.transient_failures += 1;
                warn!("Advance failed, retrying after the next timeout: {}", e);
            }
        }
        self.last_advance = attempted_at;
        self.pause(self.settle_delay);
        ControllerEvent::Settled
    }

    fn pause(&self, total: Duration) {
        let mut remaining = total;
        while !remaining.is_zero() && !self.shutdown.is_raised() {
            let slice = remaining.min(SLEEP_SLICE);
            self.clock.sleep(slice);
            remaining -= slice;
        }
    }
}
