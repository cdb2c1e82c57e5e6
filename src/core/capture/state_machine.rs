use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    AwaitingManualStart,
    Scanning,
    TargetDetected,
    Saved,
    TimedOut,
    Advancing,
    Terminated,
}

/// 每一步动作产生的事件，驱动状态转移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// 操作员确认开始
    Begin,
    /// 最后保存的编号已到区间末尾
    RangeComplete,
    /// 距上次翻页超过等待上限
    WaitExceeded,
    TargetFound,
    /// 未命中，或本轮提取失败
    NoTarget,
    FreshIdentifier,
    /// 未解析出编号，或与上次保存重复
    NoFreshIdentifier,
    Persisted,
    TimeoutLogged,
    Settled,
}

impl ControllerState {
    pub fn new() -> Self {
        ControllerState::AwaitingManualStart
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerState::Terminated)
    }

    /// Pure transition table. Events that do not apply leave the state unchanged.
    pub fn transition(self, event: ControllerEvent) -> ControllerState {
        use ControllerEvent as E;
        use ControllerState as S;

        match (self, event) {
            (S::Terminated, _) => S::Terminated,
            (S::AwaitingManualStart, E::Begin) => S::Scanning,
            (S::Scanning, E::RangeComplete) => S::Terminated,
            (S::Scanning, E::WaitExceeded) => S::TimedOut,
            (S::Scanning, E::TargetFound) => S::TargetDetected,
            (S::Scanning, E::NoTarget) => S::Scanning,
            (S::TargetDetected, E::FreshIdentifier) => S::Saved,
            (S::TargetDetected, E::NoFreshIdentifier) => S::Scanning,
            (S::Saved, E::Persisted) => S::Advancing,
            (S::TimedOut, E::TimeoutLogged) => S::Advancing,
            (S::Advancing, E::Settled) => S::Scanning,
            (state, _) => state,
        }
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::AwaitingManualStart => "awaiting-manual-start",
            ControllerState::Scanning => "scanning",
            ControllerState::TargetDetected => "target-detected",
            ControllerState::Saved => "saved",
            ControllerState::TimedOut => "timed-out",
            ControllerState::Advancing => "advancing",
            ControllerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub cycles: u64,
    pub saved: u64,
    pub duplicates_skipped: u64,
    pub resolver_misses: u64,
    pub forced_advances: u64,
    pub advances: u64,
    pub transient_failures: u64,
}
