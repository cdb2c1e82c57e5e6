//! 完整性核对 - 将已保存编号与期望的连续区间对比，找出缺口

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// `[start, end]`，两端包含
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRange {
    pub start: i64,
    pub end: i64,
}

impl IdentifierRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.start <= id && id <= self.end
    }

    /// Saturates at `usize::MAX` for ranges wider than the address space.
    pub fn len(&self) -> usize {
        let span = i128::from(self.end) - i128::from(self.start) + 1;
        usize::try_from(span.max(0)).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> {
        self.start..=self.end
    }
}

impl Default for IdentifierRange {
    fn default() -> Self {
        Self::new(933, 1242)
    }
}

impl fmt::Display for IdentifierRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub range: IdentifierRange,
    pub found: BTreeSet<i64>,
    pub missing: Vec<i64>,
    /// 区间外的已保存编号，仅供参考
    pub out_of_range: Vec<i64>,
}

impl IntegrityReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn generate_report(range: IdentifierRange, persisted_ids: &BTreeSet<i64>) -> IntegrityReport {
    let missing = range
        .iter()
        .filter(|id| !persisted_ids.contains(id))
        .collect();
    let out_of_range = persisted_ids
        .iter()
        .copied()
        .filter(|&id| !range.contains(id))
        .collect();

    IntegrityReport {
        range,
        found: persisted_ids.clone(),
        missing,
        out_of_range,
    }
}

const BANNER_WIDTH: usize = 30;

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let banner = "=".repeat(BANNER_WIDTH);
        writeln!(f)?;
        writeln!(f, "{}", banner)?;
        writeln!(f, "REPORT FOR RANGE {}", self.range)?;
        writeln!(
            f,
            "Success: {} | Missing: {}",
            self.found.len(),
            self.missing.len()
        )?;
        if !self.missing.is_empty() {
            writeln!(f, "Missing IDs: {:?}", self.missing)?;
        }
        if !self.out_of_range.is_empty() {
            writeln!(f, "Outside range: {:?}", self.out_of_range)?;
        }
        write!(f, "{}", banner)
    }
}
