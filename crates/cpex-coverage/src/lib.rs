// SPDX-License-Identifier: AGPL-3.0

//! Coverage bookkeeping for exploration runs.
//!
//! Coverage is observed at symbolic branch sites: every reported branch
//! contributes its `(file, line)` and, within the same file, the arc from
//! the previously observed line. [`CoverageData`] is the per-run or
//! cumulative record; [`CoverageMeter`] accumulates one run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Covered lines and arcs, grouped per file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageData {
    lines: BTreeMap<String, BTreeSet<u32>>,
    arcs: BTreeMap<String, BTreeSet<(u32, u32)>>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_line(&mut self, file: &str, line: u32) {
        self.lines.entry(file.to_string()).or_default().insert(line);
    }

    pub fn record_arc(&mut self, file: &str, origin: u32, dest: u32) {
        self.arcs
            .entry(file.to_string())
            .or_default()
            .insert((origin, dest));
    }

    /// Union `other` into `self`.
    pub fn update(&mut self, other: &CoverageData) {
        for (file, lines) in &other.lines {
            self.lines.entry(file.clone()).or_default().extend(lines);
        }
        for (file, arcs) in &other.arcs {
            self.arcs.entry(file.clone()).or_default().extend(arcs);
        }
    }

    /// True when `self` covers every line and every arc of `other`.
    pub fn covers(&self, other: &CoverageData) -> bool {
        for (file, lines) in &other.lines {
            match self.lines.get(file) {
                Some(ours) if ours.is_superset(lines) => {}
                _ if lines.is_empty() => {}
                _ => return false,
            }
        }
        for (file, arcs) in &other.arcs {
            match self.arcs.get(file) {
                Some(ours) if ours.is_superset(arcs) => {}
                _ if arcs.is_empty() => {}
                _ => return false,
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.line_count() == 0 && self.arc_count() == 0
    }

    pub fn line_count(&self) -> usize {
        self.lines.values().map(|s| s.len()).sum()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.values().map(|s| s.len()).sum()
    }

    pub fn file_count(&self) -> usize {
        let mut files: BTreeSet<&String> = self.lines.keys().collect();
        files.extend(self.arcs.keys());
        files.len()
    }
}

/// Accumulates branch-site telemetry for a single execution.
#[derive(Debug, Default)]
pub struct CoverageMeter {
    data: CoverageData,
    last_site: Option<(String, u32)>,
}

impl CoverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current run. Called at the start of every execution.
    pub fn reset(&mut self) {
        self.data = CoverageData::new();
        self.last_site = None;
    }

    /// Record one observed branch site.
    pub fn record(&mut self, file: &str, line: u32) {
        self.data.record_line(file, line);
        if let Some((prev_file, prev_line)) = &self.last_site {
            if prev_file == file {
                self.data.record_arc(file, *prev_line, line);
            }
        }
        self.last_site = Some((file.to_string(), line));
    }

    /// The coverage observed so far in this run.
    pub fn snapshot(&self) -> CoverageData {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let mut cov = CoverageData::new();
        cov.record_line("demo.rs", 10);
        cov.record_line("demo.rs", 12);
        cov.record_line("demo.rs", 10);
        cov.record_arc("demo.rs", 10, 12);

        assert_eq!(cov.line_count(), 2);
        assert_eq!(cov.arc_count(), 1);
        assert_eq!(cov.file_count(), 1);
        assert!(!cov.is_empty());
    }

    #[test]
    fn test_update_unions() {
        let mut a = CoverageData::new();
        a.record_line("x.rs", 1);

        let mut b = CoverageData::new();
        b.record_line("x.rs", 2);
        b.record_line("y.rs", 7);
        b.record_arc("y.rs", 7, 9);

        a.update(&b);
        assert_eq!(a.line_count(), 3);
        assert_eq!(a.arc_count(), 1);
        assert_eq!(a.file_count(), 2);
    }

    #[test]
    fn test_covers() {
        let mut small = CoverageData::new();
        small.record_line("x.rs", 1);
        small.record_arc("x.rs", 1, 3);

        let mut big = CoverageData::new();
        big.record_line("x.rs", 1);
        big.record_line("x.rs", 3);
        big.record_arc("x.rs", 1, 3);

        assert!(big.covers(&small));
        assert!(!small.covers(&big));
        assert!(big.covers(&CoverageData::new()));
    }

    #[test]
    fn test_meter_arcs_stay_within_file() {
        let mut meter = CoverageMeter::new();
        meter.record("a.rs", 5);
        meter.record("a.rs", 9);
        meter.record("b.rs", 2);
        meter.record("b.rs", 4);

        let cov = meter.snapshot();
        assert_eq!(cov.line_count(), 4);
        assert_eq!(cov.arc_count(), 2);
    }

    #[test]
    fn test_meter_reset() {
        let mut meter = CoverageMeter::new();
        meter.record("a.rs", 5);
        meter.reset();
        assert!(meter.snapshot().is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut cov = CoverageData::new();
        cov.record_line("demo.rs", 3);
        cov.record_arc("demo.rs", 3, 8);

        let json = serde_json::to_string(&cov).unwrap();
        let back: CoverageData = serde_json::from_str(&json).unwrap();
        assert_eq!(cov, back);
    }
}
