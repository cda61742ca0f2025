// SPDX-License-Identifier: AGPL-3.0

//! The end-of-run report.

use cpex_engine::ExplorationStats;
use serde::Serialize;

/// Exit codes of the `cpex` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exitcode {
    Pass = 0,
    OracleFailed = 1,
}

/// Everything the run produced, in one serialisable record.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub program: String,
    pub paths: usize,
    pub iterations: usize,
    pub execution_time: f64,
    pub solver_time: f64,
    pub lines_covered: usize,
    pub branches_covered: usize,
    pub files_covered: usize,
    pub exceptions: usize,
    pub triaged_exceptions: usize,
    /// None when the program declares no oracle.
    pub oracle_passed: Option<bool>,
}

impl RunReport {
    pub fn new(program: &str, stats: &ExplorationStats, oracle_passed: Option<bool>) -> Self {
        RunReport {
            program: program.to_string(),
            paths: stats.paths,
            iterations: stats.iterations,
            execution_time: stats.wall_time,
            solver_time: stats.total_solve_time,
            lines_covered: stats.lines_covered,
            branches_covered: stats.arcs_covered,
            files_covered: stats.files_covered,
            exceptions: stats.exceptions,
            triaged_exceptions: stats.triaged_exceptions,
            oracle_passed,
        }
    }

    /// 0 unless a declared oracle failed.
    pub fn exitcode(&self) -> i32 {
        match self.oracle_passed {
            Some(false) => Exitcode::OracleFailed as i32,
            _ => Exitcode::Pass as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> ExplorationStats {
        ExplorationStats {
            paths: 3,
            iterations: 3,
            processed_constraints: 2,
            total_solve_time: 0.5,
            wall_time: 1.25,
            lines_covered: 4,
            arcs_covered: 3,
            files_covered: 1,
            exceptions: 0,
            triaged_exceptions: 0,
        }
    }

    #[test]
    fn test_exitcode_values() {
        assert_eq!(Exitcode::Pass as i32, 0);
        assert_eq!(Exitcode::OracleFailed as i32, 1);
    }

    #[test]
    fn test_exitcode_follows_oracle() {
        assert_eq!(RunReport::new("escape", &stats(), None).exitcode(), 0);
        assert_eq!(RunReport::new("escape", &stats(), Some(true)).exitcode(), 0);
        assert_eq!(RunReport::new("escape", &stats(), Some(false)).exitcode(), 1);
    }

    #[test]
    fn test_report_serialises() {
        let report = RunReport::new("escape", &stats(), Some(true));
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"program\":\"escape\""));
        assert!(json.contains("\"oracle_passed\":true"));
    }
}
