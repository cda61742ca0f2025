// SPDX-License-Identifier: AGPL-3.0

//! Error types shared across the CPEX workspace.
//!
//! Only two kinds of failure exist at this layer: fatal setup errors that
//! abort the process before the first execution, and errors surfaced by a
//! program under test, which are recorded and never stop exploration.

use thiserror::Error;

/// Fatal errors raised while assembling an exploration run.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Unknown solver: {0}")]
    UnknownSolver(String),

    #[error("Unknown scheduling policy: {0}")]
    UnknownPolicy(String),

    #[error("Unknown program: {0}")]
    UnknownProgram(String),

    #[error("Query folder {0} not found")]
    QueryStoreMissing(String),

    #[error("Empty solve-timeout ladder")]
    EmptyTimeoutLadder,

    #[error("At least one solver worker is required")]
    NoWorkers,

    #[error("Solver binary {0} not found in PATH")]
    SolverBinaryMissing(String),

    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },
}

/// Result type for setup-time operations.
pub type SetupResult<T> = Result<T, SetupError>;

/// Errors surfaced by a program under test.
///
/// Every variant carries the user-source site (`file:line`) that produced
/// it; the engine uses the site as a stable triage id when counting
/// distinct failures across runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// The program attempted to terminate the process. The harness converts
    /// this into a recorded outcome so exploration continues.
    #[error("Program Exit ({code})")]
    Exit { code: i32, site: String },

    /// A failure raised inside the program.
    #[error("{message}")]
    Raise { message: String, site: String },
}

impl ProgramError {
    /// Raise a failure tagged with the caller's source location.
    #[track_caller]
    pub fn raise(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        ProgramError::Raise {
            message: message.into(),
            site: format!("{}:{}", loc.file(), loc.line()),
        }
    }

    /// Intercepted process-exit request, tagged with the caller's location.
    #[track_caller]
    pub fn exit(code: i32) -> Self {
        let loc = std::panic::Location::caller();
        ProgramError::Exit {
            code,
            site: format!("{}:{}", loc.file(), loc.line()),
        }
    }

    /// The user-source site that produced this error.
    pub fn site(&self) -> &str {
        match self {
            ProgramError::Exit { site, .. } => site,
            ProgramError::Raise { site, .. } => site,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_display() {
        let err = SetupError::UnknownSolver("boolector".to_string());
        assert_eq!(err.to_string(), "Unknown solver: boolector");

        let err = SetupError::QueryStoreMissing("/tmp/queries".to_string());
        assert_eq!(err.to_string(), "Query folder /tmp/queries not found");
    }

    #[test]
    fn test_invalid_argument_display() {
        let err = SetupError::InvalidArgument {
            name: "in1".to_string(),
            reason: "expected a string".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid argument in1: expected a string");
    }

    #[test]
    fn test_program_exit_display() {
        let err = ProgramError::Exit {
            code: 3,
            site: "demo.rs:10".to_string(),
        };
        assert_eq!(err.to_string(), "Program Exit (3)");
    }

    #[test]
    fn test_raise_captures_site() {
        let err = ProgramError::raise("boom");
        assert_eq!(err.to_string(), "boom");
        assert!(err.site().contains("lib.rs"));
    }

    #[test]
    fn test_exit_captures_site() {
        let err = ProgramError::exit(1);
        assert!(err.site().contains(':'));
        match err {
            ProgramError::Exit { code, .. } => assert_eq!(code, 1),
            _ => panic!("expected exit"),
        }
    }
}
