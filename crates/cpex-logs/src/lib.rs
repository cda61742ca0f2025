// SPDX-License-Identifier: AGPL-3.0

//! Diagnostic logging for exploration runs.
//!
//! Messages go to the terminal (colored by severity) and, when a log file
//! has been armed, to that file without color codes. Warnings can carry a
//! code pointing at the project wiki.

use colored::*;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Warnings base URL
pub const WARNINGS_BASE_URL: &str = "https://github.com/cpex/cpex/wiki/warnings";

/// Codes attached to recurring warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
    ReplayMismatch,
    PolicyViolation,
    PreconditionViolation,
    SolverCrash,
    UnknownQuery,
    ModelMismatch,
}

impl WarningCode {
    pub fn code(&self) -> &'static str {
        match self {
            WarningCode::ReplayMismatch => "replay-mismatch",
            WarningCode::PolicyViolation => "policy-violation",
            WarningCode::PreconditionViolation => "precondition-violation",
            WarningCode::SolverCrash => "solver-crash",
            WarningCode::UnknownQuery => "unknown-query",
            WarningCode::ModelMismatch => "model-mismatch",
        }
    }

    pub fn url(&self) -> String {
        format!("{}#{}", WARNINGS_BASE_URL, self.code())
    }
}

static UNIQUE_MESSAGES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

static LOG_FILE: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));

static DEBUG_ENABLED: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

fn is_logged(message: &str) -> bool {
    let messages = UNIQUE_MESSAGES.lock().unwrap();
    messages.contains(message)
}

fn mark_logged(message: &str) {
    let mut messages = UNIQUE_MESSAGES.lock().unwrap();
    messages.insert(message.to_string());
}

fn write_to_file(level: &str, text: &str) {
    if let Some(file) = LOG_FILE.lock().unwrap().as_mut() {
        let _ = writeln!(file, "{}\t{}", level, text);
    }
}

/// Arm the log-file sink. Appends to an existing file.
pub fn set_log_file(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    *LOG_FILE.lock().unwrap() = Some(file);
    Ok(())
}

/// Enable debug-level output.
pub fn set_debug(enabled: bool) {
    *DEBUG_ENABLED.lock().unwrap() = enabled;
}

/// Log a debug message
pub fn debug(text: &str) {
    if !*DEBUG_ENABLED.lock().unwrap() {
        return;
    }
    eprintln!("{}", text.dimmed());
    write_to_file("DEBUG", text);
}

/// Log an info message
pub fn info(text: &str) {
    println!("{}", text);
    write_to_file("INFO", text);
}

/// Log a warning message
pub fn warn(text: &str, allow_duplicate: bool) {
    if allow_duplicate || !is_logged(text) {
        eprintln!("{}", text.yellow());
        write_to_file("WARNING", text);
        if !allow_duplicate {
            mark_logged(text);
        }
    }
}

/// Log an error message
pub fn error(text: &str, allow_duplicate: bool) {
    if allow_duplicate || !is_logged(text) {
        eprintln!("{}", text.red());
        write_to_file("ERROR", text);
        if !allow_duplicate {
            mark_logged(text);
        }
    }
}

/// Log a warning with a code and wiki pointer
pub fn warn_code(code: WarningCode, msg: &str, allow_duplicate: bool) {
    let full_msg = format!("{}\n(see {})", msg, code.url());
    warn(&full_msg, allow_duplicate);
}

/// Log a unique warning (no duplicates)
pub fn warn_unique(text: &str) {
    warn(text, false);
}

/// Clear all logged messages (useful for testing)
pub fn clear_logged_messages() {
    let mut messages = UNIQUE_MESSAGES.lock().unwrap();
    messages.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_code_url() {
        let code = WarningCode::ReplayMismatch;
        assert_eq!(code.code(), "replay-mismatch");
        assert!(code.url().starts_with(WARNINGS_BASE_URL));
        assert!(code.url().contains("replay-mismatch"));
    }

    #[test]
    fn test_all_warning_codes() {
        let codes = vec![
            WarningCode::ReplayMismatch,
            WarningCode::PolicyViolation,
            WarningCode::PreconditionViolation,
            WarningCode::SolverCrash,
            WarningCode::UnknownQuery,
            WarningCode::ModelMismatch,
        ];

        for code in codes {
            assert!(!code.code().is_empty());
            assert!(code.url().contains(code.code()));
        }
    }

    #[test]
    fn test_unique_logging() {
        clear_logged_messages();

        let msg = "a warning seen only once";
        assert!(!is_logged(msg));

        warn(msg, false);
        assert!(is_logged(msg));

        warn(msg, false);
        assert!(is_logged(msg));

        clear_logged_messages();
        assert!(!is_logged(msg));
    }

    #[test]
    fn test_allow_duplicate_not_tracked() {
        clear_logged_messages();

        let msg = "a repeatable warning";
        warn(msg, true);
        assert!(!is_logged(msg));

        warn(msg, false);
        assert!(is_logged(msg));
    }

    #[test]
    fn test_log_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        set_log_file(&path).unwrap();

        info("message for the file");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("INFO\tmessage for the file"));

        *LOG_FILE.lock().unwrap() = None;
    }

    #[test]
    fn test_warn_code_does_not_panic() {
        clear_logged_messages();
        warn_code(WarningCode::SolverCrash, "solver died", true);
    }
}
