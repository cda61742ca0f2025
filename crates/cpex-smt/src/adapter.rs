// SPDX-License-Identifier: AGPL-3.0

use cpex_exceptions::{SetupError, SetupResult};
use cpex_symbolic::{Sort, SymValue};
use cpex_tree::Predicate;
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Satisfying assignment returned by a solver: input name to value.
pub type Model = IndexMap<String, SymValue>;

/// Outcome of one solver query.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtOutcome {
    Sat(Model),
    Unsat,
    Unknown,
}

impl SmtOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SmtOutcome::Sat(_) => "SAT",
            SmtOutcome::Unsat => "UNSAT",
            SmtOutcome::Unknown => "UNKNOWN",
        }
    }

    pub fn is_sat(&self) -> bool {
        matches!(self, SmtOutcome::Sat(_))
    }
}

impl fmt::Display for SmtOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The configured back-end selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverKind {
    Z3,
    Cvc,
    Z3Str2,
    Multi,
}

impl SolverKind {
    /// The two back-ends raced in multi mode; the primary is listed first.
    /// String-heavy inputs get the string-capable pairing.
    pub fn multi_pair(has_string_inputs: bool) -> (SolverKind, SolverKind) {
        if has_string_inputs {
            (SolverKind::Cvc, SolverKind::Z3Str2)
        } else {
            (SolverKind::Z3, SolverKind::Cvc)
        }
    }
}

impl std::str::FromStr for SolverKind {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "z3" => Ok(SolverKind::Z3),
            "cvc" => Ok(SolverKind::Cvc),
            "z3str2" => Ok(SolverKind::Z3Str2),
            "multi" => Ok(SolverKind::Multi),
            other => Err(SetupError::UnknownSolver(other.to_string())),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverKind::Z3 => "z3",
            SolverKind::Cvc => "cvc",
            SolverKind::Z3Str2 => "z3str2",
            SolverKind::Multi => "multi",
        };
        write!(f, "{}", name)
    }
}

/// A dialect cannot express the query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("operation {0} is not supported by this solver dialect")]
    Unsupported(&'static str),
}

/// A rendered, self-contained solver script.
#[derive(Debug, Clone)]
pub struct SmtScript {
    /// Complete script text, ready to be written to a file.
    pub text: String,
    /// Declared input variables, in first-appearance order.
    pub vars: Vec<(String, Sort)>,
    /// The rendered query formula alone; the query store hashes this.
    pub query_text: String,
}

/// What a back-end must provide. `render`/`command`/`parse` together
/// implement "find a counterexample to the query while the asserts remain
/// valid": the script asserts every element of `asserts` plus the negation
/// of `query`, and a SAT answer carries a model over the input variables.
pub trait SolverAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render the query into a complete script for this dialect.
    fn render(&self, asserts: &[Predicate], query: &Predicate) -> Result<SmtScript, RenderError>;

    /// Command line running the script. `timeout` (seconds) is passed to
    /// solvers that support a soft per-query limit; enforcement beyond that
    /// is the caller's job.
    fn command(&self, script: &Path, timeout: f64) -> SetupResult<Command>;

    /// Interpret the solver's stdout.
    fn parse(&self, script: &SmtScript, stdout: &str) -> SmtOutcome;

    /// Confirm the backing binary exists. Called once at startup so a bad
    /// configuration fails before exploration begins.
    fn validate(&self) -> SetupResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_kind_from_str() {
        assert_eq!("z3".parse::<SolverKind>().unwrap(), SolverKind::Z3);
        assert_eq!("cvc".parse::<SolverKind>().unwrap(), SolverKind::Cvc);
        assert_eq!("z3str2".parse::<SolverKind>().unwrap(), SolverKind::Z3Str2);
        assert_eq!("multi".parse::<SolverKind>().unwrap(), SolverKind::Multi);
        assert!(matches!(
            "yices".parse::<SolverKind>(),
            Err(SetupError::UnknownSolver(_))
        ));
    }

    #[test]
    fn test_multi_pair_selection() {
        assert_eq!(
            SolverKind::multi_pair(true),
            (SolverKind::Cvc, SolverKind::Z3Str2)
        );
        assert_eq!(
            SolverKind::multi_pair(false),
            (SolverKind::Z3, SolverKind::Cvc)
        );
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(SmtOutcome::Sat(Model::new()).label(), "SAT");
        assert_eq!(SmtOutcome::Unsat.label(), "UNSAT");
        assert_eq!(SmtOutcome::Unknown.label(), "UNKNOWN");
        assert!(SmtOutcome::Sat(Model::new()).is_sat());
        assert!(!SmtOutcome::Unknown.is_sat());
    }
}
