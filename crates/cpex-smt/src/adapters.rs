// SPDX-License-Identifier: AGPL-3.0

//! The three concrete back-ends: z3 and cvc over standard SMT-LIB2, and
//! the legacy z3str2 string solver with its renamed operators.

use crate::adapter::{RenderError, SmtOutcome, SmtScript, SolverAdapter, SolverKind};
use crate::model;
use crate::smtlib::{self, Dialect};
use cpex_exceptions::{SetupError, SetupResult};
use cpex_symbolic::{Sort, SymValue};
use cpex_tree::Predicate;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

fn timeout_millis(timeout: f64) -> u64 {
    ((timeout * 1000.0).ceil() as u64).max(1)
}

/// Input variables referenced by the whole query, sorted by name.
fn script_vars(asserts: &[Predicate], query: &Predicate) -> Vec<(String, Sort)> {
    let mut vars = query.vars();
    for predicate in asserts {
        vars.extend(predicate.vars());
    }
    vars.into_iter().collect()
}

fn locate<'a>(
    binaries: &[&'static str],
    cell: &'a OnceCell<Option<PathBuf>>,
) -> SetupResult<&'a Path> {
    let found = cell.get_or_init(|| binaries.iter().find_map(|name| which::which(name).ok()));
    found
        .as_deref()
        .ok_or_else(|| SetupError::SolverBinaryMissing(binaries.join("|")))
}

/// Standard SMT-LIB2 script: declarations, asserts, the negated query,
/// check-sat and one get-value per input.
fn render_standard(
    dialect: Dialect,
    header: &[&str],
    asserts: &[Predicate],
    query: &Predicate,
) -> Result<SmtScript, RenderError> {
    let vars = script_vars(asserts, query);

    let mut text = String::new();
    for line in header {
        text.push_str(line);
        text.push('\n');
    }
    for (name, sort) in &vars {
        text.push_str(&format!("(declare-fun {} () {})\n", name, smtlib::sort_name(*sort)));
    }
    for predicate in asserts {
        text.push_str(&format!("(assert {})\n", smtlib::render_predicate(predicate, dialect)?));
    }
    let query_text = smtlib::render_predicate(&query.negated(), dialect)?;
    text.push_str(&format!("(assert {})\n", query_text));
    text.push_str("(check-sat)\n");
    for (name, _) in &vars {
        text.push_str(&format!("(get-value ({}))\n", name));
    }

    Ok(SmtScript {
        text,
        vars,
        query_text,
    })
}

fn parse_standard(script: &SmtScript, stdout: &str) -> SmtOutcome {
    match model::check_sat_answer(stdout) {
        "sat" => SmtOutcome::Sat(model::parse_get_value(stdout, &script.vars)),
        "unsat" => SmtOutcome::Unsat,
        _ => SmtOutcome::Unknown,
    }
}

pub struct Z3Adapter {
    binary: OnceCell<Option<PathBuf>>,
}

impl SolverAdapter for Z3Adapter {
    fn name(&self) -> &'static str {
        "z3"
    }

    fn render(&self, asserts: &[Predicate], query: &Predicate) -> Result<SmtScript, RenderError> {
        render_standard(Dialect::Z3, &[], asserts, query)
    }

    fn command(&self, script: &Path, timeout: f64) -> SetupResult<Command> {
        let binary = locate(&["z3"], &self.binary)?;
        let mut cmd = Command::new(binary);
        cmd.arg("-smt2")
            .arg(format!("-t:{}", timeout_millis(timeout)))
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    fn parse(&self, script: &SmtScript, stdout: &str) -> SmtOutcome {
        parse_standard(script, stdout)
    }

    fn validate(&self) -> SetupResult<()> {
        locate(&["z3"], &self.binary).map(|_| ())
    }
}

pub struct CvcAdapter {
    binary: OnceCell<Option<PathBuf>>,
}

const CVC_BINARIES: &[&str] = &["cvc5", "cvc4"];

impl SolverAdapter for CvcAdapter {
    fn name(&self) -> &'static str {
        "cvc"
    }

    fn render(&self, asserts: &[Predicate], query: &Predicate) -> Result<SmtScript, RenderError> {
        render_standard(
            Dialect::Cvc,
            &[
                "(set-logic ALL)",
                "(set-option :produce-models true)",
                "(set-option :strings-exp true)",
            ],
            asserts,
            query,
        )
    }

    fn command(&self, script: &Path, timeout: f64) -> SetupResult<Command> {
        let binary = locate(CVC_BINARIES, &self.binary)?;
        let mut cmd = Command::new(binary);
        cmd.arg(format!("--tlimit-per={}", timeout_millis(timeout)))
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    fn parse(&self, script: &SmtScript, stdout: &str) -> SmtOutcome {
        parse_standard(script, stdout)
    }

    fn validate(&self) -> SetupResult<()> {
        locate(CVC_BINARIES, &self.binary).map(|_| ())
    }
}

pub struct Z3Str2Adapter {
    binary: OnceCell<Option<PathBuf>>,
}

const Z3STR2_BINARIES: &[&str] = &["z3str2", "z3-str"];

impl SolverAdapter for Z3Str2Adapter {
    fn name(&self) -> &'static str {
        "z3str2"
    }

    fn render(&self, asserts: &[Predicate], query: &Predicate) -> Result<SmtScript, RenderError> {
        let vars = script_vars(asserts, query);

        let mut text = String::new();
        for (name, sort) in &vars {
            text.push_str(&format!(
                "(declare-variable {} {})\n",
                name,
                smtlib::sort_name(*sort)
            ));
        }
        for predicate in asserts {
            text.push_str(&format!(
                "(assert {})\n",
                smtlib::render_predicate(predicate, Dialect::Z3Str2)?
            ));
        }
        let query_text = smtlib::render_predicate(&query.negated(), Dialect::Z3Str2)?;
        text.push_str(&format!("(assert {})\n", query_text));
        text.push_str("(check-sat)\n(get-model)\n");

        Ok(SmtScript {
            text,
            vars,
            query_text,
        })
    }

    fn command(&self, script: &Path, _timeout: f64) -> SetupResult<Command> {
        let binary = locate(Z3STR2_BINARIES, &self.binary)?;
        let mut cmd = Command::new(binary);
        cmd.arg("-f")
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    fn parse(&self, script: &SmtScript, stdout: &str) -> SmtOutcome {
        if !stdout.contains(">> SAT") {
            return SmtOutcome::Unsat;
        }

        let mut model = crate::adapter::Model::new();
        for (name, sort) in &script.vars {
            let value = match sort {
                Sort::Int => z3str2_int(name, stdout).map(SymValue::Int),
                Sort::Str => z3str2_string(name, stdout).map(SymValue::Str),
                Sort::Bool => None,
            };
            if let Some(value) = value {
                model.insert(name.clone(), value);
            }
        }
        SmtOutcome::Sat(model)
    }

    fn validate(&self) -> SetupResult<()> {
        locate(Z3STR2_BINARIES, &self.binary).map(|_| ())
    }
}

fn z3str2_int(name: &str, stdout: &str) -> Option<i64> {
    let pattern = format!(r"{} : int -> (-?\d+)", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    re.captures(stdout)?.get(1)?.as_str().parse().ok()
}

fn z3str2_string(name: &str, stdout: &str) -> Option<String> {
    let pattern = format!(r#"{} : string -> "([\S \\]*)""#, regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    let raw = re.captures(stdout)?.get(1)?.as_str();
    Some(z3str2_unescape(raw))
}

fn z3str2_unescape(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

static Z3_ADAPTER: Z3Adapter = Z3Adapter {
    binary: OnceCell::new(),
};
static CVC_ADAPTER: CvcAdapter = CvcAdapter {
    binary: OnceCell::new(),
};
static Z3STR2_ADAPTER: Z3Str2Adapter = Z3Str2Adapter {
    binary: OnceCell::new(),
};

/// The adapter backing a concrete solver kind. Multi mode is an engine
/// behaviour (it races two concrete adapters), never an adapter itself.
pub fn adapter_for(kind: SolverKind) -> &'static dyn SolverAdapter {
    match kind {
        SolverKind::Z3 => &Z3_ADAPTER,
        SolverKind::Cvc => &CVC_ADAPTER,
        SolverKind::Z3Str2 => &Z3STR2_ADAPTER,
        SolverKind::Multi => unreachable!("multi mode launches two concrete adapters"),
    }
}

/// Whether the backing binary (or, for multi, the integer pairing) can be
/// found. Intended for tests and diagnostics; startup validation goes
/// through [`SolverAdapter::validate`].
pub fn solver_available(kind: SolverKind) -> bool {
    match kind {
        SolverKind::Multi => {
            solver_available(SolverKind::Z3) && solver_available(SolverKind::Cvc)
        }
        concrete => adapter_for(concrete).validate().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpex_symbolic::{SymInt, SymStr};

    fn int_query() -> (Vec<Predicate>, Predicate) {
        let x = SymInt::variable("x", 0);
        let assert = Predicate::new(x.ge(&SymInt::lit(0)).node().clone(), true);
        let query = Predicate::new(x.eq(&SymInt::lit(7)).node().clone(), false);
        (vec![assert], query)
    }

    fn str_query() -> (Vec<Predicate>, Predicate) {
        let s = SymStr::variable("s", "");
        let query = Predicate::new(s.contains(&SymStr::lit(":")).node().clone(), false);
        (vec![], query)
    }

    #[test]
    fn test_z3_script_shape() {
        let (asserts, query) = int_query();
        let script = Z3_ADAPTER.render(&asserts, &query).unwrap();

        assert!(script.text.contains("(declare-fun x () Int)"));
        assert!(script.text.contains("(assert (>= x 0))"));
        // The query predicate is negated: the solver hunts the flip side.
        assert!(script.text.contains("(assert (= x 7))"));
        assert!(script.text.contains("(check-sat)"));
        assert!(script.text.contains("(get-value (x))"));
        assert_eq!(script.vars, vec![("x".to_string(), Sort::Int)]);
        assert_eq!(script.query_text, "(= x 7)");
    }

    #[test]
    fn test_cvc_script_has_header() {
        let (asserts, query) = str_query();
        let script = CVC_ADAPTER.render(&asserts, &query).unwrap();

        assert!(script.text.starts_with("(set-logic ALL)"));
        assert!(script.text.contains("(set-option :produce-models true)"));
        assert!(script.text.contains("(declare-fun s () String)"));
        assert!(script.text.contains("(assert (str.contains s \":\"))"));
    }

    #[test]
    fn test_z3str2_script_uses_legacy_forms() {
        let (asserts, query) = str_query();
        let script = Z3STR2_ADAPTER.render(&asserts, &query).unwrap();

        assert!(script.text.contains("(declare-variable s String)"));
        assert!(script.text.contains("(assert (Contains s \":\"))"));
        assert!(script.text.contains("(get-model)"));
        assert!(!script.text.contains("set-logic"));
    }

    #[test]
    fn test_standard_parse_outcomes() {
        let (asserts, query) = int_query();
        let script = Z3_ADAPTER.render(&asserts, &query).unwrap();

        assert_eq!(Z3_ADAPTER.parse(&script, "unsat\n"), SmtOutcome::Unsat);
        assert_eq!(Z3_ADAPTER.parse(&script, "unknown\n"), SmtOutcome::Unknown);
        assert_eq!(Z3_ADAPTER.parse(&script, "timeout\n"), SmtOutcome::Unknown);

        match Z3_ADAPTER.parse(&script, "sat\n((x 7))\n") {
            SmtOutcome::Sat(model) => assert_eq!(model.get("x"), Some(&SymValue::Int(7))),
            other => panic!("expected sat, got {:?}", other),
        }
    }

    #[test]
    fn test_z3str2_parse_sat_model() {
        let s = SymStr::variable("s", "");
        let x = SymInt::variable("x", 0);
        let query = Predicate::new(
            s.len().eq(&x).node().clone(),
            false,
        );
        let script = Z3STR2_ADAPTER.render(&[], &query).unwrap();

        let stdout = ">> SAT\n\nx : int -> -3\ns : string -> \"a b\\\\c\"\n";
        match Z3STR2_ADAPTER.parse(&script, stdout) {
            SmtOutcome::Sat(model) => {
                assert_eq!(model.get("x"), Some(&SymValue::Int(-3)));
                assert_eq!(model.get("s"), Some(&SymValue::from("a b\\c")));
            }
            other => panic!("expected sat, got {:?}", other),
        }
    }

    #[test]
    fn test_z3str2_parse_no_sat_marker_is_unsat() {
        let (_, query) = str_query();
        let script = Z3STR2_ADAPTER.render(&[], &query).unwrap();
        assert_eq!(
            Z3STR2_ADAPTER.parse(&script, ">> UNSAT\n"),
            SmtOutcome::Unsat
        );
    }

    #[test]
    fn test_vars_are_deduplicated_across_asserts() {
        let x = SymInt::variable("x", 0);
        let a1 = Predicate::new(x.ge(&SymInt::lit(0)).node().clone(), true);
        let a2 = Predicate::new(x.le(&SymInt::lit(9)).node().clone(), true);
        let query = Predicate::new(x.eq(&SymInt::lit(7)).node().clone(), false);

        let script = Z3_ADAPTER.render(&[a1, a2], &query).unwrap();
        assert_eq!(script.vars.len(), 1);
        assert_eq!(script.text.matches("declare-fun").count(), 1);
    }
}
