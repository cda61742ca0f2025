// SPDX-License-Identifier: AGPL-3.0

//! The program registry: names mapped to invocation builders and oracles.

use crate::{ExecutionResult, FunctionInvocation, RunValue};
use cpex_exceptions::{SetupError, SetupResult};
use std::collections::BTreeSet;

/// Expected-result oracle consulted once exploration finishes.
pub enum Oracle {
    /// The set of distinct results exploration must discover, exactly.
    Set(fn() -> BTreeSet<RunValue>),
    /// The multiset of results across all iterations, exactly.
    Bag(fn() -> Vec<RunValue>),
}

/// A registered program under test.
pub struct ProgramSpec {
    pub name: &'static str,
    pub build: fn() -> FunctionInvocation,
    pub oracle: Option<Oracle>,
}

/// Look up a registered program by name.
pub fn find_program(name: &str) -> SetupResult<&'static ProgramSpec> {
    crate::PROGRAMS
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| SetupError::UnknownProgram(name.to_string()))
}

/// Check observed results against an oracle. Any captured exception fails
/// the oracle outright.
pub fn oracle_passed(oracle: &Oracle, results: &[ExecutionResult]) -> bool {
    if results.iter().any(|r| r.value().is_none()) {
        return false;
    }
    match oracle {
        Oracle::Set(expected) => {
            let observed: BTreeSet<RunValue> =
                results.iter().filter_map(|r| r.value().cloned()).collect();
            observed == expected()
        }
        Oracle::Bag(expected) => {
            let mut observed: Vec<RunValue> =
                results.iter().filter_map(|r| r.value().cloned()).collect();
            let mut expected = expected();
            observed.sort();
            expected.sort();
            observed == expected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_one() -> BTreeSet<RunValue> {
        [RunValue::Int(0), RunValue::Int(1)].into_iter().collect()
    }

    fn one_zero_bag() -> Vec<RunValue> {
        vec![RunValue::Int(1), RunValue::Int(0)]
    }

    fn values(values: &[RunValue]) -> Vec<ExecutionResult> {
        values.iter().cloned().map(ExecutionResult::Value).collect()
    }

    #[test]
    fn test_find_program() {
        assert!(find_program("escape").is_ok());
        assert!(matches!(
            find_program("no_such_program"),
            Err(SetupError::UnknownProgram(_))
        ));
    }

    #[test]
    fn test_set_oracle_ignores_multiplicity() {
        let oracle = Oracle::Set(zero_one);
        let results = values(&[RunValue::Int(0), RunValue::Int(1), RunValue::Int(0)]);
        assert!(oracle_passed(&oracle, &results));
    }

    #[test]
    fn test_set_oracle_requires_exact_set() {
        let oracle = Oracle::Set(zero_one);
        assert!(!oracle_passed(&oracle, &values(&[RunValue::Int(0)])));
        assert!(!oracle_passed(
            &oracle,
            &values(&[RunValue::Int(0), RunValue::Int(1), RunValue::Int(2)])
        ));
    }

    #[test]
    fn test_bag_oracle_counts_multiplicity() {
        let oracle = Oracle::Bag(one_zero_bag);
        assert!(oracle_passed(
            &oracle,
            &values(&[RunValue::Int(0), RunValue::Int(1)])
        ));
        assert!(!oracle_passed(
            &oracle,
            &values(&[RunValue::Int(0), RunValue::Int(1), RunValue::Int(1)])
        ));
    }

    #[test]
    fn test_exceptions_fail_oracles() {
        let oracle = Oracle::Set(zero_one);
        let mut results = values(&[RunValue::Int(0), RunValue::Int(1)]);
        results.push(ExecutionResult::Exception {
            message: "boom".to_string(),
            site: "demo.rs:1".to_string(),
        });
        assert!(!oracle_passed(&oracle, &results));
    }
}
