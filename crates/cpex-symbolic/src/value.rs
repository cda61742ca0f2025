// SPDX-License-Identifier: AGPL-3.0

//! Concrete base-type values exchanged with solvers and invocations.

use crate::expr::Sort;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete value of one of the supported base types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymValue {
    Int(i64),
    Str(String),
}

impl SymValue {
    pub fn sort(&self) -> Sort {
        match self {
            SymValue::Int(_) => Sort::Int,
            SymValue::Str(_) => Sort::Str,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SymValue::Int(v) => Some(*v),
            SymValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SymValue::Int(_) => None,
            SymValue::Str(s) => Some(s),
        }
    }
}

impl fmt::Display for SymValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymValue::Int(v) => write!(f, "{}", v),
            SymValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for SymValue {
    fn from(v: i64) -> Self {
        SymValue::Int(v)
    }
}

impl From<&str> for SymValue {
    fn from(v: &str) -> Self {
        SymValue::Str(v.to_string())
    }
}

impl From<String> for SymValue {
    fn from(v: String) -> Self {
        SymValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorts() {
        assert_eq!(SymValue::Int(3).sort(), Sort::Int);
        assert_eq!(SymValue::from("foo").sort(), Sort::Str);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(SymValue::Int(-4).as_int(), Some(-4));
        assert_eq!(SymValue::Int(-4).as_str(), None);
        assert_eq!(SymValue::from("xy").as_str(), Some("xy"));
    }

    #[test]
    fn test_display() {
        assert_eq!(SymValue::Int(14).to_string(), "14");
        assert_eq!(SymValue::from("XIV").to_string(), "\"XIV\"");
    }
}
