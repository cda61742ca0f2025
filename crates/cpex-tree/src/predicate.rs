// SPDX-License-Identifier: AGPL-3.0

use cpex_symbolic::{Sort, SymNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A symbolic boolean expression paired with the branch direction taken.
/// Immutable after construction; equality is structural on both parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub expr: SymNode,
    pub result: bool,
}

impl Predicate {
    pub fn new(expr: SymNode, result: bool) -> Self {
        Predicate { expr, result }
    }

    /// The same expression with the direction inverted.
    pub fn negated(&self) -> Predicate {
        Predicate {
            expr: self.expr.clone(),
            result: !self.result,
        }
    }

    /// Input variables referenced by the expression.
    pub fn vars(&self) -> BTreeSet<(String, Sort)> {
        self.expr.vars()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.result {
            write!(f, "{}", self.expr)
        } else {
            write!(f, "Not({})", self.expr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpex_symbolic::SymInt;

    fn sample() -> Predicate {
        let x = SymInt::variable("x", 0);
        Predicate::new(x.eq(&SymInt::lit(7)).node().clone(), true)
    }

    #[test]
    fn test_negated_flips_direction_only() {
        let p = sample();
        let n = p.negated();
        assert_eq!(p.expr, n.expr);
        assert!(p.result);
        assert!(!n.result);
        assert_eq!(n.negated(), p);
    }

    #[test]
    fn test_equality_is_structural() {
        assert_eq!(sample(), sample());
        assert_ne!(sample(), sample().negated());
    }

    #[test]
    fn test_display() {
        let p = sample();
        assert_eq!(p.to_string(), "(= x 7)");
        assert_eq!(p.negated().to_string(), "Not((= x 7))");
    }

    #[test]
    fn test_vars() {
        let vars = sample().vars();
        assert_eq!(vars.len(), 1);
        assert!(vars.iter().any(|(name, _)| name == "x"));
    }
}
