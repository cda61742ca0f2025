// SPDX-License-Identifier: AGPL-3.0

//! Concolic wrappers: concrete values paired with their symbolic mirror.
//!
//! String positions and lengths are counted in characters, matching the
//! semantics SMT string theories use; out-of-range accesses yield the empty
//! string rather than failing.

use crate::expr::{ArithOp, CmpOp, Sort, SymExpr, SymNode};
use crate::sink;
use std::panic::Location;
use std::sync::Arc;

/// A concolic integer.
#[derive(Debug, Clone)]
pub struct SymInt {
    node: SymNode,
    concrete: i64,
}

/// A concolic string.
#[derive(Debug, Clone)]
pub struct SymStr {
    node: SymNode,
    concrete: String,
}

/// A concolic boolean, produced by comparisons. Calling [`SymBool::branch`]
/// is the only way control flow may depend on it.
#[derive(Debug, Clone)]
pub struct SymBool {
    node: SymNode,
    concrete: bool,
}

impl SymInt {
    pub fn variable(name: &str, value: i64) -> Self {
        SymInt {
            node: Arc::new(SymExpr::Var {
                name: name.to_string(),
                sort: Sort::Int,
            }),
            concrete: value,
        }
    }

    pub fn lit(value: i64) -> Self {
        SymInt {
            node: Arc::new(SymExpr::IntConst(value)),
            concrete: value,
        }
    }

    pub fn node(&self) -> &SymNode {
        &self.node
    }

    pub fn concrete(&self) -> i64 {
        self.concrete
    }

    fn arith(&self, op: ArithOp, other: &SymInt, concrete: i64) -> SymInt {
        SymInt {
            node: Arc::new(SymExpr::Arith {
                op,
                lhs: self.node.clone(),
                rhs: other.node.clone(),
            }),
            concrete,
        }
    }

    pub fn add(&self, other: &SymInt) -> SymInt {
        self.arith(ArithOp::Add, other, self.concrete.wrapping_add(other.concrete))
    }

    pub fn sub(&self, other: &SymInt) -> SymInt {
        self.arith(ArithOp::Sub, other, self.concrete.wrapping_sub(other.concrete))
    }

    pub fn mul(&self, other: &SymInt) -> SymInt {
        self.arith(ArithOp::Mul, other, self.concrete.wrapping_mul(other.concrete))
    }

    pub fn div(&self, other: &SymInt) -> SymInt {
        let concrete = if other.concrete == 0 {
            0
        } else {
            self.concrete.wrapping_div(other.concrete)
        };
        self.arith(ArithOp::Div, other, concrete)
    }

    pub fn rem(&self, other: &SymInt) -> SymInt {
        let concrete = if other.concrete == 0 {
            0
        } else {
            self.concrete.wrapping_rem(other.concrete)
        };
        self.arith(ArithOp::Rem, other, concrete)
    }

    pub fn neg(&self) -> SymInt {
        SymInt {
            node: Arc::new(SymExpr::Neg(self.node.clone())),
            concrete: self.concrete.wrapping_neg(),
        }
    }

    pub fn abs(&self) -> SymInt {
        SymInt {
            node: Arc::new(SymExpr::Abs(self.node.clone())),
            concrete: self.concrete.wrapping_abs(),
        }
    }

    fn cmp(&self, op: CmpOp, other: &SymInt, concrete: bool) -> SymBool {
        SymBool {
            node: Arc::new(SymExpr::Cmp {
                op,
                lhs: self.node.clone(),
                rhs: other.node.clone(),
            }),
            concrete,
        }
    }

    pub fn eq(&self, other: &SymInt) -> SymBool {
        self.cmp(CmpOp::Eq, other, self.concrete == other.concrete)
    }

    pub fn ne(&self, other: &SymInt) -> SymBool {
        self.cmp(CmpOp::Ne, other, self.concrete != other.concrete)
    }

    pub fn lt(&self, other: &SymInt) -> SymBool {
        self.cmp(CmpOp::Lt, other, self.concrete < other.concrete)
    }

    pub fn le(&self, other: &SymInt) -> SymBool {
        self.cmp(CmpOp::Le, other, self.concrete <= other.concrete)
    }

    pub fn gt(&self, other: &SymInt) -> SymBool {
        self.cmp(CmpOp::Gt, other, self.concrete > other.concrete)
    }

    pub fn ge(&self, other: &SymInt) -> SymBool {
        self.cmp(CmpOp::Ge, other, self.concrete >= other.concrete)
    }
}

fn char_len(s: &str) -> i64 {
    s.chars().count() as i64
}

/// Character slice `[start, start + len)`, clamped the way str.substr is.
fn char_slice(s: &str, start: i64, len: i64) -> String {
    if start < 0 || len <= 0 || start >= char_len(s) {
        return String::new();
    }
    s.chars().skip(start as usize).take(len as usize).collect()
}

impl SymStr {
    pub fn variable(name: &str, value: &str) -> Self {
        SymStr {
            node: Arc::new(SymExpr::Var {
                name: name.to_string(),
                sort: Sort::Str,
            }),
            concrete: value.to_string(),
        }
    }

    pub fn lit(value: &str) -> Self {
        SymStr {
            node: Arc::new(SymExpr::StrConst(value.to_string())),
            concrete: value.to_string(),
        }
    }

    pub fn node(&self) -> &SymNode {
        &self.node
    }

    pub fn concrete(&self) -> &str {
        &self.concrete
    }

    pub fn len(&self) -> SymInt {
        SymInt {
            node: Arc::new(SymExpr::Length(self.node.clone())),
            concrete: char_len(&self.concrete),
        }
    }

    pub fn concat(&self, other: &SymStr) -> SymStr {
        SymStr {
            node: Arc::new(SymExpr::Concat(self.node.clone(), other.node.clone())),
            concrete: format!("{}{}", self.concrete, other.concrete),
        }
    }

    pub fn contains(&self, needle: &SymStr) -> SymBool {
        SymBool {
            node: Arc::new(SymExpr::Contains {
                string: self.node.clone(),
                needle: needle.node.clone(),
            }),
            concrete: self.concrete.contains(&needle.concrete),
        }
    }

    /// Character index of the first occurrence of `needle`, -1 when absent.
    pub fn find(&self, needle: &SymStr) -> SymInt {
        let concrete = match self.concrete.find(&needle.concrete) {
            Some(byte_idx) => char_len(&self.concrete[..byte_idx]),
            None => -1,
        };
        SymInt {
            node: Arc::new(SymExpr::IndexOf {
                string: self.node.clone(),
                needle: needle.node.clone(),
            }),
            concrete,
        }
    }

    /// The one-character string at `index`, empty when out of range.
    pub fn char_at(&self, index: &SymInt) -> SymStr {
        SymStr {
            node: Arc::new(SymExpr::CharAt {
                string: self.node.clone(),
                index: index.node.clone(),
            }),
            concrete: char_slice(&self.concrete, index.concrete, 1),
        }
    }

    /// Convenience for concrete loop counters.
    pub fn char_at_index(&self, index: i64) -> SymStr {
        self.char_at(&SymInt::lit(index))
    }

    pub fn substr(&self, offset: &SymInt, length: &SymInt) -> SymStr {
        SymStr {
            node: Arc::new(SymExpr::Substr {
                string: self.node.clone(),
                offset: offset.node.clone(),
                length: length.node.clone(),
            }),
            concrete: char_slice(&self.concrete, offset.concrete, length.concrete),
        }
    }

    /// Replace the first occurrence of `from`, like str.replace. An empty
    /// `from` prepends `to`.
    pub fn replace(&self, from: &SymStr, to: &SymStr) -> SymStr {
        let concrete = if from.concrete.is_empty() {
            format!("{}{}", to.concrete, self.concrete)
        } else {
            self.concrete.replacen(&from.concrete, &to.concrete, 1)
        };
        SymStr {
            node: Arc::new(SymExpr::Replace {
                string: self.node.clone(),
                from: from.node.clone(),
                to: to.node.clone(),
            }),
            concrete,
        }
    }

    pub fn lower(&self) -> SymStr {
        SymStr {
            node: Arc::new(SymExpr::Lower(self.node.clone())),
            concrete: self.concrete.to_lowercase(),
        }
    }

    pub fn eq(&self, other: &SymStr) -> SymBool {
        SymBool {
            node: Arc::new(SymExpr::Cmp {
                op: CmpOp::Eq,
                lhs: self.node.clone(),
                rhs: other.node.clone(),
            }),
            concrete: self.concrete == other.concrete,
        }
    }

    pub fn ne(&self, other: &SymStr) -> SymBool {
        SymBool {
            node: Arc::new(SymExpr::Cmp {
                op: CmpOp::Ne,
                lhs: self.node.clone(),
                rhs: other.node.clone(),
            }),
            concrete: self.concrete != other.concrete,
        }
    }

    /// String truthiness: non-empty.
    pub fn truthy(&self) -> SymBool {
        self.len().gt(&SymInt::lit(0))
    }

    pub fn is_empty(&self) -> SymBool {
        self.len().eq(&SymInt::lit(0))
    }
}

impl SymBool {
    pub fn node(&self) -> &SymNode {
        &self.node
    }

    pub fn concrete(&self) -> bool {
        self.concrete
    }

    /// Branch on this condition: report the taken direction to the current
    /// branch sink, then yield the concrete truth value. The caller's
    /// location becomes the branch's source site. Conditions without input
    /// variables are plain boolean reads.
    #[track_caller]
    pub fn branch(&self) -> bool {
        if self.node.has_vars() {
            sink::report(self.concrete, &self.node, Location::caller());
        }
        self.concrete
    }

    pub fn and(&self, other: &SymBool) -> SymBool {
        SymBool {
            node: Arc::new(SymExpr::And(self.node.clone(), other.node.clone())),
            concrete: self.concrete && other.concrete,
        }
    }

    pub fn or(&self, other: &SymBool) -> SymBool {
        SymBool {
            node: Arc::new(SymExpr::Or(self.node.clone(), other.node.clone())),
            concrete: self.concrete || other.concrete,
        }
    }
}

impl std::ops::Not for &SymBool {
    type Output = SymBool;

    fn not(self) -> SymBool {
        SymBool {
            node: Arc::new(SymExpr::Not(self.node.clone())),
            concrete: !self.concrete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic_tracks_concrete() {
        let a = SymInt::variable("a", 4);
        let b = SymInt::lit(3);

        assert_eq!(a.add(&b).concrete(), 7);
        assert_eq!(a.sub(&b).concrete(), 1);
        assert_eq!(a.mul(&b).concrete(), 12);
        assert_eq!(a.div(&b).concrete(), 1);
        assert_eq!(a.rem(&b).concrete(), 1);
        assert_eq!(a.neg().concrete(), -4);
        assert_eq!(a.neg().abs().concrete(), 4);
    }

    #[test]
    fn test_division_by_zero_is_total() {
        let a = SymInt::lit(9);
        let zero = SymInt::lit(0);
        assert_eq!(a.div(&zero).concrete(), 0);
        assert_eq!(a.rem(&zero).concrete(), 0);
    }

    #[test]
    fn test_int_comparisons() {
        let a = SymInt::variable("a", 4);
        assert!(a.eq(&SymInt::lit(4)).concrete());
        assert!(a.ne(&SymInt::lit(5)).concrete());
        assert!(a.lt(&SymInt::lit(5)).concrete());
        assert!(!a.gt(&SymInt::lit(5)).concrete());
        assert_eq!(a.lt(&SymInt::lit(5)).node().to_string(), "(< a 5)");
    }

    #[test]
    fn test_string_basics() {
        let s = SymStr::variable("s", "foo");
        assert_eq!(s.len().concrete(), 3);
        assert_eq!(s.concat(&SymStr::lit("E")).concrete(), "fooE");
        assert!(s.contains(&SymStr::lit("oo")).concrete());
        assert!(s.truthy().concrete());
        assert!(SymStr::lit("").is_empty().concrete());
    }

    #[test]
    fn test_find_counts_characters() {
        let s = SymStr::lit("ab:cd");
        assert_eq!(s.find(&SymStr::lit(":")).concrete(), 2);
        assert_eq!(s.find(&SymStr::lit("x")).concrete(), -1);
    }

    #[test]
    fn test_char_at_out_of_range_is_empty() {
        let s = SymStr::lit("ab");
        assert_eq!(s.char_at_index(0).concrete(), "a");
        assert_eq!(s.char_at_index(1).concrete(), "b");
        assert_eq!(s.char_at_index(2).concrete(), "");
        assert_eq!(s.char_at(&SymInt::lit(-1)).concrete(), "");
    }

    #[test]
    fn test_substr_clamps() {
        let s = SymStr::lit("abcdef");
        assert_eq!(s.substr(&SymInt::lit(1), &SymInt::lit(3)).concrete(), "bcd");
        assert_eq!(s.substr(&SymInt::lit(4), &SymInt::lit(10)).concrete(), "ef");
        assert_eq!(s.substr(&SymInt::lit(9), &SymInt::lit(2)).concrete(), "");
        assert_eq!(s.substr(&SymInt::lit(0), &SymInt::lit(0)).concrete(), "");
    }

    #[test]
    fn test_replace_first_occurrence_only() {
        let s = SymStr::lit("aXbXc");
        let out = s.replace(&SymStr::lit("X"), &SymStr::lit("-"));
        assert_eq!(out.concrete(), "a-bXc");

        let prefixed = s.replace(&SymStr::lit(""), &SymStr::lit(">"));
        assert_eq!(prefixed.concrete(), ">aXbXc");
    }

    #[test]
    fn test_lower() {
        let s = SymStr::lit("HeLLo");
        assert_eq!(s.lower().concrete(), "hello");
        assert_eq!(s.lower().node().to_string(), "(lower \"HeLLo\")");
    }

    #[test]
    fn test_bool_combinators() {
        let t = SymInt::lit(1).eq(&SymInt::lit(1));
        let f = SymInt::lit(1).eq(&SymInt::lit(2));

        assert!(t.and(&t).concrete());
        assert!(!t.and(&f).concrete());
        assert!(t.or(&f).concrete());
        assert!((!&f).concrete());
        assert_eq!((!&f).node().to_string(), "(not (= 1 2))");
    }
}
