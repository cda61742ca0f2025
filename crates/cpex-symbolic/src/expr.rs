// SPDX-License-Identifier: AGPL-3.0

//! The symbolic expression tree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Shared handle to an expression node. Expressions are immutable after
/// construction, so handles can be cloned freely across the tree, the
/// recorder and solver jobs.
pub type SymNode = Arc<SymExpr>;

/// Result sort of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sort {
    Int,
    Str,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A node in a symbolic expression. Integer arithmetic, string operations,
/// comparisons, constants and input variables; nothing else is needed to
/// mirror the operations the instrumented programs perform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymExpr {
    IntConst(i64),
    StrConst(String),
    Var { name: String, sort: Sort },
    Arith { op: ArithOp, lhs: SymNode, rhs: SymNode },
    Neg(SymNode),
    Abs(SymNode),
    Length(SymNode),
    IndexOf { string: SymNode, needle: SymNode },
    Concat(SymNode, SymNode),
    Substr { string: SymNode, offset: SymNode, length: SymNode },
    CharAt { string: SymNode, index: SymNode },
    Replace { string: SymNode, from: SymNode, to: SymNode },
    Lower(SymNode),
    Contains { string: SymNode, needle: SymNode },
    Cmp { op: CmpOp, lhs: SymNode, rhs: SymNode },
    Not(SymNode),
    And(SymNode, SymNode),
    Or(SymNode, SymNode),
}

impl SymExpr {
    /// Result sort of this node.
    pub fn sort(&self) -> Sort {
        match self {
            SymExpr::IntConst(_)
            | SymExpr::Arith { .. }
            | SymExpr::Neg(_)
            | SymExpr::Abs(_)
            | SymExpr::Length(_)
            | SymExpr::IndexOf { .. } => Sort::Int,
            SymExpr::StrConst(_)
            | SymExpr::Concat(..)
            | SymExpr::Substr { .. }
            | SymExpr::CharAt { .. }
            | SymExpr::Replace { .. }
            | SymExpr::Lower(_) => Sort::Str,
            SymExpr::Contains { .. }
            | SymExpr::Cmp { .. }
            | SymExpr::Not(_)
            | SymExpr::And(..)
            | SymExpr::Or(..) => Sort::Bool,
            SymExpr::Var { sort, .. } => *sort,
        }
    }

    /// Names and sorts of all input variables referenced by this expression.
    pub fn vars(&self) -> BTreeSet<(String, Sort)> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    /// Whether any input variable occurs in this expression. Branches on
    /// fully-concrete conditions carry no information for the solver and
    /// are not reported.
    pub fn has_vars(&self) -> bool {
        match self {
            SymExpr::IntConst(_) | SymExpr::StrConst(_) => false,
            SymExpr::Var { .. } => true,
            SymExpr::Arith { lhs, rhs, .. } | SymExpr::Cmp { lhs, rhs, .. } => {
                lhs.has_vars() || rhs.has_vars()
            }
            SymExpr::Neg(a) | SymExpr::Abs(a) | SymExpr::Length(a) | SymExpr::Lower(a) | SymExpr::Not(a) => {
                a.has_vars()
            }
            SymExpr::IndexOf { string, needle } | SymExpr::Contains { string, needle } => {
                string.has_vars() || needle.has_vars()
            }
            SymExpr::Concat(a, b) | SymExpr::And(a, b) | SymExpr::Or(a, b) => {
                a.has_vars() || b.has_vars()
            }
            SymExpr::Substr { string, offset, length } => {
                string.has_vars() || offset.has_vars() || length.has_vars()
            }
            SymExpr::CharAt { string, index } => string.has_vars() || index.has_vars(),
            SymExpr::Replace { string, from, to } => {
                string.has_vars() || from.has_vars() || to.has_vars()
            }
        }
    }

    fn collect_vars(&self, out: &mut BTreeSet<(String, Sort)>) {
        match self {
            SymExpr::IntConst(_) | SymExpr::StrConst(_) => {}
            SymExpr::Var { name, sort } => {
                out.insert((name.clone(), *sort));
            }
            SymExpr::Arith { lhs, rhs, .. } | SymExpr::Cmp { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
            SymExpr::Neg(a) | SymExpr::Abs(a) | SymExpr::Length(a) | SymExpr::Lower(a) | SymExpr::Not(a) => {
                a.collect_vars(out);
            }
            SymExpr::IndexOf { string, needle } | SymExpr::Contains { string, needle } => {
                string.collect_vars(out);
                needle.collect_vars(out);
            }
            SymExpr::Concat(a, b) | SymExpr::And(a, b) | SymExpr::Or(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            SymExpr::Substr { string, offset, length } => {
                string.collect_vars(out);
                offset.collect_vars(out);
                length.collect_vars(out);
            }
            SymExpr::CharAt { string, index } => {
                string.collect_vars(out);
                index.collect_vars(out);
            }
            SymExpr::Replace { string, from, to } => {
                string.collect_vars(out);
                from.collect_vars(out);
                to.collect_vars(out);
            }
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymExpr::IntConst(v) => write!(f, "{}", v),
            SymExpr::StrConst(s) => write!(f, "{}", quote(s)),
            SymExpr::Var { name, .. } => write!(f, "{}", name),
            SymExpr::Arith { op, lhs, rhs } => {
                let sym = match op {
                    ArithOp::Add => "+",
                    ArithOp::Sub => "-",
                    ArithOp::Mul => "*",
                    ArithOp::Div => "div",
                    ArithOp::Rem => "mod",
                };
                write!(f, "({} {} {})", sym, lhs, rhs)
            }
            SymExpr::Neg(a) => write!(f, "(- {})", a),
            SymExpr::Abs(a) => write!(f, "(abs {})", a),
            SymExpr::Length(a) => write!(f, "(len {})", a),
            SymExpr::IndexOf { string, needle } => write!(f, "(find {} {})", string, needle),
            SymExpr::Concat(a, b) => write!(f, "(concat {} {})", a, b),
            SymExpr::Substr { string, offset, length } => {
                write!(f, "(substr {} {} {})", string, offset, length)
            }
            SymExpr::CharAt { string, index } => write!(f, "(at {} {})", string, index),
            SymExpr::Replace { string, from, to } => write!(f, "(replace {} {} {})", string, from, to),
            SymExpr::Lower(a) => write!(f, "(lower {})", a),
            SymExpr::Contains { string, needle } => write!(f, "(contains {} {})", string, needle),
            SymExpr::Cmp { op, lhs, rhs } => {
                let sym = match op {
                    CmpOp::Eq => "=",
                    CmpOp::Ne => "!=",
                    CmpOp::Lt => "<",
                    CmpOp::Le => "<=",
                    CmpOp::Gt => ">",
                    CmpOp::Ge => ">=",
                };
                write!(f, "({} {} {})", sym, lhs, rhs)
            }
            SymExpr::Not(a) => write!(f, "(not {})", a),
            SymExpr::And(a, b) => write!(f, "(and {} {})", a, b),
            SymExpr::Or(a, b) => write!(f, "(or {} {})", a, b),
        }
    }
}
