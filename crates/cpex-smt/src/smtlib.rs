// SPDX-License-Identifier: AGPL-3.0

//! SMT-LIB2 rendering of symbolic expressions, per solver dialect.

use crate::adapter::RenderError;
use cpex_symbolic::{ArithOp, CmpOp, Sort, SymExpr};
use cpex_tree::Predicate;

/// Output dialects. `Z3` and `Cvc` are standard SMT-LIB2 with different
/// operator coverage; `Z3Str2` is the legacy string-solver dialect with
/// renamed string operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Z3,
    Cvc,
    Z3Str2,
}

pub fn sort_name(sort: Sort) -> &'static str {
    match sort {
        Sort::Int => "Int",
        Sort::Str => "String",
        Sort::Bool => "Bool",
    }
}

/// Render a predicate: the expression itself for a taken-true branch, its
/// negation otherwise.
pub fn render_predicate(predicate: &Predicate, dialect: Dialect) -> Result<String, RenderError> {
    let body = render_expr(&predicate.expr, dialect)?;
    if predicate.result {
        Ok(body)
    } else {
        Ok(format!("(not {})", body))
    }
}

pub fn render_expr(expr: &SymExpr, dialect: Dialect) -> Result<String, RenderError> {
    let rendered = match expr {
        SymExpr::IntConst(v) => {
            if *v < 0 {
                format!("(- {})", v.unsigned_abs())
            } else {
                format!("{}", v)
            }
        }
        SymExpr::StrConst(s) => quote_string(s, dialect),
        SymExpr::Var { name, .. } => name.clone(),
        SymExpr::Arith { op, lhs, rhs } => {
            let sym = match op {
                ArithOp::Add => "+",
                ArithOp::Sub => "-",
                ArithOp::Mul => "*",
                ArithOp::Div => "div",
                ArithOp::Rem => "mod",
            };
            format!(
                "({} {} {})",
                sym,
                render_expr(lhs, dialect)?,
                render_expr(rhs, dialect)?
            )
        }
        SymExpr::Neg(a) => format!("(- {})", render_expr(a, dialect)?),
        SymExpr::Abs(a) => format!("(abs {})", render_expr(a, dialect)?),
        SymExpr::Length(a) => {
            let op = match dialect {
                Dialect::Z3Str2 => "Length",
                _ => "str.len",
            };
            format!("({} {})", op, render_expr(a, dialect)?)
        }
        SymExpr::IndexOf { string, needle } => {
            let op = match dialect {
                Dialect::Z3Str2 => "Indexof2",
                _ => "str.indexof",
            };
            format!(
                "({} {} {} 0)",
                op,
                render_expr(string, dialect)?,
                render_expr(needle, dialect)?
            )
        }
        SymExpr::Concat(a, b) => {
            let op = match dialect {
                Dialect::Z3Str2 => "Concat",
                _ => "str.++",
            };
            format!(
                "({} {} {})",
                op,
                render_expr(a, dialect)?,
                render_expr(b, dialect)?
            )
        }
        SymExpr::Substr { string, offset, length } => {
            let op = match dialect {
                Dialect::Z3Str2 => "Substring",
                _ => "str.substr",
            };
            format!(
                "({} {} {} {})",
                op,
                render_expr(string, dialect)?,
                render_expr(offset, dialect)?,
                render_expr(length, dialect)?
            )
        }
        SymExpr::CharAt { string, index } => {
            let op = match dialect {
                Dialect::Z3Str2 => "CharAt",
                _ => "str.at",
            };
            format!(
                "({} {} {})",
                op,
                render_expr(string, dialect)?,
                render_expr(index, dialect)?
            )
        }
        SymExpr::Replace { string, from, to } => {
            let op = match dialect {
                Dialect::Z3Str2 => "Replace",
                _ => "str.replace",
            };
            format!(
                "({} {} {} {})",
                op,
                render_expr(string, dialect)?,
                render_expr(from, dialect)?,
                render_expr(to, dialect)?
            )
        }
        SymExpr::Lower(a) => match dialect {
            Dialect::Cvc => format!("(str.to_lower {})", render_expr(a, dialect)?),
            _ => return Err(RenderError::Unsupported("str.to_lower")),
        },
        SymExpr::Contains { string, needle } => {
            let op = match dialect {
                Dialect::Z3Str2 => "Contains",
                _ => "str.contains",
            };
            format!(
                "({} {} {})",
                op,
                render_expr(string, dialect)?,
                render_expr(needle, dialect)?
            )
        }
        SymExpr::Cmp { op, lhs, rhs } => {
            let lhs = render_expr(lhs, dialect)?;
            let rhs = render_expr(rhs, dialect)?;
            match op {
                CmpOp::Eq => format!("(= {} {})", lhs, rhs),
                CmpOp::Ne => format!("(not (= {} {}))", lhs, rhs),
                CmpOp::Lt => format!("(< {} {})", lhs, rhs),
                CmpOp::Le => format!("(<= {} {})", lhs, rhs),
                CmpOp::Gt => format!("(> {} {})", lhs, rhs),
                CmpOp::Ge => format!("(>= {} {})", lhs, rhs),
            }
        }
        SymExpr::Not(a) => format!("(not {})", render_expr(a, dialect)?),
        SymExpr::And(a, b) => format!(
            "(and {} {})",
            render_expr(a, dialect)?,
            render_expr(b, dialect)?
        ),
        SymExpr::Or(a, b) => format!(
            "(or {} {})",
            render_expr(a, dialect)?,
            render_expr(b, dialect)?
        ),
    };
    Ok(rendered)
}

/// SMT-LIB2 doubles embedded quotes; the legacy dialect uses backslash
/// escapes instead.
fn quote_string(s: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::Z3Str2 => format!(
            "\"{}\"",
            s.replace('\\', "\\\\").replace('"', "\\\"")
        ),
        _ => format!("\"{}\"", s.replace('"', "\"\"")),
    }
}
