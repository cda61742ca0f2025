// SPDX-License-Identifier: AGPL-3.0

//! Symbolic expression trees and the concolic value wrappers built on them.
//!
//! A concolic value carries both a concrete value (used to actually run the
//! program) and a symbolic mirror (an immutable [`SymExpr`] tree behind an
//! `Arc`). Branching on a [`SymBool`] reports the decision to the installed
//! [`BranchSink`] before yielding the concrete truth value.

mod concolic;
mod expr;
mod sink;
mod value;

pub use concolic::{SymBool, SymInt, SymStr};
pub use expr::{ArithOp, CmpOp, Sort, SymExpr, SymNode};
pub use sink::{with_sink, BranchSink};
pub use value::SymValue;
