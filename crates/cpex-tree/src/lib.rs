// SPDX-License-Identifier: AGPL-3.0

//! The constraint tree: every path predicate discovered so far, sharing
//! common prefixes, plus the priority element used to order unsolved
//! constraints.

mod pending;
mod predicate;
mod tree;

pub use pending::PendingConstraint;
pub use predicate::Predicate;
pub use tree::{format_inputs, Constraint, ConstraintId, ConstraintTree, InputMap};
