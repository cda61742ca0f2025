// SPDX-License-Identifier: AGPL-3.0

use crate::tree::ConstraintId;
use std::cmp::Ordering;

/// Priority-queue element for an unsolved constraint.
///
/// Ordered for a max-heap so that the smallest candidate timeout pops
/// first; ties go to the longer path (deepest-first bias), then to the
/// smaller id for determinism.
#[derive(Debug, Clone, Copy)]
pub struct PendingConstraint {
    pub timeout: f64,
    pub depth: usize,
    pub id: ConstraintId,
}

impl PendingConstraint {
    pub fn new(timeout: f64, depth: usize, id: ConstraintId) -> Self {
        PendingConstraint { timeout, depth, id }
    }
}

impl Ord for PendingConstraint {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timeout
            .total_cmp(&self.timeout)
            .then_with(|| self.depth.cmp(&other.depth))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for PendingConstraint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingConstraint {}
