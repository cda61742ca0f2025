// SPDX-License-Identifier: AGPL-3.0

//! Mirrors one concrete execution against the constraint tree.
//!
//! The recorder holds the tree root and a cursor that is reset to the root
//! before every run. Each branch the program takes either follows an
//! existing edge or grows a new child; new children are buffered for the
//! engine to enqueue. In replay mode the recorder checks that the run
//! follows the expected path and flips exactly the last branch.

use cpex_coverage::{CoverageData, CoverageMeter};
use cpex_logs::WarningCode;
use cpex_symbolic::{BranchSink, SymNode};
use cpex_tree::{ConstraintId, ConstraintTree, Predicate};
use std::panic::Location;

pub struct PathRecorder {
    name: String,
    tree: ConstraintTree,
    current: ConstraintId,
    expected_path: Option<Vec<Predicate>>,
    new_constraints: Vec<ConstraintId>,
    meter: CoverageMeter,
}

impl PathRecorder {
    pub fn new(name: &str) -> Self {
        PathRecorder {
            name: name.to_string(),
            tree: ConstraintTree::new(),
            current: ConstraintTree::ROOT,
            expected_path: None,
            new_constraints: Vec::new(),
            meter: CoverageMeter::new(),
        }
    }

    /// Rewind to the root for a fresh execution. When `expected` names a
    /// leaf, replay checking is armed: the run is expected to repeat that
    /// leaf's path and flip only its final branch.
    pub fn reset(&mut self, expected: Option<ConstraintId>) {
        self.current = ConstraintTree::ROOT;
        self.meter.reset();
        self.expected_path = expected.map(|leaf| {
            let mut stack = Vec::new();
            let mut cursor = Some(leaf);
            while let Some(id) = cursor {
                let node = self.tree.node(id);
                if let Some(predicate) = &node.predicate {
                    stack.push(predicate.clone());
                }
                cursor = node.parent;
            }
            stack
        });
    }

    /// Constraints created since the last drain, oldest first.
    pub fn drain_new(&mut self) -> Vec<ConstraintId> {
        std::mem::take(&mut self.new_constraints)
    }

    /// Coverage observed during the current run so far.
    pub fn run_coverage(&self) -> CoverageData {
        self.meter.snapshot()
    }

    pub fn tree(&self) -> &ConstraintTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ConstraintTree {
        &mut self.tree
    }

    pub fn current(&self) -> ConstraintId {
        self.current
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_dot(&self) -> String {
        self.tree.to_dot(&self.name)
    }

    fn check_replay(&mut self, taken: bool, expr: &SymNode) {
        let Some(stack) = self.expected_path.as_mut() else {
            return;
        };
        let Some(expected) = stack.pop() else {
            return;
        };
        let done = stack.is_empty();
        // Only the direction is compared, not the predicate itself: the
        // program may branch on a different expression than the model
        // anticipated.
        if (!done && expected.result != taken) || (done && expected.result == taken) {
            cpex_logs::warn_code(
                WarningCode::ReplayMismatch,
                &format!(
                    "Replay mismatch (done={}): expected {}, observed {}",
                    done,
                    expected,
                    Predicate::new(expr.clone(), taken)
                ),
                true,
            );
        }
    }
}

impl BranchSink for PathRecorder {
    fn which_branch(&mut self, taken: bool, expr: &SymNode, site: &'static Location<'static>) {
        self.meter.record(site.file(), site.line());

        let predicate = Predicate::new(expr.clone(), taken);
        let negated = self.tree.find_child(self.current, &predicate.negated());

        let child = match self.tree.find_child(self.current, &predicate) {
            Some(existing) => existing,
            None => {
                let branch_id = format!("{}:{}:{}", site.file(), site.line(), taken);
                let id = self.tree.add_child(self.current, predicate, Some(branch_id));
                self.new_constraints.push(id);
                id
            }
        };

        self.check_replay(taken, expr);

        // Both directions observed: the subtree is fully bifurcated here.
        if let Some(negated) = negated {
            self.tree.node_mut(negated).processed = true;
            self.tree.node_mut(child).processed = true;
        }

        self.current = child;
    }
}
