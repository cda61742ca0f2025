// SPDX-License-Identifier: AGPL-3.0

//! Pre-dispatch pruning of unpromising constraints.

use cpex_coverage::CoverageData;
use cpex_tree::{ConstraintId, ConstraintTree, InputMap};
use std::collections::HashSet;

/// Decides whether a constraint is worth a solver query. Both rules are
/// optional; a disabled rule never prunes.
#[derive(Debug, Clone, Default)]
pub struct Pruner {
    /// Budget for cumulative solving time along the path to the root,
    /// counted once per distinct input frontier.
    pub path_timeout: Option<f64>,
    /// Window `K`: prune when the last `K` distinct-input ancestors
    /// already cover everything this node covered.
    pub coverage_window: Option<usize>,
}

impl Pruner {
    pub fn pruned(&self, tree: &ConstraintTree, id: ConstraintId) -> bool {
        if let Some(limit) = self.path_timeout {
            let spent = self.path_time(tree, id);
            cpex_logs::debug(&format!("Path solve time {:.2}", spent));
            if spent >= limit {
                cpex_logs::debug(&format!("Pruned {} (path budget)", id));
                return true;
            }
        }

        if let Some(window) = self.coverage_window {
            if self.coverage_stagnant(tree, id, window) {
                cpex_logs::debug(&format!("Pruned {} (coverage stagnation)", id));
                return true;
            }
        }

        false
    }

    /// Sum of `solving_time` from `id` to the root, counting each distinct
    /// input frontier once.
    fn path_time(&self, tree: &ConstraintTree, id: ConstraintId) -> f64 {
        let mut seen: HashSet<Option<String>> = HashSet::new();
        let mut total = 0.0;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = tree.node(current);
            let frozen = node.inputs.as_ref().map(freeze_inputs);
            if seen.insert(frozen) {
                total += node.solving_time;
            }
            cursor = node.parent;
        }
        total
    }

    /// Walk ancestors collecting the coverage of the last `window` nodes
    /// whose inputs differ from their parent's. Prune only when the full
    /// window was found, it covered something, and it covers everything
    /// this node saw.
    fn coverage_stagnant(&self, tree: &ConstraintTree, id: ConstraintId, window: usize) -> bool {
        let mut remaining = window;
        let mut ancestor_coverage = CoverageData::new();

        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if remaining == 0 {
                break;
            }
            let node = tree.node(current);
            if let (Some(parent), Some(inputs)) = (node.parent, &node.inputs) {
                let parent_node = tree.node(parent);
                if let Some(parent_inputs) = &parent_node.inputs {
                    if inputs != parent_inputs {
                        remaining -= 1;
                        ancestor_coverage.update(&parent_node.coverage);
                    }
                }
            }
            cursor = node.parent;
        }

        if remaining != 0 {
            return false;
        }
        if ancestor_coverage.is_empty() {
            return false;
        }
        ancestor_coverage.covers(&tree.node(id).coverage)
    }
}

fn freeze_inputs(inputs: &InputMap) -> String {
    let mut entries: Vec<String> = inputs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    entries.sort();
    entries.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpex_symbolic::{SymInt, SymValue};
    use cpex_tree::Predicate;

    fn pred(value: i64, result: bool) -> Predicate {
        let x = SymInt::variable("x", 0);
        Predicate::new(x.eq(&SymInt::lit(value)).node().clone(), result)
    }

    fn inputs(value: i64) -> InputMap {
        let mut map = InputMap::new();
        map.insert("x".to_string(), SymValue::Int(value));
        map
    }

    fn coverage(lines: &[u32]) -> CoverageData {
        let mut cov = CoverageData::new();
        for &line in lines {
            cov.record_line("demo.rs", line);
        }
        cov
    }

    /// Chain root -> a -> b -> c with distinct inputs per level.
    fn chain() -> (ConstraintTree, ConstraintId, ConstraintId, ConstraintId) {
        let mut tree = ConstraintTree::new();
        let a = tree.add_child(ConstraintTree::ROOT, pred(1, true), None);
        let b = tree.add_child(a, pred(2, true), None);
        let c = tree.add_child(b, pred(3, true), None);

        tree.node_mut(a).inputs = Some(inputs(1));
        tree.node_mut(b).inputs = Some(inputs(2));
        tree.node_mut(c).inputs = Some(inputs(3));
        (tree, a, b, c)
    }

    #[test]
    fn test_disabled_rules_never_prune() {
        let (tree, _, _, c) = chain();
        let pruner = Pruner::default();
        assert!(!pruner.pruned(&tree, c));
    }

    #[test]
    fn test_path_budget_counts_distinct_frontiers_once() {
        let (mut tree, a, b, c) = chain();
        tree.node_mut(a).solving_time = 0.4;
        tree.node_mut(b).solving_time = 0.4;
        tree.node_mut(c).solving_time = 0.4;
        // b shares a's input frontier, so only one of the two counts.
        tree.node_mut(b).inputs = Some(inputs(1));

        let over = Pruner {
            path_timeout: Some(0.7),
            coverage_window: None,
        };
        assert!(over.pruned(&tree, c));

        let under = Pruner {
            path_timeout: Some(0.9),
            coverage_window: None,
        };
        assert!(!under.pruned(&tree, c));
    }

    #[test]
    fn test_coverage_stagnation_prunes_covered_node() {
        let (mut tree, a, b, c) = chain();
        tree.node_mut(a).coverage = coverage(&[1, 2, 3]);
        tree.node_mut(b).coverage = coverage(&[1, 2, 3]);
        tree.node_mut(c).coverage = coverage(&[1, 2]);

        let pruner = Pruner {
            path_timeout: None,
            coverage_window: Some(2),
        };
        assert!(pruner.pruned(&tree, c));
    }

    #[test]
    fn test_new_coverage_is_not_pruned() {
        let (mut tree, a, b, c) = chain();
        tree.node_mut(a).coverage = coverage(&[1, 2]);
        tree.node_mut(b).coverage = coverage(&[1, 2]);
        tree.node_mut(c).coverage = coverage(&[1, 2, 9]);

        let pruner = Pruner {
            path_timeout: None,
            coverage_window: Some(2),
        };
        assert!(!pruner.pruned(&tree, c));
    }

    #[test]
    fn test_short_ancestor_chain_is_not_pruned() {
        let (mut tree, a, b, c) = chain();
        tree.node_mut(a).coverage = coverage(&[1, 2, 3]);
        tree.node_mut(b).coverage = coverage(&[1, 2, 3]);
        tree.node_mut(c).coverage = coverage(&[1]);

        // Only two distinct-input ancestors exist; a window of three must
        // not prune.
        let pruner = Pruner {
            path_timeout: None,
            coverage_window: Some(3),
        };
        assert!(!pruner.pruned(&tree, c));
    }

    #[test]
    fn test_empty_ancestor_coverage_is_not_pruned() {
        let (tree, _, _, c) = chain();
        let pruner = Pruner {
            path_timeout: None,
            coverage_window: Some(2),
        };
        assert!(!pruner.pruned(&tree, c));
    }
}
