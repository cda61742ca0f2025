// SPDX-License-Identifier: AGPL-3.0

use crate::predicate::Predicate;
use cpex_coverage::CoverageData;
use cpex_symbolic::SymValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Concrete input assignment for one execution, in declaration order.
pub type InputMap = IndexMap<String, SymValue>;

/// Identifier of a constraint node. Ids are assigned monotonically at
/// creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(pub usize);

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node of the constraint tree: the predicate negated to reach it from
/// its parent, plus the execution metadata recorded the first time a run
/// visited it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub parent: Option<ConstraintId>,
    pub children: Vec<ConstraintId>,
    pub predicate: Option<Predicate>,
    pub processed: bool,
    pub inputs: Option<InputMap>,
    pub solving_time: f64,
    pub coverage: CoverageData,
    pub branch_id: Option<String>,
}

/// Arena-owned tree of constraints. Parent/child links are arena indices,
/// so the structure is acyclic by construction and serialises directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintTree {
    nodes: Vec<Constraint>,
}

impl ConstraintTree {
    pub const ROOT: ConstraintId = ConstraintId(0);

    pub fn new() -> Self {
        ConstraintTree {
            nodes: vec![Constraint {
                id: Self::ROOT,
                parent: None,
                children: Vec::new(),
                predicate: None,
                processed: false,
                inputs: None,
                solving_time: 0.0,
                coverage: CoverageData::default(),
                branch_id: None,
            }],
        }
    }

    /// Number of constraints, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: ConstraintId) -> &Constraint {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: ConstraintId) -> &mut Constraint {
        &mut self.nodes[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.nodes.iter()
    }

    /// Linear scan of `parent`'s children for an equal predicate.
    pub fn find_child(&self, parent: ConstraintId, predicate: &Predicate) -> Option<ConstraintId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).predicate.as_ref() == Some(predicate))
    }

    /// Append a new child under `parent`. The caller must have checked the
    /// predicate is not already present among the siblings.
    pub fn add_child(
        &mut self,
        parent: ConstraintId,
        predicate: Predicate,
        branch_id: Option<String>,
    ) -> ConstraintId {
        assert!(
            self.find_child(parent, &predicate).is_none(),
            "duplicate sibling predicate under constraint {}",
            parent
        );
        let id = ConstraintId(self.nodes.len());
        self.nodes.push(Constraint {
            id,
            parent: Some(parent),
            children: Vec::new(),
            predicate: Some(predicate),
            processed: false,
            inputs: None,
            solving_time: 0.0,
            coverage: CoverageData::default(),
            branch_id,
        });
        self.node_mut(parent).children.push(id);
        id
    }

    /// Number of edges between `id` and the root.
    pub fn depth(&self, id: ConstraintId) -> usize {
        let mut depth = 0;
        let mut cursor = self.node(id).parent;
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.node(parent).parent;
        }
        depth
    }

    /// The solver task for `id`: the predicates along the path from its
    /// parent up to the root (leaf side first) and `id`'s own predicate as
    /// the query. Marks the node processed.
    pub fn asserts_and_query(&mut self, id: ConstraintId) -> (Vec<Predicate>, Predicate) {
        self.node_mut(id).processed = true;

        let query = self
            .node(id)
            .predicate
            .clone()
            .expect("query requested for the root constraint");

        let mut asserts = Vec::new();
        let mut cursor = self.node(id).parent;
        while let Some(current) = cursor {
            let node = self.node(current);
            if let Some(predicate) = &node.predicate {
                asserts.push(predicate.clone());
            }
            cursor = node.parent;
        }

        (asserts, query)
    }

    /// Render the tree in DOT format. Nodes are labelled with predicate and
    /// branch id; edges carry the child's recorded inputs and solving time.
    pub fn to_dot(&self, name: &str) -> String {
        let mut body = String::new();
        for node in &self.nodes {
            let label = match &node.predicate {
                None => name.to_string(),
                Some(predicate) => predicate.to_string(),
            };
            let branch_id = node.branch_id.as_deref().unwrap_or("None");
            body.push_str(&format!(
                "C{} [ label=\"{}:{}\" ];\n",
                node.id,
                escape_dot(&label),
                escape_dot(branch_id)
            ));
            for &child in &node.children {
                let child_node = self.node(child);
                let inputs = match &child_node.inputs {
                    Some(inputs) => format_inputs(inputs),
                    None => "None".to_string(),
                };
                body.push_str(&format!(
                    "C{} -> C{} [ label=\"{} ({:.2})\" ];\n",
                    node.id,
                    child,
                    escape_dot(&inputs),
                    child_node.solving_time
                ));
            }
        }
        format!("digraph {{\n{}}}\n", body)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

impl Default for ConstraintTree {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Human-readable `{name: value, ...}` rendering of an input map.
pub fn format_inputs(inputs: &InputMap) -> String {
    let entries: Vec<String> = inputs
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpex_symbolic::SymInt;

    fn pred(name: &str, value: i64, result: bool) -> Predicate {
        let x = SymInt::variable(name, 0);
        Predicate::new(x.eq(&SymInt::lit(value)).node().clone(), result)
    }

    #[test]
    fn test_new_tree_has_only_root() {
        let tree = ConstraintTree::new();
        assert_eq!(tree.len(), 1);
        let root = tree.node(ConstraintTree::ROOT);
        assert!(root.parent.is_none());
        assert!(root.predicate.is_none());
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_add_and_find_child() {
        let mut tree = ConstraintTree::new();
        let p = pred("x", 1, true);
        let child = tree.add_child(ConstraintTree::ROOT, p.clone(), None);

        assert_eq!(tree.find_child(ConstraintTree::ROOT, &p), Some(child));
        assert_eq!(tree.find_child(ConstraintTree::ROOT, &p.negated()), None);
        assert_eq!(tree.node(child).parent, Some(ConstraintTree::ROOT));
        assert!(tree.node(ConstraintTree::ROOT).children.contains(&child));
    }

    #[test]
    #[should_panic(expected = "duplicate sibling predicate")]
    fn test_duplicate_sibling_asserts() {
        let mut tree = ConstraintTree::new();
        let p = pred("x", 1, true);
        tree.add_child(ConstraintTree::ROOT, p.clone(), None);
        tree.add_child(ConstraintTree::ROOT, p, None);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut tree = ConstraintTree::new();
        let a = tree.add_child(ConstraintTree::ROOT, pred("x", 1, true), None);
        let b = tree.add_child(a, pred("x", 2, false), None);
        let c = tree.add_child(a, pred("x", 2, true), None);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_depth() {
        let mut tree = ConstraintTree::new();
        let a = tree.add_child(ConstraintTree::ROOT, pred("x", 1, true), None);
        let b = tree.add_child(a, pred("x", 2, true), None);

        assert_eq!(tree.depth(ConstraintTree::ROOT), 0);
        assert_eq!(tree.depth(a), 1);
        assert_eq!(tree.depth(b), 2);
    }

    #[test]
    fn test_asserts_and_query_covers_path() {
        let mut tree = ConstraintTree::new();
        let a = tree.add_child(ConstraintTree::ROOT, pred("x", 1, true), None);
        let b = tree.add_child(a, pred("x", 2, false), None);
        let c = tree.add_child(b, pred("x", 3, true), None);

        let (asserts, query) = tree.asserts_and_query(c);
        assert_eq!(asserts.len(), tree.depth(c) - 1);
        assert_eq!(asserts[0], *tree.node(b).predicate.as_ref().unwrap());
        assert_eq!(asserts[1], *tree.node(a).predicate.as_ref().unwrap());
        assert_eq!(query, *tree.node(c).predicate.as_ref().unwrap());
        assert!(tree.node(c).processed);
    }

    #[test]
    fn test_tree_integrity_after_growth() {
        let mut tree = ConstraintTree::new();
        let a = tree.add_child(ConstraintTree::ROOT, pred("x", 1, true), None);
        tree.add_child(a, pred("y", 1, true), None);
        tree.add_child(a, pred("y", 1, false), None);

        for node in tree.iter() {
            if let Some(parent) = node.parent {
                assert!(tree.node(parent).children.contains(&node.id));
            }
            for (i, &left) in node.children.iter().enumerate() {
                for &right in &node.children[i + 1..] {
                    assert_ne!(tree.node(left).predicate, tree.node(right).predicate);
                }
            }
        }
    }

    #[test]
    fn test_json_round_trip() {
        let mut tree = ConstraintTree::new();
        let a = tree.add_child(ConstraintTree::ROOT, pred("x", 1, true), Some("demo.rs:3:true".into()));
        let mut inputs = InputMap::new();
        inputs.insert("x".to_string(), SymValue::Int(1));
        tree.node_mut(a).inputs = Some(inputs);
        tree.node_mut(a).solving_time = 0.25;

        let json = tree.to_json().unwrap();
        let back = ConstraintTree::from_json(&json).unwrap();
        assert_eq!(back.len(), tree.len());
        assert_eq!(back.node(a).branch_id.as_deref(), Some("demo.rs:3:true"));
        assert_eq!(back.node(a).solving_time, 0.25);
        assert_eq!(back.node(a).inputs, tree.node(a).inputs);
    }

    #[test]
    fn test_dot_output() {
        let mut tree = ConstraintTree::new();
        let a = tree.add_child(ConstraintTree::ROOT, pred("x", 1, true), Some("demo.rs:3:true".into()));
        let mut inputs = InputMap::new();
        inputs.insert("x".to_string(), SymValue::Int(1));
        tree.node_mut(a).inputs = Some(inputs);

        let dot = tree.to_dot("demo");
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("C0 [ label=\"demo:None\" ];"));
        assert!(dot.contains("C0 -> C1"));
        assert!(dot.contains("x: 1"));
    }

    #[test]
    fn test_format_inputs() {
        let mut inputs = InputMap::new();
        inputs.insert("a".to_string(), SymValue::Int(3));
        inputs.insert("s".to_string(), SymValue::from("hi"));
        assert_eq!(format_inputs(&inputs), "{a: 3, s: \"hi\"}");
    }
}
