use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::graph::{Graph, GraphBuilder};

/// A simple path given by the labels along it.
///
/// `node_labels` has exactly one element more than `edge_labels`. The derived
/// ordering compares node labels first and edge labels second.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathPattern {
    node_labels: Vec<usize>,
    edge_labels: Vec<usize>,
}

impl PathPattern {
    pub fn new(node_labels: Vec<usize>, edge_labels: Vec<usize>) -> Self {
        assert_eq!(
            node_labels.len(),
            edge_labels.len() + 1,
            "a path has one node more than edges"
        );
        Self {
            node_labels,
            edge_labels,
        }
    }

    pub fn node_labels(&self) -> &[usize] {
        &self.node_labels
    }

    pub fn edge_labels(&self) -> &[usize] {
        &self.edge_labels
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edge_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_labels.is_empty()
    }

    pub fn reversed(&self) -> Self {
        Self {
            node_labels: self.node_labels.iter().rev().copied().collect(),
            edge_labels: self.edge_labels.iter().rev().copied().collect(),
        }
    }

    /// The smaller of the path and its reversal, so that both
    /// traversal directions of an undirected path are equal.
    pub fn canonical(self) -> Self {
        if self.is_canonical() {
            self
        } else {
            self.reversed()
        }
    }

    /// Whether the reversal of the path is not smaller than the path.
    pub fn is_canonical(&self) -> bool {
        let len = self.node_labels.len();
        for idx in 0..len {
            let (left, right) = (self.node_labels[idx], self.node_labels[len - idx - 1]);
            if left != right {
                return left < right;
            }
        }
        let len = self.edge_labels.len();
        for idx in 0..len {
            let (left, right) = (self.edge_labels[idx], self.edge_labels[len - idx - 1]);
            if left != right {
                return left < right;
            }
        }
        true
    }

    pub fn to_graph(&self) -> Graph {
        let mut builder = GraphBuilder::new();
        for (id, &label) in self.node_labels.iter().enumerate() {
            builder.add_node(id, label);
        }
        for (id, &label) in self.edge_labels.iter().enumerate() {
            builder.add_edge(id, id + 1, label);
        }
        builder.build()
    }
}

impl Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, label) in self.node_labels.iter().enumerate() {
            write!(f, "{}", label)?;
            if let Some(edge_label) = self.edge_labels.get(idx) {
                write!(f, "-{}-", edge_label)?;
            }
        }
        Ok(())
    }
}

/// A star with one center and exactly two leaves.
///
/// Leaves are `(edge label, leaf label)` pairs kept in ascending order,
/// which makes the pattern independent of the order its leaves were found in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreePattern {
    center: usize,
    leaves: [(usize, usize); 2],
}

impl TreePattern {
    pub fn new(center: usize, first: (usize, usize), second: (usize, usize)) -> Self {
        let leaves = if second < first {
            [second, first]
        } else {
            [first, second]
        };
        Self { center, leaves }
    }

    pub fn center(&self) -> usize {
        self.center
    }

    pub fn leaves(&self) -> &[(usize, usize); 2] {
        &self.leaves
    }

    /// The center gets id 0 and the leaves ids 1 and 2 in canonical leaf
    /// order. Returns the sorted `(min id, max id, label of min, label of max,
    /// edge label)` tuples of both edges.
    pub fn canonical_edges(&self) -> [(usize, usize, usize, usize, usize); 2] {
        let [(first_edge, first_leaf), (second_edge, second_leaf)] = self.leaves;
        let mut edges = [
            (0, 1, self.center, first_leaf, first_edge),
            (0, 2, self.center, second_leaf, second_edge),
        ];
        edges.sort_unstable();
        edges
    }

    pub fn to_graph(&self) -> Graph {
        let mut builder = GraphBuilder::new();
        builder.add_node(0, self.center);
        for (id, &(edge_label, leaf_label)) in self.leaves.iter().enumerate() {
            builder.add_node(id + 1, leaf_label);
            builder.add_edge(0, id + 1, edge_label);
        }
        builder.build()
    }
}

impl Display for TreePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [(first_edge, first_leaf), (second_edge, second_leaf)] = self.leaves;
        write!(
            f,
            "{}-{}-({})-{}-{}",
            first_leaf, first_edge, self.center, second_edge, second_leaf
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Path,
    Tree,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pattern {
    Path(PathPattern),
    Tree(TreePattern),
}

impl Pattern {
    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::Path(_) => PatternKind::Path,
            Pattern::Tree(_) => PatternKind::Tree,
        }
    }

    pub fn to_graph(&self) -> Graph {
        match self {
            Pattern::Path(path) => path.to_graph(),
            Pattern::Tree(tree) => tree.to_graph(),
        }
    }
}

impl From<PathPattern> for Pattern {
    fn from(path: PathPattern) -> Self {
        Pattern::Path(path)
    }
}

impl From<TreePattern> for Pattern {
    fn from(tree: TreePattern) -> Self {
        Pattern::Tree(tree)
    }
}

impl Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Path => write!(f, "path"),
            PatternKind::Tree => write!(f, "tree"),
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::Path(path) => write!(f, "[path] {}", path),
            Pattern::Tree(tree) => write!(f, "[tree] {}", tree),
        }
    }
}
