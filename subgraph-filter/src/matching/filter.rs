use std::fmt::Display;

use crate::graph::Graph;

mod gql;
mod ldf;
mod nlf;

pub use gql::gql_filter;
pub use ldf::ldf_filter;
pub use nlf::nlf_filter;

const INVALID_NODE_ID: usize = usize::MAX;

/// Data nodes a query node can be mapped to.
#[derive(Debug, Default)]
pub struct Candidates {
    /// candidates for each query node
    candidates: Box<[Vec<usize>]>,
}

impl Candidates {
    pub fn new(candidates: Vec<Vec<usize>>) -> Self {
        Self {
            candidates: candidates.into_boxed_slice(),
        }
    }

    pub fn add_candidate(&mut self, query_node: usize, data_node: usize) {
        self.candidates[query_node].push(data_node);
    }

    pub fn candidates(&self, query_node: usize) -> &[usize] {
        self.candidates[query_node].as_slice()
    }

    pub fn candidates_mut(&mut self, query_node: usize) -> &mut [usize] {
        self.candidates[query_node].as_mut_slice()
    }

    pub fn candidate_count(&self, query_node: usize) -> usize {
        self.candidates[query_node].len()
    }

    pub fn sort(&mut self) {
        for c in self.candidates.iter_mut() {
            c.sort_unstable()
        }
    }

    /// Removes candidates that were invalidated in place.
    pub fn compact(&mut self) {
        for node_candidates in self.candidates.iter_mut() {
            node_candidates.retain(|&data_node| data_node != INVALID_NODE_ID);
        }
    }

    /// Every query node has at least one candidate.
    pub fn is_valid(&self) -> bool {
        self.candidates
            .iter()
            .all(|node_candidates| !node_candidates.is_empty())
    }
}

impl From<(&Graph, &Graph)> for Candidates {
    fn from((data_graph, query_graph): (&Graph, &Graph)) -> Self {
        let query_node_count = query_graph.node_count();
        let max_candidates = data_graph.max_label_frequency();

        let candidates = (0..query_node_count)
            .map(|_| Vec::<usize>::with_capacity(max_candidates))
            .collect::<Vec<_>>();

        Self::new(candidates)
    }
}

impl Display for Candidates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts = self
            .candidates
            .iter()
            .enumerate()
            .map(|(n, c)| format!("{}: {}", n, c.len()))
            .collect::<Vec<_>>();

        write!(f, "{{{}}}", counts.join(", "))
    }
}
