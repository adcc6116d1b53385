use std::{hash::Hash, time::Instant};

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;

use crate::{
    config::MiningConfig,
    graph::Graph,
    pattern::{PathPattern, TreePattern},
    Error,
};

/// Only pairs among the first neighbors of a center node form star patterns.
pub const TREE_FAN_OUT: usize = 4;

/// Occurrence sets of patterns in the order they were first found.
///
/// Occurrences are sorted graph indices without duplicates,
/// the support of a pattern is the length of its occurrence set.
#[derive(Debug, Clone)]
pub struct PatternSupport<P> {
    occurrences: IndexMap<P, Vec<usize>>,
}

impl<P: Hash + Eq> PatternSupport<P> {
    fn record(&mut self, pattern: P, graph: usize) {
        let occurrences = self.occurrences.entry(pattern).or_default();
        if occurrences.last() != Some(&graph) {
            occurrences.push(graph);
        }
    }

    fn retain_frequent(&mut self, min_support: usize) {
        self.occurrences
            .retain(|_, occurrences| occurrences.len() >= min_support);
    }

    pub fn support(&self, pattern: &P) -> usize {
        self.occurrences.get(pattern).map_or(0, Vec::len)
    }

    pub fn occurrences(&self, pattern: &P) -> &[usize] {
        self.occurrences
            .get(pattern)
            .map_or(&[][..], Vec::as_slice)
    }

    /// `(pattern, occurrences)` in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&P, &[usize])> + '_ {
        self.occurrences
            .iter()
            .map(|(pattern, occurrences)| (pattern, occurrences.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }
}

impl<P> Default for PatternSupport<P> {
    fn default() -> Self {
        Self {
            occurrences: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MinedPatterns {
    pub paths: PatternSupport<PathPattern>,
    pub trees: PatternSupport<TreePattern>,
    graph_count: usize,
}

impl MinedPatterns {
    /// Number of graphs the patterns were mined from.
    pub fn graph_count(&self) -> usize {
        self.graph_count
    }

    pub fn len(&self) -> usize {
        self.paths.len() + self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.trees.is_empty()
    }
}

/// Distinct canonical patterns of a single graph.
#[derive(Debug, Default)]
struct GraphPatterns {
    paths: IndexSet<PathPattern>,
    trees: IndexSet<TreePattern>,
}

/// Mines path patterns and, if enabled, star patterns from all graphs and
/// keeps those that occur in at least `min_support` graphs.
///
/// Graphs are enumerated in parallel one chunk at a time. The patterns of a
/// chunk are merged in graph order, which makes the result independent of
/// thread scheduling.
pub fn mine(graphs: &[Graph], config: &MiningConfig) -> Result<MinedPatterns, Error> {
    let min_support = if config.min_support < 1 {
        log::warn!("min_support {} clamped to 1", config.min_support);
        1
    } else {
        config.min_support
    };
    let chunk_size = usize::max(config.chunk_size, 1);
    let chunk_count = (graphs.len() + chunk_size - 1) / chunk_size;

    log::info!("Mining {} graphs ({})", graphs.len(), config);
    let start = Instant::now();

    let mut mined = MinedPatterns {
        graph_count: graphs.len(),
        ..MinedPatterns::default()
    };

    for (chunk_idx, chunk) in graphs.chunks(chunk_size).enumerate() {
        let offset = chunk_idx * chunk_size;
        if chunk_count > 1 {
            log::info!(
                "Chunk {}/{} (graphs {}-{})",
                chunk_idx + 1,
                chunk_count,
                offset,
                offset + chunk.len() - 1
            );
        }

        let chunk_patterns = chunk
            .par_iter()
            .map(|graph| enumerate_patterns(graph, config))
            .collect::<Vec<_>>();

        for (idx, patterns) in chunk_patterns.into_iter().enumerate() {
            let graph = offset + idx;
            for path in patterns.paths {
                mined.paths.record(path, graph);
            }
            for tree in patterns.trees {
                mined.trees.record(tree, graph);
            }
        }

        if let Some(limit) = config.max_patterns {
            if mined.len() > limit {
                return Err(Error::PatternLimitExceeded {
                    limit,
                    graphs: offset + chunk.len() - 1,
                });
            }
        }
    }

    let (paths, trees) = (mined.paths.len(), mined.trees.len());
    mined.paths.retain_frequent(min_support);
    mined.trees.retain_frequent(min_support);

    log::info!(
        "Found {}/{} frequent paths and {}/{} frequent trees with support >= {} in {:?}",
        mined.paths.len(),
        paths,
        mined.trees.len(),
        trees,
        min_support,
        start.elapsed()
    );

    Ok(mined)
}

fn enumerate_patterns(graph: &Graph, config: &MiningConfig) -> GraphPatterns {
    let paths = if config.max_path_length > 0 {
        enumerate_paths(graph, config.max_path_length)
    } else {
        IndexSet::new()
    };
    let trees = if config.include_trees {
        enumerate_trees(graph)
    } else {
        IndexSet::new()
    };
    GraphPatterns { paths, trees }
}

/// Depth-first walk over simple paths with at most `max_length` edges.
struct PathWalker<'a> {
    graph: &'a Graph,
    max_length: usize,
    visited: Vec<bool>,
    node_labels: Vec<usize>,
    edge_labels: Vec<usize>,
    paths: IndexSet<PathPattern>,
}

impl<'a> PathWalker<'a> {
    fn walk(&mut self, node: usize) {
        if self.edge_labels.len() == self.max_length {
            return;
        }
        let graph = self.graph;

        for (&neighbor, &edge_label) in graph
            .neighbors(node)
            .iter()
            .zip(graph.neighbor_labels(node))
        {
            if self.visited[neighbor] {
                continue;
            }
            self.visited[neighbor] = true;
            self.node_labels.push(graph.label(neighbor));
            self.edge_labels.push(edge_label);

            let path = PathPattern::new(self.node_labels.clone(), self.edge_labels.clone());
            self.paths.insert(path.canonical());

            self.walk(neighbor);

            self.edge_labels.pop();
            self.node_labels.pop();
            self.visited[neighbor] = false;
        }
    }
}

fn enumerate_paths(graph: &Graph, max_length: usize) -> IndexSet<PathPattern> {
    let mut walker = PathWalker {
        graph,
        max_length,
        visited: vec![false; graph.node_count()],
        node_labels: Vec::with_capacity(max_length + 1),
        edge_labels: Vec::with_capacity(max_length),
        paths: IndexSet::new(),
    };

    for start in 0..graph.node_count() {
        walker.visited[start] = true;
        walker.node_labels.push(graph.label(start));
        walker.walk(start);
        walker.node_labels.pop();
        walker.visited[start] = false;
    }

    walker.paths
}

fn enumerate_trees(graph: &Graph) -> IndexSet<TreePattern> {
    let mut trees = IndexSet::new();

    for center in 0..graph.node_count() {
        if graph.degree(center) < 2 {
            continue;
        }
        let fan_out = usize::min(graph.degree(center), TREE_FAN_OUT);
        let neighbors = &graph.neighbors(center)[..fan_out];
        let edge_labels = &graph.neighbor_labels(center)[..fan_out];

        for i in 0..fan_out {
            for j in i + 1..fan_out {
                trees.insert(TreePattern::new(
                    graph.label(center),
                    (edge_labels[i], graph.label(neighbors[i])),
                    (edge_labels[j], graph.label(neighbors[j])),
                ));
            }
        }
    }

    trees
}
