use std::{
    collections::{BTreeMap, HashMap},
    fmt::{Display, Write},
    ops::{Deref, Range},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::Error;

/// An immutable, undirected graph with labeled nodes and edges.
///
/// Nodes are stored densely in ascending order of their original ids.
/// Adjacency lists are sorted and the label of an edge is stored at the
/// same offset as the neighbor it leads to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "GraphRecord", from = "GraphRecord")]
pub struct Graph {
    node_count: usize,
    relationship_count: usize,
    label_count: usize,
    ids: Box<[usize]>,
    labels: Box<[usize]>,
    offsets: Box<[usize]>,
    neighbors: Box<[usize]>,
    edge_labels: Box<[usize]>,
    label_index: Box<[usize]>,
    label_ranges: HashMap<usize, Range<usize>>,
    max_degree: usize,
    max_label: usize,
    max_label_frequency: usize,
    #[cfg(feature = "neighbor-label-frequency")]
    neighbor_label_frequencies: Box<[HashMap<(usize, usize), usize>]>,
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn relationship_count(&self) -> usize {
        self.relationship_count
    }

    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    pub fn degree(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }

    pub fn label(&self, node: usize) -> usize {
        self.labels[node]
    }

    /// The id the node was declared with.
    pub fn node_id(&self, node: usize) -> usize {
        self.ids[node]
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        let from = self.offsets[node];
        let to = self.offsets[node + 1];
        &self.neighbors[from..to]
    }

    /// Edge labels in the same order as `neighbors(node)`.
    pub fn neighbor_labels(&self, node: usize) -> &[usize] {
        let from = self.offsets[node];
        let to = self.offsets[node + 1];
        &self.edge_labels[from..to]
    }

    pub fn exists(&self, source: usize, target: usize) -> bool {
        self.neighbors(source).binary_search(&target).is_ok()
    }

    pub fn edge_label(&self, source: usize, target: usize) -> Option<usize> {
        self.neighbors(source)
            .binary_search(&target)
            .ok()
            .map(|idx| self.neighbor_labels(source)[idx])
    }

    pub fn nodes_by_label(&self, label: usize) -> &[usize] {
        match self.label_ranges.get(&label) {
            Some(range) => &self.label_index[range.clone()],
            None => &[],
        }
    }

    /// Number of distinct node labels.
    pub fn label_count(&self) -> usize {
        self.label_count
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    pub fn max_label(&self) -> usize {
        self.max_label
    }

    pub fn max_label_frequency(&self) -> usize {
        self.max_label_frequency
    }

    /// Counts of `(edge label, neighbor label)` pairs around `node`.
    #[cfg(feature = "neighbor-label-frequency")]
    pub fn neighbor_label_frequency(&self, node: usize) -> &HashMap<(usize, usize), usize> {
        &self.neighbor_label_frequencies[node]
    }

    /// `(id, label)` for every node in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.ids.iter().copied().zip(self.labels.iter().copied())
    }

    /// `(source id, target id, label)` for every edge with `source < target`,
    /// sorted by source and target.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        (0..self.node_count).flat_map(move |node| {
            self.neighbors(node)
                .iter()
                .zip(self.neighbor_labels(node))
                .filter(move |(&target, _)| target > node)
                .map(move |(&target, &label)| (self.ids[node], self.ids[target], label))
        })
    }

    /// A representation independent of declaration order that is
    /// equal for two graphs iff they have the same nodes and edges.
    pub fn canonical_key(&self) -> String {
        let mut key = String::from("N[");
        for (idx, (id, label)) in self.nodes().enumerate() {
            if idx > 0 {
                key.push(',');
            }
            let _ = write!(key, "{}:{}", id, label);
        }
        key.push_str("]E[");
        for (idx, (source, target, label)) in self.edges().enumerate() {
            if idx > 0 {
                key.push(',');
            }
            let _ = write!(key, "{}-{}:{}", source, target, label);
        }
        key.push(']');
        key
    }
}

impl Display for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "|V|: {}, |E|: {}, |Σ|: {}\nMax Degree: {}, Max Label Frequency: {}",
            self.node_count,
            self.relationship_count,
            self.label_count,
            self.max_degree,
            self.max_label_frequency
        )
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
            && self.labels == other.labels
            && self.offsets == other.offsets
            && self.neighbors == other.neighbors
            && self.edge_labels == other.edge_labels
    }
}

impl Eq for Graph {}

/// Collects nodes and edges of a graph before it is frozen.
///
/// Edges are undirected: `(a, b, l)` and `(b, a, l)` denote the same edge.
/// Self loops and edges referencing undeclared nodes are dropped. If a node
/// pair is connected more than once, the first label wins.
#[derive(Debug, Default, Clone)]
pub struct GraphBuilder {
    nodes: BTreeMap<usize, usize>,
    edges: Vec<(usize, usize, usize)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: usize, label: usize) -> &mut Self {
        self.nodes.insert(id, label);
        self
    }

    pub fn add_edge(&mut self, source: usize, target: usize, label: usize) -> &mut Self {
        self.edges.push((source, target, label));
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn build(self) -> Graph {
        Graph::from(self)
    }

    fn dense_edges(&self, ids: &[usize]) -> BTreeMap<(usize, usize), usize> {
        let mut edges = BTreeMap::new();

        for &(source, target, label) in &self.edges {
            if source == target {
                log::debug!("dropping self loop on node {}", source);
                continue;
            }
            let (source, target) = match (ids.binary_search(&source), ids.binary_search(&target)) {
                (Ok(source), Ok(target)) => (source, target),
                _ => {
                    log::debug!("dropping edge {}-{} with unknown endpoint", source, target);
                    continue;
                }
            };
            let pair = if source < target {
                (source, target)
            } else {
                (target, source)
            };
            edges.entry(pair).or_insert(label);
        }

        edges
    }
}

impl From<GraphBuilder> for Graph {
    fn from(builder: GraphBuilder) -> Self {
        let ids = builder.nodes.keys().copied().collect::<Vec<_>>();
        let labels = builder.nodes.values().copied().collect::<Vec<_>>();
        let edges = builder.dense_edges(&ids);
        let node_count = ids.len();

        let mut degrees = vec![0_usize; node_count];
        for &(source, target) in edges.keys() {
            degrees[source] += 1;
            degrees[target] += 1;
        }

        let mut offsets = Vec::with_capacity(node_count + 1);
        offsets.push(0);
        for degree in &degrees {
            offsets.push(offsets[offsets.len() - 1] + degree);
        }

        // undirected
        let mut neighbors = vec![0; edges.len() * 2];
        let mut edge_labels = vec![0; edges.len() * 2];
        // stores the next offset to insert for each node
        let mut next_offset = vec![0; node_count];

        // Edges are visited in (source, target) order. Adding all smaller
        // neighbors before all larger ones keeps every adjacency list sorted.
        for (&(source, target), &label) in edges.iter() {
            let offset = offsets[target] + next_offset[target];
            neighbors[offset] = source;
            edge_labels[offset] = label;
            next_offset[target] += 1;
        }
        for (&(source, target), &label) in edges.iter() {
            let offset = offsets[source] + next_offset[source];
            neighbors[offset] = target;
            edge_labels[offset] = label;
            next_offset[source] += 1;
        }

        let mut label_frequency = HashMap::<usize, usize>::new();
        for &label in &labels {
            *label_frequency.entry(label).or_insert(0) += 1;
        }
        let max_label = labels.iter().copied().max().unwrap_or_default();
        let label_count = label_frequency.len();
        let max_label_frequency = label_frequency.values().copied().max().unwrap_or_default();
        let max_degree = degrees.iter().copied().max().unwrap_or_default();

        let (label_index, label_ranges) = label_index(&labels);

        #[cfg(feature = "neighbor-label-frequency")]
        let neighbor_label_frequencies =
            neighbor_label_frequencies(&labels, &offsets, &neighbors, &edge_labels);

        Self {
            node_count,
            relationship_count: edges.len(),
            label_count,
            ids: ids.into_boxed_slice(),
            labels: labels.into_boxed_slice(),
            offsets: offsets.into_boxed_slice(),
            neighbors: neighbors.into_boxed_slice(),
            edge_labels: edge_labels.into_boxed_slice(),
            label_index: label_index.into_boxed_slice(),
            label_ranges,
            max_degree,
            max_label,
            max_label_frequency,
            #[cfg(feature = "neighbor-label-frequency")]
            neighbor_label_frequencies: neighbor_label_frequencies.into_boxed_slice(),
        }
    }
}

/// Nodes grouped by label, ascending within each group, and the
/// range of every group. Labels can be arbitrarily large.
fn label_index(labels: &[usize]) -> (Vec<usize>, HashMap<usize, Range<usize>>) {
    let mut nodes = (0..labels.len()).collect::<Vec<_>>();
    nodes.sort_by_key(|&node| labels[node]);

    let mut ranges = HashMap::new();
    let mut start = 0;
    while start < nodes.len() {
        let label = labels[nodes[start]];
        let len = nodes[start..]
            .iter()
            .take_while(|&&node| labels[node] == label)
            .count();
        ranges.insert(label, start..start + len);
        start += len;
    }

    (nodes, ranges)
}

#[cfg(feature = "neighbor-label-frequency")]
fn neighbor_label_frequencies(
    labels: &[usize],
    offsets: &[usize],
    neighbors: &[usize],
    edge_labels: &[usize],
) -> Vec<HashMap<(usize, usize), usize>> {
    let mut nlfs = Vec::with_capacity(labels.len());

    for node in 0..labels.len() {
        let mut nlf = HashMap::<(usize, usize), usize>::new();

        for offset in offsets[node]..offsets[node + 1] {
            let key = (edge_labels[offset], labels[neighbors[offset]]);
            *nlf.entry(key).or_insert(0) += 1;
        }

        nlfs.push(nlf);
    }

    nlfs
}

/// Plain node and edge lists, the serialized form of a [`Graph`].
#[derive(Debug, Serialize, Deserialize)]
struct GraphRecord {
    nodes: Vec<(usize, usize)>,
    edges: Vec<(usize, usize, usize)>,
}

impl From<Graph> for GraphRecord {
    fn from(graph: Graph) -> Self {
        GraphRecord {
            nodes: graph.nodes().collect(),
            edges: graph.edges().collect(),
        }
    }
}

impl From<GraphRecord> for Graph {
    fn from(record: GraphRecord) -> Self {
        let mut builder = GraphBuilder::new();
        for (id, label) in record.nodes {
            builder.add_node(id, label);
        }
        for (source, target, label) in record.edges {
            builder.add_edge(source, target, label);
        }
        builder.build()
    }
}

/// A graph declared in GDL, e.g. `(n0:L1)-[:E2]->(n1:L3)`.
///
/// Node labels and relationship types carry their numeric label after a
/// single character prefix. Relationships without type get label 0.
/// Edge direction is ignored.
pub struct GdlGraph(Graph);

impl GdlGraph {
    pub fn into_inner(self) -> Graph {
        self.0
    }
}

impl Deref for GdlGraph {
    type Target = Graph;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for GdlGraph {
    type Err = Error;

    fn from_str(gdl: &str) -> Result<Self, Error> {
        fn numeric_suffix(value: &str) -> Result<usize, Error> {
            value
                .get(1..)
                .and_then(|suffix| suffix.parse::<usize>().ok())
                .ok_or_else(|| Error::InvalidGdlGraph(format!("non-numeric label {}", value)))
        }

        let gdl_graph = gdl.parse::<gdl::Graph>()?;

        let mut builder = GraphBuilder::new();

        for node in gdl_graph.nodes() {
            let label = match node.labels().next() {
                Some(label) => numeric_suffix(label)?,
                None => {
                    return Err(Error::InvalidGdlGraph(format!(
                        "node {} has no label",
                        node.variable()
                    )))
                }
            };
            builder.add_node(node.id(), label);
        }

        for rel in gdl_graph.relationships() {
            let node_id = |variable: &str| {
                gdl_graph
                    .get_node(variable)
                    .map(|node| node.id())
                    .ok_or_else(|| Error::InvalidGdlGraph(format!("unknown node {}", variable)))
            };
            let source = node_id(rel.source())?;
            let target = node_id(rel.target())?;
            let label = match rel.rel_type() {
                Some(rel_type) => numeric_suffix(rel_type)?,
                None => 0,
            };
            builder.add_edge(source, target, label);
        }

        Ok(GdlGraph(builder.build()))
    }
}
