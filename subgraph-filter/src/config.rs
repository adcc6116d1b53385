use std::{fmt::Display, time::Duration};

/// Candidate filter used by the isomorphism oracle to restrict
/// the data nodes a pattern node can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Ldf,  // label-degree-filter
    Gql,  // graphql-filter
    Nlf,  // neighbor-label-frequency-filter
    Auto, // strongest filter compiled into the library
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiningConfig {
    /// Minimum number of graphs a pattern must occur in.
    pub min_support: usize,
    /// Maximum number of edges of an enumerated path.
    pub max_path_length: usize,
    /// Whether two-leaf star patterns are mined next to paths.
    pub include_trees: bool,
    /// Number of graphs enumerated in parallel before
    /// their patterns are folded into the global counters.
    pub chunk_size: usize,
    /// Upper bound for distinct patterns tracked during mining.
    pub max_patterns: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionConfig {
    pub k: usize,
    /// Maximum Jaccard overlap between occurrence sets of two
    /// selected patterns. Derived from the database size if unset.
    pub overlap_threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleConfig {
    pub filter: Filter,
    /// Time budget for a single containment test.
    pub timeout: Option<Duration>,
}

pub const DEFAULT_CHUNK_SIZE: usize = 5_000;
pub const DEFAULT_K: usize = 50;
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.8;
pub const LARGE_DATABASE_OVERLAP_THRESHOLD: f64 = 0.7;
pub const LARGE_DATABASE: usize = 10_000;

/// Diversity threshold used when none is configured.
/// Large databases get a stricter threshold.
pub fn default_overlap_threshold(graph_count: usize) -> f64 {
    if graph_count > LARGE_DATABASE {
        LARGE_DATABASE_OVERLAP_THRESHOLD
    } else {
        DEFAULT_OVERLAP_THRESHOLD
    }
}

impl MiningConfig {
    /// Support threshold relative to the database size: a pattern must
    /// occur in at least 20% of all graphs, but never in less than two.
    pub fn for_database(graph_count: usize) -> Self {
        MiningConfig {
            min_support: usize::max(2, graph_count / 5),
            ..MiningConfig::default()
        }
    }
}

impl SelectionConfig {
    pub fn overlap_threshold(&self, graph_count: usize) -> f64 {
        self.overlap_threshold
            .unwrap_or_else(|| default_overlap_threshold(graph_count))
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        MiningConfig {
            min_support: 2,
            max_path_length: 5,
            include_trees: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_patterns: None,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            k: DEFAULT_K,
            overlap_threshold: None,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            filter: Filter::Auto,
            timeout: None,
        }
    }
}

impl From<Filter> for OracleConfig {
    fn from(filter: Filter) -> Self {
        OracleConfig {
            filter,
            ..OracleConfig::default()
        }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Display for MiningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "min_support: {}, max_path_length: {}, trees: {}, chunk_size: {}",
            self.min_support, self.max_path_length, self.include_trees, self.chunk_size
        )?;
        if let Some(limit) = self.max_patterns {
            write!(f, ", max_patterns: {}", limit)?;
        }
        Ok(())
    }
}

impl Display for SelectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.overlap_threshold {
            Some(threshold) => write!(f, "k: {}, overlap: {}", self.k, threshold),
            None => write!(f, "k: {}, overlap: auto", self.k),
        }
    }
}

impl Display for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.timeout {
            Some(timeout) => write!(f, "{} (timeout {:?})", self.filter, timeout),
            None => write!(f, "{}", self.filter),
        }
    }
}
