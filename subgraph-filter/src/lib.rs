/*!
## Subgraph Filter

A library for answering subgraph containment queries over a database of
small labeled graphs using the filter-and-verify approach.

The database is mined for frequent path and star patterns, a diverse set of
discriminative patterns is selected and every graph is turned into a binary
feature vector over those patterns. A query graph can only be contained in a
database graph whose feature vector dominates its own, which prunes most of
the database before the expensive isomorphism test runs.

```text
graph store -> mine -> select -> extract (db, queries) -> filter -> verify
```

### License

MIT
*/
pub mod candidate;
pub mod config;
pub mod feature;
pub mod graph;
pub mod matching;
pub mod mine;
pub mod pattern;
pub mod select;
pub mod store;

use std::io;

pub use candidate::{
    filter, verify_and_score, CandidateSets, CandidateStatistics, QueryScore, Scores, Status,
};
pub use config::{Filter, MiningConfig, OracleConfig, SelectionConfig};
pub use feature::{extract, FeatureMatrix};
pub use graph::{GdlGraph, Graph, GraphBuilder};
pub use matching::{resolve, BacktrackingOracle, Oracle, Verdict};
pub use mine::{mine, MinedPatterns};
pub use pattern::{PathPattern, Pattern, TreePattern};
pub use select::{select, SelectedPattern};
pub use store::{deduplicate, GraphFormat, LabelDictionary};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("error while reading or writing graph data")]
    Io {
        #[from]
        source: io::Error,
    },
    #[error("error while parsing GDL graph")]
    ParseGdlGraph {
        #[from]
        source: gdl::graph::GraphHandlerError,
    },
    #[error("error in GDL graph: {0}")]
    InvalidGdlGraph(String),
    #[error("error while (de)serializing binary data")]
    Serialization {
        #[from]
        source: bincode::Error,
    },
    #[error("invalid label dictionary: {0}")]
    InvalidLabels(String),
    #[error("input {0} does not contain any graph")]
    EmptyInput(String),
    #[error("isomorphism oracle is not available: {capability}")]
    OracleUnavailable { capability: &'static str },
    #[error("more than {limit} distinct patterns after processing graphs up to index {graphs}, lower max_path_length or raise min_support")]
    PatternLimitExceeded { limit: usize, graphs: usize },
    #[error("feature width mismatch: database has {database} columns, queries have {queries}")]
    FeatureWidthMismatch { database: usize, queries: usize },
    #[error("candidates are given for {candidates} queries, but there are {queries} query graphs")]
    QueryCountMismatch { candidates: usize, queries: usize },
    #[error("query {query} references database graph {candidate}, database has {database} graphs")]
    CandidateOutOfRange {
        query: usize,
        candidate: usize,
        database: usize,
    },
}
