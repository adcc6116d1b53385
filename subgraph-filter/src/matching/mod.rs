//! Label-preserving subgraph monomorphism tests.
//!
//! A pattern occurs in a target if its nodes can be mapped to distinct
//! target nodes with equal labels such that every pattern edge maps to a
//! target edge with an equal label. Additional target nodes and edges are
//! allowed.

pub mod enumerate;
pub mod filter;
pub mod order;

use std::{
    fmt::Display,
    ops::ControlFlow,
    time::{Duration, Instant},
};

use crate::{
    config::{Filter, OracleConfig},
    graph::Graph,
    Error,
};

use self::{
    enumerate::Outcome,
    filter::{gql_filter, ldf_filter, nlf_filter, Candidates},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    NoMatch,
    /// The time budget ran out before a decision was reached.
    TimedOut,
}

impl Verdict {
    /// Timeouts count as no match.
    pub fn is_match(self) -> bool {
        self == Verdict::Match
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Match => write!(f, "match"),
            Verdict::NoMatch => write!(f, "no match"),
            Verdict::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Decides whether a pattern graph occurs in a target graph.
///
/// Implementations are shared between rayon workers.
pub trait Oracle: Send + Sync {
    fn name(&self) -> &str;

    fn test(&self, pattern: &Graph, target: &Graph) -> Verdict;
}

/// Filters candidates per pattern node, orders the pattern nodes and
/// searches for the first embedding by backtracking.
#[derive(Debug, Clone)]
pub struct BacktrackingOracle {
    filter: Filter,
    timeout: Option<Duration>,
    name: String,
}

impl BacktrackingOracle {
    /// Fails if the requested filter has not been compiled in.
    pub fn new(config: &OracleConfig) -> Result<Self, Error> {
        let filter = available(config.filter)?;
        Ok(Self {
            filter,
            timeout: config.timeout,
            name: format!("backtracking-{}", filter).to_lowercase(),
        })
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn candidates(&self, pattern: &Graph, target: &Graph) -> Option<Candidates> {
        let mut candidates = match self.filter {
            Filter::Ldf => ldf_filter(target, pattern),
            Filter::Gql | Filter::Auto => gql_filter(target, pattern),
            Filter::Nlf => nlf_filter(target, pattern),
        }?;
        candidates.sort();
        Some(candidates)
    }
}

impl Oracle for BacktrackingOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self, pattern: &Graph, target: &Graph) -> Verdict {
        if pattern.is_empty() {
            return Verdict::Match;
        }
        if pattern.node_count() > target.node_count()
            || pattern.relationship_count() > target.relationship_count()
        {
            return Verdict::NoMatch;
        }

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);

        let candidates = match self.candidates(pattern, target) {
            Some(candidates) => candidates,
            None => return Verdict::NoMatch,
        };

        let order = order::gql_order(pattern, &candidates);

        let (_, outcome) = enumerate::gql_with(
            target,
            pattern,
            &candidates,
            &order,
            deadline,
            |_| ControlFlow::Break(()),
        );

        match outcome {
            Outcome::Stopped => Verdict::Match,
            Outcome::Exhausted => Verdict::NoMatch,
            Outcome::TimedOut => Verdict::TimedOut,
        }
    }
}

const NLF_COMPILED: bool = cfg!(feature = "neighbor-label-frequency");

/// Resolves `Auto` to the strongest filter compiled into the library and
/// rejects filters that are not available.
fn available(filter: Filter) -> Result<Filter, Error> {
    available_with(filter, NLF_COMPILED)
}

fn available_with(filter: Filter, nlf_compiled: bool) -> Result<Filter, Error> {
    match filter {
        Filter::Auto if nlf_compiled => Ok(Filter::Nlf),
        Filter::Auto => Ok(Filter::Gql),
        Filter::Nlf if !nlf_compiled => Err(Error::OracleUnavailable {
            capability: "neighbor-label-frequency",
        }),
        filter => Ok(filter),
    }
}

/// Builds the oracle for the given configuration once at startup.
pub fn resolve(config: &OracleConfig) -> Result<Box<dyn Oracle>, Error> {
    let oracle = BacktrackingOracle::new(config)?;
    log::info!("Using isomorphism oracle {}", oracle.name());
    Ok(Box::new(oracle))
}
