use std::{fmt::Display, io::Write};

use rayon::prelude::*;

use crate::{
    feature::FeatureMatrix,
    graph::Graph,
    matching::{Oracle, Verdict},
    Error,
};

/// Database graphs that may contain each query, in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSets {
    candidates: Vec<Vec<usize>>,
}

impl CandidateSets {
    pub fn new(candidates: Vec<Vec<usize>>) -> Self {
        Self { candidates }
    }

    pub fn get(&self, query: usize) -> &[usize] {
        &self.candidates[query]
    }

    /// `(query index, candidates)` in ascending query order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.candidates
            .iter()
            .enumerate()
            .map(|(query, candidates)| (query, candidates.as_slice()))
    }

    /// Number of queries.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Writes `q # <query>` followed by `c # <candidates>` for every query.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        for (query, candidates) in self.iter() {
            writeln!(writer, "q # {}", query)?;
            write!(writer, "c #")?;
            if candidates.is_empty() {
                write!(writer, " ")?;
            }
            for candidate in candidates {
                write!(writer, " {}", candidate)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn statistics(&self, database_size: usize) -> CandidateStatistics {
        let sizes = self.candidates.iter().map(Vec::len);
        let total = sizes.clone().sum::<usize>();
        let average = if self.is_empty() {
            0.0
        } else {
            total as f64 / self.len() as f64
        };
        let filtering_ratio = if database_size == 0 {
            0.0
        } else {
            1.0 - average / database_size as f64
        };

        CandidateStatistics {
            queries: self.len(),
            database_size,
            average,
            min: sizes.clone().min().unwrap_or_default(),
            max: sizes.max().unwrap_or_default(),
            filtering_ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateStatistics {
    pub queries: usize,
    pub database_size: usize,
    pub average: f64,
    pub min: usize,
    pub max: usize,
    /// Share of the database pruned for an average query.
    pub filtering_ratio: f64,
}

impl Display for CandidateStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total queries: {}", self.queries)?;
        writeln!(f, "Total database graphs: {}", self.database_size)?;
        writeln!(f, "Average candidates per query: {:.2}", self.average)?;
        writeln!(f, "Min candidates: {}", self.min)?;
        writeln!(f, "Max candidates: {}", self.max)?;
        write!(
            f,
            "Average filtering ratio: {:.2}%",
            self.filtering_ratio * 100.0
        )
    }
}

/// A database graph is a candidate for a query iff its feature row
/// dominates the feature row of the query.
///
/// Both matrices must be extracted with the same patterns. If a query is
/// contained in a database graph, every pattern of the query is also a
/// pattern of the database graph, so no true match is ever pruned.
pub fn filter(database: &FeatureMatrix, queries: &FeatureMatrix) -> Result<CandidateSets, Error> {
    if database.columns() != queries.columns() {
        return Err(Error::FeatureWidthMismatch {
            database: database.columns(),
            queries: queries.columns(),
        });
    }

    let candidates = (0..queries.rows())
        .into_par_iter()
        .map(|query| {
            (0..database.rows())
                .filter(|&graph| database.dominates(graph, queries, query))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let candidates = CandidateSets::new(candidates);
    log::info!(
        "Generated candidates for {} queries, {:.2} on average",
        candidates.len(),
        candidates.statistics(database.rows()).average
    );

    Ok(candidates)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Good,
    Ok,
    Poor,
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Good => write!(f, "good"),
            Status::Ok => write!(f, "ok"),
            Status::Poor => write!(f, "needs improvement"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryScore {
    pub candidates: usize,
    /// Candidates that actually contain the query.
    pub verified: usize,
    /// `verified / candidates`, zero without candidates.
    pub precision: f64,
}

impl QueryScore {
    fn new(candidates: usize, verified: usize) -> Self {
        let precision = if candidates == 0 {
            0.0
        } else {
            verified as f64 / candidates as f64
        };
        Self {
            candidates,
            verified,
            precision,
        }
    }

    pub fn status(&self) -> Status {
        if self.precision >= 0.5 {
            Status::Good
        } else if self.precision >= 0.2 {
            Status::Ok
        } else {
            Status::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub per_query: Vec<QueryScore>,
    pub avg_precision: f64,
    pub avg_verified: f64,
    pub avg_candidates: f64,
    pub total_verified: usize,
    pub total_candidates: usize,
}

impl Scores {
    fn new(per_query: Vec<QueryScore>) -> Self {
        let total_verified = per_query.iter().map(|score| score.verified).sum::<usize>();
        let total_candidates = per_query.iter().map(|score| score.candidates).sum::<usize>();
        let mean = |total: f64| {
            if per_query.is_empty() {
                0.0
            } else {
                total / per_query.len() as f64
            }
        };

        Self {
            avg_precision: mean(per_query.iter().map(|score| score.precision).sum()),
            avg_verified: mean(total_verified as f64),
            avg_candidates: mean(total_candidates as f64),
            total_verified,
            total_candidates,
            per_query,
        }
    }

    /// Verified over candidates across all queries.
    pub fn total_precision(&self) -> f64 {
        if self.total_candidates == 0 {
            0.0
        } else {
            self.total_verified as f64 / self.total_candidates as f64
        }
    }
}

impl Display for Scores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<8} {:<8} {:<8} {:<10} Status", "Query", "|Cq|", "|Rq|", "sq")?;
        for (query, score) in self.per_query.iter().enumerate() {
            writeln!(
                f,
                "q # {:<4} {:<8} {:<8} {:<10.4} {}",
                query,
                score.candidates,
                score.verified,
                score.precision,
                score.status()
            )?;
        }
        writeln!(
            f,
            "{:<8} {:<8.1} {:<8.1} {:<10.4}",
            "AVG", self.avg_candidates, self.avg_verified, self.avg_precision
        )?;
        write!(
            f,
            "TOTAL    {:<8} {:<8} {:<10.4}",
            self.total_candidates,
            self.total_verified,
            self.total_precision()
        )
    }
}

/// Runs the oracle on every candidate of every query.
///
/// Queries are verified in parallel, timeouts count as not verified.
pub fn verify_and_score(
    candidates: &CandidateSets,
    queries: &[Graph],
    database: &[Graph],
    oracle: &dyn Oracle,
) -> Result<Scores, Error> {
    if candidates.len() != queries.len() {
        return Err(Error::QueryCountMismatch {
            candidates: candidates.len(),
            queries: queries.len(),
        });
    }
    for (query, query_candidates) in candidates.iter() {
        if let Some(&candidate) = query_candidates.iter().find(|&&c| c >= database.len()) {
            return Err(Error::CandidateOutOfRange {
                query,
                candidate,
                database: database.len(),
            });
        }
    }

    let per_query = queries
        .par_iter()
        .enumerate()
        .map(|(query_idx, query)| {
            let query_candidates = candidates.get(query_idx);
            let verified = query_candidates
                .iter()
                .filter(|&&candidate| match oracle.test(query, &database[candidate]) {
                    Verdict::Match => true,
                    Verdict::NoMatch => false,
                    Verdict::TimedOut => {
                        log::warn!(
                            "Timed out verifying query {} against graph {}, treating as no match",
                            query_idx,
                            candidate
                        );
                        false
                    }
                })
                .count();
            QueryScore::new(query_candidates.len(), verified)
        })
        .collect::<Vec<_>>();

    Ok(Scores::new(per_query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::OracleConfig,
        graph::GdlGraph,
        matching::BacktrackingOracle,
    };

    fn graph(gdl: &str) -> Graph {
        gdl.parse::<GdlGraph>().unwrap().into_inner()
    }

    fn oracle() -> BacktrackingOracle {
        BacktrackingOracle::new(&OracleConfig::default()).unwrap()
    }

    #[test]
    fn test_filter_by_dominance() {
        let database = FeatureMatrix::from_rows(2, &[[true, true], [true, false], [false, true]]);
        let queries = FeatureMatrix::from_rows(2, &[[true, false], [false, false]]);

        let candidates = filter(&database, &queries).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates.get(0), &[0, 1]);
        // a query without features matches everything
        assert_eq!(candidates.get(1), &[0, 1, 2]);
    }

    #[test]
    fn test_filter_width_mismatch() {
        let database = FeatureMatrix::new(2, 3);
        let queries = FeatureMatrix::new(1, 2);

        assert!(matches!(
            filter(&database, &queries),
            Err(Error::FeatureWidthMismatch {
                database: 3,
                queries: 2
            })
        ));
    }

    #[test]
    fn test_filter_degenerate() {
        let candidates = filter(&FeatureMatrix::new(0, 2), &FeatureMatrix::new(2, 2)).unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.get(0).is_empty());

        let candidates = filter(&FeatureMatrix::new(3, 2), &FeatureMatrix::new(0, 2)).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_write_to() {
        let candidates = CandidateSets::new(vec![vec![0, 4, 7], vec![]]);
        let mut out = Vec::new();

        candidates.write_to(&mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "q # 0\nc # 0 4 7\nq # 1\nc # \n"
        );
    }

    #[test]
    fn test_statistics() {
        let candidates = CandidateSets::new(vec![vec![0, 1], vec![2], vec![0, 1, 2]]);
        let statistics = candidates.statistics(10);

        assert_eq!(statistics.queries, 3);
        assert_eq!(statistics.min, 1);
        assert_eq!(statistics.max, 3);
        assert!((statistics.average - 2.0).abs() < 1e-12);
        assert!((statistics.filtering_ratio - 0.8).abs() < 1e-12);

        let empty = CandidateSets::default().statistics(0);
        assert_eq!((empty.min, empty.max), (0, 0));
        assert_eq!(empty.filtering_ratio, 0.0);
    }

    #[test]
    fn test_verify_and_score() {
        let database = vec![
            graph("(n0:L0),(n1:L1),(n0)-->(n1)"),
            graph("(n0:L0),(n1:L2),(n0)-->(n1)"),
            graph("(n0:L0),(n1:L1),(n2:L1),(n0)-->(n1),(n0)-->(n2)"),
        ];
        let queries = vec![graph("(n0:L0),(n1:L1),(n0)-->(n1)"), graph("(n0:L3)")];
        let candidates = CandidateSets::new(vec![vec![0, 1, 2], vec![]]);

        let scores = verify_and_score(&candidates, &queries, &database, &oracle()).unwrap();

        assert_eq!(scores.per_query[0].candidates, 3);
        assert_eq!(scores.per_query[0].verified, 2);
        assert_eq!(scores.per_query[0].status(), Status::Good);
        assert_eq!(scores.per_query[1].candidates, 0);
        assert_eq!(scores.per_query[1].precision, 0.0);
        assert_eq!(scores.per_query[1].status(), Status::Poor);
        assert_eq!(scores.total_verified, 2);
        assert_eq!(scores.total_candidates, 3);
        assert!((scores.avg_precision - 1.0 / 3.0).abs() < 1e-12);
        assert!((scores.avg_candidates - 1.5).abs() < 1e-12);
        assert!((scores.avg_verified - 1.0).abs() < 1e-12);
        assert!((scores.total_precision() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_dominance_example() {
        // database [1,1], [1,0], [0,1] and query [1,0]
        let database = vec![
            graph("(n0:L0),(n1:L1),(n2:L2),(n0)-->(n1),(n1)-->(n2)"),
            graph("(n0:L0),(n1:L1),(n0)-->(n1)"),
            graph("(n0:L1),(n1:L2),(n0)-->(n1)"),
        ];
        let queries = vec![graph("(n0:L0),(n1:L1),(n2:L2),(n0)-->(n1),(n1)-->(n2)")];
        let db_features =
            FeatureMatrix::from_rows(2, &[[true, true], [true, false], [false, true]]);
        let query_features = FeatureMatrix::from_rows(2, &[[true, false]]);

        let candidates = filter(&db_features, &query_features).unwrap();
        assert_eq!(candidates.get(0), &[0, 1]);

        let scores = verify_and_score(&candidates, &queries, &database, &oracle()).unwrap();
        assert_eq!(scores.per_query[0].candidates, 2);
        assert_eq!(scores.per_query[0].verified, 1);
        assert_eq!(scores.per_query[0].precision, 0.5);
        assert_eq!(scores.per_query[0].status(), Status::Good);
    }

    #[test]
    fn test_precision_bounds() {
        let database = vec![graph("(n0:L0)"), graph("(n0:L1)")];
        let queries = vec![graph("(n0:L0)"), graph("(n0:L1)")];
        let candidates = CandidateSets::new(vec![vec![0, 1], vec![1]]);

        let scores = verify_and_score(&candidates, &queries, &database, &oracle()).unwrap();

        for score in &scores.per_query {
            assert!(score.verified <= score.candidates);
            assert!((0.0..=1.0).contains(&score.precision));
        }
        assert_eq!(scores.per_query[0].precision, 0.5);
        assert_eq!(scores.per_query[1].precision, 1.0);
    }

    #[test]
    fn test_candidate_out_of_range() {
        let database = vec![graph("(n0:L0)")];
        let queries = vec![graph("(n0:L0)")];
        let candidates = CandidateSets::new(vec![vec![0, 5]]);

        assert!(matches!(
            verify_and_score(&candidates, &queries, &database, &oracle()),
            Err(Error::CandidateOutOfRange {
                query: 0,
                candidate: 5,
                database: 1
            })
        ));
    }

    #[test]
    fn test_query_count_mismatch() {
        let candidates = CandidateSets::new(vec![vec![], vec![]]);

        assert!(matches!(
            verify_and_score(&candidates, &[graph("(n0:L0)")], &[], &oracle()),
            Err(Error::QueryCountMismatch {
                candidates: 2,
                queries: 1
            })
        ));
    }
}
