use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    graph::Graph,
    matching::{Oracle, Verdict},
    Error,
};

const WORD_BITS: usize = u64::BITS as usize;

/// A binary matrix with one row per graph and one column per pattern.
///
/// Columns are positional: two matrices are comparable iff they were
/// extracted with the same patterns in the same order. Each row is packed
/// into `u64` words, unused bits of the last word are zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: usize,
    columns: usize,
    words: Vec<u64>,
}

impl FeatureMatrix {
    /// An all-zero matrix.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            words: vec![0; rows * words_per_row(columns)],
        }
    }

    /// Panics if a row does not have exactly `columns` entries.
    pub fn from_rows<R: AsRef<[bool]>>(columns: usize, rows: &[R]) -> Self {
        let mut matrix = Self::new(rows.len(), columns);
        for (row, values) in rows.iter().enumerate() {
            let values = values.as_ref();
            assert_eq!(values.len(), columns, "row {} has wrong width", row);
            for (column, &value) in values.iter().enumerate() {
                matrix.set(row, column, value);
            }
        }
        matrix
    }

    fn from_words(rows: usize, columns: usize, words: Vec<u64>) -> Self {
        debug_assert_eq!(words.len(), rows * words_per_row(columns));
        Self {
            rows,
            columns,
            words,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> bool {
        assert!(column < self.columns);
        let word = self.row_words(row)[column / WORD_BITS];
        word & (1 << (column % WORD_BITS)) != 0
    }

    pub fn set(&mut self, row: usize, column: usize, value: bool) {
        assert!(column < self.columns);
        let offset = row * words_per_row(self.columns) + column / WORD_BITS;
        let mask = 1 << (column % WORD_BITS);
        if value {
            self.words[offset] |= mask;
        } else {
            self.words[offset] &= !mask;
        }
    }

    /// The values of a row in column order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = bool> + '_ {
        (0..self.columns).map(move |column| self.get(row, column))
    }

    /// Number of ones in a row.
    pub fn count_ones(&self, row: usize) -> usize {
        self.row_words(row)
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// Whether `row` of this matrix is at least `other_row` of `other` in
    /// every column, i.e. every pattern present in the other graph is present
    /// here as well.
    pub fn dominates(&self, row: usize, other: &FeatureMatrix, other_row: usize) -> bool {
        assert_eq!(self.columns, other.columns, "matrices have different widths");
        self.row_words(row)
            .iter()
            .zip(other.row_words(other_row))
            .all(|(mine, theirs)| theirs & !mine == 0)
    }

    fn row_words(&self, row: usize) -> &[u64] {
        let width = words_per_row(self.columns);
        &self.words[row * width..(row + 1) * width]
    }

    fn is_consistent(&self) -> bool {
        let width = words_per_row(self.columns);
        if self.words.len() != self.rows * width {
            return false;
        }
        let spare = width * WORD_BITS - self.columns;
        spare == 0
            || (0..self.rows).all(|row| self.row_words(row)[width - 1] >> (WORD_BITS - spare) == 0)
    }
}

fn words_per_row(columns: usize) -> usize {
    (columns + WORD_BITS - 1) / WORD_BITS
}

/// Tests every pattern against every graph.
///
/// Rows are computed in parallel and keep the order of `graphs`, columns
/// keep the order of `patterns`. Patterns larger than a graph are rejected
/// without consulting the oracle. Timeouts count as absent and are logged.
pub fn extract(graphs: &[Graph], patterns: &[Graph], oracle: &dyn Oracle) -> FeatureMatrix {
    log::info!(
        "Extracting {} features for {} graphs using {}",
        patterns.len(),
        graphs.len(),
        oracle.name()
    );

    let width = words_per_row(patterns.len());

    let rows = graphs
        .par_iter()
        .enumerate()
        .map(|(graph_idx, graph)| {
            let mut words = vec![0_u64; width];

            for (pattern_idx, pattern) in patterns.iter().enumerate() {
                if pattern.node_count() > graph.node_count()
                    || pattern.relationship_count() > graph.relationship_count()
                {
                    continue;
                }

                match oracle.test(pattern, graph) {
                    Verdict::Match => {
                        words[pattern_idx / WORD_BITS] |= 1 << (pattern_idx % WORD_BITS)
                    }
                    Verdict::NoMatch => {}
                    Verdict::TimedOut => log::warn!(
                        "Timed out testing pattern {} against graph {}, treating as absent",
                        pattern_idx,
                        graph_idx
                    ),
                }
            }

            words
        })
        .collect::<Vec<_>>();

    let matrix = FeatureMatrix::from_words(graphs.len(), patterns.len(), rows.concat());

    let ones = (0..matrix.rows())
        .map(|row| matrix.count_ones(row))
        .sum::<usize>();
    log::debug!(
        "Feature matrix {}x{} has {} ones",
        matrix.rows(),
        matrix.columns(),
        ones
    );

    matrix
}

pub fn save_features(path: &Path, features: &FeatureMatrix) -> Result<(), Error> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, features)?;
    Ok(())
}

pub fn load_features(path: &Path) -> Result<FeatureMatrix, Error> {
    let reader = BufReader::new(File::open(path)?);
    let features: FeatureMatrix = bincode::deserialize_from(reader)?;
    if !features.is_consistent() {
        return Err(Error::from(Box::new(bincode::ErrorKind::Custom(format!(
            "inconsistent feature matrix in {}",
            path.display()
        )))));
    }
    Ok(features)
}
