use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{graph::Graph, mine::MinedPatterns, pattern::Pattern, Error};

/// A pattern picked by [`select`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedPattern {
    pub pattern: Pattern,
    pub score: f64,
    pub support: usize,
    /// Picked after the diversity constraint ran out of candidates.
    pub backfilled: bool,
}

impl SelectedPattern {
    pub fn graph(&self) -> Graph {
        self.pattern.to_graph()
    }
}

/// Materializes the selected patterns in selection order.
pub fn graphs(selected: &[SelectedPattern]) -> Vec<Graph> {
    selected.iter().map(SelectedPattern::graph).collect()
}

/// Entropy of the split a pattern induces on the database, weighted by how
/// balanced the split is and by the support itself.
///
/// Patterns contained in none or all of the graphs do not discriminate
/// anything and score zero.
pub fn score(support: usize, graph_count: usize) -> f64 {
    if support == 0 || support >= graph_count {
        return 0.0;
    }
    let present = support as f64 / graph_count as f64;
    let absent = 1.0 - present;
    let entropy = -present * present.log2() - absent * absent.log2();
    let balance = 2.0 * f64::min(present, absent);
    entropy * balance * support as f64
}

/// Jaccard similarity of two sorted occurrence sets.
/// Zero if either of them is empty.
pub fn jaccard(left: &[usize], right: &[usize]) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let (mut i, mut j, mut intersection) = (0, 0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                intersection += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = left.len() + right.len() - intersection;

    intersection as f64 / union as f64
}

struct Candidate<'a> {
    pattern: Pattern,
    occurrences: &'a [usize],
    score: f64,
}

/// Greedily picks up to `k` patterns by descending score.
///
/// A pattern is accepted only if the Jaccard similarity between its
/// occurrence set and that of every pattern accepted so far is at most
/// `overlap_threshold`. If fewer than `k` patterns pass, the remaining slots
/// are filled by score alone and marked as `backfilled`.
///
/// This is a greedy heuristic for a diverse, high scoring set and does not
/// guarantee an optimal one. Equal scores keep enumeration order, paths
/// before trees.
pub fn select(
    mined: &MinedPatterns,
    k: usize,
    graph_count: usize,
    overlap_threshold: f64,
) -> Vec<SelectedPattern> {
    let paths = mined.paths.iter().map(|(path, occurrences)| Candidate {
        pattern: Pattern::Path(path.clone()),
        occurrences,
        score: score(occurrences.len(), graph_count),
    });
    let trees = mined.trees.iter().map(|(tree, occurrences)| Candidate {
        pattern: Pattern::Tree(tree.clone()),
        occurrences,
        score: score(occurrences.len(), graph_count),
    });
    let mut candidates = paths.chain(trees).collect::<Vec<_>>();

    // stable, ties keep enumeration order
    candidates.sort_by(|left, right| right.score.total_cmp(&left.score));

    for (rank, candidate) in candidates.iter().take(10).enumerate() {
        let support = candidate.occurrences.len();
        log::info!(
            "{}. [{}] support: {}/{} ({:.1}%), score: {:.4}",
            rank + 1,
            candidate.pattern.kind(),
            support,
            graph_count,
            100.0 * support as f64 / usize::max(graph_count, 1) as f64,
            candidate.score
        );
    }

    let mut selected = Vec::with_capacity(usize::min(k, candidates.len()));
    let mut occurrence_sets = Vec::<&[usize]>::with_capacity(selected.capacity());
    let mut accepted = HashSet::with_capacity(selected.capacity());

    for candidate in &candidates {
        if selected.len() >= k {
            break;
        }
        let is_diverse = occurrence_sets
            .iter()
            .all(|occurrences| jaccard(candidate.occurrences, occurrences) <= overlap_threshold);
        if is_diverse {
            accepted.insert(&candidate.pattern);
            occurrence_sets.push(candidate.occurrences);
            selected.push(picked(candidate, false));
        }
    }

    if selected.len() < k {
        log::info!(
            "{} patterns passed the diversity filter, back-filling up to {}",
            selected.len(),
            k
        );
        for candidate in &candidates {
            if selected.len() >= k {
                break;
            }
            if accepted.insert(&candidate.pattern) {
                selected.push(picked(candidate, true));
            }
        }
    }

    let trees = selected
        .iter()
        .filter(|s| matches!(s.pattern, Pattern::Tree(_)))
        .count();
    log::info!(
        "Selected {} patterns ({} paths, {} trees) out of {}",
        selected.len(),
        selected.len() - trees,
        trees,
        candidates.len()
    );

    selected
}

fn picked(candidate: &Candidate<'_>, backfilled: bool) -> SelectedPattern {
    SelectedPattern {
        pattern: candidate.pattern.clone(),
        score: candidate.score,
        support: candidate.occurrences.len(),
        backfilled,
    }
}

/// Stores pattern graphs in selection order.
pub fn save_patterns(path: &Path, patterns: &[Graph]) -> Result<(), Error> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, patterns)?;
    Ok(())
}

pub fn load_patterns(path: &Path) -> Result<Vec<Graph>, Error> {
    let reader = BufReader::new(File::open(path)?);
    let patterns = bincode::deserialize_from(reader)?;
    Ok(patterns)
}
