use std::{ops::ControlFlow, time::Instant};

use crate::graph::Graph;

use super::filter::Candidates;

// number of expanded candidates between two deadline checks
const DEADLINE_INTERVAL: usize = 1 << 10;

/// How an enumeration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every embedding has been visited.
    Exhausted,
    /// The action asked to stop.
    Stopped,
    TimedOut,
}

/// Counts all embeddings of the query graph in the data graph.
pub fn gql(
    data_graph: &Graph,
    query_graph: &Graph,
    candidates: &Candidates,
    order: &[usize],
) -> usize {
    let (embedding_count, _) = gql_with(data_graph, query_graph, candidates, order, None, |_| {
        ControlFlow::Continue(())
    });
    embedding_count
}

/// Enumerates embeddings of the query graph in the data graph and calls
/// `action` with each of them, indexed by query node.
///
/// An embedding maps query nodes to distinct data nodes with the same label
/// such that every query edge maps to a data edge with the same label.
pub fn gql_with<F>(
    data_graph: &Graph,
    query_graph: &Graph,
    candidates: &Candidates,
    order: &[usize],
    deadline: Option<Instant>,
    mut action: F,
) -> (usize, Outcome)
where
    F: FnMut(&[usize]) -> ControlFlow<()>,
{
    let mut embedding_count = 0;

    if order.is_empty() {
        return (embedding_count, Outcome::Exhausted);
    }

    // Stores the neighbors for each query node that have already been visited
    // according to the defined order.
    let visited_neighbors = visited_neighbors(query_graph, order);

    // The root of the traversal.
    let start_node = order[0];
    let max_depth = query_graph.node_count();

    // Tracks which data node has already been visited during the traversal.
    let mut visited = vec![false; data_graph.node_count()];

    // Represents the valid next candidates out of the possible candidates for each depth.
    // For depth 0, this is equivalent to the candidates of query node at order[0].
    let mut valid_candidates = Vec::with_capacity(max_depth);
    valid_candidates.push(Vec::from(candidates.candidates(start_node)));
    for &u in order[1..].iter() {
        // We pre-allocate the vec with the number of candidates since we can't
        // know how many of them will be valid neighbors according to the query.
        valid_candidates.push(vec![0; candidates.candidate_count(u)]);
    }

    // Idx tracks the currently processed candidate at each depth.
    let mut idx = vec![0_usize; max_depth];
    // Idx_count tracks the number of valid candidates at each depth.
    let mut idx_count = vec![0_usize; max_depth];
    // Stores the mapping between query and data nodes according to order.
    let mut embedding = vec![0_usize; max_depth];

    let mut cur_depth = 0;
    let mut steps = 0_usize;

    idx[cur_depth] = 0;
    idx_count[cur_depth] = candidates.candidate_count(start_node);

    loop {
        while idx[cur_depth] < idx_count[cur_depth] {
            if steps % DEADLINE_INTERVAL == 0 && is_expired(deadline) {
                return (embedding_count, Outcome::TimedOut);
            }
            steps += 1;

            let u = order[cur_depth];
            let v = valid_candidates[cur_depth][idx[cur_depth]];

            embedding[u] = v;
            visited[v] = true;
            idx[cur_depth] += 1;

            if cur_depth == max_depth - 1 {
                embedding_count += 1;
                visited[v] = false;
                if action(&embedding).is_break() {
                    return (embedding_count, Outcome::Stopped);
                }
            } else {
                // Go down into the rabbit hole.
                cur_depth += 1;
                idx[cur_depth] = 0;

                generate_valid_candidates(
                    data_graph,
                    cur_depth,
                    &embedding,
                    &mut idx_count,
                    &mut valid_candidates,
                    &visited,
                    &visited_neighbors,
                    order,
                    candidates,
                );
            }
        }

        if cur_depth == 0 {
            break;
        }
        // backtrack
        cur_depth -= 1;
        visited[embedding[order[cur_depth]]] = false;
    }

    (embedding_count, Outcome::Exhausted)
}

fn is_expired(deadline: Option<Instant>) -> bool {
    matches!(deadline, Some(deadline) if Instant::now() >= deadline)
}

/// For each position in the order stores which neighbors of the node
/// at that position already have been visited, together with the label
/// of the edge leading to them.
fn visited_neighbors(query_graph: &Graph, order: &[usize]) -> Vec<Vec<(usize, usize)>> {
    let max_depth = query_graph.node_count();
    let start_node = order[0];

    let mut blacklist = vec![Vec::<(usize, usize)>::new(); max_depth];
    let mut visited = vec![false; max_depth];
    visited[start_node] = true;

    for (depth, &cur_node) in order.iter().enumerate().skip(1) {
        let neighbors = query_graph
            .neighbors(cur_node)
            .iter()
            .zip(query_graph.neighbor_labels(cur_node));

        for (&neighbor, &edge_label) in neighbors {
            if visited[neighbor] {
                blacklist[depth].push((neighbor, edge_label));
            }
        }
        visited[cur_node] = true;
    }

    blacklist
}

#[allow(clippy::too_many_arguments)]
fn generate_valid_candidates(
    data_graph: &Graph,
    depth: usize,
    embedding: &[usize],
    idx_count: &mut [usize],
    valid_candidates: &mut [Vec<usize>],
    visited: &[bool],
    visited_neighbors: &[Vec<(usize, usize)>],
    order: &[usize],
    candidates: &Candidates,
) {
    let u = order[depth];

    idx_count[depth] = 0;

    for &v in candidates.candidates(u) {
        if visited[v] {
            continue;
        }

        // Visited neighbors contains the adjacent query nodes that
        // we already evaluated and mapped to a data node. We need
        // to make sure that for each relationship to those neighbors
        // there exists a relationship with the same label in the data
        // graph that points to the candidate node v.
        let valid = visited_neighbors[depth]
            .iter()
            .all(|&(u_nbr, edge_label)| {
                data_graph.edge_label(v, embedding[u_nbr]) == Some(edge_label)
            });

        if valid {
            valid_candidates[depth][idx_count[depth]] = v;
            idx_count[depth] += 1;
        }
    }
}
