use crate::graph::Graph;

use super::filter::Candidates;

/// Builds a matching order by starting with the node with the minimum
/// number of candidates and iteratively selecting nodes that are adjacent
/// to already selected nodes and having the minimum number of candidates.
///
/// If no unvisited node is adjacent to the selected ones, the query graph
/// is disconnected and the next component starts at its unvisited node with
/// the minimum number of candidates.
pub fn gql_order(query_graph: &Graph, candidates: &Candidates) -> Vec<usize> {
    let node_count = query_graph.node_count();

    let mut visited = vec![false; node_count];
    let mut adjacent = vec![false; node_count];
    let mut order = Vec::<usize>::with_capacity(node_count);

    while order.len() < node_count {
        let next_node = min_candidate_node(query_graph, candidates, |node| {
            !visited[node] && adjacent[node]
        })
        .or_else(|| min_candidate_node(query_graph, candidates, |node| !visited[node]));

        match next_node {
            Some(next_node) => {
                update_valid_vertices(query_graph, next_node, &mut visited, &mut adjacent);
                order.push(next_node);
            }
            None => break,
        }
    }

    order
}

/// Selects the eligible node with the minimum number of candidates.
///
/// Ties are handled by picking the node with a higher degree.
fn min_candidate_node(
    query_graph: &Graph,
    candidates: &Candidates,
    is_eligible: impl Fn(usize) -> bool,
) -> Option<usize> {
    let mut best: Option<usize> = None;

    for node in (0..query_graph.node_count()).filter(|&node| is_eligible(node)) {
        best = match best {
            Some(best_node) => {
                let num_node_candidates = candidates.candidate_count(node);
                let num_best_candidates = candidates.candidate_count(best_node);

                if num_node_candidates < num_best_candidates
                    || (num_node_candidates == num_best_candidates
                        && query_graph.degree(node) > query_graph.degree(best_node))
                {
                    Some(node)
                } else {
                    Some(best_node)
                }
            }
            None => Some(node),
        };
    }

    best
}

fn update_valid_vertices(
    query_graph: &Graph,
    query_node: usize,
    visited: &mut [bool],
    adjacent: &mut [bool],
) {
    visited[query_node] = true;
    for &neighbor in query_graph.neighbors(query_node) {
        adjacent[neighbor] = true;
    }
}
