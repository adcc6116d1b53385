use cfg_if::cfg_if;

use crate::graph::Graph;

use super::Candidates;

/// Label and degree filtering, additionally requiring that a data node has
/// at least as many neighbors per `(edge label, neighbor label)` pair as the
/// query node. Falls back to LDF without the `neighbor-label-frequency`
/// feature.
pub fn nlf_filter(data_graph: &Graph, query_graph: &Graph) -> Option<Candidates> {
    cfg_if! {
        if #[cfg(feature = "neighbor-label-frequency")] {
            nlf_filter_(data_graph, query_graph)
        } else {
            super::ldf_filter(data_graph, query_graph)
        }
    }
}

#[cfg(feature = "neighbor-label-frequency")]
fn nlf_filter_(data_graph: &Graph, query_graph: &Graph) -> Option<Candidates> {
    let mut candidates = Candidates::from((data_graph, query_graph));

    for query_node in 0..query_graph.node_count() {
        let label = query_graph.label(query_node);
        let degree = query_graph.degree(query_node);
        let query_nlf = query_graph.neighbor_label_frequency(query_node);

        for &data_node in data_graph.nodes_by_label(label) {
            if data_graph.degree(data_node) < degree {
                continue;
            }

            let data_nlf = data_graph.neighbor_label_frequency(data_node);
            if data_nlf.len() < query_nlf.len() {
                continue;
            }

            let is_valid = query_nlf.iter().all(|(key, query_count)| {
                matches!(data_nlf.get(key), Some(data_count) if data_count >= query_count)
            });

            if is_valid {
                candidates.add_candidate(query_node, data_node);
            }
        }

        if candidates.candidate_count(query_node) == 0 {
            return None;
        }
    }

    Some(candidates)
}

#[cfg(all(test, feature = "neighbor-label-frequency"))]
mod tests {
    use super::*;
    use crate::graph::GdlGraph;
    use trim_margin::MarginTrimmable;

    fn graph(gdl: &str) -> GdlGraph {
        gdl.trim_margin().unwrap().parse::<GdlGraph>().unwrap()
    }

    #[test]
    fn test_nlf_filter() {
        // n0 and n4 pass LDF for the query center, only n4 has two L1 neighbors
        let data_graph = graph(
            "
            |(n0:L0),(n1:L1),(n2:L2),(n3:L1),(n4:L0),(n5:L1)
            |(n0)-->(n1)
            |(n0)-->(n2)
            |(n4)-->(n3)
            |(n4)-->(n5)
            |",
        );
        let query_graph = graph(
            "
            |(n0:L0),(n1:L1),(n2:L1)
            |(n0)-->(n1)
            |(n0)-->(n2)
            |",
        );

        let candidates = nlf_filter(&data_graph, &query_graph).unwrap();

        assert_eq!(candidates.candidates(0), &[4]);
        assert_eq!(candidates.candidates(1), &[1, 3, 5]);
        assert_eq!(candidates.candidates(2), &[1, 3, 5]);
    }

    #[test]
    fn test_nlf_filter_checks_every_label() {
        // the last checked pair matches, the first one does not
        let data_graph = graph(
            "
            |(n0:L0),(n1:L1),(n2:L2)
            |(n0)-[:E0]->(n1)
            |(n0)-[:E1]->(n2)
            |",
        );
        let query_graph = graph(
            "
            |(n0:L0),(n1:L1),(n2:L2)
            |(n0)-[:E1]->(n1)
            |(n0)-[:E1]->(n2)
            |",
        );

        assert!(nlf_filter(&data_graph, &query_graph).is_none());
    }
}
