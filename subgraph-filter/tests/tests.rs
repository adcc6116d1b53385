use std::path::{Path, PathBuf};
use subgraph_filter::{
    extract, feature, filter, mine, resolve, select, store, verify_and_score, Error, Graph,
    GraphBuilder, GraphFormat, LabelDictionary, MiningConfig, OracleConfig, Oracle,
};

const CRATE_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const DATABASE_PATH: &[&str] = &[CRATE_ROOT, "resources", "molecules.txt"];
const QUERY_PATH: &[&str] = &[CRATE_ROOT, "resources", "queries.txt"];

fn molecules() -> (Vec<Graph>, Vec<Graph>) {
    let mut labels = LabelDictionary::new();
    let database = store::read_graphs(
        &DATABASE_PATH.iter().collect::<PathBuf>(),
        GraphFormat::Raw,
        &mut labels,
    )
    .unwrap();
    let queries = store::read_graphs(
        &QUERY_PATH.iter().collect::<PathBuf>(),
        GraphFormat::Raw,
        &mut labels,
    )
    .unwrap();
    (database, queries)
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sufi-{}-{}", std::process::id(), name))
}

/// Deterministic pseudo random numbers for generated graphs.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.0 >> 33) as usize) % bound
    }
}

fn generated_graphs(count: usize, seed: u64) -> Vec<Graph> {
    let mut rng = Lcg(seed);
    (0..count)
        .map(|_| {
            let node_count = 6 + rng.next(5);
            let mut builder = GraphBuilder::new();
            for node in 0..node_count {
                builder.add_node(node, rng.next(3));
            }
            for node in 1..node_count {
                builder.add_edge(node - 1, node, rng.next(2));
            }
            for _ in 0..node_count / 2 {
                builder.add_edge(rng.next(node_count), rng.next(node_count), rng.next(2));
            }
            builder.build()
        })
        .collect()
}

/// The subgraph spanned by the first `node_count` nodes.
fn prefix_subgraph(graph: &Graph, node_count: usize) -> Graph {
    let mut builder = GraphBuilder::new();
    for (id, label) in graph.nodes().take(node_count) {
        builder.add_node(id, label);
    }
    for (source, target, label) in graph.edges() {
        if source < node_count && target < node_count {
            builder.add_edge(source, target, label);
        }
    }
    builder.build()
}

fn assert_complete(
    database: &[Graph],
    queries: &[Graph],
    candidates: &subgraph_filter::CandidateSets,
    oracle: &dyn Oracle,
) {
    for (query_idx, query) in queries.iter().enumerate() {
        for (graph_idx, graph) in database.iter().enumerate() {
            if oracle.test(query, graph).is_match() {
                assert!(
                    candidates.get(query_idx).contains(&graph_idx),
                    "query {} is contained in graph {} but was filtered",
                    query_idx,
                    graph_idx
                );
            }
        }
    }
}

#[test]
fn molecule_pipeline() {
    let (database, queries) = molecules();
    assert_eq!(database.len(), 12);
    assert_eq!(queries.len(), 5);

    let mined = mine(&database, &MiningConfig::for_database(database.len())).unwrap();
    assert!(!mined.is_empty());

    let selected = select::select(&mined, 50, database.len(), 0.8);
    assert!(!selected.is_empty());
    assert!(selected.len() <= 50);

    let patterns = select::graphs(&selected);
    let oracle = resolve(&OracleConfig::default()).unwrap();

    let db_features = extract(&database, &patterns, oracle.as_ref());
    let query_features = extract(&queries, &patterns, oracle.as_ref());
    assert_eq!(db_features.rows(), database.len());
    assert_eq!(query_features.rows(), queries.len());
    assert_eq!(db_features.columns(), patterns.len());

    let candidates = filter(&db_features, &query_features).unwrap();
    assert_eq!(candidates.len(), queries.len());
    assert_complete(&database, &queries, &candidates, oracle.as_ref());

    let scores = verify_and_score(&candidates, &queries, &database, oracle.as_ref()).unwrap();
    for (query_idx, (query, score)) in queries.iter().zip(&scores.per_query).enumerate() {
        let expected = database
            .iter()
            .filter(|graph| oracle.test(query, graph).is_match())
            .count();
        assert_eq!(score.verified, expected, "query {}", query_idx);
        assert_eq!(score.candidates, candidates.get(query_idx).len());
        assert!((0.0..=1.0).contains(&score.precision));
    }

    // C-O-H occurs in graphs 2, 5, 6 and 11
    assert_eq!(scores.per_query[0].verified, 4);
}

#[test]
fn filter_is_complete_on_generated_graphs() {
    let database = generated_graphs(40, 42);
    let queries = database
        .iter()
        .step_by(7)
        .map(|graph| prefix_subgraph(graph, 4))
        .collect::<Vec<_>>();

    let config = MiningConfig {
        max_path_length: 3,
        ..MiningConfig::for_database(database.len())
    };
    let mined = mine(&database, &config).unwrap();
    let selected = select::select(&mined, 20, database.len(), 0.8);
    let patterns = select::graphs(&selected);
    let oracle = resolve(&OracleConfig::default()).unwrap();

    let candidates = filter(
        &extract(&database, &patterns, oracle.as_ref()),
        &extract(&queries, &patterns, oracle.as_ref()),
    )
    .unwrap();

    // every query was cut out of its source graph
    for (query_idx, source) in (0..database.len()).step_by(7).enumerate() {
        assert!(candidates.get(query_idx).contains(&source));
    }
    assert_complete(&database, &queries, &candidates, oracle.as_ref());
}

#[test]
fn no_patterns_keeps_every_graph() {
    let (database, queries) = molecules();
    let mined = mine(&database, &MiningConfig::for_database(database.len())).unwrap();
    let selected = select::select(&mined, 0, database.len(), 0.8);
    assert!(selected.is_empty());

    let oracle = resolve(&OracleConfig::default()).unwrap();
    let db_features = extract(&database, &[], oracle.as_ref());
    let query_features = extract(&queries, &[], oracle.as_ref());
    let candidates = filter(&db_features, &query_features).unwrap();

    for (_, query_candidates) in candidates.iter() {
        assert_eq!(query_candidates.len(), database.len());
    }
    assert_eq!(candidates.statistics(database.len()).filtering_ratio, 0.0);
}

#[test]
fn patterns_and_features_survive_persistence() {
    let (database, _) = molecules();
    let mined = mine(&database, &MiningConfig::for_database(database.len())).unwrap();
    let patterns = select::graphs(&select::select(&mined, 10, database.len(), 0.8));
    let oracle = resolve(&OracleConfig::default()).unwrap();
    let features = extract(&database, &patterns, oracle.as_ref());

    let patterns_path = temp_path("patterns.bin");
    let features_path = temp_path("features.bin");

    select::save_patterns(&patterns_path, &patterns).unwrap();
    feature::save_features(&features_path, &features).unwrap();

    let restored_patterns = select::load_patterns(&patterns_path).unwrap();
    let restored_features = feature::load_features(&features_path).unwrap();

    std::fs::remove_file(&patterns_path).unwrap();
    std::fs::remove_file(&features_path).unwrap();

    assert_eq!(restored_patterns, patterns);
    assert_eq!(restored_features, features);
    assert_eq!(
        extract(&database, &restored_patterns, oracle.as_ref()),
        features
    );
}

#[test]
fn database_format_round_trip() {
    let (database, _) = molecules();
    let path = temp_path("database.txt");

    let mut file = std::fs::File::create(&path).unwrap();
    store::write_database(&mut file, &database).unwrap();
    drop(file);

    let restored =
        store::read_graphs(&path, GraphFormat::Database, &mut LabelDictionary::new()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restored, database);
}

#[test]
fn empty_input_is_an_error() {
    let path = temp_path("empty.txt");
    std::fs::File::create(&path).unwrap();

    let result = store::read_graphs(&path, GraphFormat::Raw, &mut LabelDictionary::new());
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(result, Err(Error::EmptyInput(_))));
}

#[test]
fn missing_input_is_an_error() {
    let path = Path::new(CRATE_ROOT).join("resources").join("missing.txt");
    let result = store::read_graphs(&path, GraphFormat::Raw, &mut LabelDictionary::new());
    assert!(matches!(result, Err(Error::Io { .. })));
}
