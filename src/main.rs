/*!
## Sufi (Subgraph Filter)

A command-line utility for answering subgraph containment queries over a
database of small labeled graphs.

`sufi mine` selects discriminative patterns from a graph database,
`sufi features` turns graphs into binary feature vectors over those patterns,
`sufi candidates` prunes the database for each query by feature dominance and
`sufi query` runs all query side stages including verification.

### License

MIT
*/
use std::{fs::File, io::BufWriter, path::Path, time::Instant};

use eyre::{Result, WrapErr};
use subgraph_filter::{
    candidate, feature, resolve, select, store, Graph, GraphFormat, LabelDictionary,
    MiningConfig,
};

mod cli;

use cli::{CandidateArgs, Command, FeatureArgs, MineArgs, QueryArgs};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let total = Instant::now();

    match cli::main()? {
        Command::Mine(args) => mine(args)?,
        Command::Features(args) => features(args)?,
        Command::Candidates(args) => candidates(args)?,
        Command::Query(args) => query(args)?,
    }

    log::info!("Total runtime = {:?}", total.elapsed());

    Ok(())
}

fn mine(args: MineArgs) -> Result<()> {
    let mut labels = LabelDictionary::new();
    let graphs = load_graphs(
        "mining",
        &args.database,
        args.format,
        &mut labels,
        args.keep_duplicates,
    )?;
    save_labels(&labels, args.labels.as_deref())?;

    let graph_count = graphs.len();
    let mining = MiningConfig {
        min_support: args
            .min_support
            .unwrap_or_else(|| MiningConfig::for_database(graph_count).min_support),
        ..args.mining
    };
    log::info!("Mining config: {}", mining);

    let mined = measure("Mine patterns", || subgraph_filter::mine(&graphs, &mining))
        .wrap_err_with(|| format!("mining: {}", args.database.display()))?;

    let overlap_threshold = args.selection.overlap_threshold(graph_count);
    log::info!("Selection config: {}", args.selection);

    let selected = measure("Select patterns", || {
        select::select(&mined, args.selection.k, graph_count, overlap_threshold)
    });
    for (rank, pattern) in selected.iter().enumerate() {
        log::debug!(
            "{}. {} support: {} score: {:.4}{}",
            rank + 1,
            pattern.pattern,
            pattern.support,
            pattern.score,
            if pattern.backfilled { " (back-filled)" } else { "" }
        );
    }

    select::save_patterns(&args.output, &select::graphs(&selected))
        .wrap_err_with(|| format!("selection: {}", args.output.display()))?;
    log::info!(
        "Wrote {} patterns to {}",
        selected.len(),
        args.output.display()
    );

    Ok(())
}

fn features(args: FeatureArgs) -> Result<()> {
    let mut labels = load_labels(args.labels.as_deref())?;
    let graphs = load_graphs(
        "extraction",
        &args.graphs,
        args.format,
        &mut labels,
        args.keep_duplicates,
    )?;
    save_labels(&labels, args.labels.as_deref())?;

    let patterns = select::load_patterns(&args.patterns)
        .wrap_err_with(|| format!("extraction: {}", args.patterns.display()))?;
    let oracle = resolve(&args.oracle).wrap_err("extraction: isomorphism oracle")?;

    let features = measure("Extract features", || {
        feature::extract(&graphs, &patterns, oracle.as_ref())
    });

    feature::save_features(&args.output, &features)
        .wrap_err_with(|| format!("extraction: {}", args.output.display()))?;
    log::info!(
        "Wrote {}x{} feature matrix to {}",
        features.rows(),
        features.columns(),
        args.output.display()
    );

    Ok(())
}

fn candidates(args: CandidateArgs) -> Result<()> {
    let database = feature::load_features(&args.database)
        .wrap_err_with(|| format!("filtering: {}", args.database.display()))?;
    let queries = feature::load_features(&args.queries)
        .wrap_err_with(|| format!("filtering: {}", args.queries.display()))?;

    let candidates = measure("Filter candidates", || {
        candidate::filter(&database, &queries)
    })
    .wrap_err_with(|| format!("filtering: {}", args.queries.display()))?;

    println!("{}", candidates.statistics(database.rows()));

    write_candidates(&candidates, &args.output)
}

fn query(args: QueryArgs) -> Result<()> {
    let mut labels = load_labels(args.labels.as_deref())?;
    let database = load_graphs(
        "extraction",
        &args.database,
        args.format,
        &mut labels,
        args.keep_duplicates,
    )?;
    let queries = load_graphs(
        "extraction",
        &args.queries,
        args.format,
        &mut labels,
        args.keep_duplicates,
    )?;
    save_labels(&labels, args.labels.as_deref())?;

    let patterns = select::load_patterns(&args.patterns)
        .wrap_err_with(|| format!("extraction: {}", args.patterns.display()))?;
    let oracle = resolve(&args.oracle).wrap_err("extraction: isomorphism oracle")?;

    let db_features = measure("Extract database features", || {
        feature::extract(&database, &patterns, oracle.as_ref())
    });
    let query_features = measure("Extract query features", || {
        feature::extract(&queries, &patterns, oracle.as_ref())
    });

    let candidates = measure("Filter candidates", || {
        candidate::filter(&db_features, &query_features)
    })
    .wrap_err_with(|| format!("filtering: {}", args.queries.display()))?;

    println!("{}", candidates.statistics(database.len()));

    if let Some(output) = &args.output {
        write_candidates(&candidates, output)?;
    }

    let scores = measure("Verify candidates", || {
        candidate::verify_and_score(&candidates, &queries, &database, oracle.as_ref())
    })
    .wrap_err_with(|| format!("verification: {}", args.queries.display()))?;

    println!("{}", scores);

    Ok(())
}

fn load_graphs(
    stage: &str,
    path: &Path,
    format: GraphFormat,
    labels: &mut LabelDictionary,
    keep_duplicates: bool,
) -> Result<Vec<Graph>> {
    let graphs = measure("Load graphs", || store::read_graphs(path, format, labels))
        .wrap_err_with(|| format!("{}: {}", stage, path.display()))?;
    if keep_duplicates {
        Ok(graphs)
    } else {
        Ok(store::deduplicate(graphs))
    }
}

fn load_labels(path: Option<&Path>) -> Result<LabelDictionary> {
    match path {
        Some(path) if path.exists() => LabelDictionary::load(path)
            .wrap_err_with(|| format!("loading labels: {}", path.display())),
        _ => Ok(LabelDictionary::new()),
    }
}

fn save_labels(labels: &LabelDictionary, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        labels
            .save(path)
            .wrap_err_with(|| format!("saving labels: {}", path.display()))?;
    }
    Ok(())
}

fn write_candidates(candidates: &candidate::CandidateSets, path: &Path) -> Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("filtering: {}", path.display()))?;
    candidates
        .write_to(&mut BufWriter::new(file))
        .wrap_err_with(|| format!("filtering: {}", path.display()))?;
    log::info!(
        "Wrote candidates for {} queries to {}",
        candidates.len(),
        path.display()
    );
    Ok(())
}

fn measure<R>(desc: &str, func: impl FnOnce() -> R) -> R {
    log::info!("Start :: {}", desc);
    let start = Instant::now();
    let result = func();
    log::info!("Finish :: {} took {:?}", desc, start.elapsed());
    result
}
