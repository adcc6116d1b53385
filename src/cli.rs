use pico_args::Arguments;
use std::{ffi::OsStr, path::PathBuf, str::FromStr, time::Duration};
use subgraph_filter::{Filter, GraphFormat, MiningConfig, OracleConfig, SelectionConfig};

use crate::Result;

const HELP: &str = "\
sufi - discriminative subgraph filtering

USAGE:
  sufi mine -d <graphs> -o <patterns> [--raw] [--keep-duplicates] [--labels <file>]
            [-k <n>] [--min-support <n>] [--max-path-length <n>] [--no-trees]
            [--overlap <f>] [--max-patterns <n>]
  sufi features -g <graphs> -p <patterns> -o <features> [--raw] [--keep-duplicates]
            [--labels <file>] [--oracle auto|ldf|gql|nlf] [--timeout-ms <n>]
  sufi candidates -d <db features> -q <query features> -o <candidates>
  sufi query -d <db graphs> -q <query graphs> -p <patterns> [-o <candidates>]
            [--raw] [--keep-duplicates] [--labels <file>] [--oracle auto|ldf|gql|nlf]
            [--timeout-ms <n>]

Graphs are read in the database format unless --raw is given.
Duplicate graphs are removed after loading unless --keep-duplicates is given.
Set RUST_LOG to control the log level.
";

#[derive(Debug)]
pub(crate) enum Command {
    Mine(MineArgs),
    Features(FeatureArgs),
    Candidates(CandidateArgs),
    Query(QueryArgs),
}

#[derive(Debug)]
pub(crate) struct MineArgs {
    pub(crate) database: PathBuf,
    pub(crate) output: PathBuf,
    pub(crate) format: GraphFormat,
    pub(crate) labels: Option<PathBuf>,
    pub(crate) keep_duplicates: bool,
    /// Derived from the database size if unset.
    pub(crate) min_support: Option<usize>,
    pub(crate) mining: MiningConfig,
    pub(crate) selection: SelectionConfig,
}

#[derive(Debug)]
pub(crate) struct FeatureArgs {
    pub(crate) graphs: PathBuf,
    pub(crate) patterns: PathBuf,
    pub(crate) output: PathBuf,
    pub(crate) format: GraphFormat,
    pub(crate) labels: Option<PathBuf>,
    pub(crate) keep_duplicates: bool,
    pub(crate) oracle: OracleConfig,
}

#[derive(Debug)]
pub(crate) struct CandidateArgs {
    pub(crate) database: PathBuf,
    pub(crate) queries: PathBuf,
    pub(crate) output: PathBuf,
}

#[derive(Debug)]
pub(crate) struct QueryArgs {
    pub(crate) database: PathBuf,
    pub(crate) queries: PathBuf,
    pub(crate) patterns: PathBuf,
    pub(crate) output: Option<PathBuf>,
    pub(crate) format: GraphFormat,
    pub(crate) labels: Option<PathBuf>,
    pub(crate) keep_duplicates: bool,
    pub(crate) oracle: OracleConfig,
}

pub(crate) fn main() -> Result<Command> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let command = match pargs.subcommand()?.as_deref() {
        Some("mine") => Command::Mine(mine_args(&mut pargs)?),
        Some("features") => Command::Features(feature_args(&mut pargs)?),
        Some("candidates") => Command::Candidates(candidate_args(&mut pargs)?),
        Some("query") => Command::Query(query_args(&mut pargs)?),
        Some(other) => return Err(eyre::eyre!("Unknown command {}\n\n{}", other, HELP)),
        None => return Err(eyre::eyre!("Missing command\n\n{}", HELP)),
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        return Err(eyre::eyre!("Unused arguments: {:?}", remaining));
    }

    Ok(command)
}

fn as_path_buf(arg: &OsStr) -> Result<PathBuf> {
    Ok(arg.into())
}

fn format(pargs: &mut Arguments) -> GraphFormat {
    if pargs.contains("--raw") {
        GraphFormat::Raw
    } else {
        GraphFormat::Database
    }
}

fn mine_args(pargs: &mut Arguments) -> Result<MineArgs> {
    let defaults = MiningConfig::default();

    let mining = MiningConfig {
        max_path_length: pargs
            .opt_value_from_str("--max-path-length")?
            .unwrap_or(defaults.max_path_length),
        include_trees: !pargs.contains("--no-trees"),
        max_patterns: pargs.opt_value_from_str("--max-patterns")?,
        ..defaults
    };

    let selection = SelectionConfig {
        k: pargs
            .opt_value_from_str("-k")?
            .unwrap_or(SelectionConfig::default().k),
        overlap_threshold: pargs.opt_value_from_str("--overlap")?,
    };

    Ok(MineArgs {
        database: pargs.value_from_os_str(["-d", "--database"], as_path_buf)?,
        output: pargs.value_from_os_str(["-o", "--output"], as_path_buf)?,
        format: format(pargs),
        labels: pargs.opt_value_from_os_str("--labels", as_path_buf)?,
        keep_duplicates: pargs.contains("--keep-duplicates"),
        min_support: pargs.opt_value_from_str("--min-support")?,
        mining,
        selection,
    })
}

fn feature_args(pargs: &mut Arguments) -> Result<FeatureArgs> {
    Ok(FeatureArgs {
        graphs: pargs.value_from_os_str(["-g", "--graphs"], as_path_buf)?,
        patterns: pargs.value_from_os_str(["-p", "--patterns"], as_path_buf)?,
        output: pargs.value_from_os_str(["-o", "--output"], as_path_buf)?,
        format: format(pargs),
        labels: pargs.opt_value_from_os_str("--labels", as_path_buf)?,
        keep_duplicates: pargs.contains("--keep-duplicates"),
        oracle: oracle_config(pargs)?,
    })
}

fn candidate_args(pargs: &mut Arguments) -> Result<CandidateArgs> {
    Ok(CandidateArgs {
        database: pargs.value_from_os_str(["-d", "--database"], as_path_buf)?,
        queries: pargs.value_from_os_str(["-q", "--queries"], as_path_buf)?,
        output: pargs.value_from_os_str(["-o", "--output"], as_path_buf)?,
    })
}

fn query_args(pargs: &mut Arguments) -> Result<QueryArgs> {
    Ok(QueryArgs {
        database: pargs.value_from_os_str(["-d", "--database"], as_path_buf)?,
        queries: pargs.value_from_os_str(["-q", "--queries"], as_path_buf)?,
        patterns: pargs.value_from_os_str(["-p", "--patterns"], as_path_buf)?,
        output: pargs.opt_value_from_os_str(["-o", "--output"], as_path_buf)?,
        format: format(pargs),
        labels: pargs.opt_value_from_os_str("--labels", as_path_buf)?,
        keep_duplicates: pargs.contains("--keep-duplicates"),
        oracle: oracle_config(pargs)?,
    })
}

fn oracle_config(pargs: &mut Arguments) -> Result<OracleConfig> {
    Ok(OracleConfig {
        filter: pargs
            .opt_value_from_fn("--oracle", FilterWrapper::from_str)?
            .map(Filter::from)
            .unwrap_or(Filter::Auto),
        timeout: pargs
            .opt_value_from_str::<_, u64>("--timeout-ms")?
            .map(Duration::from_millis),
    })
}

struct FilterWrapper(Filter);

impl From<FilterWrapper> for Filter {
    fn from(f: FilterWrapper) -> Self {
        f.0
    }
}

impl FromStr for FilterWrapper {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<FilterWrapper> {
        match s {
            "AUTO" | "auto" => Ok(FilterWrapper(Filter::Auto)),
            "LDF" | "ldf" => Ok(FilterWrapper(Filter::Ldf)),
            "GQL" | "gql" => Ok(FilterWrapper(Filter::Gql)),
            "NLF" | "nlf" => Ok(FilterWrapper(Filter::Nlf)),
            _ => Err(eyre::eyre!("Unsupported oracle {}", s)),
        }
    }
}
