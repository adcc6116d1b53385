//! Reading and writing graph databases.
//!
//! Two line based formats are supported:
//!
//! * the raw record format, in which every record starts with a `#` marker
//!   line, followed by the node count, one label per node, an optional edge
//!   count and `source target label` lines. Labels are arbitrary strings.
//! * the database format produced by [`write_database`], with `v id label`
//!   and `e source target label` lines and integer labels.
use atoi::FromRadix10Checked;
use indexmap::IndexSet;
use linereader::LineReader;
use std::{
    collections::HashSet,
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
    str::FromStr,
    time::Instant,
};

use crate::{
    graph::{Graph, GraphBuilder},
    Error,
};

/// Maps label strings to integer ids in first-seen order.
///
/// Node and edge labels share one dictionary. Graphs read in separate runs
/// are only comparable if the dictionary is carried over with
/// [`LabelDictionary::save`] and [`LabelDictionary::load`].
#[derive(Debug, Default, Clone)]
pub struct LabelDictionary {
    labels: IndexSet<String>,
}

impl LabelDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&mut self, label: &str) -> usize {
        match self.labels.get_index_of(label) {
            Some(id) => id,
            None => self.labels.insert_full(label.to_owned()).0,
        }
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.labels.get_index_of(label)
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get_index(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Reads one label per line, the line number being the id.
    pub fn read_from<R: Read>(mut lines: LineReader<R>) -> Result<Self, Error> {
        let mut dictionary = Self::new();
        while let Some(line) = lines.next_line() {
            let line = std::str::from_utf8(line?)
                .map_err(|e| Error::InvalidLabels(e.to_string()))?
                .trim_end_matches(&['\r', '\n'][..]);
            if !dictionary.labels.insert(line.to_owned()) {
                return Err(Error::InvalidLabels(format!("duplicate label {}", line)));
            }
        }
        Ok(dictionary)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        for label in &self.labels {
            writeln!(writer, "{}", label)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let dictionary = Self::read_from(LineReader::new(File::open(path)?))?;
        log::info!("Loaded {} labels from {:?}", dictionary.len(), path);
        Ok(dictionary)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Raw,
    Database,
}

impl FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" | "RAW" => Ok(GraphFormat::Raw),
            "db" | "DB" | "database" => Ok(GraphFormat::Database),
            _ => Err(format!("Unsupported graph format {}", s)),
        }
    }
}

pub fn read_graphs(
    path: &Path,
    format: GraphFormat,
    labels: &mut LabelDictionary,
) -> Result<Vec<Graph>, Error> {
    log::info!("Reading from: {:?}", path);
    let start = Instant::now();
    let file = File::open(path)?;
    let graphs = match format {
        GraphFormat::Raw => parse_records(LineReader::new(file), labels)?,
        GraphFormat::Database => parse_database(LineReader::new(file))?,
    };
    log::info!("Parsed {} graphs in {:?}", graphs.len(), start.elapsed());

    if graphs.is_empty() {
        return Err(Error::EmptyInput(path.display().to_string()));
    }
    Ok(graphs)
}

enum RecordState {
    Outside,
    NodeCount,
    Nodes { next: usize, count: usize },
    EdgeCount,
    Edges { remaining: usize, node_count: usize },
    Done,
}

/// Parses graphs from the raw record format.
///
/// Malformed content is skipped with a warning: a record with an invalid node
/// count is dropped, an invalid edge count drops the edges of its record and
/// an invalid edge line drops that edge. Records without nodes are dropped.
pub fn parse_records<R: Read>(
    mut lines: LineReader<R>,
    labels: &mut LabelDictionary,
) -> Result<Vec<Graph>, Error> {
    let mut graphs = Vec::new();
    let mut record: Option<GraphBuilder> = None;
    let mut state = RecordState::Outside;
    let mut line_number = 0;

    while let Some(line) = lines.next_line() {
        let line = line?;
        line_number += 1;

        let line = match std::str::from_utf8(line) {
            Ok(line) => line.trim(),
            Err(_) => {
                log::warn!("line {}: skipping non UTF-8 content", line_number);
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        // node labels are taken verbatim, even if they look like a marker
        if line.starts_with('#') && !matches!(state, RecordState::Nodes { .. }) {
            finish_record(record.take(), &mut graphs);
            record = Some(GraphBuilder::new());
            state = RecordState::NodeCount;
            continue;
        }

        state = match state {
            RecordState::Outside => RecordState::Outside,
            RecordState::Done => RecordState::Done,
            RecordState::NodeCount => match parse_usize(line.as_bytes()) {
                Some(0) => RecordState::EdgeCount,
                Some(count) => RecordState::Nodes { next: 0, count },
                None => {
                    log::warn!("line {}: invalid node count {:?}, skipping record", line_number, line);
                    record = None;
                    RecordState::Outside
                }
            },
            RecordState::Nodes { next, count } => {
                if let Some(builder) = record.as_mut() {
                    builder.add_node(next, labels.id(line));
                }
                if next + 1 == count {
                    RecordState::EdgeCount
                } else {
                    RecordState::Nodes {
                        next: next + 1,
                        count,
                    }
                }
            }
            RecordState::EdgeCount => match parse_usize(line.as_bytes()) {
                Some(0) => RecordState::Done,
                Some(remaining) => RecordState::Edges {
                    remaining,
                    node_count: record.as_ref().map_or(0, GraphBuilder::node_count),
                },
                None => {
                    log::warn!("line {}: invalid edge count {:?}, skipping edges", line_number, line);
                    RecordState::Done
                }
            },
            RecordState::Edges {
                remaining,
                node_count,
            } => {
                match parse_edge(line, labels) {
                    Some((source, target, label)) if source < node_count && target < node_count => {
                        if let Some(builder) = record.as_mut() {
                            builder.add_edge(source, target, label);
                        }
                    }
                    Some(_) => log::debug!("line {}: edge endpoint out of range", line_number),
                    None => log::warn!("line {}: invalid edge {:?}", line_number, line),
                }
                if remaining == 1 {
                    RecordState::Done
                } else {
                    RecordState::Edges {
                        remaining: remaining - 1,
                        node_count,
                    }
                }
            }
        };
    }

    finish_record(record, &mut graphs);

    Ok(graphs)
}

/// Parses graphs from the database format.
///
/// A record starts with a line beginning with `#` or `t`. Lines that are
/// neither `v` nor `e` lines or that do not contain valid integers are
/// skipped with a warning.
pub fn parse_database<R: Read>(mut lines: LineReader<R>) -> Result<Vec<Graph>, Error> {
    let mut graphs = Vec::new();
    let mut record: Option<GraphBuilder> = None;
    let mut line_number = 0;

    while let Some(line) = lines.next_line() {
        let line = line?;
        line_number += 1;

        let line = trim_ascii(line);
        if line.is_empty() {
            continue;
        }

        match line[0] {
            b'#' | b't' => {
                finish_record(record.take(), &mut graphs);
                record = Some(GraphBuilder::new());
            }
            b'v' | b'e' => {
                let builder = match record.as_mut() {
                    Some(builder) => builder,
                    None => {
                        log::warn!("line {}: element outside of a record", line_number);
                        continue;
                    }
                };
                let fields = line[1..]
                    .split(|b| b.is_ascii_whitespace())
                    .filter(|field| !field.is_empty())
                    .map(parse_usize)
                    .collect::<Option<Vec<_>>>();

                match (line[0], fields.as_deref()) {
                    (b'v', Some(&[id, label])) => {
                        builder.add_node(id, label);
                    }
                    (b'e', Some(&[source, target, label])) => {
                        builder.add_edge(source, target, label);
                    }
                    _ => log::warn!("line {}: skipping malformed line", line_number),
                }
            }
            _ => log::warn!("line {}: skipping unknown line", line_number),
        }
    }

    finish_record(record, &mut graphs);

    Ok(graphs)
}

/// Writes graphs in the database format. Records are numbered by their
/// position, edges are written once with `source < target`.
pub fn write_database<W: Write>(writer: &mut W, graphs: &[Graph]) -> Result<(), Error> {
    for (idx, graph) in graphs.iter().enumerate() {
        writeln!(writer, "t # {}", idx)?;
        for (id, label) in graph.nodes() {
            writeln!(writer, "v {} {}", id, label)?;
        }
        for (source, target, label) in graph.edges() {
            writeln!(writer, "e {} {} {}", source, target, label)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Removes every graph whose canonical key has been seen before.
pub fn deduplicate(graphs: Vec<Graph>) -> Vec<Graph> {
    let total = graphs.len();
    let mut seen = HashSet::with_capacity(total);

    let unique = graphs
        .into_iter()
        .filter(|graph| seen.insert(graph.canonical_key()))
        .collect::<Vec<_>>();

    if unique.len() < total {
        log::info!("Removed {} duplicate graphs", total - unique.len());
    }
    unique
}

fn finish_record(record: Option<GraphBuilder>, graphs: &mut Vec<Graph>) {
    if let Some(builder) = record {
        if builder.node_count() > 0 {
            graphs.push(builder.build());
        }
    }
}

fn parse_edge(line: &str, labels: &mut LabelDictionary) -> Option<(usize, usize, usize)> {
    let mut fields = line.split_whitespace();
    let source = fields.next()?;
    let target = fields.next()?;
    let label = fields.next()?;
    let source = parse_usize(source.as_bytes())?;
    let target = parse_usize(target.as_bytes())?;
    Some((source, target, labels.id(label)))
}

fn parse_usize(field: &[u8]) -> Option<usize> {
    match usize::from_radix_10_checked(field) {
        (Some(value), used) if used > 0 && used == field.len() => Some(value),
        _ => None,
    }
}

fn trim_ascii(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |end| end + 1);
    &line[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use trim_margin::MarginTrimmable;

    fn records(input: &str, labels: &mut LabelDictionary) -> Vec<Graph> {
        let input = input.trim_margin().unwrap();
        parse_records(LineReader::new(input.as_bytes()), labels).unwrap()
    }

    #[test]
    fn label_dictionary_round_trip() {
        let mut labels = LabelDictionary::new();
        assert_eq!(labels.id("C"), 0);
        assert_eq!(labels.id("double bond"), 1);
        assert_eq!(labels.id("C"), 0);

        let mut bytes = Vec::new();
        labels.write_to(&mut bytes).unwrap();
        let mut restored = LabelDictionary::read_from(LineReader::new(bytes.as_slice())).unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get("double bond"), Some(1));
        assert_eq!(restored.label(0), Some("C"));
        assert_eq!(restored.id("N"), 2);
    }

    #[test]
    fn label_dictionary_rejects_duplicates() {
        let result = LabelDictionary::read_from(LineReader::new("C\nO\nC\n".as_bytes()));
        assert!(matches!(result, Err(Error::InvalidLabels(_))));
    }

    fn database(input: &str) -> Vec<Graph> {
        let input = input.trim_margin().unwrap();
        parse_database(LineReader::new(input.as_bytes())).unwrap()
    }

    #[test]
    fn read_raw_records() {
        let mut labels = LabelDictionary::new();
        let graphs = records(
            "
            |#10
            |3
            |C
            |O
            |C
            |2
            |0 1 single
            |1 2 double
            |
            |#11
            |2
            |N
            |C
            |1
            |1 0 single
            |",
            &mut labels,
        );

        assert_eq!(graphs.len(), 2);
        assert_eq!(labels.get("C"), Some(0));
        assert_eq!(labels.get("O"), Some(1));
        assert_eq!(labels.get("single"), Some(2));
        assert_eq!(labels.get("double"), Some(3));
        assert_eq!(labels.get("N"), Some(4));
        assert_eq!(labels.label(4), Some("N"));

        assert_eq!(graphs[0].canonical_key(), "N[0:0,1:1,2:0]E[0-1:2,1-2:3]");
        assert_eq!(graphs[1].canonical_key(), "N[0:4,1:0]E[0-1:2]");
    }

    #[test]
    fn raw_records_without_edges() {
        let mut labels = LabelDictionary::new();
        let graphs = records(
            "
            |#1
            |2
            |A
            |B
            |#2
            |1
            |A
            |0
            |",
            &mut labels,
        );

        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].relationship_count(), 0);
        assert_eq!(graphs[1].node_count(), 1);
    }

    #[test]
    fn malformed_raw_records_are_skipped() {
        let mut labels = LabelDictionary::new();
        let graphs = records(
            "
            |#1
            |many
            |A
            |B
            |#2
            |2
            |A
            |B
            |some
            |0 1 x
            |#3
            |3
            |A
            |B
            |C
            |4
            |0 1 x
            |1 1 x
            |1 7 x
            |2 y x
            |#4
            |0
            |",
            &mut labels,
        );

        assert_eq!(graphs.len(), 2);
        // invalid edge count drops the edges, not the nodes
        assert_eq!(graphs[0].node_count(), 2);
        assert_eq!(graphs[0].relationship_count(), 0);
        // self loop, out of range and non-numeric edges are dropped
        assert_eq!(graphs[1].node_count(), 3);
        assert_eq!(graphs[1].edges().collect::<Vec<_>>(), vec![(0, 1, 3)]);
        assert_eq!(labels.get("x"), Some(3));
    }

    #[test]
    fn rejected_edges_do_not_allocate_labels() {
        let mut labels = LabelDictionary::new();
        let graphs = records(
            "
            |#1
            |2
            |A
            |B
            |3
            |0 z never
            |q 1 never
            |0 1 x
            |",
            &mut labels,
        );

        assert_eq!(graphs[0].edges().collect::<Vec<_>>(), vec![(0, 1, 2)]);
        assert_eq!(labels.get("never"), None);
        assert_eq!(labels.get("x"), Some(2));
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn node_labels_may_start_with_hash() {
        let mut labels = LabelDictionary::new();
        let graphs = records(
            "
            |#1
            |3
            |C
            |#ring
            |#
            |2
            |0 1 a
            |1 2 a
            |#2
            |1
            |N
            |0
            |",
            &mut labels,
        );

        assert_eq!(graphs.len(), 2);
        assert_eq!(labels.get("#ring"), Some(1));
        assert_eq!(labels.get("#"), Some(2));
        assert_eq!(graphs[0].canonical_key(), "N[0:0,1:1,2:2]E[0-1:3,1-2:3]");
        assert_eq!(graphs[1].canonical_key(), "N[0:4]E[]");
    }

    #[test]
    fn dictionaries_are_independent() {
        let input = "
            |#1
            |2
            |B
            |A
            |1
            |0 1 x
            |";

        let mut first = LabelDictionary::new();
        first.id("A");
        let mut second = LabelDictionary::new();

        let left = records(input, &mut first);
        let right = records(input, &mut second);

        assert_eq!(left[0].canonical_key(), "N[0:1,1:0]E[0-1:2]");
        assert_eq!(right[0].canonical_key(), "N[0:0,1:1]E[0-1:2]");
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn read_database() {
        let graphs = database(
            "
            |t # 0
            |v 0 1
            |v 1 2
            |v 2 1
            |e 0 1 0
            |e 2 1 4
            |#
            |v 0 3
            |x 1 2
            |v 1 oops
            |e 0 1
            |",
        );

        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].canonical_key(), "N[0:1,1:2,2:1]E[0-1:0,1-2:4]");
        assert_eq!(graphs[1].canonical_key(), "N[0:3]E[]");
    }

    #[test]
    fn database_with_large_labels() {
        let graphs = database(
            "
            |t # 0
            |v 0 18446744073709551615
            |v 1 3
            |e 0 1 0
            |t # 1
            |v 0 4000000000000
            |v 1 4000000000000
            |e 0 1 18446744073709551615
            |",
        );

        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].nodes_by_label(usize::MAX), &[0]);
        assert_eq!(graphs[0].nodes_by_label(3), &[1]);
        assert_eq!(graphs[1].nodes_by_label(4_000_000_000_000), &[0, 1]);
        assert_eq!(graphs[1].edge_label(0, 1), Some(usize::MAX));
        assert_eq!(graphs[1].label_count(), 1);
    }

    #[test]
    fn database_round_trip() {
        let graphs = database(
            "
            |#
            |v 0 1
            |v 1 2
            |v 5 2
            |e 5 0 3
            |e 1 0 3
            |e 0 1 3
            |#
            |v 0 0
            |",
        );

        let mut buffer = Vec::new();
        write_database(&mut buffer, &graphs).unwrap();
        let output = String::from_utf8(buffer.clone()).unwrap();
        assert_eq!(
            output,
            "t # 0\nv 0 1\nv 1 2\nv 5 2\ne 0 1 3\ne 0 5 3\nt # 1\nv 0 0\n"
        );

        let restored = parse_database(LineReader::new(buffer.as_slice())).unwrap();
        assert_eq!(restored.len(), graphs.len());
        for (restored, graph) in restored.iter().zip(graphs.iter()) {
            assert_eq!(restored.canonical_key(), graph.canonical_key());
        }
    }

    #[test]
    fn deduplicate_keeps_first_occurrence() {
        let graphs = database(
            "
            |#
            |v 0 1
            |v 1 2
            |e 0 1 0
            |#
            |v 0 7
            |#
            |v 1 2
            |v 0 1
            |e 1 0 0
            |#
            |v 0 8
            |",
        );

        let unique = deduplicate(graphs);
        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].canonical_key(), "N[0:1,1:2]E[0-1:0]");
        assert_eq!(unique[1].canonical_key(), "N[0:7]E[]");
        assert_eq!(unique[2].canonical_key(), "N[0:8]E[]");

        let keys = unique.iter().map(Graph::canonical_key).collect::<Vec<_>>();
        let again = deduplicate(unique);
        assert_eq!(again.iter().map(Graph::canonical_key).collect::<Vec<_>>(), keys);
    }

    #[test]
    fn empty_input() {
        let graphs = parse_database(LineReader::new("".as_bytes())).unwrap();
        assert!(graphs.is_empty());

        let mut labels = LabelDictionary::new();
        let graphs = parse_records(LineReader::new("\n\n".as_bytes()), &mut labels).unwrap();
        assert!(graphs.is_empty());
        assert!(labels.is_empty());
    }
}
