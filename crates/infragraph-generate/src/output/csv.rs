use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use infragraph_core::{AttributeValue, Edge, EdgeType, Entity, EntityKind};

use crate::output::{CountingWriter, unavailable};
use crate::sink::{BatchError, GraphSink, IdentityIndex, Operation, SinkError};

type FileWriter = CountingWriter<Box<dyn Write + Send>>;
type Opener = fn(&Path) -> io::Result<Box<dyn Write + Send>>;
type RowBuffer = csv::Writer<Vec<u8>>;

/// Column holding the node identifier in a node file.
pub const NODE_ID_COLUMN: &str = "id:ID";
pub const NODE_LABEL_COLUMN: &str = ":LABEL";
pub const START_ID_COLUMN: &str = ":START_ID";
pub const END_ID_COLUMN: &str = ":END_ID";
pub const TYPE_COLUMN: &str = ":TYPE";
/// Header suffix marking an integer attribute column.
pub const INT_SUFFIX: &str = ":int";

pub fn node_file_name(kind: EntityKind) -> String {
    format!("nodes_{}.csv", kind.label())
}

pub fn relationship_file_name(edge_type: EdgeType) -> String {
    format!("relationships_{}.csv", edge_type.as_str())
}

/// Writes the `neo4j-admin database import` layout: one node file per kind
/// and one relationship file per edge type.
///
/// A batch is encoded in memory first and appended to the files only once
/// every row encoded. If an append fails the files may hold part of the
/// batch, so the sink refuses every later batch instead of writing rows twice.
pub struct CsvExportSink {
    dir: PathBuf,
    index: IdentityIndex,
    nodes: BTreeMap<EntityKind, NodeFile>,
    relationships: BTreeMap<EdgeType, FileWriter>,
    open: Opener,
    poisoned: Option<String>,
}

struct NodeFile {
    columns: Vec<String>,
    writer: FileWriter,
}

/// Rows of one batch, grouped by target file.
#[derive(Default)]
struct StagedBatch {
    nodes: BTreeMap<EntityKind, StagedNodes>,
    relationships: BTreeMap<EdgeType, RowBuffer>,
}

struct StagedNodes {
    columns: Vec<String>,
    rows: RowBuffer,
}

impl CsvExportSink {
    pub fn create(dir: &Path) -> Result<Self, SinkError> {
        std::fs::create_dir_all(dir).map_err(unavailable)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            index: IdentityIndex::new(),
            nodes: BTreeMap::new(),
            relationships: BTreeMap::new(),
            open: open_file,
            poisoned: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bytes handed to the files so far; exact after `flush`.
    pub fn bytes_written(&self) -> u64 {
        let nodes: u64 = self
            .nodes
            .values()
            .map(|file| file.writer.bytes_written())
            .sum();
        let relationships: u64 = self
            .relationships
            .values()
            .map(|writer| writer.bytes_written())
            .sum();
        nodes + relationships
    }

    /// Set after an append failed partway; the export is incomplete.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    fn stage_entity(&self, staged: &mut StagedBatch, entity: &Entity) -> Result<(), SinkError> {
        let nodes = match staged.nodes.entry(entity.kind) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut rows = row_buffer();
                let columns = match self.nodes.get(&entity.kind) {
                    Some(file) => file.columns.clone(),
                    None => {
                        let (columns, header) = node_header(entity);
                        rows.write_record(&header).map_err(unavailable)?;
                        columns
                    }
                };
                entry.insert(StagedNodes { columns, rows })
            }
        };

        let mut record = Vec::with_capacity(nodes.columns.len() + 2);
        record.push(entity.id.to_string());
        for column in &nodes.columns {
            record.push(
                entity
                    .attribute(column)
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            );
        }
        record.push(entity.kind.label().to_string());
        nodes.rows.write_record(&record).map_err(unavailable)
    }

    fn stage_edge(&self, staged: &mut StagedBatch, edge: &Edge) -> Result<(), SinkError> {
        let rows = match staged.relationships.entry(edge.edge_type) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut rows = row_buffer();
                if !self.relationships.contains_key(&edge.edge_type) {
                    rows.write_record([START_ID_COLUMN, END_ID_COLUMN, TYPE_COLUMN])
                        .map_err(unavailable)?;
                }
                entry.insert(rows)
            }
        };
        rows.write_record([
            edge.source.id.as_str(),
            edge.target.id.as_str(),
            edge.edge_type.as_str(),
        ])
        .map_err(unavailable)
    }

    /// Append encoded rows, creating files on first use.
    fn append(&mut self, staged: StagedBatch) -> Result<(), SinkError> {
        for (kind, nodes) in staged.nodes {
            let bytes = nodes.rows.into_inner().map_err(unavailable)?;
            let file = match self.nodes.entry(kind) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let path = self.dir.join(node_file_name(kind));
                    let writer = (self.open)(&path).map_err(unavailable)?;
                    entry.insert(NodeFile {
                        columns: nodes.columns,
                        writer: CountingWriter::new(writer),
                    })
                }
            };
            file.writer.write_all(&bytes).map_err(unavailable)?;
        }

        for (edge_type, rows) in staged.relationships {
            let bytes = rows.into_inner().map_err(unavailable)?;
            let writer = match self.relationships.entry(edge_type) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let path = self.dir.join(relationship_file_name(edge_type));
                    let writer = (self.open)(&path).map_err(unavailable)?;
                    entry.insert(CountingWriter::new(writer))
                }
            };
            writer.write_all(&bytes).map_err(unavailable)?;
        }
        Ok(())
    }
}

/// Attribute columns and the header record for a kind's first entity;
/// generated kinds carry a fixed attribute set.
fn node_header(first: &Entity) -> (Vec<String>, Vec<String>) {
    let columns: Vec<String> = first.attributes.keys().cloned().collect();
    let mut header = vec![NODE_ID_COLUMN.to_string()];
    for (name, value) in &first.attributes {
        match value {
            AttributeValue::Int(_) => header.push(format!("{name}{INT_SUFFIX}")),
            AttributeValue::Text(_) => header.push(name.clone()),
        }
    }
    header.push(NODE_LABEL_COLUMN.to_string());
    (columns, header)
}

fn row_buffer() -> RowBuffer {
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new())
}

fn open_file(path: &Path) -> io::Result<Box<dyn Write + Send>> {
    Ok(Box::new(BufWriter::new(File::create(path)?)))
}

impl GraphSink for CsvExportSink {
    /// Bulk import has no constraint statements; uniqueness is enforced
    /// here and by the import tool's ID space.
    fn declare_unique_constraint(
        &mut self,
        kind: EntityKind,
        field: &str,
    ) -> Result<(), SinkError> {
        self.index.declare(kind, field);
        Ok(())
    }

    fn create_entity(&mut self, entity: &Entity) -> Result<(), SinkError> {
        let operation = Operation::CreateEntity(entity.clone());
        self.run_batch(std::slice::from_ref(&operation))
            .map_err(|err| err.source)
    }

    fn create_edge(&mut self, edge: &Edge) -> Result<(), SinkError> {
        let operation = Operation::CreateEdge(edge.clone());
        self.run_batch(std::slice::from_ref(&operation))
            .map_err(|err| err.source)
    }

    fn run_batch(&mut self, operations: &[Operation]) -> Result<(), BatchError> {
        let Some(first) = operations.first() else {
            return Ok(());
        };
        if let Some(reason) = &self.poisoned {
            return Err(BatchError::new(
                0,
                first,
                unavailable(format!("export incomplete after earlier failure: {reason}")),
            ));
        }

        self.index.validate_batch(operations)?;
        let mut staged = StagedBatch::default();
        for (index, operation) in operations.iter().enumerate() {
            let encoded = match operation {
                Operation::CreateEntity(entity) => self.stage_entity(&mut staged, entity),
                Operation::CreateEdge(edge) => self.stage_edge(&mut staged, edge),
            };
            encoded.map_err(|source| BatchError::new(index, operation, source))?;
        }

        if let Err(source) = self.append(staged) {
            warn!(dir = %self.dir.display(), error = %source, "csv export poisoned");
            self.poisoned = Some(source.to_string());
            return Err(BatchError::new(0, first, source));
        }
        self.index.commit_batch(operations);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        for file in self.nodes.values_mut() {
            file.writer.flush().map_err(unavailable)?;
        }
        for writer in self.relationships.values_mut() {
            writer.flush().map_err(unavailable)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use infragraph_core::EntityId;

    use super::*;

    fn temp_out_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("infragraph_{label}_{}", uuid::Uuid::new_v4()))
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Node files open normally; relationship files reject every write.
    fn full_disk_for_relationships(path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let relationship = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("relationships_"));
        if relationship {
            Ok(Box::new(FullDisk))
        } else {
            open_file(path)
        }
    }

    fn host(id: &str) -> Entity {
        Entity::new(EntityId::new(id), EntityKind::Host)
            .with_attribute("cpu", AttributeValue::Int(48))
    }

    fn network_device(id: &str) -> Entity {
        Entity::new(EntityId::new(id), EntityKind::NetworkDevice)
            .with_attribute("type", AttributeValue::Text("Core".to_string()))
    }

    #[test]
    fn writes_import_layout() {
        let dir = temp_out_dir("csv_sink");
        let mut sink = CsvExportSink::create(&dir).expect("sink");
        let host = Entity::new(EntityId::new("host-0"), EntityKind::Host)
            .with_attribute("cpu", AttributeValue::Int(48))
            .with_attribute("vendor", AttributeValue::Text("Dell".to_string()));
        let net = Entity::new(EntityId::new("net-0"), EntityKind::NetworkDevice)
            .with_attribute("type", AttributeValue::Text("Core".to_string()));
        let ops = vec![
            Operation::CreateEntity(host.clone()),
            Operation::CreateEntity(net.clone()),
            Operation::CreateEdge(Edge::new(EdgeType::ConnectedTo, &host, &net)),
        ];
        sink.run_batch(&ops).expect("batch");
        sink.flush().expect("flush");
        assert!(sink.bytes_written() > 0);

        let hosts = std::fs::read_to_string(dir.join("nodes_Host.csv")).expect("hosts");
        let mut lines = hosts.lines();
        assert_eq!(lines.next(), Some("id:ID,cpu:int,vendor,:LABEL"));
        assert_eq!(lines.next(), Some("host-0,48,Dell,Host"));

        let rels =
            std::fs::read_to_string(dir.join("relationships_CONNECTED_TO.csv")).expect("rels");
        assert_eq!(
            rels.lines().collect::<Vec<_>>(),
            vec![":START_ID,:END_ID,:TYPE", "host-0,net-0,CONNECTED_TO"]
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_batch_writes_no_rows() {
        let dir = temp_out_dir("csv_sink_invalid");
        let mut sink = CsvExportSink::create(&dir).expect("sink");
        let pod = Entity::new(EntityId::new("pod-0"), EntityKind::Pod);
        let ops = vec![
            Operation::CreateEntity(pod.clone()),
            Operation::CreateEntity(pod),
        ];
        let err = sink.run_batch(&ops).expect_err("duplicate");
        assert_eq!(err.index, 1);
        sink.flush().expect("flush");
        assert!(!dir.join("nodes_Pod.csv").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn later_batches_append_without_repeating_headers() {
        let dir = temp_out_dir("csv_sink_append");
        let mut sink = CsvExportSink::create(&dir).expect("sink");
        sink.run_batch(&[Operation::CreateEntity(host("host-0"))])
            .expect("first batch");
        sink.run_batch(&[Operation::CreateEntity(host("host-1"))])
            .expect("second batch");
        sink.flush().expect("flush");

        let hosts = std::fs::read_to_string(dir.join("nodes_Host.csv")).expect("hosts");
        assert_eq!(
            hosts.lines().collect::<Vec<_>>(),
            vec!["id:ID,cpu:int,:LABEL", "host-0,48,Host", "host-1,48,Host"]
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_append_refuses_retries_instead_of_duplicating_rows() {
        let dir = temp_out_dir("csv_sink_full_disk");
        let mut sink = CsvExportSink::create(&dir).expect("sink");
        sink.open = full_disk_for_relationships;

        let source = host("host-0");
        let target = network_device("net-0");
        let ops = vec![
            Operation::CreateEntity(source.clone()),
            Operation::CreateEntity(target.clone()),
            Operation::CreateEdge(Edge::new(EdgeType::ConnectedTo, &source, &target)),
        ];

        let err = sink.run_batch(&ops).expect_err("relationship append fails");
        assert!(matches!(err.source, SinkError::BackendUnavailable(_)));
        assert!(sink.is_poisoned());

        let retry = sink.run_batch(&ops).expect_err("export is incomplete");
        assert!(matches!(retry.source, SinkError::BackendUnavailable(_)));
        assert!(retry.to_string().contains("export incomplete"));
        let single = sink.create_entity(&host("host-1")).expect_err("still refused");
        assert!(matches!(single, SinkError::BackendUnavailable(_)));

        sink.flush().expect("flush");
        let hosts = std::fs::read_to_string(dir.join("nodes_Host.csv")).expect("hosts");
        assert_eq!(
            hosts.lines().collect::<Vec<_>>(),
            vec!["id:ID,cpu:int,:LABEL", "host-0,48,Host"]
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
