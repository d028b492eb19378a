use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use infragraph_core::{AttributeValue, Edge, EdgeType, Entity, EntityKind, IDENTITY_FIELD};

use crate::output::{CountingWriter, unavailable};
use crate::sink::{BatchError, GraphSink, IdentityIndex, Operation, SinkError};

/// Writes a Cypher script replayable with `cypher-shell`.
///
/// Each batch becomes one explicit transaction. Node creations are grouped
/// per label and relationship creations per (type, source label, target
/// label), each as a single `UNWIND` statement. A transaction is rendered
/// whole before it is written; after a failed write the script may end in a
/// partial transaction, so every later batch is refused.
pub struct CypherScriptSink<W: Write = BufWriter<File>> {
    out: CountingWriter<W>,
    index: IdentityIndex,
    transactions: u64,
    poisoned: Option<String>,
}

impl CypherScriptSink<BufWriter<File>> {
    pub fn create(path: &Path, reset: bool) -> Result<Self, SinkError> {
        let file = File::create(path).map_err(unavailable)?;
        Self::new(BufWriter::new(file), reset)
    }
}

impl<W: Write> CypherScriptSink<W> {
    /// Start a script; `reset` first deletes every node in the target store.
    pub fn new(writer: W, reset: bool) -> Result<Self, SinkError> {
        let mut sink = Self {
            out: CountingWriter::new(writer),
            index: IdentityIndex::new(),
            transactions: 0,
            poisoned: None,
        };
        if reset {
            writeln!(sink.out, "MATCH (n) DETACH DELETE n;").map_err(unavailable)?;
        }
        Ok(sink)
    }

    pub fn bytes_written(&self) -> u64 {
        self.out.bytes_written()
    }

    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    pub fn into_inner(mut self) -> Result<W, SinkError> {
        self.out.flush().map_err(unavailable)?;
        Ok(self.out.into_inner())
    }

    fn render_transaction(operations: &[Operation]) -> std::io::Result<Vec<u8>> {
        let mut nodes: BTreeMap<EntityKind, Vec<&Entity>> = BTreeMap::new();
        let mut relationships: BTreeMap<(EdgeType, EntityKind, EntityKind), Vec<&Edge>> =
            BTreeMap::new();
        for operation in operations {
            match operation {
                Operation::CreateEntity(entity) => {
                    nodes.entry(entity.kind).or_default().push(entity)
                }
                Operation::CreateEdge(edge) => relationships
                    .entry((edge.edge_type, edge.source.kind, edge.target.kind))
                    .or_default()
                    .push(edge),
            }
        }

        let mut script = Vec::new();
        writeln!(script, ":begin")?;
        for (kind, entities) in &nodes {
            let rows: Vec<String> = entities.iter().map(|entity| node_row(entity)).collect();
            writeln!(script, "UNWIND [{}] AS row", rows.join(", "))?;
            writeln!(script, "CREATE (n:{}) SET n = row;", kind.label())?;
        }
        for ((edge_type, source, target), edges) in &relationships {
            let rows: Vec<String> = edges
                .iter()
                .map(|edge| {
                    format!(
                        "{{source: {}, target: {}}}",
                        quote(edge.source.id.as_str()),
                        quote(edge.target.id.as_str())
                    )
                })
                .collect();
            writeln!(script, "UNWIND [{}] AS row", rows.join(", "))?;
            writeln!(
                script,
                "MATCH (s:{} {{{IDENTITY_FIELD}: row.source}}), (t:{} {{{IDENTITY_FIELD}: row.target}})",
                source.label(),
                target.label()
            )?;
            writeln!(script, "CREATE (s)-[:{}]->(t);", edge_type.as_str())?;
        }
        writeln!(script, ":commit")?;
        Ok(script)
    }
}

impl<W: Write> GraphSink for CypherScriptSink<W> {
    fn declare_unique_constraint(
        &mut self,
        kind: EntityKind,
        field: &str,
    ) -> Result<(), SinkError> {
        if !self.index.declare(kind, field) {
            return Ok(());
        }
        writeln!(
            self.out,
            "CREATE CONSTRAINT {}_{}_unique IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE;",
            kind.slug().replace('-', "_"),
            field,
            kind.label(),
            field
        )
        .map_err(unavailable)
    }

    fn create_entity(&mut self, entity: &Entity) -> Result<(), SinkError> {
        self.index.check_entity(entity)?;
        writeln!(self.out, "CREATE (:{} {});", entity.kind.label(), node_row(entity))
            .map_err(unavailable)?;
        self.index.insert(entity);
        Ok(())
    }

    fn create_edge(&mut self, edge: &Edge) -> Result<(), SinkError> {
        self.index.check_edge(edge)?;
        writeln!(
            self.out,
            "MATCH (s:{} {{{IDENTITY_FIELD}: {}}}), (t:{} {{{IDENTITY_FIELD}: {}}}) CREATE (s)-[:{}]->(t);",
            edge.source.kind.label(),
            quote(edge.source.id.as_str()),
            edge.target.kind.label(),
            quote(edge.target.id.as_str()),
            edge.edge_type.as_str()
        )
        .map_err(unavailable)
    }

    fn run_batch(&mut self, operations: &[Operation]) -> Result<(), BatchError> {
        let Some(first) = operations.first() else {
            return Ok(());
        };
        if let Some(reason) = &self.poisoned {
            return Err(BatchError::new(
                0,
                first,
                unavailable(format!("script incomplete after earlier failure: {reason}")),
            ));
        }
        self.index.validate_batch(operations)?;
        let script = Self::render_transaction(operations)
            .map_err(|err| BatchError::new(0, first, unavailable(err)))?;
        if let Err(err) = self.out.write_all(&script) {
            self.poisoned = Some(err.to_string());
            return Err(BatchError::new(0, first, unavailable(err)));
        }
        self.index.commit_batch(operations);
        self.transactions += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.out.flush().map_err(unavailable)
    }
}

fn node_row(entity: &Entity) -> String {
    let mut fields = vec![format!("{IDENTITY_FIELD}: {}", quote(entity.id.as_str()))];
    for (key, value) in &entity.attributes {
        fields.push(format!("`{}`: {}", key.replace('`', "``"), literal(value)));
    }
    format!("{{{}}}", fields.join(", "))
}

fn literal(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Int(value) => value.to_string(),
        AttributeValue::Text(value) => quote(value),
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
