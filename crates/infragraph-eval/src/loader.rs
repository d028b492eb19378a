use std::collections::HashMap;
use std::path::{Path, PathBuf};

use infragraph_core::{
    AttributeValue, Edge, EdgeType, Entity, EntityId, EntityKind, EntityRef, TopologySnapshot,
};
use infragraph_generate::output::csv::{
    END_ID_COLUMN, INT_SUFFIX, NODE_ID_COLUMN, NODE_LABEL_COLUMN, START_ID_COLUMN, TYPE_COLUMN,
};

use crate::errors::EvalError;

const NODE_PREFIX: &str = "nodes_";
const RELATIONSHIP_PREFIX: &str = "relationships_";

/// Load a bulk-import CSV export back into a snapshot.
///
/// Node files are read before relationship files so edge endpoints can take
/// their kind from the node they reference. An endpoint that matches no node
/// keeps the first kind its edge type allows and surfaces as a dangling
/// endpoint during evaluation.
pub fn load_csv_export(dir: &Path) -> Result<TopologySnapshot, EvalError> {
    let (node_files, relationship_files) = list_export_files(dir)?;
    if node_files.is_empty() {
        return Err(EvalError::InvalidExport(format!(
            "no node files found in {}",
            dir.display()
        )));
    }

    let mut snapshot = TopologySnapshot::default();
    for path in &node_files {
        read_node_file(path, &mut snapshot.entities)?;
    }

    let kinds: HashMap<&str, EntityKind> = snapshot
        .entities
        .iter()
        .map(|entity| (entity.id.as_str(), entity.kind))
        .collect();
    let mut edges = Vec::new();
    for path in &relationship_files {
        read_relationship_file(path, &kinds, &mut edges)?;
    }
    snapshot.edges = edges;
    Ok(snapshot)
}

fn list_export_files(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), EvalError> {
    let mut nodes = Vec::new();
    let mut relationships = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !name.ends_with(".csv") {
            continue;
        }
        if name.starts_with(NODE_PREFIX) {
            nodes.push(path);
        } else if name.starts_with(RELATIONSHIP_PREFIX) {
            relationships.push(path);
        }
    }
    nodes.sort();
    relationships.sort();
    Ok((nodes, relationships))
}

fn read_node_file(path: &Path, entities: &mut Vec<Entity>) -> Result<(), EvalError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_column = column(&headers, NODE_ID_COLUMN, path)?;
    let label_column = column(&headers, NODE_LABEL_COLUMN, path)?;

    for record in reader.records() {
        let record = record?;
        let label = record.get(label_column).unwrap_or_default();
        let kind = EntityKind::from_label(label).ok_or_else(|| {
            EvalError::InvalidExport(format!("unknown label '{label}' in {}", path.display()))
        })?;
        let id = record.get(id_column).unwrap_or_default();
        let mut entity = Entity::new(EntityId::new(id), kind);

        for (index, header) in headers.iter().enumerate() {
            if index == id_column || index == label_column {
                continue;
            }
            let raw = record.get(index).unwrap_or_default();
            let (name, value) = match header.strip_suffix(INT_SUFFIX) {
                Some(name) => {
                    let parsed = raw.parse::<i64>().map_err(|_| {
                        EvalError::InvalidExport(format!(
                            "column '{header}' in {} holds non-integer '{raw}'",
                            path.display()
                        ))
                    })?;
                    (name, AttributeValue::Int(parsed))
                }
                None => (header, AttributeValue::Text(raw.to_string())),
            };
            entity = entity.with_attribute(name, value);
        }
        entities.push(entity);
    }
    Ok(())
}

fn read_relationship_file(
    path: &Path,
    kinds: &HashMap<&str, EntityKind>,
    edges: &mut Vec<Edge>,
) -> Result<(), EvalError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let start_column = column(&headers, START_ID_COLUMN, path)?;
    let end_column = column(&headers, END_ID_COLUMN, path)?;
    let type_column = column(&headers, TYPE_COLUMN, path)?;

    for record in reader.records() {
        let record = record?;
        let name = record.get(type_column).unwrap_or_default();
        let edge_type = EdgeType::from_name(name).ok_or_else(|| {
            EvalError::InvalidExport(format!(
                "unknown relationship type '{name}' in {}",
                path.display()
            ))
        })?;
        let (fallback_source, fallback_target) = edge_type.endpoints()[0];
        let source = endpoint(record.get(start_column), kinds, fallback_source);
        let target = endpoint(record.get(end_column), kinds, fallback_target);
        edges.push(Edge {
            edge_type,
            source,
            target,
        });
    }
    Ok(())
}

fn endpoint(
    raw: Option<&str>,
    kinds: &HashMap<&str, EntityKind>,
    fallback: EntityKind,
) -> EntityRef {
    let id = raw.unwrap_or_default();
    EntityRef {
        kind: kinds.get(id).copied().unwrap_or(fallback),
        id: EntityId::new(id),
    }
}

fn column(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize, EvalError> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| {
            EvalError::InvalidExport(format!("missing column '{name}' in {}", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(label: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("infragraph_eval_{label}_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn loads_typed_attributes_and_endpoint_kinds() {
        let dir = temp_dir("loader");
        std::fs::write(
            dir.join("nodes_Rack.csv"),
            "id:ID,:LABEL\nrack-0,Rack\n",
        )
        .expect("rack file");
        std::fs::write(
            dir.join("nodes_Host.csv"),
            "id:ID,cpu:int,vendor,:LABEL\nhost-0,16,Dell,Host\n",
        )
        .expect("host file");
        std::fs::write(
            dir.join("relationships_HAS_HOST.csv"),
            ":START_ID,:END_ID,:TYPE\nrack-0,host-0,HAS_HOST\nrack-0,host-7,HAS_HOST\n",
        )
        .expect("relationship file");
        std::fs::write(dir.join("notes.txt"), "ignored").expect("other file");

        let snapshot = load_csv_export(&dir).expect("load");
        assert_eq!(snapshot.entities.len(), 2);
        let host = snapshot
            .entities
            .iter()
            .find(|entity| entity.kind == EntityKind::Host)
            .expect("host");
        assert_eq!(host.attribute("cpu"), Some(&AttributeValue::Int(16)));
        assert_eq!(
            host.attribute("vendor"),
            Some(&AttributeValue::Text("Dell".to_string()))
        );

        assert_eq!(snapshot.edges.len(), 2);
        assert_eq!(snapshot.edges[0].source.kind, EntityKind::Rack);
        assert_eq!(snapshot.edges[1].target.kind, EntityKind::Host);
        assert_eq!(snapshot.edges[1].target.id.as_str(), "host-7");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_unknown_labels() {
        let dir = temp_dir("loader_label");
        std::fs::write(dir.join("nodes_Blade.csv"), "id:ID,:LABEL\nb-0,Blade\n")
            .expect("node file");
        let err = load_csv_export(&dir).expect_err("unknown label");
        assert!(matches!(err, EvalError::InvalidExport(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_directory_is_not_an_export() {
        let dir = temp_dir("loader_empty");
        assert!(matches!(
            load_csv_export(&dir),
            Err(EvalError::InvalidExport(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
