//! Schema Metadata
//!
//! Table descriptions fetched from the database catalog, keyed as
//! `schema.table`, with foreign-key relationships inferred from column naming.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub is_primary_key: bool,
}

/// One row of the catalog metadata RPC.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableRecord {
    pub table_schema: Option<String>,
    pub table_name: Option<String>,
    pub table_description: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub foreign_key_column: String,
    pub references_table: String,
    pub references_column: String,
    pub constraint_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    pub description: Option<String>,
}

/// `schema.table` -> table metadata
pub type SchemaMap = BTreeMap<String, TableMetadata>;

/// Where catalog metadata comes from (the database in production).
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_schema_metadata(&self, schemas: &[String]) -> Result<Vec<TableRecord>>;
}

/// Key catalog rows by `schema.table` and infer relationships.
/// Rows missing either name are skipped.
pub fn build_schema_map(records: Vec<TableRecord>) -> SchemaMap {
    let mut map = SchemaMap::new();
    for record in records {
        let (Some(schema), Some(table)) = (record.table_schema, record.table_name) else {
            debug!("Skipping catalog row without schema or table name");
            continue;
        };
        if schema.is_empty() || table.is_empty() {
            continue;
        }
        map.insert(
            format!("{}.{}", schema, table),
            TableMetadata {
                columns: record.columns,
                relationships: Vec::new(),
                description: record.table_description,
            },
        );
    }
    infer_relationships(&mut map);
    map
}

/// Infer foreign keys from naming conventions.
///
/// A non-key column named like a primary key of another table references that
/// table. Otherwise a `<prefix>_id` / `<prefix>_pk` column references tables
/// named `<prefix>` or `<prefix>s`.
pub fn infer_relationships(map: &mut SchemaMap) {
    // pk column -> owning table; later tables win on duplicate names
    let mut primary_keys: BTreeMap<String, String> = BTreeMap::new();
    for (table, meta) in map.iter() {
        for column in meta.columns.iter().filter(|c| c.is_primary_key) {
            if !column.column_name.is_empty() {
                primary_keys.insert(column.column_name.clone(), table.clone());
            }
        }
    }

    let mut total = 0;
    for (table, meta) in map.iter_mut() {
        let mut relations = Vec::new();
        for column in &meta.columns {
            let name = &column.column_name;
            if name.is_empty() || column.is_primary_key {
                continue;
            }
            let constraint_name = format!("inferred_fk_{}_{}", table.replace('.', "_"), name);

            if let Some(owner) = primary_keys.get(name).filter(|owner| *owner != table) {
                relations.push(Relationship {
                    foreign_key_column: name.clone(),
                    references_table: owner.clone(),
                    references_column: name.clone(),
                    constraint_name,
                });
                continue;
            }

            if name.ends_with("_id") || name.ends_with("_pk") {
                let prefix = &name[..name.len() - 3];
                let plural = format!("{}s", prefix);
                for (pk_name, pk_table) in &primary_keys {
                    let base = pk_table.rsplit('.').next().unwrap_or(pk_table);
                    if base == prefix || base == plural {
                        relations.push(Relationship {
                            foreign_key_column: name.clone(),
                            references_table: pk_table.clone(),
                            references_column: pk_name.clone(),
                            constraint_name: constraint_name.clone(),
                        });
                    }
                }
            }
        }
        total += relations.len();
        meta.relationships = relations;
    }
    info!(tables = map.len(), relationships = total, "Inferred table relationships");
}

/// Render one text chunk per table for embedding and prompting.
pub fn schema_to_chunks(map: &SchemaMap) -> Vec<String> {
    map.iter()
        .map(|(table, meta)| {
            let mut lines = vec![
                format!("Table: {}", table),
                format!("Description: {}", meta.description.as_deref().unwrap_or_default()),
                "Columns:".to_string(),
            ];
            lines.extend(
                meta.columns
                    .iter()
                    .map(|c| format!("- {} ({})", c.column_name, c.data_type)),
            );
            lines.push("Relationships:".to_string());
            lines.extend(meta.relationships.iter().map(|r| {
                format!(
                    "- {} → {}.{}",
                    r.foreign_key_column, r.references_table, r.references_column
                )
            }));
            lines.join("\n")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, data_type: &str, pk: bool) -> ColumnInfo {
        ColumnInfo {
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            is_primary_key: pk,
        }
    }

    fn record(schema: &str, table: &str, columns: Vec<ColumnInfo>) -> TableRecord {
        TableRecord {
            table_schema: Some(schema.to_string()),
            table_name: Some(table.to_string()),
            table_description: Some(format!("{} table", table)),
            columns,
        }
    }

    fn sample() -> SchemaMap {
        build_schema_map(vec![
            record(
                "partner",
                "partner_info",
                vec![
                    col("partner_id", "bigint", true),
                    col("country", "text", false),
                    col("is_internal", "boolean", false),
                ],
            ),
            record(
                "client",
                "clients",
                vec![
                    col("client_pk", "bigint", true),
                    col("partner_id", "bigint", false),
                ],
            ),
            record(
                "client",
                "trades",
                vec![
                    col("trade_id", "bigint", true),
                    col("client_id", "bigint", false),
                ],
            ),
            TableRecord {
                table_schema: None,
                table_name: Some("orphan".to_string()),
                ..Default::default()
            },
        ])
    }

    #[test]
    fn test_rows_without_names_are_skipped() {
        let map = sample();
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("partner.partner_info"));
    }

    #[test]
    fn test_shared_primary_key_name_becomes_relationship() {
        let map = sample();
        let rels = &map["client.clients"].relationships;
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].references_table, "partner.partner_info");
        assert_eq!(rels[0].references_column, "partner_id");
        assert_eq!(rels[0].constraint_name, "inferred_fk_client_clients_partner_id");
    }

    #[test]
    fn test_prefix_matches_plural_table_name() {
        let map = sample();
        let rels = &map["client.trades"].relationships;
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].foreign_key_column, "client_id");
        assert_eq!(rels[0].references_table, "client.clients");
        assert_eq!(rels[0].references_column, "client_pk");
    }

    #[test]
    fn test_primary_keys_never_reference() {
        let map = sample();
        assert!(map["partner.partner_info"].relationships.is_empty());
    }

    #[test]
    fn test_chunk_layout() {
        let map = sample();
        let chunks = schema_to_chunks(&map);
        let trades = chunks.iter().find(|c| c.starts_with("Table: client.trades")).unwrap();
        assert_eq!(
            trades,
            "Table: client.trades\nDescription: trades table\nColumns:\n- trade_id (bigint)\n- client_id (bigint)\nRelationships:\n- client_id → client.clients.client_pk"
        );
    }
}
