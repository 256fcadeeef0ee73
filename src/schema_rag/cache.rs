//! Schema snapshot cache
//!
//! Persists the schema map as `schema_metadata.json` under the metadata
//! directory and refetches it from the `SchemaSource` once it is older than the
//! freshness window.

use crate::config::{WorkflowConfig, MAX_SCHEMA_AGE_HOURS};
use crate::error::{AgentError, Result};
use crate::schema_rag::metadata::{build_schema_map, SchemaMap, SchemaSource};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const SNAPSHOT_FILE: &str = "schema_metadata.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub tables: SchemaMap,
}

pub struct SchemaCache {
    source: Arc<dyn SchemaSource>,
    path: PathBuf,
    max_age: Duration,
    schema_names: Vec<String>,
}

impl SchemaCache {
    pub fn new(
        source: Arc<dyn SchemaSource>,
        metadata_dir: impl AsRef<Path>,
        max_age_hours: i64,
        schema_names: Vec<String>,
    ) -> Self {
        Self {
            source,
            path: metadata_dir.as_ref().join(SNAPSHOT_FILE),
            max_age: Duration::hours(max_age_hours.clamp(0, MAX_SCHEMA_AGE_HOURS)),
            schema_names,
        }
    }

    pub fn from_config(source: Arc<dyn SchemaSource>, config: &WorkflowConfig) -> Self {
        Self::new(
            source,
            &config.metadata_dir,
            config.schema_max_age_hours,
            config.schema_names.clone(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_fresh(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(fetched_at) <= self.max_age
    }

    /// Read the persisted snapshot, if there is one.
    pub fn load(&self) -> Result<Option<SchemaSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let snapshot = serde_json::from_str(&raw).map_err(|e| {
            AgentError::Metadata(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    /// Fetch fresh catalog metadata and persist it.
    pub async fn refresh(&self) -> Result<SchemaSnapshot> {
        info!(schemas = ?self.schema_names, "Refreshing schema metadata");
        let records = self.source.fetch_schema_metadata(&self.schema_names).await?;
        if records.is_empty() {
            warn!("Schema metadata fetch returned no rows");
        }

        let snapshot = SchemaSnapshot {
            fetched_at: Utc::now(),
            tables: build_schema_map(records),
        };

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&snapshot)?)?;
        info!(tables = snapshot.tables.len(), path = %self.path.display(), "Schema metadata saved");
        Ok(snapshot)
    }

    /// Return the persisted snapshot while it is fresh, refetching otherwise.
    pub async fn load_or_refresh(&self) -> Result<SchemaSnapshot> {
        match self.load() {
            Ok(Some(snapshot)) if self.is_fresh(snapshot.fetched_at, Utc::now()) => Ok(snapshot),
            Ok(Some(snapshot)) => {
                let age = Utc::now().signed_duration_since(snapshot.fetched_at);
                info!(age_hours = age.num_hours(), "Schema metadata is stale");
                self.refresh().await
            }
            Ok(None) => {
                info!("Schema metadata file not found, fetching fresh data");
                self.refresh().await
            }
            Err(e) => {
                warn!(error = %e, "Unreadable schema metadata, fetching fresh data");
                self.refresh().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_rag::metadata::{ColumnInfo, TableRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource(AtomicUsize);

    #[async_trait::async_trait]
    impl SchemaSource for CountingSource {
        async fn fetch_schema_metadata(&self, schemas: &[String]) -> Result<Vec<TableRecord>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(schemas
                .iter()
                .map(|schema| TableRecord {
                    table_schema: Some(schema.clone()),
                    table_name: Some("accounts".to_string()),
                    table_description: None,
                    columns: vec![ColumnInfo {
                        column_name: "account_id".to_string(),
                        data_type: "bigint".to_string(),
                        is_primary_key: true,
                    }],
                })
                .collect())
        }
    }

    fn cache(dir: &Path, source: Arc<CountingSource>) -> SchemaCache {
        SchemaCache::new(source, dir, 24, vec!["partner".to_string(), "client".to_string()])
    }

    #[tokio::test]
    async fn test_missing_file_triggers_fetch_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CountingSource(AtomicUsize::new(0)));
        let cache = cache(dir.path(), source.clone());

        let first = cache.load_or_refresh().await.unwrap();
        assert_eq!(first.tables.len(), 2);
        assert!(cache.path().exists());

        let second = cache.load_or_refresh().await.unwrap();
        assert_eq!(second, first);
        assert_eq!(source.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CountingSource(AtomicUsize::new(0)));
        let cache = cache(dir.path(), source.clone());

        let stale = SchemaSnapshot {
            fetched_at: Utc::now() - Duration::hours(25),
            tables: SchemaMap::new(),
        };
        std::fs::write(cache.path(), serde_json::to_string(&stale).unwrap()).unwrap();

        let snapshot = cache.load_or_refresh().await.unwrap();
        assert_eq!(source.0.load(Ordering::SeqCst), 1);
        assert!(snapshot.fetched_at > stale.fetched_at);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CountingSource(AtomicUsize::new(0)));
        let cache = cache(dir.path(), source.clone());
        std::fs::write(cache.path(), "{not json").unwrap();

        assert!(cache.load().is_err());
        let snapshot = cache.load_or_refresh().await.unwrap();
        assert_eq!(snapshot.tables.len(), 2);
    }

    #[test]
    fn test_oversized_window_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CountingSource(AtomicUsize::new(0)));
        let cache = SchemaCache::new(source, dir.path(), i64::MAX, vec!["partner".to_string()]);

        let now = Utc::now();
        assert!(cache.is_fresh(now - Duration::hours(MAX_SCHEMA_AGE_HOURS - 1), now));
        assert!(!cache.is_fresh(now - Duration::hours(MAX_SCHEMA_AGE_HOURS + 1), now));
    }

    #[test]
    fn test_freshness_window() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), Arc::new(CountingSource(AtomicUsize::new(0))));
        let now = Utc::now();
        assert!(cache.is_fresh(now - Duration::hours(23), now));
        assert!(!cache.is_fresh(now - Duration::hours(25), now));
    }
}
