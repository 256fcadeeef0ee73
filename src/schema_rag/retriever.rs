//! Schema RAG Retriever
//!
//! Answers `retrieve(query, k)` with the most relevant schema chunks. The
//! embedding index is rebuilt whenever the schema snapshot it was built from
//! changes.

use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::schema_rag::cache::SchemaCache;
use crate::schema_rag::embedder::Embedder;
use crate::schema_rag::metadata::{schema_to_chunks, SchemaMap};
use crate::schema_rag::vector_store::{Document, InMemoryVectorStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const INDEX_FILE: &str = "schema_vectorstore.json";

/// Source of schema context for SQL generation and correction.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Top-`k` schema chunks for `query`, joined by blank lines.
    async fn retrieve(&self, query: &str, k: usize) -> Result<String>;
}

pub struct SchemaRetriever {
    cache: SchemaCache,
    embedder: Arc<dyn Embedder>,
    index_path: PathBuf,
    index: Mutex<Option<Arc<InMemoryVectorStore>>>,
}

impl SchemaRetriever {
    pub fn new(cache: SchemaCache, embedder: Arc<dyn Embedder>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            embedder,
            index_path: index_path.into(),
            index: Mutex::new(None),
        }
    }

    pub fn from_config(cache: SchemaCache, embedder: Arc<dyn Embedder>, config: &WorkflowConfig) -> Self {
        Self::new(cache, embedder, config.metadata_dir.join(INDEX_FILE))
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Force a snapshot refetch and a full re-embedding. Returns the chunk count.
    pub async fn refresh(&self) -> Result<usize> {
        let snapshot = self.cache.refresh().await?;
        let store = self.build_index(&snapshot.tables, snapshot.fetched_at).await?;
        let count = store.len();
        *self.index.lock().await = Some(Arc::new(store));
        Ok(count)
    }

    async fn build_index(
        &self,
        tables: &SchemaMap,
        fetched_at: DateTime<Utc>,
    ) -> Result<InMemoryVectorStore> {
        let chunks = schema_to_chunks(tables);
        info!(chunks = chunks.len(), "Embedding schema chunks");
        let embeddings = self.embedder.embed(&chunks).await?;

        let mut store = InMemoryVectorStore::default();
        let ids = tables.keys();
        for ((id, text), embedding) in ids.zip(chunks).zip(embeddings) {
            store.add_document(Document {
                id: id.clone(),
                text,
                embedding,
            })?;
        }
        store.set_built_from(fetched_at);

        if let Err(e) = store.save(&self.index_path) {
            warn!(error = %e, path = %self.index_path.display(), "Failed to persist vector store");
        }
        Ok(store)
    }

    /// Current index, loading or rebuilding it when stale. The lock is held
    /// only while the index is checked or replaced.
    async fn current_index(&self) -> Result<Arc<InMemoryVectorStore>> {
        let mut slot = self.index.lock().await;
        if let Some(store) = slot.as_ref() {
            if let Some(built_from) = store.built_from() {
                if self.cache.is_fresh(built_from, Utc::now()) {
                    return Ok(store.clone());
                }
            }
        }
        let store = Arc::new(self.load_or_build().await?);
        *slot = Some(store.clone());
        Ok(store)
    }

    async fn load_or_build(&self) -> Result<InMemoryVectorStore> {
        let snapshot = self.cache.load_or_refresh().await?;

        if self.index_path.exists() {
            match InMemoryVectorStore::load(&self.index_path) {
                Ok(store) if store.built_from() == Some(snapshot.fetched_at) => {
                    debug!(
                        documents = store.len(),
                        dimension = store.dimension(),
                        "Loaded persisted vector store"
                    );
                    return Ok(store);
                }
                Ok(_) => info!("Vector store predates schema snapshot, rebuilding"),
                Err(e) => warn!(error = %e, "Unreadable vector store, rebuilding"),
            }
        }

        self.build_index(&snapshot.tables, snapshot.fetched_at).await
    }
}

#[async_trait]
impl ContextRetriever for SchemaRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<String> {
        let store = self.current_index().await?;
        if store.is_empty() {
            warn!("Schema index is empty; generating without schema context");
            return Ok(String::new());
        }

        let query_embedding = self.embedder.embed_text(query).await?;
        let hits = store.search(&query_embedding, k)?;
        debug!(
            hits = hits.len(),
            tables = ?hits.iter().map(|h| h.document.id.as_str()).collect::<Vec<_>>(),
            "Retrieved schema context"
        );
        Ok(hits
            .into_iter()
            .map(|h| h.document.text)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_rag::metadata::{ColumnInfo, SchemaSource, TableRecord};
    use crate::schema_rag::vector_store::Embedding;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TwoTables;

    #[async_trait]
    impl SchemaSource for TwoTables {
        async fn fetch_schema_metadata(&self, _schemas: &[String]) -> Result<Vec<TableRecord>> {
            let table = |schema: &str, name: &str, column: &str| TableRecord {
                table_schema: Some(schema.to_string()),
                table_name: Some(name.to_string()),
                table_description: None,
                columns: vec![ColumnInfo {
                    column_name: column.to_string(),
                    data_type: "text".to_string(),
                    is_primary_key: false,
                }],
            };
            Ok(vec![
                table("partner", "partner_info", "country"),
                table("client", "trades", "volume"),
            ])
        }
    }

    /// Embeds by keyword: partner-ish text on one axis, trade-ish on the other.
    #[derive(Default)]
    struct KeywordEmbedder {
        batches: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("partner") { 1.0 } else { 0.0 },
                        if t.contains("trade") { 1.0 } else { 0.0 },
                    ]
                })
                .collect())
        }
    }

    /// Tracks how many embedding calls are in flight at once.
    #[derive(Default)]
    struct SlowEmbedder {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn retriever(dir: &Path, embedder: Arc<KeywordEmbedder>) -> SchemaRetriever {
        let cache = SchemaCache::new(Arc::new(TwoTables), dir, 24, vec!["partner".to_string()]);
        SchemaRetriever::new(cache, embedder, dir.join(INDEX_FILE))
    }

    #[tokio::test]
    async fn test_retrieve_returns_most_relevant_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(KeywordEmbedder::default());
        let retriever = retriever(dir.path(), embedder.clone());

        let context = retriever.retrieve("top trades by volume", 1).await.unwrap();
        assert!(context.starts_with("Table: client.trades"));
        assert!(!context.contains("partner_info"));
        assert!(retriever.index_path().exists());
    }

    #[tokio::test]
    async fn test_index_built_once_per_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(KeywordEmbedder::default());
        let retriever = retriever(dir.path(), embedder.clone());

        let both = retriever.retrieve("partner", 7).await.unwrap();
        retriever.retrieve("trade", 7).await.unwrap();

        assert_eq!(both.split("\n\n").count(), 2);
        // one batch for the chunks, one per query
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persisted_index_reused_by_new_retriever() {
        let dir = tempfile::tempdir().unwrap();
        retriever(dir.path(), Arc::new(KeywordEmbedder::default()))
            .retrieve("partner", 1)
            .await
            .unwrap();

        let embedder = Arc::new(KeywordEmbedder::default());
        let second = retriever(dir.path(), embedder.clone());
        let context = second.retrieve("partner", 1).await.unwrap();

        assert!(context.starts_with("Table: partner.partner_info"));
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_queries_embed_in_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(SlowEmbedder::default());
        let cache = SchemaCache::new(Arc::new(TwoTables), dir.path(), 24, vec!["partner".to_string()]);
        let retriever = SchemaRetriever::new(cache, embedder.clone(), dir.path().join(INDEX_FILE));

        retriever.retrieve("warm up", 1).await.unwrap();
        embedder.peak.store(0, Ordering::SeqCst);

        let (a, b, c) = tokio::join!(
            retriever.retrieve("partners", 1),
            retriever.retrieve("trades", 1),
            retriever.retrieve("volume", 1),
        );
        for context in [a, b, c] {
            assert!(context.unwrap().starts_with("Table: "));
        }
        assert_eq!(embedder.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_refresh_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(KeywordEmbedder::default());
        let retriever = retriever(dir.path(), embedder.clone());

        assert_eq!(retriever.refresh().await.unwrap(), 2);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
    }
}
