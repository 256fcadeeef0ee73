//! Vector Store
//!
//! In-memory cosine-similarity search over embedded schema chunks, persisted
//! as JSON next to the schema snapshot it was built from.

use crate::error::{AgentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Vector embedding (simple f32 vector)
pub type Embedding = Vec<f32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub embedding: Embedding,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryVectorStore {
    /// 0 until the first document fixes it
    dimension: usize,
    documents: Vec<Document>,
    /// `fetched_at` of the schema snapshot the documents were embedded from
    built_from: Option<DateTime<Utc>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    pub fn built_from(&self) -> Option<DateTime<Utc>> {
        self.built_from
    }

    pub fn set_built_from(&mut self, fetched_at: DateTime<Utc>) {
        self.built_from = Some(fetched_at);
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Add a document; an embedding of the wrong dimension is rejected.
    pub fn add_document(&mut self, document: Document) -> Result<()> {
        if self.dimension == 0 {
            self.dimension = document.embedding.len();
        }
        if document.embedding.len() != self.dimension {
            return Err(AgentError::Metadata(format!(
                "Embedding dimension {} doesn't match store dimension {} for '{}'",
                document.embedding.len(),
                self.dimension,
                document.id
            )));
        }
        self.documents.retain(|d| d.id != document.id);
        self.documents.push(document);
        Ok(())
    }

    pub fn add_documents(&mut self, documents: Vec<Document>) -> Result<()> {
        for doc in documents {
            self.add_document(doc)?;
        }
        Ok(())
    }

    /// Top-`k` documents by cosine similarity, best first.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if self.documents.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query_embedding.len() != self.dimension {
            return Err(AgentError::Metadata(format!(
                "Query embedding dimension {} doesn't match store dimension {}",
                query_embedding.len(),
                self.dimension
            )));
        }

        let mut results: Vec<SearchResult> = self
            .documents
            .iter()
            .map(|doc| SearchResult {
                score: cosine_similarity(query_embedding, &doc.embedding),
                document: doc.clone(),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let encoded = std::fs::read_to_string(path)?;
        let store: Self = serde_json::from_str(&encoded).map_err(|e| {
            AgentError::Metadata(format!("Failed to parse vector store {}: {}", path.display(), e))
        })?;
        if store.documents.iter().any(|d| d.embedding.len() != store.dimension) {
            warn!(path = %path.display(), "Vector store has mixed dimensions");
            return Err(AgentError::Metadata("Vector store has mixed embedding dimensions".to_string()));
        }
        Ok(store)
    }
}

/// Compute cosine similarity between two vectors
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, embedding: Vec<f32>) -> Document {
        Document {
            id: id.to_string(),
            text: format!("Table: {}", id),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 1.0);

        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let mut store = InMemoryVectorStore::default();
        store
            .add_documents(vec![
                doc("partner.partner_info", vec![1.0, 0.0]),
                doc("client.trades", vec![0.0, 1.0]),
                doc("client.clients", vec![0.7, 0.7]),
            ])
            .unwrap();

        let hits = store.search(&[1.0, 0.1], 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["partner.partner_info", "client.clients"]);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut store = InMemoryVectorStore::new(2);
        assert!(store.add_document(doc("a", vec![1.0, 0.0, 0.0])).is_err());
        store.add_document(doc("b", vec![1.0, 0.0])).unwrap();
        assert!(store.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_save_and_load_keeps_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema_vectorstore.json");
        let stamp = Utc::now();

        let mut store = InMemoryVectorStore::default();
        store.add_document(doc("partner.partner_info", vec![0.5, 0.5])).unwrap();
        store.set_built_from(stamp);
        store.save(&path).unwrap();

        let loaded = InMemoryVectorStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.built_from(), Some(stamp));
    }
}
