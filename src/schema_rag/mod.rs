pub mod cache;
pub mod embedder;
pub mod metadata;
pub mod retriever;
pub mod vector_store;

pub use cache::{SchemaCache, SchemaSnapshot};
pub use embedder::{Embedder, OpenAiEmbedder};
pub use metadata::{
    build_schema_map, infer_relationships, schema_to_chunks, ColumnInfo, Relationship, SchemaMap,
    SchemaSource, TableMetadata, TableRecord,
};
pub use retriever::{ContextRetriever, SchemaRetriever};
pub use vector_store::{Document, Embedding, InMemoryVectorStore, SearchResult};
