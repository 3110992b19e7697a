//! Vector storage and retrieval

pub mod retriever;
pub mod vector_store;

pub use retriever::Retriever;
pub use vector_store::{
    IndexManifest, LocalVectorStore, SearchResult, SourceInfo, VectorStoreRepository, INDEX_FILE,
};
