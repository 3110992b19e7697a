//! Retriever bound to a vector store with a fixed k

use std::sync::Arc;

use crate::error::Result;
use crate::types::Document;

use super::vector_store::{SearchResult, VectorStoreRepository};

/// Returns the k most similar stored chunks for a query
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStoreRepository>,
    k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStoreRepository>, k: usize) -> Self {
        Self { store, k }
    }

    /// Number of chunks returned per query
    pub fn k(&self) -> usize {
        self.k
    }

    /// Scored search results, best first
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let results = self.store.search(query, self.k).await?;
        tracing::debug!(
            query = %query,
            k = self.k,
            found = results.len(),
            "Retrieved chunks"
        );
        Ok(results)
    }

    /// Retrieved chunks as documents, best first
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        Ok(self
            .search(query)
            .await?
            .into_iter()
            .map(|r| r.chunk.to_document())
            .collect())
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever").field("k", &self.k).finish()
    }
}
