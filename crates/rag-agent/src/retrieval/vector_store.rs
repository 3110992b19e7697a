//! Persistent vector store
//!
//! Chunks, their embeddings and a small manifest live in a SQLite file inside
//! the persistence directory. The whole index is held in memory as a matrix of
//! L2-normalized embeddings and ranked by cosine similarity.
//!
//! A store is either loaded from an existing directory or built from chunks
//! with [`VectorStoreRepository::save`]; searching before either step fails
//! with [`Error::UninitializedStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use parking_lot::RwLock;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::fingerprint_file;
use crate::providers::EmbeddingProvider;
use crate::types::Chunk;

use super::retriever::Retriever;

/// Index file name inside the persistence directory
pub const INDEX_FILE: &str = "index.sqlite3";

/// A chunk with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1]
    pub similarity: f32,
}

/// Source file the index was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: String,
    /// SHA-256 of the file contents, hex encoded
    pub fingerprint: String,
}

impl SourceInfo {
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.display().to_string(),
            fingerprint: fingerprint_file(path)?,
        })
    }
}

/// Build information persisted next to the chunks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_provider: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
    pub source: Option<SourceInfo>,
}

/// Vector store contract used by the pipeline and the agent
#[async_trait]
pub trait VectorStoreRepository: Send + Sync {
    /// True when the persistence directory is present
    fn exists(&self) -> bool;

    /// Load a previously persisted store; `Ok(false)` when nothing is persisted
    async fn load(&self) -> Result<bool>;

    /// Embed and persist chunks, replacing any previous contents
    async fn save(&self, chunks: &[Chunk]) -> Result<()>;

    /// Top-k chunks by similarity to the query, best first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>>;

    /// True after a successful `load` or `save`
    fn is_initialized(&self) -> bool;

    /// Bind a retriever with a fixed k
    fn as_retriever(&self, k: usize) -> Result<Retriever>;
}

struct Index {
    chunks: Vec<Chunk>,
    /// One L2-normalized row per chunk
    embeddings: Array2<f32>,
    manifest: Option<IndexManifest>,
}

struct StoreState {
    persist_dir: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    source: Option<SourceInfo>,
    index: RwLock<Option<Index>>,
}

/// SQLite-backed vector store with in-memory similarity search
#[derive(Clone)]
pub struct LocalVectorStore {
    state: Arc<StoreState>,
}

impl LocalVectorStore {
    /// Create a store rooted at `persist_dir`; nothing is read until `load`
    pub fn new(persist_dir: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_source(persist_dir, embedder, None)
    }

    /// Create a store that records (and checks) the source file fingerprint
    pub fn with_source(
        persist_dir: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingProvider>,
        source: Option<SourceInfo>,
    ) -> Self {
        Self {
            state: Arc::new(StoreState {
                persist_dir: persist_dir.into(),
                embedder,
                source,
                index: RwLock::new(None),
            }),
        }
    }

    /// Persistence directory
    pub fn persist_dir(&self) -> &Path {
        &self.state.persist_dir
    }

    /// Path of the SQLite index file
    pub fn index_path(&self) -> PathBuf {
        self.state.persist_dir.join(INDEX_FILE)
    }

    /// Number of chunks currently held in memory
    pub fn len(&self) -> usize {
        self.state.index.read().as_ref().map_or(0, |i| i.chunks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Manifest of the loaded or saved index
    pub fn manifest(&self) -> Option<IndexManifest> {
        self.state.index.read().as_ref().and_then(|i| i.manifest.clone())
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(self.index_path())
            .map_err(|e| Error::vector_db(format!("Failed to open index: {}", e)))?;
        migrate(&conn)?;
        Ok(conn)
    }

    fn write_index(&self, chunks: &[Chunk], vectors: &[Vec<f32>], manifest: &IndexManifest) -> Result<()> {
        std::fs::create_dir_all(&self.state.persist_dir)?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks", [])?;
        tx.execute("DELETE FROM manifest", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, idx, content, metadata, embedding) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (chunk, vector) in chunks.iter().zip(vectors) {
                stmt.execute(params![
                    chunk.id.to_string(),
                    chunk.index as i64,
                    chunk.content,
                    serde_json::to_string(&chunk.metadata)?,
                    encode_vector(vector),
                ])?;
            }
        }
        tx.execute(
            "INSERT INTO manifest (id, body) VALUES (1, ?1)",
            params![serde_json::to_string(manifest)?],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove what a failed first save left behind
    fn discard_index(&self, keep_dir: bool) {
        let dir = &self.state.persist_dir;
        let result = if keep_dir {
            ["", "-wal", "-shm", "-journal"]
                .iter()
                .map(|suffix| dir.join(format!("{}{}", INDEX_FILE, suffix)))
                .filter(|path| path.exists())
                .try_for_each(std::fs::remove_file)
        } else {
            std::fs::remove_dir_all(dir)
        };

        if let Err(e) = result {
            tracing::warn!("Failed to clean up {} after a failed save: {}", dir.display(), e);
        }
    }

    fn check_manifest(&self, manifest: &IndexManifest) {
        let embedder = &self.state.embedder;
        if manifest.embedding_model != embedder.model_name() {
            tracing::warn!(
                "Vector store was built with embedding model '{}' but '{}' is configured; delete {} to rebuild",
                manifest.embedding_model,
                embedder.model_name(),
                self.state.persist_dir.display()
            );
        }

        if let (Some(stored), Some(current)) = (&manifest.source, &self.state.source) {
            if stored.fingerprint != current.fingerprint {
                tracing::warn!(
                    "Context file {} changed since the vector store was built; delete {} to rebuild",
                    current.path,
                    self.state.persist_dir.display()
                );
            }
        }
    }
}

#[async_trait]
impl VectorStoreRepository for LocalVectorStore {
    fn exists(&self) -> bool {
        self.state.persist_dir.is_dir()
    }

    async fn load(&self) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }

        if !self.index_path().is_file() {
            tracing::warn!(
                "Persistence directory {} has no {}; loading an empty vector store",
                self.state.persist_dir.display(),
                INDEX_FILE
            );
            *self.state.index.write() = Some(Index {
                chunks: Vec::new(),
                embeddings: Array2::zeros((0, 0)),
                manifest: None,
            });
            return Ok(true);
        }

        tracing::info!("Loading existing vector store from {}", self.state.persist_dir.display());

        let conn = self.open()?;
        let manifest = read_manifest(&conn)?;
        let rows = read_chunks(&conn)?;

        match &manifest {
            Some(manifest) => self.check_manifest(manifest),
            None => tracing::warn!(
                "Vector store at {} has no manifest (interrupted save?); delete it to rebuild",
                self.state.persist_dir.display()
            ),
        }

        let (chunks, vectors): (Vec<Chunk>, Vec<Vec<f32>>) = rows.into_iter().unzip();
        let embeddings = build_matrix(&vectors)?;

        tracing::info!("Loaded {} chunks from vector store", chunks.len());
        *self.state.index.write() = Some(Index {
            chunks,
            embeddings,
            manifest,
        });

        Ok(true)
    }

    async fn save(&self, chunks: &[Chunk]) -> Result<()> {
        let embedder = &self.state.embedder;
        tracing::info!("Creating vector store with {} embeddings...", embedder.name());

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }
        let embeddings = build_matrix(&vectors)?;

        let manifest = IndexManifest {
            embedding_provider: embedder.name().to_string(),
            embedding_model: embedder.model_name().to_string(),
            dimension: embeddings.ncols(),
            chunk_count: chunks.len(),
            created_at: Utc::now(),
            source: self.state.source.clone(),
        };

        let had_dir = self.exists();
        let had_index = self.index_path().is_file();
        if let Err(err) = self.write_index(chunks, &vectors, &manifest) {
            // A rolled-back rewrite keeps the old rows; a fresh index must not survive
            if !had_index {
                self.discard_index(had_dir);
            }
            return Err(err);
        }

        tracing::info!(
            "Vector store persisted to {} ({} chunks, dimension {})",
            self.state.persist_dir.display(),
            chunks.len(),
            manifest.dimension
        );

        *self.state.index.write() = Some(Index {
            chunks: chunks.to_vec(),
            embeddings,
            manifest: Some(manifest),
        });

        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let count = {
            let guard = self.state.index.read();
            match guard.as_ref() {
                Some(index) => index.chunks.len(),
                None => return Err(Error::UninitializedStore),
            }
        };
        if k == 0 || count == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.state.embedder.embed(query).await?;

        let guard = self.state.index.read();
        let index = guard.as_ref().ok_or(Error::UninitializedStore)?;
        if query_vector.len() != index.embeddings.ncols() {
            return Err(Error::vector_db(format!(
                "Query embedding has dimension {} but the index has {}",
                query_vector.len(),
                index.embeddings.ncols()
            )));
        }

        let scores = index.embeddings.dot(&normalized(Array1::from(query_vector)));
        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(i, similarity)| SearchResult {
                chunk: index.chunks[i].clone(),
                similarity,
            })
            .collect())
    }

    fn is_initialized(&self) -> bool {
        self.state.index.read().is_some()
    }

    fn as_retriever(&self, k: usize) -> Result<Retriever> {
        if !self.is_initialized() {
            return Err(Error::UninitializedStore);
        }
        Ok(Retriever::new(Arc::new(self.clone()), k))
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            idx INTEGER NOT NULL,
            content TEXT NOT NULL,
            metadata TEXT NOT NULL,
            embedding BLOB NOT NULL
        );

        CREATE TABLE IF NOT EXISTS manifest (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            body TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| Error::vector_db(format!("Failed to migrate index: {}", e)))
}

fn read_manifest(conn: &Connection) -> Result<Option<IndexManifest>> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM manifest WHERE id = 1", [], |row| row.get(0))
        .optional()?;

    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

fn read_chunks(conn: &Connection) -> Result<Vec<(Chunk, Vec<f32>)>> {
    let mut stmt =
        conn.prepare("SELECT id, idx, content, metadata, embedding FROM chunks ORDER BY idx")?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Vec<u8>>(4)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, idx, content, metadata, blob) = row?;
        let id = Uuid::parse_str(&id)
            .map_err(|e| Error::vector_db(format!("Invalid chunk id '{}': {}", id, e)))?;
        let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata)?;

        out.push((
            Chunk {
                id,
                index: idx.max(0) as usize,
                content,
                metadata,
            },
            decode_vector(&blob)?,
        ));
    }
    Ok(out)
}

/// Stack vectors into a matrix of L2-normalized rows
fn build_matrix(vectors: &[Vec<f32>]) -> Result<Array2<f32>> {
    let dim = vectors.first().map_or(0, Vec::len);
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(Error::vector_db(format!(
            "Inconsistent embedding dimensions: {} and {}",
            dim,
            bad.len()
        )));
    }

    let mut matrix = Array2::<f32>::zeros((vectors.len(), dim));
    for (mut row, vector) in matrix.rows_mut().into_iter().zip(vectors) {
        row.assign(&normalized(Array1::from(vector.clone())));
    }
    Ok(matrix)
}

fn normalized(mut v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v /= norm;
    }
    v
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::vector_db(format!(
            "Corrupt embedding blob of {} bytes",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
