use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::chunking::TextChunk;
use crate::error::RagError;

const INDEX_FILE: &str = "index.json";
const DEFAULT_ROOT: &str = "./vector_store";

/// Configuration for the on-disk vector store
pub struct IndexConfig {
    /// Root directory holding one collection directory per document
    pub root: PathBuf,
}

impl IndexConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Self {
        let root = env::var("RAG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ROOT));
        IndexConfig { root }
    }

    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        IndexConfig { root: root.into() }
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(get_collection_name(collection))
    }
}

/// One indexed chunk: stable identifier, source text, embedding vector.
/// Immutable once built; there is no update or delete path.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: u64,
    text: String,
    vector: Vec<f32>,
}

/// On-disk representation of a collection
#[derive(Serialize, Deserialize)]
struct IndexFile {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// A persisted collection of (text, vector) pairs supporting cosine
/// nearest-neighbor queries. Each collection owns one directory under the
/// configured root, scoped per document identity, so sessions on
/// different documents cannot clobber each other's data.
#[derive(Debug)]
pub struct VectorIndex {
    path: PathBuf,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create a new persisted collection from chunks and their vectors,
    /// replacing any prior collection at the same location.
    pub fn build(
        config: &IndexConfig,
        collection: &str,
        chunks: &[TextChunk],
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::Index(format!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            ))
            .into());
        }
        if chunks.is_empty() {
            return Err(RagError::Index("cannot build an empty index".to_string()).into());
        }

        let dimension = vectors[0].len();
        if dimension == 0 {
            return Err(RagError::Index("zero-dimensional vectors".to_string()).into());
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for (idx, (chunk, vector)) in chunks.iter().zip(vectors.into_iter()).enumerate() {
            if chunk.text.trim().is_empty() {
                return Err(RagError::Index(format!("chunk {} has empty text", idx)).into());
            }
            if vector.len() != dimension {
                return Err(RagError::Index(format!(
                    "vector dimension mismatch at chunk {}: expected {}, got {}",
                    idx,
                    dimension,
                    vector.len()
                ))
                .into());
            }
            entries.push(IndexEntry {
                id: idx as u64,
                text: chunk.text.clone(),
                vector,
            });
        }

        // Destructive replace of any prior collection at this location.
        Self::wipe(config, collection)?;

        let index = VectorIndex {
            path: config.collection_dir(collection),
            dimension,
            entries,
        };
        index.persist()?;
        info!(
            "Built collection {} with {} entries",
            index.path.display(),
            index.entries.len()
        );
        Ok(index)
    }

    /// Check if a persisted collection exists for this document
    pub fn exists(config: &IndexConfig, collection: &str) -> bool {
        config.collection_dir(collection).join(INDEX_FILE).is_file()
    }

    /// Reload a persisted collection without re-embedding anything
    pub fn open(config: &IndexConfig, collection: &str) -> Result<Self> {
        let path = config.collection_dir(collection);
        let file = path.join(INDEX_FILE);
        let raw = fs::read_to_string(&file)
            .map_err(|e| RagError::Index(format!("read {}: {}", file.display(), e)))?;
        let stored: IndexFile = serde_json::from_str(&raw)
            .map_err(|e| RagError::Index(format!("parse {}: {}", file.display(), e)))?;

        debug!(
            "Opened collection {} ({} entries, dimension {})",
            path.display(),
            stored.entries.len(),
            stored.dimension
        );
        Ok(VectorIndex {
            path,
            dimension: stored.dimension,
            entries: stored.entries,
        })
    }

    /// Durably flush the collection to its storage location
    pub fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.path)
            .map_err(|e| RagError::Index(format!("create {}: {}", self.path.display(), e)))?;
        let stored = IndexFile {
            dimension: self.dimension,
            entries: self.entries.clone(),
        };
        let raw = serde_json::to_string(&stored).context("serialize index")?;
        let file = self.path.join(INDEX_FILE);
        fs::write(&file, raw)
            .map_err(|e| RagError::Index(format!("write {}: {}", file.display(), e)))?;
        Ok(())
    }

    /// Nearest-neighbor search by cosine similarity.
    ///
    /// Returns at most `k` (text, score) pairs in descending similarity;
    /// fewer only if the collection has fewer entries. `k == 0` yields an
    /// empty result. A query vector whose dimensionality does not match
    /// the collection is an error, never a silent mismatch.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.dimension {
            return Err(RagError::Index(format!(
                "query dimension mismatch: index has {}, query has {}",
                self.dimension,
                vector.len()
            ))
            .into());
        }

        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry.text.clone(), cosine_similarity(&entry.vector, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// Irreversibly delete one persisted collection. Deleting a
    /// collection that does not exist (or was only partially written) is
    /// success, not failure.
    pub fn wipe(config: &IndexConfig, collection: &str) -> Result<()> {
        remove_dir_idempotent(config.collection_dir(collection))
    }

    /// Irreversibly delete the entire storage root: every collection.
    /// The operator-facing data-reset action. Idempotent.
    pub fn wipe_all(config: &IndexConfig) -> Result<()> {
        remove_dir_idempotent(config.root.clone())
    }

    /// Number of entries in the collection
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality this collection was built with
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn remove_dir_idempotent(dir: PathBuf) -> Result<()> {
    match fs::remove_dir_all(&dir) {
        Ok(()) => {
            info!("Deleted {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RagError::Index(format!("delete {}: {}", dir.display(), e)).into()),
    }
}

/// Generate a collection directory name from a document id
fn get_collection_name(document_id: &str) -> String {
    let name = document_id
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase();

    format!("rag_{}", name)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
