use anyhow::{Context, Result};
use log::info;

use crate::database::{IndexConfig, VectorIndex};
use crate::document::Document;
use crate::embeddings::{Embedder, EncoderConfig, TextEncoder};
use crate::error::RagError;
use crate::explain::{self, ExplanationLevel};
use crate::gemini::GeminiClient;
use crate::quiz::{self, QuizParams};
use crate::rag::{self, RagEngine};
use crate::retriever::Retriever;

/// All mutable state for one loaded document: the document itself, the
/// live index handle (inside the engine) and the generation client.
/// Created on upload, dropped on reset or the next upload — never
/// ambient global state. Chat history, if any, belongs to the caller.
pub struct Session {
    document: Document,
    engine: RagEngine<TextEncoder, GeminiClient>,
    gemini: GeminiClient,
}

impl Session {
    /// Create a session for a freshly loaded document.
    ///
    /// Loads the encoder and either reopens the document's persisted
    /// collection (no re-embedding) or builds and persists a new one.
    /// Encoding is CPU-bound, so the whole step runs on a blocking
    /// thread. Hard sequencing: nothing can be asked until this returns.
    pub async fn create(
        document: Document,
        index_config: IndexConfig,
        encoder_config: EncoderConfig,
        gemini: GeminiClient,
        top_k: usize,
    ) -> Result<Self> {
        if document.is_empty() {
            anyhow::bail!(
                "document {} contains no extractable text",
                document.document_id
            );
        }

        let document_id = document.document_id.clone();
        let content = document.content.clone();

        let (encoder, index) = tokio::task::spawn_blocking(move || -> Result<_> {
            let encoder = TextEncoder::load(&encoder_config)?;

            let index = if VectorIndex::exists(&index_config, &document_id) {
                info!("Using existing collection for {}", document_id);
                let index = VectorIndex::open(&index_config, &document_id)?;
                if index.dimension() != encoder.dimension() {
                    return Err(RagError::Index(format!(
                        "collection for {} was built with dimension {}, encoder produces {}; \
                         wipe it and re-index",
                        document_id,
                        index.dimension(),
                        encoder.dimension()
                    ))
                    .into());
                }
                index
            } else {
                rag::index_document(&encoder, &content, &document_id, &index_config)?
            };

            Ok((encoder, index))
        })
        .await
        .context("indexing task panicked")??;

        let engine = RagEngine::new(Retriever::new(encoder, index), gemini.clone()).with_top_k(top_k);

        Ok(Session {
            document,
            engine,
            gemini,
        })
    }

    /// Free-form question answering against the indexed document
    pub async fn ask(&self, question: &str) -> Result<String> {
        self.engine.answer(question).await
    }

    /// Tiered explanation of the whole document (does not use the index)
    pub async fn explain(&self, level: ExplanationLevel) -> Result<String> {
        explain::explain(&self.gemini, &self.document.content, level).await
    }

    /// Practice questions over the whole document (does not use the index)
    pub async fn quiz(&self, params: QuizParams) -> Result<Vec<String>> {
        quiz::generate_questions(&self.gemini, &self.document.content, params).await
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}
