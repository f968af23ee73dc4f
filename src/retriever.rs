use anyhow::{Context, Result};
use log::debug;

use crate::database::VectorIndex;
use crate::embeddings::Embedder;

/// Default number of context chunks retrieved per question
pub const DEFAULT_TOP_K: usize = 4;

/// Wraps the encoder and the vector index with a top-k query contract:
/// embed the question, search the collection, hand back chunk texts in
/// descending relevance order. Scores are dropped at this layer.
pub struct Retriever<E> {
    encoder: E,
    index: VectorIndex,
}

impl<E: Embedder> Retriever<E> {
    pub fn new(encoder: E, index: VectorIndex) -> Self {
        Retriever { encoder, index }
    }

    /// Retrieve up to `k` chunk texts relevant to the question
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<String>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedded = self
            .encoder
            .embed(&[question.to_string()])
            .context("Failed to embed question")?;
        let query_vector = embedded
            .into_iter()
            .next()
            .context("Encoder returned no vector for the question")?;

        let results = self.index.query(&query_vector, k)?;
        debug!("Retrieved {} chunks for question", results.len());

        Ok(results.into_iter().map(|(text, _score)| text).collect())
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TextChunk;
    use crate::database::IndexConfig;
    use crate::embeddings::test_support::KeywordEmbedder;

    fn chunk(text: &str) -> TextChunk {
        TextChunk {
            text: text.to_string(),
            token_count: crate::chunking::estimate_token_count(text),
            document_id: "facts.pdf".to_string(),
            start_position: 0,
        }
    }

    fn sky_water_retriever(config: &IndexConfig) -> Retriever<KeywordEmbedder> {
        let embedder = KeywordEmbedder::new(&["sky", "water"]);
        let chunks = vec![chunk("The sky is blue."), chunk("Water boils at 100C.")];
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).unwrap();
        let index = VectorIndex::build(config, "facts.pdf", &chunks, vectors).unwrap();
        Retriever::new(embedder, index)
    }

    #[test]
    fn test_retrieve_returns_most_relevant_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = sky_water_retriever(&IndexConfig::new(dir.path()));

        let results = retriever.retrieve("What color is the sky?", 1).unwrap();
        assert_eq!(results, vec!["The sky is blue.".to_string()]);
    }

    #[test]
    fn test_retrieve_orders_by_relevance() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = sky_water_retriever(&IndexConfig::new(dir.path()));

        let results = retriever
            .retrieve("At what temperature does water boil?", 2)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], "Water boils at 100C.");
    }

    #[test]
    fn test_retrieve_with_k_zero_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = sky_water_retriever(&IndexConfig::new(dir.path()));

        assert!(retriever.retrieve("anything", 0).unwrap().is_empty());
    }
}
