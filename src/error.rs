use thiserror::Error;

/// Failure classes surfaced by the core pipeline.
///
/// Errors are constructed at the failure site and propagate through
/// `anyhow::Result`, so callers that need to distinguish classes can
/// downcast while everyone else just bubbles them up.
#[derive(Debug, Error)]
pub enum RagError {
    /// The ingestion boundary received a file type outside {PDF, PNG}.
    #[error("unsupported document type: {mime}. Only PDF and PNG files are supported")]
    UnsupportedType { mime: String },

    /// The embedding encoder could not be fetched or loaded. Fatal for
    /// the session: no index can be built or queried without it.
    #[error("failed to load embedding model: {0}")]
    ModelLoad(String),

    /// The persistence layer could not read or write the storage
    /// location, or the stored collection is unusable (e.g. a query
    /// vector of a different dimensionality).
    #[error("vector index error: {0}")]
    Index(String),

    /// The hosted LLM call failed. Carries the provider's error detail
    /// verbatim; there is no retry strategy, the caller decides.
    #[error("generation request failed: {0}")]
    Generation(String),
}
