pub mod chunking;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod explain;
pub mod gemini;
pub mod quiz;
pub mod rag;
pub mod retriever;
pub mod session;
