//! Text chunking for low-latency streaming synthesis.
//!
//! Converts an append-only stream of text fragments into ordered chunks cut
//! at punctuation boundaries, sized by the live token budget from the
//! backpressure controller.

pub mod chunker;
pub mod config;
pub mod types;

pub use chunker::TextChunker;
pub use config::ChunkingConfig;
pub use types::{next_chunk_id, ChunkingMode, PunctuationClass, TextChunk};
