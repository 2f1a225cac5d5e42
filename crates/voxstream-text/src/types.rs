//! Core chunk types

use std::sync::atomic::{AtomicU64, Ordering};

/// Generates unique chunk IDs
static CHUNK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique chunk ID
pub fn next_chunk_id() -> u64 {
    CHUNK_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Kind of boundary that closed a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunctuationClass {
    /// No boundary: forced, timed-out, or end-of-stream flush
    None,
    /// Clause separator: `,` `;` `:`
    Soft,
    /// Sentence end: `.` `!` `?`
    Hard,
}

impl PunctuationClass {
    pub fn of(c: char) -> Self {
        match c {
            '.' | '!' | '?' => PunctuationClass::Hard,
            ',' | ';' | ':' => PunctuationClass::Soft,
            _ => PunctuationClass::None,
        }
    }
}

/// Chunking behavior switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingMode {
    /// Budget-aware micro-chunking (default)
    Micro,
    /// Rollback mode: flush on hard punctuation only
    Sentence,
}

/// One synthesis unit. Immutable once emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub id: u64,
    pub text: String,
    pub token_count: usize,
    pub punctuation: PunctuationClass,
    pub sentence_id: u64,
    pub sequence: u64,
}
