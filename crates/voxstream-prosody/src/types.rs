//! Segment and correction types

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generates unique segment IDs
static SEGMENT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique segment ID
pub fn next_segment_id() -> u64 {
    SEGMENT_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// One span of synthesized speech, owned by the smoother's registry after
/// registration. Maps to exactly one text chunk.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub id: u64,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Session-timeline position at registration (ms)
    pub start_time_ms: u64,
    pub duration_ms: u64,
    pub chunk_id: u64,
}

impl AudioSegment {
    pub fn new(
        id: u64,
        chunk_id: u64,
        samples: Vec<f32>,
        sample_rate: u32,
        start_time_ms: u64,
    ) -> Self {
        let duration_ms = samples.len() as u64 * 1000 / sample_rate.max(1) as u64;
        Self {
            id,
            samples,
            sample_rate,
            start_time_ms,
            duration_ms,
            chunk_id,
        }
    }
}

/// Why a correction was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetimeReason {
    /// Later text changed the intended intonation of an earlier span
    LateContext,
    /// A clause boundary moved after synthesis
    BoundaryRevision,
    /// Emphasis shifted onto a different word
    EmphasisShift,
}

impl fmt::Display for RetimeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RetimeReason::LateContext => "late-context",
            RetimeReason::BoundaryRevision => "boundary-revision",
            RetimeReason::EmphasisShift => "emphasis-shift",
        };
        f.write_str(s)
    }
}

/// Record of a successful correction; cleared with its segment.
#[derive(Debug, Clone)]
pub struct ProsodyCorrection {
    pub original_segment_id: u64,
    pub corrected_segment_id: u64,
    pub crossfade_start_ms: u64,
    pub crossfade_duration_ms: u64,
    pub reason: RetimeReason,
}

/// A successful correction's audio: the full blended buffer plus the offset
/// from which the playback sink needs to re-splice.
#[derive(Debug, Clone)]
pub struct CorrectedAudio {
    pub correction: ProsodyCorrection,
    /// Full corrected output; `[0, crossfade_start_sample)` is bit-identical
    /// to the original segment
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub crossfade_start_sample: usize,
}

impl CorrectedAudio {
    /// The tail the sink actually replaces, starting at
    /// `crossfade_start_ms` within the original segment.
    pub fn patch_samples(&self) -> &[f32] {
        &self.samples[self.crossfade_start_sample..]
    }
}
