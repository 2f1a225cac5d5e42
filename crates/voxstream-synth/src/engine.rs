//! Synthesis engine interface

use async_trait::async_trait;

use crate::error::SynthResult;

/// One chunk of text to synthesize.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub chunk_id: u64,
    pub text: String,
}

/// Sampled audio returned by an engine.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / self.sample_rate.max(1) as u64
    }
}

/// Core synthesis engine interface.
///
/// Implementations wrap a concrete speech model or service. The dispatcher
/// keeps several requests in flight on one shared engine, so methods take
/// `&self` and implementations manage their own interior state.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Engine name/identifier
    fn name(&self) -> &str;

    /// Output sample rate for this engine's audio
    fn sample_rate(&self) -> u32;

    /// Check if the engine can synthesize on this system
    async fn is_available(&self) -> bool;

    /// Synthesize one chunk of text to audio
    async fn synthesize(&self, request: SynthesisRequest) -> SynthResult<SynthesizedAudio>;
}

/// Silence standing in for a chunk whose synthesis failed twice. Keeps the
/// emission sequence gapless so later chunks are not held up.
pub fn filler_audio(duration_ms: u64, sample_rate: u32) -> SynthesizedAudio {
    let len = (duration_ms * sample_rate as u64 / 1000) as usize;
    SynthesizedAudio {
        samples: vec![0.0; len],
        sample_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filler_has_requested_duration() {
        let audio = filler_audio(250, 16_000);
        assert_eq!(audio.samples.len(), 4000);
        assert_eq!(audio.duration_ms(), 250);
        assert!(audio.samples.iter().all(|&s| s == 0.0));
    }
}
