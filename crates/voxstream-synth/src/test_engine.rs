//! Deterministic engine for tests and the demo binary
//!
//! Produces a quiet tone whose duration scales with the text length, with
//! configurable per-call delays and scripted failures, so pipeline behavior
//! under load and error conditions is reproducible.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::engine::{SynthesisEngine, SynthesisRequest, SynthesizedAudio};
use crate::error::{SynthError, SynthResult};

#[derive(Debug, Clone)]
pub struct ToneEngineConfig {
    pub sample_rate: u32,
    /// Audio produced per text token (ms); ~60 approximates speech cadence
    pub ms_per_token: u64,
    /// Delay before each call completes, cycled per call (empty = none)
    pub delays_ms: Vec<u64>,
    /// Additional delay per text token, so longer chunks synthesize slower
    pub delay_per_token_ms: u64,
    /// Fail this many synthesize calls before succeeding again
    pub fail_next: usize,
    /// Report the engine as gone entirely
    pub unavailable: bool,
}

impl Default for ToneEngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            ms_per_token: 60,
            delays_ms: Vec::new(),
            delay_per_token_ms: 0,
            fail_next: 0,
            unavailable: false,
        }
    }
}

/// Test engine emitting a 220Hz tone sized to the request text.
pub struct ToneEngine {
    config: ToneEngineConfig,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl ToneEngine {
    pub fn new(config: ToneEngineConfig) -> Self {
        let failures_left = AtomicUsize::new(config.fail_next);
        Self {
            config,
            calls: AtomicUsize::new(0),
            failures_left,
        }
    }

    pub fn calls_made(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for ToneEngine {
    fn default() -> Self {
        Self::new(ToneEngineConfig::default())
    }
}

#[async_trait]
impl SynthesisEngine for ToneEngine {
    fn name(&self) -> &str {
        "tone"
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    async fn is_available(&self) -> bool {
        !self.config.unavailable
    }

    async fn synthesize(&self, request: SynthesisRequest) -> SynthResult<SynthesizedAudio> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);

        if self.config.unavailable {
            return Err(SynthError::EngineNotAvailable("tone engine disabled".into()));
        }
        if request.text.is_empty() {
            return Err(SynthError::InvalidInput("empty text".into()));
        }

        let tokens = request.text.chars().count() as u64;
        let mut delay = tokens * self.config.delay_per_token_ms;
        if !self.config.delays_ms.is_empty() {
            delay += self.config.delays_ms[call % self.config.delays_ms.len()];
        }
        if delay > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
        }

        if self
            .failures_left
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
        {
            debug!(target: "synth", chunk_id = request.chunk_id, "scripted failure");
            return Err(SynthError::SynthesisFailed("scripted failure".into()));
        }

        let len = (tokens * self.config.ms_per_token * self.config.sample_rate as u64 / 1000)
            as usize;
        let samples = (0..len)
            .map(|i| {
                let t = i as f32 / self.config.sample_rate as f32;
                0.1 * (TAU * 220.0 * t).sin()
            })
            .collect();

        Ok(SynthesizedAudio {
            samples,
            sample_rate: self.config.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duration_scales_with_text_length() {
        let engine = ToneEngine::default();
        let short = engine
            .synthesize(SynthesisRequest {
                chunk_id: 1,
                text: "Hi.".into(),
            })
            .await
            .unwrap();
        let long = engine
            .synthesize(SynthesisRequest {
                chunk_id: 2,
                text: "A noticeably longer utterance.".into(),
            })
            .await
            .unwrap();
        assert!(long.samples.len() > short.samples.len());
        assert_eq!(short.duration_ms(), 3 * 60);
    }

    #[tokio::test]
    async fn scripted_failures_then_recovery() {
        let engine = ToneEngine::new(ToneEngineConfig {
            fail_next: 2,
            ..Default::default()
        });
        let req = SynthesisRequest {
            chunk_id: 1,
            text: "hello".into(),
        };
        assert!(engine.synthesize(req.clone()).await.is_err());
        assert!(engine.synthesize(req.clone()).await.is_err());
        assert!(engine.synthesize(req).await.is_ok());
        assert_eq!(engine.calls_made(), 3);
    }

    #[tokio::test]
    async fn unavailable_engine_reports_unavailability() {
        let engine = ToneEngine::new(ToneEngineConfig {
            unavailable: true,
            ..Default::default()
        });
        assert!(!engine.is_available().await);
        let err = engine
            .synthesize(SynthesisRequest {
                chunk_id: 1,
                text: "hello".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_unavailability());
    }

    #[tokio::test]
    async fn empty_text_is_invalid() {
        let engine = ToneEngine::default();
        let err = engine
            .synthesize(SynthesisRequest {
                chunk_id: 1,
                text: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SynthError::InvalidInput(_)));
    }
}
