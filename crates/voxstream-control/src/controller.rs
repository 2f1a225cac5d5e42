use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use voxstream_foundation::{SharedClock, SharedConfig};

use crate::budget::ChunkBudget;
use crate::config::ControlConfig;

/// One playback-buffer health report from the sink.
///
/// Produced roughly every 100-250ms; consumed exactly once.
#[derive(Debug, Clone, Copy)]
pub struct BufferTelemetry {
    pub buffered_ms: u64,
    pub underrun_count: u64,
    pub timestamp: Instant,
}

/// Keeps the playback buffer inside the watermark band by stepping the chunk
/// token budget. At most one step per observation so the loop cannot
/// oscillate; a stale feed reverts to the neutral default.
pub struct BackpressureController {
    config: Arc<SharedConfig<ControlConfig>>,
    budget: ChunkBudget,
    clock: SharedClock,
    last_underruns: u64,
    last_observed: Option<Instant>,
}

impl BackpressureController {
    /// Adopts the shared budget wherever the session seeded it; the
    /// controller only steps it from there.
    pub fn new(
        config: Arc<SharedConfig<ControlConfig>>,
        budget: ChunkBudget,
        clock: SharedClock,
    ) -> Self {
        Self {
            config,
            budget,
            clock,
            last_underruns: 0,
            last_observed: None,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget.get()
    }

    /// Applies one telemetry observation to the budget.
    pub fn observe(&mut self, telemetry: BufferTelemetry) {
        let cfg = self.config.snapshot();
        let current = self.budget.get();
        let underruns_grew = telemetry.underrun_count > self.last_underruns;

        let next = if telemetry.buffered_ms < cfg.low_watermark_ms || underruns_grew {
            current
                .saturating_sub(cfg.step_tokens)
                .max(cfg.min_token_budget)
        } else if telemetry.buffered_ms > cfg.high_watermark_ms {
            (current + cfg.step_tokens).min(cfg.max_token_budget)
        } else {
            current
        };

        if next != current {
            debug!(
                target: "control",
                buffered_ms = telemetry.buffered_ms,
                underruns = telemetry.underrun_count,
                from = current,
                to = next,
                "chunk budget adjusted"
            );
            self.budget.set(next);
        }

        self.last_underruns = telemetry.underrun_count;
        self.last_observed = Some(telemetry.timestamp);
    }

    /// Reverts to the neutral budget when the telemetry feed has gone quiet.
    /// Returns true if a stale reset happened.
    pub fn check_staleness(&mut self) -> bool {
        let cfg = self.config.snapshot();
        let Some(last) = self.last_observed else {
            return false;
        };
        let age = self.clock.now().saturating_duration_since(last);
        if age.as_millis() as u64 > cfg.stale_after_ms {
            if self.budget.get() != cfg.neutral_token_budget {
                debug!(
                    target: "control",
                    age_ms = age.as_millis() as u64,
                    "telemetry stale, reverting to neutral budget"
                );
                self.budget.set(cfg.neutral_token_budget);
            }
            self.last_observed = None;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.budget.set(self.config.snapshot().neutral_token_budget);
        self.last_underruns = 0;
        self.last_observed = None;
    }
}
