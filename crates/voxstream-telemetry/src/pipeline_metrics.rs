use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared metrics for cross-task pipeline monitoring
#[derive(Clone)]
pub struct PipelineMetrics {
    // Chunking
    pub chunks_emitted: Arc<AtomicU64>,
    pub chunk_rate: Arc<AtomicU64>, // chunks per second * 10
    pub forced_flushes: Arc<AtomicU64>,
    pub timeout_flushes: Arc<AtomicU64>,

    // Synthesis
    pub synth_requests: Arc<AtomicU64>,
    pub synth_retries: Arc<AtomicU64>,
    pub synth_failures: Arc<AtomicU64>,
    pub filler_segments: Arc<AtomicU64>,

    // Emission
    pub segments_emitted: Arc<AtomicU64>,
    pub reordered_completions: Arc<AtomicU64>, // completions held for a predecessor
    pub first_audio_latency_ms: Arc<AtomicU64>, // 0 until first emission

    // Prosody corrections
    pub corrections_applied: Arc<AtomicU64>,
    pub corrections_rejected: Arc<AtomicU64>,

    // Backpressure
    pub token_budget: Arc<AtomicUsize>,     // current budget gauge
    pub buffered_ms: Arc<AtomicU64>,        // last reported playback buffer depth
    pub underrun_count: Arc<AtomicU64>,     // last reported underrun total
    pub budget_steps_up: Arc<AtomicU64>,
    pub budget_steps_down: Arc<AtomicU64>,
    pub stale_telemetry_resets: Arc<AtomicU64>,

    // Pipeline stage tracking
    pub stage_chunker: Arc<AtomicBool>,
    pub stage_synthesis: Arc<AtomicBool>,
    pub stage_smoother: Arc<AtomicBool>,
    pub stage_output: Arc<AtomicBool>,

    pub session_started: Arc<RwLock<Option<Instant>>>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            chunks_emitted: Arc::new(AtomicU64::new(0)),
            chunk_rate: Arc::new(AtomicU64::new(0)),
            forced_flushes: Arc::new(AtomicU64::new(0)),
            timeout_flushes: Arc::new(AtomicU64::new(0)),

            synth_requests: Arc::new(AtomicU64::new(0)),
            synth_retries: Arc::new(AtomicU64::new(0)),
            synth_failures: Arc::new(AtomicU64::new(0)),
            filler_segments: Arc::new(AtomicU64::new(0)),

            segments_emitted: Arc::new(AtomicU64::new(0)),
            reordered_completions: Arc::new(AtomicU64::new(0)),
            first_audio_latency_ms: Arc::new(AtomicU64::new(0)),

            corrections_applied: Arc::new(AtomicU64::new(0)),
            corrections_rejected: Arc::new(AtomicU64::new(0)),

            token_budget: Arc::new(AtomicUsize::new(0)),
            buffered_ms: Arc::new(AtomicU64::new(0)),
            underrun_count: Arc::new(AtomicU64::new(0)),
            budget_steps_up: Arc::new(AtomicU64::new(0)),
            budget_steps_down: Arc::new(AtomicU64::new(0)),
            stale_telemetry_resets: Arc::new(AtomicU64::new(0)),

            stage_chunker: Arc::new(AtomicBool::new(false)),
            stage_synthesis: Arc::new(AtomicBool::new(false)),
            stage_smoother: Arc::new(AtomicBool::new(false)),
            stage_output: Arc::new(AtomicBool::new(false)),

            session_started: Arc::new(RwLock::new(None)),
        }
    }
}

impl PipelineMetrics {
    pub fn mark_session_start(&self) {
        *self.session_started.write() = Some(Instant::now());
    }

    /// Records the time-to-first-audio once; later calls are no-ops.
    pub fn mark_first_audio(&self) {
        if self.first_audio_latency_ms.load(Ordering::Relaxed) != 0 {
            return;
        }
        if let Some(started) = *self.session_started.read() {
            let latency = started.elapsed().as_millis() as u64;
            self.first_audio_latency_ms
                .store(latency.max(1), Ordering::Relaxed);
        }
    }

    pub fn mark_stage_active(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::Chunker => self.stage_chunker.store(true, Ordering::Relaxed),
            PipelineStage::Synthesis => self.stage_synthesis.store(true, Ordering::Relaxed),
            PipelineStage::Smoother => self.stage_smoother.store(true, Ordering::Relaxed),
            PipelineStage::Output => self.stage_output.store(true, Ordering::Relaxed),
        }
    }

    pub fn decay_stages(&self) {
        self.stage_chunker.store(false, Ordering::Relaxed);
        self.stage_synthesis.store(false, Ordering::Relaxed);
        self.stage_smoother.store(false, Ordering::Relaxed);
        self.stage_output.store(false, Ordering::Relaxed);
    }

    pub fn increment_chunks(&self) {
        self.chunks_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_segments(&self) {
        self.segments_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_chunk_rate(&self, per_sec: f64) {
        self.chunk_rate.store((per_sec * 10.0) as u64, Ordering::Relaxed);
    }

    pub fn update_buffer_health(&self, buffered_ms: u64, underruns: u64) {
        self.buffered_ms.store(buffered_ms, Ordering::Relaxed);
        self.underrun_count.store(underruns, Ordering::Relaxed);
    }

    pub fn update_token_budget(&self, budget: usize) {
        self.token_budget.store(budget, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PipelineStage {
    Chunker,
    Synthesis,
    Smoother,
    Output,
}

/// Windowed events-per-second tracker
#[derive(Debug)]
pub struct RateTracker {
    last_update: Instant,
    count: u64,
}

impl RateTracker {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            count: 0,
        }
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed >= Duration::from_secs(1) {
            let rate = self.count as f64 / elapsed.as_secs_f64();
            self.last_update = Instant::now();
            self.count = 0;
            Some(rate)
        } else {
            None
        }
    }
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_audio_latency_recorded_once() {
        let metrics = PipelineMetrics::default();
        metrics.mark_session_start();
        metrics.mark_first_audio();
        let first = metrics.first_audio_latency_ms.load(Ordering::Relaxed);
        assert!(first >= 1);

        std::thread::sleep(Duration::from_millis(5));
        metrics.mark_first_audio();
        assert_eq!(metrics.first_audio_latency_ms.load(Ordering::Relaxed), first);
    }

    #[test]
    fn stage_flags_set_and_decay() {
        let metrics = PipelineMetrics::default();
        metrics.mark_stage_active(PipelineStage::Chunker);
        metrics.mark_stage_active(PipelineStage::Output);
        assert!(metrics.stage_chunker.load(Ordering::Relaxed));
        assert!(metrics.stage_output.load(Ordering::Relaxed));
        metrics.decay_stages();
        assert!(!metrics.stage_chunker.load(Ordering::Relaxed));
        assert!(!metrics.stage_output.load(Ordering::Relaxed));
    }
}
