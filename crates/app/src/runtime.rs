//! Per-session pipeline wiring.
//!
//! One session owns one chunker, one controller, one smoother, and one
//! dispatcher, glued with channels. Sessions share nothing mutable beyond
//! the aggregate metrics instance the caller passes in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use voxstream_control::{BackpressureController, BufferTelemetry, ChunkBudget, ControlConfig};
use voxstream_foundation::{
    monotonic_clock, ConfigError, PipelineError, SharedClock, SharedConfig, Validate,
};
use voxstream_prosody::{CrossfadeConfig, ProsodySmoother};
use voxstream_synth::SynthesisEngine;
use voxstream_telemetry::PipelineMetrics;
use voxstream_text::{ChunkingConfig, ChunkingMode, TextChunker};

use crate::config::PipelineConfig;
use crate::pipeline::{
    ControlTask, DispatcherCommand, SinkEvent, SynthesisDispatcher, TextEvent, TextFeed,
};
use crate::state::{SessionState, SessionStateManager};

pub struct SessionOptions {
    pub mode: ChunkingMode,
    pub config: PipelineConfig,
    pub engine: Arc<dyn SynthesisEngine>,
    pub clock: SharedClock,
    pub metrics: Arc<PipelineMetrics>,
}

impl SessionOptions {
    pub fn new(engine: Arc<dyn SynthesisEngine>) -> Self {
        Self {
            mode: ChunkingMode::Micro,
            config: PipelineConfig::default(),
            engine,
            clock: monotonic_clock(),
            metrics: Arc::new(PipelineMetrics::default()),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mode(mut self, mode: ChunkingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }
}

/// Handle to a running session pipeline.
pub struct SessionHandle {
    pub metrics: Arc<PipelineMetrics>,
    pub text_tx: mpsc::Sender<TextEvent>,
    pub telemetry_tx: mpsc::Sender<BufferTelemetry>,
    pub command_tx: mpsc::Sender<DispatcherCommand>,
    state: SessionStateManager,
    budget: ChunkBudget,
    chunking_cfg: Arc<SharedConfig<ChunkingConfig>>,
    control_cfg: Arc<SharedConfig<ControlConfig>>,
    crossfade_cfg: Arc<SharedConfig<CrossfadeConfig>>,
    running: Arc<AtomicBool>,
    feed_handle: JoinHandle<()>,
    control_handle: JoinHandle<()>,
    dispatch_handle: JoinHandle<()>,
}

/// Builds and starts a session pipeline. Returns the handle and the sink
/// event stream the caller plays back.
pub fn spawn_session(
    options: SessionOptions,
) -> Result<(SessionHandle, mpsc::Receiver<SinkEvent>), PipelineError> {
    let SessionOptions {
        mode,
        config,
        engine,
        clock,
        metrics,
    } = options;

    let chunking_cfg = Arc::new(SharedConfig::new(config.chunking)?);
    let control_cfg = Arc::new(SharedConfig::new(config.control)?);
    let crossfade_cfg = Arc::new(SharedConfig::new(config.crossfade)?);

    let (text_tx, text_rx) = mpsc::channel(64);
    let (chunk_tx, chunk_rx) = mpsc::channel(64);
    let (telemetry_tx, telemetry_rx) = mpsc::channel(16);
    let (command_tx, command_rx) = mpsc::channel(16);
    let (sink_tx, sink_rx) = mpsc::channel(64);

    let budget = ChunkBudget::new(chunking_cfg.snapshot().chunk_token_budget);
    metrics.mark_session_start();
    metrics.update_token_budget(budget.get());

    let running = Arc::new(AtomicBool::new(true));
    let state = SessionStateManager::new();

    let chunker = TextChunker::new(chunking_cfg.clone(), budget.clone(), clock.clone(), mode);
    let feed_handle = TextFeed::new(
        text_rx,
        chunk_tx,
        chunker,
        metrics.clone(),
        running.clone(),
    )
    .spawn();

    let controller = BackpressureController::new(control_cfg.clone(), budget.clone(), clock.clone());
    let control_handle =
        ControlTask::new(telemetry_rx, controller, metrics.clone(), running.clone()).spawn();

    let smoother = ProsodySmoother::new(crossfade_cfg.clone(), clock);
    let dispatch_handle = SynthesisDispatcher::new(
        chunk_rx,
        command_rx,
        engine,
        smoother,
        sink_tx,
        metrics.clone(),
        state.clone(),
        running.clone(),
    )
    .spawn();

    state.transition(SessionState::Streaming)?;
    info!(target: "runtime", mode = ?mode, "session pipeline started");

    Ok((
        SessionHandle {
            metrics,
            text_tx,
            telemetry_tx,
            command_tx,
            state,
            budget,
            chunking_cfg,
            control_cfg,
            crossfade_cfg,
            running,
            feed_handle,
            control_handle,
            dispatch_handle,
        },
        sink_rx,
    ))
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Swaps in a new configuration; future decisions only. All sections are
    /// validated before any of them applies.
    pub fn update_config(&self, config: PipelineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let seed = config.chunking.chunk_token_budget;
        self.chunking_cfg.update(config.chunking)?;
        self.control_cfg.update(config.control)?;
        self.crossfade_cfg.update(config.crossfade)?;
        // Re-seed the live budget; the controller adapts from here.
        self.budget.set(seed);
        self.metrics.update_token_budget(seed);
        info!(target: "runtime", "configuration updated");
        Ok(())
    }

    /// Graceful end of session: close the inputs and wait for everything
    /// buffered or in flight to be emitted.
    pub async fn drain(self) {
        let _ = self.state.transition(SessionState::Draining);
        let _ = self.text_tx.send(TextEvent::End).await;
        drop(self.text_tx);
        drop(self.telemetry_tx);
        drop(self.command_tx);

        let _ = self.feed_handle.await;
        let _ = self.dispatch_handle.await;
        self.running.store(false, Ordering::SeqCst);
        self.control_handle.abort();
        let _ = self.control_handle.await;
        let _ = self.state.transition(SessionState::Stopped);
        info!(target: "runtime", "session drained");
    }

    /// Hard cancel: abandon in-flight synthesis; nothing further reaches
    /// the sink.
    pub async fn cancel(self) {
        self.running.store(false, Ordering::SeqCst);
        self.feed_handle.abort();
        self.dispatch_handle.abort();
        self.control_handle.abort();
        let _ = self.feed_handle.await;
        let _ = self.dispatch_handle.await;
        let _ = self.control_handle.await;
        let _ = self.state.transition(SessionState::Stopped);
        info!(target: "runtime", "session cancelled");
    }
}
