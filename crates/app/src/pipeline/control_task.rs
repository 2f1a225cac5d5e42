//! Channel-driven worker around the backpressure controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::info;

use voxstream_control::{BackpressureController, BufferTelemetry};
use voxstream_telemetry::PipelineMetrics;

/// Applies telemetry reports to the shared chunk budget and watches for a
/// stale feed.
pub struct ControlTask {
    telemetry_rx: mpsc::Receiver<BufferTelemetry>,
    controller: BackpressureController,
    metrics: Arc<PipelineMetrics>,
    running: Arc<AtomicBool>,
}

impl ControlTask {
    pub fn new(
        telemetry_rx: mpsc::Receiver<BufferTelemetry>,
        controller: BackpressureController,
        metrics: Arc<PipelineMetrics>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            telemetry_rx,
            controller,
            metrics,
            running,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(target: "control", "backpressure controller started");
        let mut stale_tick = time::interval(Duration::from_millis(250));

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                report = self.telemetry_rx.recv() => match report {
                    Some(telemetry) => {
                        self.metrics
                            .update_buffer_health(telemetry.buffered_ms, telemetry.underrun_count);
                        self.controller.observe(telemetry);
                        self.metrics.update_token_budget(self.controller.budget());
                    }
                    None => break,
                },
                _ = stale_tick.tick() => {
                    if self.controller.check_staleness() {
                        self.metrics
                            .stale_telemetry_resets
                            .fetch_add(1, Ordering::Relaxed);
                        self.metrics.update_token_budget(self.controller.budget());
                    }
                }
            }
        }
        info!(target: "control", "backpressure controller stopped");
    }
}
