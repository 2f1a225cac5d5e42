//! Channel-driven worker around the synchronous text chunker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{info, warn};

use voxstream_telemetry::{PipelineMetrics, PipelineStage, RateTracker};
use voxstream_text::{PunctuationClass, TextChunk, TextChunker};

/// Input to a session: ordered text fragments tagged with a sentence id.
#[derive(Debug, Clone)]
pub enum TextEvent {
    Fragment { sentence_id: u64, text: String },
    End,
}

/// Pulls text events, drives the chunker, and forwards chunks downstream.
/// Ticks the chunker so time-based flushes fire even when input stalls.
pub struct TextFeed {
    text_rx: mpsc::Receiver<TextEvent>,
    chunk_tx: mpsc::Sender<TextChunk>,
    chunker: TextChunker,
    metrics: Arc<PipelineMetrics>,
    running: Arc<AtomicBool>,
}

impl TextFeed {
    pub fn new(
        text_rx: mpsc::Receiver<TextEvent>,
        chunk_tx: mpsc::Sender<TextChunk>,
        chunker: TextChunker,
        metrics: Arc<PipelineMetrics>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            text_rx,
            chunk_tx,
            chunker,
            metrics,
            running,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(target: "chunker", "text feed started");
        // Poll fast enough that a flush timeout is late by at most one tick.
        let mut tick = time::interval(Duration::from_millis(20));
        let mut rate = RateTracker::new();

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                event = self.text_rx.recv() => match event {
                    Some(TextEvent::Fragment { sentence_id, text }) => {
                        for chunk in self.chunker.push(sentence_id, &text) {
                            self.forward(chunk, &mut rate).await;
                        }
                    }
                    Some(TextEvent::End) | None => {
                        if let Some(chunk) = self.chunker.finish() {
                            self.forward(chunk, &mut rate).await;
                        }
                        break;
                    }
                },
                _ = tick.tick() => {
                    if let Some(chunk) = self.chunker.poll() {
                        self.metrics.timeout_flushes.fetch_add(1, Ordering::Relaxed);
                        self.forward(chunk, &mut rate).await;
                    }
                }
            }
        }
        info!(target: "chunker", "text feed stopped");
    }

    async fn forward(&self, chunk: TextChunk, rate: &mut RateTracker) {
        self.metrics.increment_chunks();
        if chunk.punctuation == PunctuationClass::None {
            self.metrics.forced_flushes.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(per_sec) = rate.tick() {
            self.metrics.update_chunk_rate(per_sec);
        }
        self.metrics.mark_stage_active(PipelineStage::Chunker);
        if self.chunk_tx.send(chunk).await.is_err() {
            warn!(target: "chunker", "no dispatcher listening for chunks");
        }
    }
}
