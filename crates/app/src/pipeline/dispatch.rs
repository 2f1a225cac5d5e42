//! Synthesis dispatch with strict in-order emission.
//!
//! Chunks fan out to the engine concurrently; completed audio is held in a
//! reorder buffer and released to the sink strictly by chunk sequence, so a
//! fast later chunk never overtakes a slow earlier one.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use voxstream_prosody::{next_segment_id, AudioSegment, ProsodySmoother, RetimeReason};
use voxstream_synth::{filler_audio, SynthesisEngine, SynthesisRequest, SynthesizedAudio};
use voxstream_telemetry::{PipelineMetrics, PipelineStage};
use voxstream_text::TextChunk;

use crate::pipeline::sink::SinkEvent;
use crate::state::SessionStateManager;

/// Silence stands in for a chunk that failed twice, keeping its slot in the
/// emission sequence.
const FILLER_MS: u64 = 200;

/// Control-plane requests into a running dispatcher.
#[derive(Debug)]
pub enum DispatcherCommand {
    /// Crossfade a corrected rendition over an already-emitted segment.
    RequestCorrection {
        segment_id: u64,
        samples: Vec<f32>,
        sample_rate: u32,
        reason: RetimeReason,
    },
}

struct Completion {
    chunk: TextChunk,
    audio: SynthesizedAudio,
}

enum SynthOutcome {
    Done(Completion),
    EngineGone(String),
}

pub struct SynthesisDispatcher {
    chunk_rx: mpsc::Receiver<TextChunk>,
    cmd_rx: mpsc::Receiver<DispatcherCommand>,
    engine: Arc<dyn SynthesisEngine>,
    smoother: ProsodySmoother,
    sink_tx: mpsc::Sender<SinkEvent>,
    metrics: Arc<PipelineMetrics>,
    state: SessionStateManager,
    running: Arc<AtomicBool>,
}

impl SynthesisDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chunk_rx: mpsc::Receiver<TextChunk>,
        cmd_rx: mpsc::Receiver<DispatcherCommand>,
        engine: Arc<dyn SynthesisEngine>,
        smoother: ProsodySmoother,
        sink_tx: mpsc::Sender<SinkEvent>,
        metrics: Arc<PipelineMetrics>,
        state: SessionStateManager,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            chunk_rx,
            cmd_rx,
            engine,
            smoother,
            sink_tx,
            metrics,
            state,
            running,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        let (completion_tx, completion_rx) = mpsc::channel(64);
        let worker = DispatchWorker {
            chunk_rx: self.chunk_rx,
            cmd_rx: self.cmd_rx,
            engine: self.engine,
            smoother: self.smoother,
            sink_tx: self.sink_tx,
            metrics: self.metrics,
            state: self.state,
            running: self.running,
            completion_tx,
            completion_rx,
            pending: BTreeMap::new(),
            next_emit: 0,
            in_flight: 0,
            chunks_closed: false,
        };
        tokio::spawn(worker.run())
    }
}

struct DispatchWorker {
    chunk_rx: mpsc::Receiver<TextChunk>,
    cmd_rx: mpsc::Receiver<DispatcherCommand>,
    engine: Arc<dyn SynthesisEngine>,
    smoother: ProsodySmoother,
    sink_tx: mpsc::Sender<SinkEvent>,
    metrics: Arc<PipelineMetrics>,
    state: SessionStateManager,
    running: Arc<AtomicBool>,
    completion_tx: mpsc::Sender<SynthOutcome>,
    completion_rx: mpsc::Receiver<SynthOutcome>,
    /// Completed audio waiting for its predecessors, keyed by sequence
    pending: BTreeMap<u64, Completion>,
    next_emit: u64,
    in_flight: usize,
    chunks_closed: bool,
}

impl DispatchWorker {
    async fn run(mut self) {
        info!(target: "dispatch", engine = self.engine.name(), "dispatcher started");

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                chunk = self.chunk_rx.recv(), if !self.chunks_closed => match chunk {
                    Some(chunk) => self.dispatch(chunk),
                    None => self.chunks_closed = true,
                },
                Some(outcome) = self.completion_rx.recv() => {
                    self.in_flight -= 1;
                    match outcome {
                        SynthOutcome::Done(completion) => self.on_completion(completion).await,
                        SynthOutcome::EngineGone(reason) => {
                            error!(target: "dispatch", %reason, "synthesis engine unavailable");
                            self.state.fail(reason);
                            break;
                        }
                    }
                }
                Some(cmd) = self.cmd_rx.recv() => self.on_command(cmd).await,
                else => break,
            }

            if self.chunks_closed && self.in_flight == 0 && self.pending.is_empty() {
                break;
            }
        }

        info!(
            target: "dispatch",
            emitted = self.next_emit,
            "dispatcher stopped"
        );
    }

    /// Fans one chunk out to the engine. Retries once on failure; a second
    /// failure yields a filler segment so the sequence stays gapless.
    fn dispatch(&mut self, chunk: TextChunk) {
        self.metrics.synth_requests.fetch_add(1, Ordering::Relaxed);
        self.metrics.mark_stage_active(PipelineStage::Synthesis);
        self.in_flight += 1;

        let engine = self.engine.clone();
        let completion_tx = self.completion_tx.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let request = SynthesisRequest {
                chunk_id: chunk.id,
                text: chunk.text.clone(),
            };
            let outcome = match engine.synthesize(request.clone()).await {
                Ok(audio) => SynthOutcome::Done(Completion { chunk, audio }),
                Err(err) if err.is_unavailability() => SynthOutcome::EngineGone(err.to_string()),
                Err(err) => {
                    warn!(
                        target: "dispatch",
                        chunk_id = request.chunk_id,
                        %err,
                        "synthesis failed, retrying once"
                    );
                    metrics.synth_retries.fetch_add(1, Ordering::Relaxed);
                    match engine.synthesize(request.clone()).await {
                        Ok(audio) => SynthOutcome::Done(Completion { chunk, audio }),
                        Err(err) if err.is_unavailability() => {
                            SynthOutcome::EngineGone(err.to_string())
                        }
                        Err(err) => {
                            warn!(
                                target: "dispatch",
                                chunk_id = request.chunk_id,
                                %err,
                                "synthesis failed twice, substituting filler"
                            );
                            metrics.synth_failures.fetch_add(1, Ordering::Relaxed);
                            metrics.filler_segments.fetch_add(1, Ordering::Relaxed);
                            let audio = filler_audio(FILLER_MS, engine.sample_rate());
                            SynthOutcome::Done(Completion { chunk, audio })
                        }
                    }
                }
            };
            let _ = completion_tx.send(outcome).await;
        });
    }

    /// Buffers a completion and releases every segment whose predecessors
    /// have all been emitted.
    async fn on_completion(&mut self, completion: Completion) {
        if completion.chunk.sequence != self.next_emit {
            self.metrics
                .reordered_completions
                .fetch_add(1, Ordering::Relaxed);
            debug!(
                target: "dispatch",
                seq = completion.chunk.sequence,
                waiting_for = self.next_emit,
                "completion held for ordering"
            );
        }
        self.pending.insert(completion.chunk.sequence, completion);

        while let Some(completion) = self.pending.remove(&self.next_emit) {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            self.emit(completion).await;
            self.next_emit += 1;
        }
    }

    async fn emit(&mut self, completion: Completion) {
        let Completion { chunk, audio } = completion;
        let segment = AudioSegment::new(
            next_segment_id(),
            chunk.id,
            audio.samples,
            audio.sample_rate,
            self.smoother.now_ms(),
        );

        self.metrics.mark_stage_active(PipelineStage::Smoother);
        self.smoother.register(chunk.sentence_id, segment.clone());

        let event = SinkEvent::Segment {
            id: segment.id,
            samples: segment.samples,
            sample_rate: segment.sample_rate,
            sequence: chunk.sequence,
            sentence_id: chunk.sentence_id,
        };
        self.metrics.increment_segments();
        self.metrics.mark_first_audio();
        self.metrics.mark_stage_active(PipelineStage::Output);
        if self.sink_tx.send(event).await.is_err() {
            debug!(target: "dispatch", "sink closed, segment dropped");
        }
    }

    async fn on_command(&mut self, cmd: DispatcherCommand) {
        match cmd {
            DispatcherCommand::RequestCorrection {
                segment_id,
                samples,
                sample_rate,
                reason,
            } => {
                if !self.smoother.can_correct(segment_id) {
                    self.metrics
                        .corrections_rejected
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(
                        target: "dispatch",
                        segment_id,
                        %reason,
                        "correction outside the retime window"
                    );
                    return;
                }
                match self
                    .smoother
                    .request_correction(segment_id, &samples, sample_rate, reason)
                {
                    Some(corrected) => {
                        self.metrics
                            .corrections_applied
                            .fetch_add(1, Ordering::Relaxed);
                        let event = SinkEvent::Patch {
                            segment_id,
                            crossfade_start_ms: corrected.correction.crossfade_start_ms,
                            crossfade_duration_ms: corrected.correction.crossfade_duration_ms,
                            samples: corrected.patch_samples().to_vec(),
                        };
                        if self.sink_tx.send(event).await.is_err() {
                            debug!(target: "dispatch", "sink closed, patch dropped");
                        }
                    }
                    None => {
                        self.metrics
                            .corrections_rejected
                            .fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }
}
