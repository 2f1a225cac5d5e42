use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use voxstream_app::pipeline::{TextEvent, WavSink};
use voxstream_app::{load_config, spawn_session, PipelineConfig, SessionOptions};
use voxstream_control::BufferTelemetry;
use voxstream_synth::ToneEngine;
use voxstream_text::ChunkingMode;

/// Streaming speech synthesis pipeline demo: reads text lines, streams them
/// through the pipeline word by word, and writes the audio to a WAV file.
#[derive(Parser, Debug)]
#[command(name = "voxstream")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "VOXSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Input text file; stdin when omitted. One line per sentence.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output WAV path
    #[arg(long, default_value = "voxstream-out.wav")]
    output: PathBuf,

    /// Rollback mode: flush on hard punctuation only
    #[arg(long)]
    sentence_mode: bool,

    /// Delay between streamed words, simulating upstream generation (ms)
    #[arg(long, default_value_t = 20)]
    word_delay_ms: u64,
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "voxstream.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging().map_err(|e| anyhow::anyhow!("logging init failed: {e}"))?;
    tracing::info!("starting voxstream");

    let config = match &args.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let mode = if args.sentence_mode {
        ChunkingMode::Sentence
    } else {
        ChunkingMode::Micro
    };
    let engine = Arc::new(ToneEngine::default());
    let options = SessionOptions::new(engine)
        .with_config(config)
        .with_mode(mode);
    let (session, mut sink_rx) = spawn_session(options)?;

    // Feed text word by word, the way a generator would hand it over.
    let text_tx = session.text_tx.clone();
    let input = args.input.clone();
    let word_delay = Duration::from_millis(args.word_delay_ms);
    let feeder = tokio::spawn(async move {
        let reader: Box<dyn tokio::io::AsyncBufRead + Unpin + Send> = match input {
            Some(path) => match tokio::fs::File::open(&path).await {
                Ok(file) => Box::new(BufReader::new(file)),
                Err(err) => {
                    tracing::error!("cannot open {}: {err}", path.display());
                    return;
                }
            },
            None => Box::new(BufReader::new(tokio::io::stdin())),
        };

        let mut lines = reader.lines();
        let mut sentence_id = 0u64;
        while let Ok(Some(line)) = lines.next_line().await {
            sentence_id += 1;
            for word in line.split_inclusive(' ') {
                let event = TextEvent::Fragment {
                    sentence_id,
                    text: word.to_string(),
                };
                if text_tx.send(event).await.is_err() {
                    return;
                }
                tokio::time::sleep(word_delay).await;
            }
        }
        let _ = text_tx.send(TextEvent::End).await;
    });

    // Play the sink stream into a WAV file while reporting buffer health
    // back, as a real playback sink would.
    let mut sink = WavSink::new();
    let mut playback_started: Option<Instant> = None;
    let mut underruns = 0u64;
    while let Some(event) = sink_rx.recv().await {
        sink.handle(event);
        let started = *playback_started.get_or_insert_with(Instant::now);
        let played_ms = started.elapsed().as_millis() as u64;
        let buffered_ms = sink.duration_ms().saturating_sub(played_ms);
        if buffered_ms == 0 {
            underruns += 1;
        }
        let _ = session.telemetry_tx.try_send(BufferTelemetry {
            buffered_ms,
            underrun_count: underruns,
            timestamp: Instant::now(),
        });
    }

    let _ = feeder.await;
    let metrics = session.metrics.clone();
    session.drain().await;

    sink.write_wav(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    tracing::info!(
        chunks = metrics.chunks_emitted.load(std::sync::atomic::Ordering::Relaxed),
        segments = metrics.segments_emitted.load(std::sync::atomic::Ordering::Relaxed),
        fillers = metrics.filler_segments.load(std::sync::atomic::Ordering::Relaxed),
        first_audio_ms = metrics
            .first_audio_latency_ms
            .load(std::sync::atomic::Ordering::Relaxed),
        duration_ms = sink.duration_ms(),
        output = %args.output.display(),
        "session complete"
    );

    Ok(())
}
