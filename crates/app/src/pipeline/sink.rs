//! Playback sink interface and the demo WAV sink.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

/// What the playback sink receives: ordered segments plus out-of-band
/// correction patches.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Segment {
        id: u64,
        samples: Vec<f32>,
        sample_rate: u32,
        sequence: u64,
        sentence_id: u64,
    },
    /// Replaces a segment's tail from `crossfade_start_ms` onward; the
    /// samples before that offset are untouched by contract.
    Patch {
        segment_id: u64,
        crossfade_start_ms: u64,
        crossfade_duration_ms: u64,
        samples: Vec<f32>,
    },
}

/// Demo sink that assembles the session into one sample timeline and writes
/// it out as a 16-bit WAV.
pub struct WavSink {
    sample_rate: Option<u32>,
    timeline: Vec<f32>,
    /// segment id -> (start offset, length) in the timeline (samples)
    segments: HashMap<u64, (usize, usize)>,
    last_segment: Option<u64>,
}

impl Default for WavSink {
    fn default() -> Self {
        Self::new()
    }
}

impl WavSink {
    pub fn new() -> Self {
        Self {
            sample_rate: None,
            timeline: Vec::new(),
            segments: HashMap::new(),
            last_segment: None,
        }
    }

    pub fn handle(&mut self, event: SinkEvent) {
        match event {
            SinkEvent::Segment {
                id,
                samples,
                sample_rate,
                sequence,
                ..
            } => {
                if self.sample_rate.is_none() {
                    self.sample_rate = Some(sample_rate);
                }
                debug!(
                    target: "sink",
                    id,
                    sequence,
                    samples = samples.len(),
                    "segment appended"
                );
                self.segments.insert(id, (self.timeline.len(), samples.len()));
                self.last_segment = Some(id);
                self.timeline.extend(samples);
            }
            SinkEvent::Patch {
                segment_id,
                crossfade_start_ms,
                samples,
                ..
            } => self.splice(segment_id, crossfade_start_ms, samples),
        }
    }

    fn splice(&mut self, segment_id: u64, crossfade_start_ms: u64, samples: Vec<f32>) {
        let Some(&(start, len)) = self.segments.get(&segment_id) else {
            warn!(target: "sink", segment_id, "patch for unknown segment dropped");
            return;
        };
        let rate = self.sample_rate.unwrap_or(16_000) as u64;
        let offset = start + (crossfade_start_ms * rate / 1000) as usize;
        // Only the newest segment may grow; extending one mid-stream would
        // shift every successor.
        let may_extend = self.last_segment == Some(segment_id);
        let bound = if may_extend { usize::MAX } else { start + len };

        debug!(
            target: "sink",
            segment_id,
            offset,
            samples = samples.len(),
            "patch spliced"
        );
        let mut written = 0;
        for (i, sample) in samples.into_iter().enumerate() {
            let idx = offset + i;
            if idx >= bound {
                warn!(target: "sink", segment_id, "patch tail beyond segment dropped");
                break;
            }
            if idx < self.timeline.len() {
                self.timeline[idx] = sample;
            } else {
                self.timeline.push(sample);
            }
            written = idx + 1 - start;
        }
        if written > len {
            self.segments.insert(segment_id, (start, written));
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn len_samples(&self) -> usize {
        self.timeline.len()
    }

    /// Total assembled audio time.
    pub fn duration_ms(&self) -> u64 {
        match self.sample_rate {
            Some(rate) if rate > 0 => self.timeline.len() as u64 * 1000 / rate as u64,
            _ => 0,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.timeline
    }

    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate.unwrap_or(16_000),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.timeline {
            let clamped = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(clamped)?;
        }
        writer.finalize()
    }
}
