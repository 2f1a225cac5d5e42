use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use voxstream_foundation::{SharedClock, SharedConfig};

use crate::config::CrossfadeConfig;
use crate::types::{next_segment_id, AudioSegment, CorrectedAudio, ProsodyCorrection, RetimeReason};

/// Smoothstep weight, clamped to the unit interval.
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Blends `corrected` over the tail of `original`, starting at sample
/// `start`. Everything before `start` is copied verbatim; the window fades
/// the original out and the correction in with smoothstep weights; whatever
/// the correction adds past the original's end is appended unchanged.
///
/// Output length is `max(original.len(), corrected.len())`.
pub fn crossfade(original: &[f32], corrected: &[f32], start: usize) -> Vec<f32> {
    let start = start.min(original.len());
    let window = original.len() - start;
    let mut out = Vec::with_capacity(original.len().max(corrected.len()));
    out.extend_from_slice(&original[..start]);

    for i in 0..window {
        let fade_in = smoothstep(i as f32 / window as f32);
        let fade_out = smoothstep((window - i) as f32 / window as f32);
        let corr = corrected.get(start + i).copied().unwrap_or(0.0);
        out.push(original[start + i] * fade_out + corr * fade_in);
    }

    if corrected.len() > out.len() {
        out.extend_from_slice(&corrected[out.len()..]);
    }
    out
}

/// Registry of recent audio segments with rate-limited crossfade corrections.
///
/// Mutated only by its owning dispatcher; one instance per session. Segments
/// age out after twice the retime window, so memory stays bounded to the
/// span of audio that is still correctable.
pub struct ProsodySmoother {
    config: Arc<SharedConfig<CrossfadeConfig>>,
    clock: SharedClock,
    epoch: Instant,
    segments: HashMap<u64, AudioSegment>,
    corrections: HashMap<u64, ProsodyCorrection>,
    current_sentence: Option<u64>,
    retimes_this_sentence: u32,
}

impl ProsodySmoother {
    pub fn new(config: Arc<SharedConfig<CrossfadeConfig>>, clock: SharedClock) -> Self {
        let epoch = clock.now();
        Self {
            config,
            clock,
            epoch,
            segments: HashMap::new(),
            corrections: HashMap::new(),
            current_sentence: None,
            retimes_this_sentence: 0,
        }
    }

    /// Milliseconds since the session epoch.
    pub fn now_ms(&self) -> u64 {
        self.clock
            .now()
            .saturating_duration_since(self.epoch)
            .as_millis() as u64
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn correction(&self, original_segment_id: u64) -> Option<&ProsodyCorrection> {
        self.corrections.get(&original_segment_id)
    }

    /// Takes ownership of a completed segment. A sentence change resets the
    /// retime counter; registration also drives eviction of aged segments.
    pub fn register(&mut self, sentence_id: u64, segment: AudioSegment) {
        if self.current_sentence != Some(sentence_id) {
            self.current_sentence = Some(sentence_id);
            self.retimes_this_sentence = 0;
        }
        self.segments.insert(segment.id, segment);
        self.evict();
    }

    /// Whether a correction for `segment_id` could still succeed. Callers
    /// gate re-synthesis behind this before paying for a corrected take.
    pub fn can_correct(&self, segment_id: u64) -> bool {
        let cfg = self.config.snapshot();
        let Some(segment) = self.segments.get(&segment_id) else {
            return false;
        };
        if self.retimes_this_sentence >= cfg.max_retimes_per_sentence {
            return false;
        }
        self.now_ms().saturating_sub(segment.start_time_ms) <= cfg.retime_threshold_ms
    }

    /// Crossfades a corrected rendition over a registered segment.
    ///
    /// Returns `None` (a designed no-op, logged only) when the sentence
    /// retime budget is spent, the segment is unknown, or the sample rate
    /// does not match the original.
    pub fn request_correction(
        &mut self,
        original_segment_id: u64,
        corrected_samples: &[f32],
        corrected_sample_rate: u32,
        reason: RetimeReason,
    ) -> Option<CorrectedAudio> {
        let cfg = self.config.snapshot();

        if self.retimes_this_sentence >= cfg.max_retimes_per_sentence {
            debug!(
                target: "prosody",
                segment_id = original_segment_id,
                %reason,
                "correction rejected: retime budget exhausted"
            );
            return None;
        }
        let Some(original) = self.segments.get(&original_segment_id) else {
            debug!(
                target: "prosody",
                segment_id = original_segment_id,
                %reason,
                "correction rejected: unknown segment"
            );
            return None;
        };
        if corrected_sample_rate != original.sample_rate {
            debug!(
                target: "prosody",
                segment_id = original_segment_id,
                expected = original.sample_rate,
                got = corrected_sample_rate,
                "correction rejected: sample rate mismatch"
            );
            return None;
        }

        let crossfade_duration_ms = cfg.crossfade_ms.min(original.duration_ms / 2);
        let crossfade_samples =
            (crossfade_duration_ms * original.sample_rate as u64 / 1000) as usize;
        let start = original.samples.len().saturating_sub(crossfade_samples);
        let samples = crossfade(&original.samples, corrected_samples, start);
        let crossfade_start_ms = start as u64 * 1000 / original.sample_rate as u64;

        let correction = ProsodyCorrection {
            original_segment_id,
            corrected_segment_id: next_segment_id(),
            crossfade_start_ms,
            crossfade_duration_ms,
            reason,
        };
        self.retimes_this_sentence += 1;
        self.corrections
            .insert(original_segment_id, correction.clone());
        debug!(
            target: "prosody",
            segment_id = original_segment_id,
            corrected_id = correction.corrected_segment_id,
            crossfade_start_ms,
            crossfade_duration_ms,
            %reason,
            "prosody correction applied"
        );

        Some(CorrectedAudio {
            correction,
            samples,
            sample_rate: corrected_sample_rate,
            crossfade_start_sample: start,
        })
    }

    /// Clears all session state.
    pub fn reset(&mut self) {
        self.segments.clear();
        self.corrections.clear();
        self.current_sentence = None;
        self.retimes_this_sentence = 0;
        self.epoch = self.clock.now();
    }

    /// Drops segments (and their corrections) older than twice the retime
    /// window; they can no longer be corrected, only remembered.
    fn evict(&mut self) {
        let horizon = 2 * self.config.snapshot().retime_threshold_ms;
        let now = self.now_ms();
        self.segments
            .retain(|_, seg| now.saturating_sub(seg.start_time_ms) <= horizon);
        let segments = &self.segments;
        self.corrections
            .retain(|id, _| segments.contains_key(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxstream_foundation::{manual_clock, ManualClock};

    const RATE: u32 = 16_000;

    fn fixture() -> (ProsodySmoother, Arc<ManualClock>) {
        let clock = manual_clock();
        let config = Arc::new(SharedConfig::new(CrossfadeConfig::default()).unwrap());
        let smoother = ProsodySmoother::new(config, clock.clone());
        (smoother, clock)
    }

    /// 100ms of a constant-value signal.
    fn segment(smoother: &ProsodySmoother, value: f32) -> AudioSegment {
        let samples = vec![value; (RATE / 10) as usize];
        AudioSegment::new(
            next_segment_id(),
            1,
            samples,
            RATE,
            smoother.now_ms(),
        )
    }

    #[test]
    fn smoothstep_endpoints() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert!((smoothstep(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn crossfade_copies_pre_window_verbatim() {
        let original: Vec<f32> = (0..1000).map(|i| (i as f32).sin()).collect();
        let corrected: Vec<f32> = (0..1200).map(|i| (i as f32).cos()).collect();
        let start = 800;
        let out = crossfade(&original, &corrected, start);

        assert_eq!(out.len(), 1200);
        for i in 0..start {
            assert_eq!(out[i].to_bits(), original[i].to_bits(), "sample {}", i);
        }
        // Past the original's end the corrected tail is untouched.
        for i in original.len()..corrected.len() {
            assert_eq!(out[i].to_bits(), corrected[i].to_bits());
        }
    }

    #[test]
    fn crossfade_length_is_max_of_inputs() {
        let original = vec![1.0f32; 500];
        let shorter = vec![0.0f32; 300];
        assert_eq!(crossfade(&original, &shorter, 400).len(), 500);
        let longer = vec![0.0f32; 900];
        assert_eq!(crossfade(&original, &longer, 400).len(), 900);
    }

    #[test]
    fn crossfade_window_blends_monotonically_between_signals() {
        let original = vec![1.0f32; 100];
        let corrected = vec![0.0f32; 100];
        let out = crossfade(&original, &corrected, 0);
        // Pure fade-out of a constant-1 signal against zeros.
        for pair in out.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-6);
        }
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn correction_applies_and_is_recorded() {
        let (mut smoother, _clock) = fixture();
        let seg = segment(&smoother, 0.5);
        let id = seg.id;
        let original = seg.samples.clone();
        smoother.register(1, seg);

        assert!(smoother.can_correct(id));
        let corrected = vec![0.25f32; original.len()];
        let result = smoother
            .request_correction(id, &corrected, RATE, RetimeReason::LateContext)
            .expect("correction should apply");

        // 30ms window on a 100ms segment: starts 30ms before the end.
        let expected_window = (30 * RATE as u64 / 1000) as usize;
        assert_eq!(
            result.crossfade_start_sample,
            original.len() - expected_window
        );
        for i in 0..result.crossfade_start_sample {
            assert_eq!(result.samples[i].to_bits(), original[i].to_bits());
        }
        assert_eq!(result.samples.len(), original.len());
        assert_eq!(result.patch_samples().len(), expected_window);

        let record = smoother.correction(id).expect("correction recorded");
        assert_eq!(record.crossfade_duration_ms, 30);
        assert_eq!(record.reason, RetimeReason::LateContext);
    }

    #[test]
    fn crossfade_duration_capped_at_half_segment() {
        let clock = manual_clock();
        let config = Arc::new(
            SharedConfig::new(CrossfadeConfig {
                crossfade_ms: 80,
                ..Default::default()
            })
            .unwrap(),
        );
        let mut smoother = ProsodySmoother::new(config, clock);
        // 40ms segment: the 80ms crossfade must shrink to 20ms.
        let samples = vec![0.5f32; (RATE * 40 / 1000) as usize];
        let seg = AudioSegment::new(next_segment_id(), 1, samples, RATE, smoother.now_ms());
        let id = seg.id;
        smoother.register(1, seg);

        let corrected = vec![0.1f32; (RATE * 40 / 1000) as usize];
        let result = smoother
            .request_correction(id, &corrected, RATE, RetimeReason::BoundaryRevision)
            .unwrap();
        assert_eq!(result.correction.crossfade_duration_ms, 20);
    }

    #[test]
    fn second_correction_in_same_sentence_is_rejected() {
        let (mut smoother, _clock) = fixture();
        let seg_a = segment(&smoother, 0.5);
        let seg_b = segment(&smoother, 0.7);
        let (id_a, id_b) = (seg_a.id, seg_b.id);
        let len = seg_a.samples.len();
        smoother.register(1, seg_a);
        smoother.register(1, seg_b);

        let corrected = vec![0.0f32; len];
        assert!(smoother
            .request_correction(id_a, &corrected, RATE, RetimeReason::LateContext)
            .is_some());
        assert!(smoother
            .request_correction(id_b, &corrected, RATE, RetimeReason::LateContext)
            .is_none());
        assert!(!smoother.can_correct(id_b));
    }

    #[test]
    fn sentence_change_restores_retime_budget() {
        let (mut smoother, _clock) = fixture();
        let seg_a = segment(&smoother, 0.5);
        let id_a = seg_a.id;
        let len = seg_a.samples.len();
        smoother.register(1, seg_a);

        let corrected = vec![0.0f32; len];
        assert!(smoother
            .request_correction(id_a, &corrected, RATE, RetimeReason::LateContext)
            .is_some());

        let seg_b = segment(&smoother, 0.7);
        let id_b = seg_b.id;
        smoother.register(2, seg_b);
        assert!(smoother
            .request_correction(id_b, &corrected, RATE, RetimeReason::LateContext)
            .is_some());
    }

    #[test]
    fn unknown_segment_is_rejected() {
        let (mut smoother, _clock) = fixture();
        assert!(smoother
            .request_correction(9999, &[0.0; 16], RATE, RetimeReason::LateContext)
            .is_none());
        assert!(!smoother.can_correct(9999));
    }

    #[test]
    fn sample_rate_mismatch_is_rejected() {
        let (mut smoother, _clock) = fixture();
        let seg = segment(&smoother, 0.5);
        let id = seg.id;
        let len = seg.samples.len();
        smoother.register(1, seg);

        assert!(smoother
            .request_correction(id, &vec![0.0; len], 48_000, RetimeReason::LateContext)
            .is_none());
        // The budget was not consumed by the rejection.
        assert!(smoother.can_correct(id));
    }

    #[test]
    fn retime_window_closes_after_threshold() {
        let (mut smoother, clock) = fixture();
        let seg = segment(&smoother, 0.5);
        let id = seg.id;
        smoother.register(1, seg);

        assert!(smoother.can_correct(id));
        clock.advance_ms(CrossfadeConfig::default().retime_threshold_ms + 1);
        assert!(!smoother.can_correct(id));
    }

    #[test]
    fn aged_segments_are_evicted_on_registration() {
        let (mut smoother, clock) = fixture();
        let seg_a = segment(&smoother, 0.5);
        let id_a = seg_a.id;
        smoother.register(1, seg_a);
        assert_eq!(smoother.segment_count(), 1);

        clock.advance_ms(2 * CrossfadeConfig::default().retime_threshold_ms + 10);
        let seg_b = segment(&smoother, 0.7);
        smoother.register(1, seg_b);

        assert_eq!(smoother.segment_count(), 1);
        assert!(!smoother.can_correct(id_a));
    }

    #[test]
    fn reset_clears_segments_and_corrections() {
        let (mut smoother, _clock) = fixture();
        let seg = segment(&smoother, 0.5);
        let id = seg.id;
        let len = seg.samples.len();
        smoother.register(1, seg);
        smoother
            .request_correction(id, &vec![0.0; len], RATE, RetimeReason::LateContext)
            .unwrap();

        smoother.reset();
        assert_eq!(smoother.segment_count(), 0);
        assert!(smoother.correction(id).is_none());
        assert!(!smoother.can_correct(id));
    }
}
