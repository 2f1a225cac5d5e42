use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

use voxstream_control::ChunkBudget;
use voxstream_foundation::{SharedClock, SharedConfig};

use crate::config::ChunkingConfig;
use crate::types::{next_chunk_id, ChunkingMode, PunctuationClass, TextChunk};

/// Streaming text chunker.
///
/// Consumes append-only text fragments and emits ordered chunks cut at
/// punctuation boundaries, sized by the live token budget. Decisions are
/// synchronous and never block; time-based flushes fire on [`push`] and
/// [`poll`].
///
/// Trigger priority at each ingested character:
/// 1. hard punctuation once the minimum floor is buffered,
/// 2. soft punctuation once the budget is buffered,
/// 3. budget + lookahead overflow, cut at the last whitespace,
/// and on the clock: the unconditional flush timeout, then the softer
/// time budget which only cuts at a buffered boundary.
///
/// [`push`]: TextChunker::push
/// [`poll`]: TextChunker::poll
pub struct TextChunker {
    config: Arc<SharedConfig<ChunkingConfig>>,
    budget: ChunkBudget,
    clock: SharedClock,
    mode: ChunkingMode,
    buf: String,
    buf_tokens: usize,
    buffered_since: Option<Instant>,
    current_sentence: u64,
    next_sequence: u64,
}

impl TextChunker {
    pub fn new(
        config: Arc<SharedConfig<ChunkingConfig>>,
        budget: ChunkBudget,
        clock: SharedClock,
        mode: ChunkingMode,
    ) -> Self {
        Self {
            config,
            budget,
            clock,
            mode,
            buf: String::new(),
            buf_tokens: 0,
            buffered_since: None,
            current_sentence: 0,
            next_sequence: 0,
        }
    }

    pub fn mode(&self) -> ChunkingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ChunkingMode) {
        self.mode = mode;
    }

    pub fn pending_tokens(&self) -> usize {
        self.buf_tokens
    }

    /// Appends one text fragment and returns every chunk it completes, in
    /// input order.
    pub fn push(&mut self, sentence_id: u64, fragment: &str) -> Vec<TextChunk> {
        let cfg = self.config.snapshot();
        let budget = self.budget.get().max(1);
        let mut out = Vec::new();

        // A chunk never spans sentences.
        if !self.buf.is_empty() && sentence_id != self.current_sentence {
            out.push(self.flush_all(PunctuationClass::None));
        }
        self.current_sentence = sentence_id;

        for ch in fragment.chars() {
            if self.buf.is_empty() {
                self.buffered_since = Some(self.clock.now());
            }
            self.buf.push(ch);
            self.buf_tokens += 1;

            let class = PunctuationClass::of(ch);
            match self.mode {
                ChunkingMode::Micro => {
                    if class == PunctuationClass::Hard && self.buf_tokens >= cfg.min_flush_tokens {
                        out.push(self.flush_all(PunctuationClass::Hard));
                    } else if class == PunctuationClass::Soft && self.buf_tokens >= budget {
                        out.push(self.flush_all(PunctuationClass::Soft));
                    } else {
                        // Loop: the budget can shrink between pushes, leaving
                        // the buffer more than one chunk over the new limit.
                        while self.buf_tokens >= budget + cfg.lookahead_tokens {
                            out.push(self.force_split(budget + cfg.lookahead_tokens));
                        }
                    }
                }
                ChunkingMode::Sentence => {
                    if class == PunctuationClass::Hard && self.buf_tokens >= cfg.min_flush_tokens {
                        out.push(self.flush_all(PunctuationClass::Hard));
                    }
                }
            }
        }

        if let Some(chunk) = self.check_time(&cfg) {
            out.push(chunk);
        }

        out
    }

    /// Fires time-based flushes; call periodically while input is sparse.
    pub fn poll(&mut self) -> Option<TextChunk> {
        let cfg = self.config.snapshot();
        self.check_time(&cfg)
    }

    /// End of stream: flush whatever is buffered regardless of budget.
    pub fn finish(&mut self) -> Option<TextChunk> {
        if self.buf.is_empty() {
            return None;
        }
        let class = self
            .buf
            .chars()
            .next_back()
            .map(PunctuationClass::of)
            .unwrap_or(PunctuationClass::None);
        Some(self.flush_all(class))
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.buf_tokens = 0;
        self.buffered_since = None;
        self.current_sentence = 0;
        self.next_sequence = 0;
    }

    fn check_time(&mut self, cfg: &ChunkingConfig) -> Option<TextChunk> {
        let since = self.buffered_since?;
        let elapsed_ms = self
            .clock
            .now()
            .saturating_duration_since(since)
            .as_millis() as u64;

        if elapsed_ms >= cfg.force_flush_timeout_ms {
            return Some(self.flush_all(PunctuationClass::None));
        }

        if self.mode == ChunkingMode::Micro
            && elapsed_ms >= cfg.time_budget_ms
            && self.buf_tokens >= cfg.min_flush_tokens
        {
            if let Some((end, class)) = self.last_boundary() {
                return Some(self.flush_prefix(end, class));
            }
        }

        None
    }

    /// Byte offset one past the newest punctuation boundary, if any.
    fn last_boundary(&self) -> Option<(usize, PunctuationClass)> {
        self.buf
            .char_indices()
            .rev()
            .find_map(|(idx, ch)| match PunctuationClass::of(ch) {
                PunctuationClass::None => None,
                class => Some((idx + ch.len_utf8(), class)),
            })
    }

    /// Overflow flush: cut at the last whitespace inside the first `limit`
    /// tokens, or at the limit itself when the text offers no break.
    fn force_split(&mut self, limit: usize) -> TextChunk {
        let mut end = 0;
        let mut ws_cut = None;
        for (tokens, (idx, ch)) in self.buf.char_indices().enumerate() {
            if tokens == limit {
                break;
            }
            end = idx + ch.len_utf8();
            if ch.is_whitespace() {
                ws_cut = Some(end);
            }
        }
        self.flush_prefix(ws_cut.unwrap_or(end), PunctuationClass::None)
    }

    fn flush_all(&mut self, class: PunctuationClass) -> TextChunk {
        let text = std::mem::take(&mut self.buf);
        let chunk = self.make_chunk(text, class);
        self.buffered_since = None;
        chunk
    }

    fn flush_prefix(&mut self, end: usize, class: PunctuationClass) -> TextChunk {
        let rest = self.buf.split_off(end);
        let text = std::mem::replace(&mut self.buf, rest);
        let chunk = self.make_chunk(text, class);
        // The remainder's latency clock restarts at the cut.
        self.buffered_since = if self.buf.is_empty() {
            None
        } else {
            Some(self.clock.now())
        };
        chunk
    }

    fn make_chunk(&mut self, text: String, class: PunctuationClass) -> TextChunk {
        let token_count = text.chars().count();
        self.buf_tokens -= token_count;
        let chunk = TextChunk {
            id: next_chunk_id(),
            token_count,
            punctuation: class,
            sentence_id: self.current_sentence,
            sequence: self.next_sequence,
            text,
        };
        self.next_sequence += 1;
        trace!(
            target: "chunker",
            id = chunk.id,
            seq = chunk.sequence,
            tokens = chunk.token_count,
            class = ?chunk.punctuation,
            "chunk flushed"
        );
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxstream_foundation::{manual_clock, ManualClock};

    fn fixture(budget: usize, lookahead: usize) -> (TextChunker, Arc<ManualClock>, ChunkBudget) {
        let clock = manual_clock();
        let cfg = ChunkingConfig {
            lookahead_tokens: lookahead,
            chunk_token_budget: budget,
            ..Default::default()
        };
        let shared = Arc::new(SharedConfig::new(cfg).unwrap());
        let handle = ChunkBudget::new(budget);
        let chunker = TextChunker::new(shared, handle.clone(), clock.clone(), ChunkingMode::Micro);
        (chunker, clock, handle)
    }

    fn concat(chunks: &[TextChunk]) -> String {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn short_sentence_flushes_immediately_as_one_chunk() {
        let (mut chunker, _clock, _budget) = fixture(48, 12);
        let chunks = chunker.push(1, "Yes.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Yes.");
        assert_eq!(chunks[0].punctuation, PunctuationClass::Hard);
        assert_eq!(chunker.finish(), None);
    }

    #[test]
    fn clause_heavy_text_yields_multiple_chunks() {
        let (mut chunker, _clock, _budget) = fixture(16, 4);
        let input = "First part, second part; third part: final part.";
        let mut chunks = chunker.push(1, input);
        if let Some(rest) = chunker.finish() {
            chunks.push(rest);
        }
        assert!(chunks.len() >= 3, "expected >= 3 chunks, got {:?}", chunks);
        assert_eq!(concat(&chunks), input);
        for chunk in &chunks {
            assert!(chunk.token_count <= 16 + 4, "oversized chunk: {:?}", chunk);
        }
    }

    #[test]
    fn concatenation_reproduces_fragmented_input() {
        let (mut chunker, _clock, _budget) = fixture(24, 8);
        let input = "The quick brown fox, which was not slow; jumped over it. Then it ran away!";
        let mut chunks = Vec::new();
        // Feed in uneven fragments, as a token stream would arrive.
        let mut rest = input;
        for size in [3usize, 7, 1, 11, 2].iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let take = (*size).min(rest.len());
            let (head, tail) = rest.split_at(take);
            chunks.extend(chunker.push(5, head));
            rest = tail;
        }
        chunks.extend(chunker.finish());
        assert_eq!(concat(&chunks), input);
        let mut sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
        let sorted = {
            let mut s = sequences.clone();
            s.sort_unstable();
            s
        };
        assert_eq!(sequences, sorted, "chunks must be emitted in order");
        sequences.dedup();
        assert_eq!(sequences.len(), chunks.len());
    }

    #[test]
    fn punctuation_free_text_is_force_flushed_at_word_boundaries() {
        let (mut chunker, _clock, _budget) = fixture(16, 4);
        let input = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let mut chunks = chunker.push(1, input);
        chunks.extend(chunker.finish());
        assert!(chunks.len() > 1);
        assert_eq!(concat(&chunks), input);
        for chunk in &chunks {
            assert!(chunk.token_count <= 20);
        }
        // Every forced cut lands after a whitespace, keeping words whole.
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.text.ends_with(char::is_whitespace),
                "forced cut split a word: {:?}",
                chunk.text
            );
            assert_eq!(chunk.punctuation, PunctuationClass::None);
        }
    }

    #[test]
    fn unbroken_run_is_cut_at_the_limit() {
        let (mut chunker, _clock, _budget) = fixture(8, 2);
        let input = "abcdefghijklmnopqrstuvwxyz";
        let mut chunks = chunker.push(1, input);
        chunks.extend(chunker.finish());
        assert_eq!(concat(&chunks), input);
        assert_eq!(chunks[0].token_count, 10);
    }

    #[test]
    fn soft_boundary_flushes_once_budget_is_reached() {
        let (mut chunker, _clock, _budget) = fixture(4, 12);
        let chunks = chunker.push(1, "One, two");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "One,");
        assert_eq!(chunks[0].punctuation, PunctuationClass::Soft);
    }

    #[test]
    fn soft_boundary_below_budget_keeps_buffering() {
        let (mut chunker, _clock, _budget) = fixture(48, 12);
        let chunks = chunker.push(1, "One, two");
        assert!(chunks.is_empty());
        assert_eq!(chunker.pending_tokens(), 8);
    }

    #[test]
    fn flush_timeout_drains_residual_buffer() {
        let (mut chunker, clock, _budget) = fixture(48, 12);
        assert!(chunker.push(1, "Hello").is_empty());
        assert_eq!(chunker.poll(), None);

        clock.advance_ms(300);
        let chunk = chunker.poll().expect("timeout flush");
        assert_eq!(chunk.text, "Hello");
        assert_eq!(chunk.punctuation, PunctuationClass::None);
        assert_eq!(chunker.poll(), None);
    }

    #[test]
    fn time_budget_flushes_at_newest_boundary() {
        let (mut chunker, clock, _budget) = fixture(48, 12);
        assert!(chunker.push(1, "Hello, wor").is_empty());

        clock.advance_ms(160);
        let chunk = chunker.poll().expect("time-budget flush");
        assert_eq!(chunk.text, "Hello,");
        assert_eq!(chunk.punctuation, PunctuationClass::Soft);

        // The remainder keeps buffering with a fresh latency clock.
        assert_eq!(chunker.poll(), None);
        assert_eq!(chunker.finish().unwrap().text, " wor");
    }

    #[test]
    fn sentence_change_flushes_previous_residue() {
        let (mut chunker, _clock, _budget) = fixture(48, 12);
        assert!(chunker.push(1, "trailing words").is_empty());
        let chunks = chunker.push(2, "Next one.");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "trailing words");
        assert_eq!(chunks[0].sentence_id, 1);
        assert_eq!(chunks[1].text, "Next one.");
        assert_eq!(chunks[1].sentence_id, 2);
    }

    #[test]
    fn sentence_mode_flushes_on_hard_punctuation_only() {
        let (mut chunker, _clock, _budget) = fixture(4, 4);
        chunker.set_mode(ChunkingMode::Sentence);
        let input = "One, two three; four five six seven eight nine ten! Short.";
        let chunks = chunker.push(1, input);
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].text,
            "One, two three; four five six seven eight nine ten!"
        );
        assert_eq!(chunks[1].text, " Short.");
        assert!(chunks.iter().all(|c| c.punctuation == PunctuationClass::Hard));
    }

    #[test]
    fn budget_update_applies_to_future_decisions_only() {
        let (mut chunker, _clock, budget) = fixture(48, 4);
        assert!(chunker.push(1, "some early words here").is_empty());

        budget.set(8);
        let chunks = chunker.push(1, " and more");
        // Buffer is now over the shrunken 8 + 4 limit: forced cut.
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert_eq!(chunk.punctuation, PunctuationClass::None);
        }
    }

    #[test]
    fn reset_clears_buffered_text() {
        let (mut chunker, _clock, _budget) = fixture(48, 12);
        assert!(chunker.push(1, "buffered").is_empty());
        chunker.reset();
        assert_eq!(chunker.pending_tokens(), 0);
        assert_eq!(chunker.finish(), None);
    }

    #[test]
    fn empty_fragment_is_a_no_op() {
        let (mut chunker, _clock, _budget) = fixture(48, 12);
        assert!(chunker.push(1, "").is_empty());
        assert_eq!(chunker.finish(), None);
    }
}
