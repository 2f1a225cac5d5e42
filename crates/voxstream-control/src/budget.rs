use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared chunk token budget.
///
/// Single writer (the controller), single reader (the chunker) per session;
/// an atomic is all the synchronization required.
#[derive(Debug, Clone)]
pub struct ChunkBudget {
    tokens: Arc<AtomicUsize>,
}

impl ChunkBudget {
    pub fn new(initial: usize) -> Self {
        Self {
            tokens: Arc::new(AtomicUsize::new(initial)),
        }
    }

    pub fn get(&self) -> usize {
        self.tokens.load(Ordering::Relaxed)
    }

    pub fn set(&self, tokens: usize) {
        self.tokens.store(tokens, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_shared_between_clones() {
        let budget = ChunkBudget::new(48);
        let reader = budget.clone();
        budget.set(16);
        assert_eq!(reader.get(), 16);
    }
}
