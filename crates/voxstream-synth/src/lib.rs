//! Synthesis engine abstraction layer for VoxStream
//!
//! The actual speech model lives behind [`SynthesisEngine`]; the pipeline
//! only sees text in and sampled audio out. A deterministic tone engine is
//! included for tests and the demo binary.

pub mod engine;
pub mod error;
pub mod test_engine;

pub use engine::{filler_audio, SynthesisEngine, SynthesisRequest, SynthesizedAudio};
pub use error::{SynthError, SynthResult};
pub use test_engine::{ToneEngine, ToneEngineConfig};
