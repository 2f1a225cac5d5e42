//! Backpressure control for the VoxStream pipeline.
//!
//! The controller watches playback-buffer telemetry and adapts the chunk
//! token budget: a starving buffer gets smaller chunks (faster first audio,
//! more synthesis calls), a comfortable buffer gets larger ones (fewer calls,
//! smoother prosody). The budget itself is a shared atomic read by the text
//! chunker on each decision.

pub mod budget;
pub mod config;
pub mod controller;

pub use budget::ChunkBudget;
pub use config::ControlConfig;
pub use controller::{BackpressureController, BufferTelemetry};
