//! VoxStream application: per-session pipeline wiring around the chunker,
//! backpressure controller, prosody smoother, and synthesis dispatcher.

pub mod config;
pub mod pipeline;
pub mod runtime;
pub mod state;

pub use config::{load_config, PipelineConfig};
pub use runtime::{spawn_session, SessionHandle, SessionOptions};
pub use state::{SessionState, SessionStateManager};
