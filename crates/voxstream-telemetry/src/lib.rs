//! Telemetry for the VoxStream pipeline.
//!
//! Metrics are plain atomics shared across tasks; sessions contribute to one
//! aggregate instance without locking on the hot path.

pub mod pipeline_metrics;

pub use pipeline_metrics::{PipelineMetrics, PipelineStage, RateTracker};
