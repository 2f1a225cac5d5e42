//! Validated, hot-swappable configuration.
//!
//! Components hold a [`SharedConfig`] and read a snapshot per decision, so a
//! live update applies to future decisions only and an invalid update leaves
//! the previous configuration in place.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Implemented by every hot-reloadable config section.
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Atomically swappable configuration cell.
///
/// Readers clone an `Arc` snapshot; writers validate first and then swap, so
/// a rejected update never disturbs running components.
pub struct SharedConfig<T> {
    inner: RwLock<Arc<T>>,
}

impl<T: Validate> SharedConfig<T> {
    pub fn new(initial: T) -> Result<Self, ConfigError> {
        initial.validate()?;
        Ok(Self {
            inner: RwLock::new(Arc::new(initial)),
        })
    }

    pub fn snapshot(&self) -> Arc<T> {
        self.inner.read().clone()
    }

    pub fn update(&self, next: T) -> Result<(), ConfigError> {
        next.validate()?;
        *self.inner.write() = Arc::new(next);
        Ok(())
    }
}
