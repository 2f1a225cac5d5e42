use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

use voxstream_foundation::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Streaming,
    Draining,
    Stopped,
    Failed { reason: String },
}

/// Session lifecycle with validated transitions.
#[derive(Clone)]
pub struct SessionStateManager {
    state: Arc<RwLock<SessionState>>,
    state_tx: Sender<SessionState>,
    state_rx: Receiver<SessionState>,
}

impl Default for SessionStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(SessionState::Idle)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: SessionState) -> Result<(), PipelineError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (SessionState::Idle, SessionState::Streaming)
                | (SessionState::Streaming, SessionState::Draining)
                | (SessionState::Streaming, SessionState::Stopped)
                | (SessionState::Draining, SessionState::Stopped)
        );

        if !valid {
            return Err(PipelineError::SessionFailed(format!(
                "invalid state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("session state: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    /// Forces the failed state; valid from anywhere but a finished session.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut current = self.state.write();
        if matches!(*current, SessionState::Stopped | SessionState::Failed { .. }) {
            return;
        }
        let next = SessionState::Failed {
            reason: reason.into(),
        };
        tracing::error!("session state: {:?} -> {:?}", *current, next);
        *current = next.clone();
        let _ = self.state_tx.send(next);
    }

    pub fn current(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<SessionState> {
        self.state_rx.clone()
    }
}
