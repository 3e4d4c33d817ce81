//! Execution context double that records every dispatched action.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::context::{Action, ContextError, ExecutionContext, HostState, MemoryContext};

/// Forwards to a [`MemoryContext`] while keeping a log of actions.
#[derive(Debug, Default)]
pub struct RecordingContext {
    inner: MemoryContext,
    actions: Mutex<Vec<Action>>,
}

impl RecordingContext {
    /// Actions dispatched so far, in order.
    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .lock()
            .expect("recording context mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl ExecutionContext for RecordingContext {
    fn state(&self) -> Arc<HostState> {
        self.inner.state()
    }

    async fn dispatch(&self, action: Action) -> Result<(), ContextError> {
        self.actions
            .lock()
            .expect("recording context mutex poisoned")
            .push(action.clone());
        self.inner.dispatch(action).await
    }
}
