//! Per-session collaborators shared by every service.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::client_channel::ClientChannel;
use crate::context::ExecutionContext;

/// Everything a session's services are bound to.
#[derive(Clone)]
pub struct ServiceScope {
    context: Arc<dyn ExecutionContext>,
    client: ClientChannel,
    zapp: Option<Value>,
    origin: Option<String>,
}

impl ServiceScope {
    /// Bundles the session collaborators.
    #[must_use]
    pub fn new(
        context: Arc<dyn ExecutionContext>,
        client: ClientChannel,
        zapp: Option<Value>,
        origin: Option<String>,
    ) -> Self {
        Self {
            context,
            client,
            zapp,
            origin,
        }
    }

    /// Host state and mutation interface.
    #[must_use]
    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }

    /// Outbound control channel to the embedded peer.
    #[must_use]
    pub fn client(&self) -> &ClientChannel {
        &self.client
    }

    /// Application descriptor from the handshake.
    #[must_use]
    pub fn zapp(&self) -> Option<&Value> {
        self.zapp.as_ref()
    }

    /// Origin recorded for the handshake sender.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceScope")
            .field("client", &self.client)
            .field("zapp", &self.zapp)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
