//! Identity queries for the embedded application.

use serde_json::Value;

use crate::registry::{CapabilityError, ServiceBuilder};

/// Commitment reported until the host exposes an identity store.
pub const PLACEHOLDER_IDENTITY_COMMITMENT: u64 = 100;

pub(crate) fn service() -> ServiceBuilder {
    ServiceBuilder::new()
        // TODO: read the commitment from host state once `HostState` carries an identity.
        .method("getIdentityCommitment", |_: Vec<Value>| async {
            Ok::<_, CapabilityError>(PLACEHOLDER_IDENTITY_COMMITMENT)
        })
        .method("getAttestedEmails", |_: Vec<Value>| async {
            Err::<Vec<Value>, _>(CapabilityError::NotImplemented)
        })
}
