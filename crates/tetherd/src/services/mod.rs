//! Default capability tree exposed to embedded applications.
//!
//! | Path                            | Behaviour                                  |
//! |---------------------------------|--------------------------------------------|
//! | `fs.list(path)`                 | folder listing from host state             |
//! | `fs.get(path)`                  | record addressed by the last path segment  |
//! | `fs.put(path, serializedPcd)`   | `add-pcds` into the parent folder, upsert  |
//! | `fs.delete(path)`               | not implemented                            |
//! | `gpc.prove(args)`               | not implemented                            |
//! | `feeds.requestAddSubscription`  | not implemented                            |
//! | `identity.getIdentityCommitment`| placeholder commitment                     |
//! | `identity.getAttestedEmails`    | not implemented                            |

mod feeds;
mod fs;
mod gpc;
mod identity;
mod scope;

use std::sync::Arc;

use crate::registry::{ServiceBuilder, ServiceRegistry};

pub use self::identity::PLACEHOLDER_IDENTITY_COMMITMENT;
pub use self::scope::ServiceScope;

const SERVICES_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::services");

/// Builds the registry bound to one session.
#[must_use]
pub fn build_registry(scope: ServiceScope) -> ServiceRegistry {
    let scope = Arc::new(scope);
    ServiceBuilder::new()
        .service("fs", fs::service(&scope))
        .service("gpc", gpc::service())
        .service("feeds", feeds::service())
        .service("identity", identity::service())
        .build()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::*;
    use crate::client_channel::ClientChannel;
    use crate::context::{ExecutionContext, MemoryContext};
    use crate::port::MessageChannel;
    use crate::registry::CapabilityError;

    fn registry_with(context: Arc<MemoryContext>) -> ServiceRegistry {
        let (local, _remote) = MessageChannel::pair();
        let (sender, _receiver) = local.start();
        let context: Arc<dyn ExecutionContext> = context;
        build_registry(ServiceScope::new(
            context,
            ClientChannel::new(sender),
            None,
            Some("test".to_string()),
        ))
    }

    async fn call(
        registry: &ServiceRegistry,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        registry.resolve(function).expect("resolve").call(args).await
    }

    fn serialized(id: &str) -> Value {
        json!({"type": "pod-pcd", "pcd": json!({"id": id}).to_string()})
    }

    #[test]
    fn exposes_the_default_paths() {
        let registry = registry_with(Arc::new(MemoryContext::new()));
        assert_eq!(
            registry.paths(),
            vec![
                "feeds.requestAddSubscription",
                "fs.delete",
                "fs.get",
                "fs.list",
                "fs.put",
                "gpc.prove",
                "identity.getAttestedEmails",
                "identity.getIdentityCommitment",
            ]
        );
    }

    #[tokio::test]
    async fn put_then_get_and_list_round_trip_through_context() {
        let context = Arc::new(MemoryContext::new());
        let registry = registry_with(Arc::clone(&context));

        let stored = call(
            &registry,
            "fs.put",
            vec![json!("folder/abc"), serialized("abc")],
        )
        .await
        .expect("put");
        assert_eq!(stored, Value::Null);

        let fetched = call(&registry, "fs.get", vec![json!("folder/abc")])
            .await
            .expect("get");
        assert_eq!(fetched, serialized("abc"));

        let listing = call(&registry, "fs.list", vec![json!("folder")])
            .await
            .expect("list");
        assert_eq!(
            listing,
            json!([{"type": "pcd", "id": "abc", "pcdType": "pod-pcd"}])
        );
    }

    #[tokio::test]
    async fn get_reports_missing_records() {
        let registry = registry_with(Arc::new(MemoryContext::new()));
        let missing = call(&registry, "fs.get", vec![json!("folder/nope")])
            .await
            .expect_err("missing");
        assert_eq!(missing.to_string(), "PCD with ID nope does not exist");

        let no_id = call(&registry, "fs.get", vec![json!("folder/")])
            .await
            .expect_err("no id");
        assert_eq!(no_id.to_string(), "No PCD ID found in path");
    }

    #[tokio::test]
    async fn placeholder_capabilities_report_not_implemented() {
        let registry = registry_with(Arc::new(MemoryContext::new()));
        for (function, args) in [
            ("gpc.prove", vec![json!({"pods": {}})]),
            ("gpc.prove", Vec::new()),
            ("feeds.requestAddSubscription", vec![json!("https://feed"), json!("1")]),
            ("feeds.requestAddSubscription", vec![json!(7)]),
            ("identity.getAttestedEmails", Vec::new()),
            ("identity.getAttestedEmails", vec![json!(true)]),
            ("fs.delete", vec![json!("folder/abc")]),
            ("fs.delete", vec![json!(1), json!(2)]),
        ] {
            let error = call(&registry, function, args).await.expect_err(function);
            assert!(
                matches!(error, CapabilityError::NotImplemented),
                "{function} should be unimplemented"
            );
        }
    }

    #[rstest]
    #[case::no_args(Vec::new())]
    #[case::surplus_args(vec![json!(1)])]
    #[tokio::test]
    async fn identity_commitment_is_the_placeholder(#[case] args: Vec<Value>) {
        let registry = registry_with(Arc::new(MemoryContext::new()));
        let commitment = call(&registry, "identity.getIdentityCommitment", args)
            .await
            .expect("commitment");
        assert_eq!(commitment, json!(100));
    }
}
