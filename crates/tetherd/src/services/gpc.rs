use serde_json::Value;

use crate::registry::{CapabilityError, ServiceBuilder};

pub(crate) fn service() -> ServiceBuilder {
    ServiceBuilder::new().method("prove", |_: Vec<Value>| async {
        Err::<Value, _>(CapabilityError::NotImplemented)
    })
}
