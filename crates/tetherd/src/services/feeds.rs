use serde_json::Value;

use crate::registry::{CapabilityError, ServiceBuilder};

pub(crate) fn service() -> ServiceBuilder {
    ServiceBuilder::new().method("requestAddSubscription", |_: Vec<Value>| async {
        Err::<(), _>(CapabilityError::NotImplemented)
    })
}
