//! Record storage addressed by slash-separated paths.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::SERVICES_TARGET;
use super::scope::ServiceScope;
use crate::context::{Action, FolderEntry, SerializedPcd};
use crate::registry::{CapabilityError, ServiceBuilder};

pub(crate) struct FileSystem {
    scope: Arc<ServiceScope>,
}

impl FileSystem {
    fn list(&self, path: &str) -> Vec<FolderEntry> {
        self.scope.context().state().pcds.list(path)
    }

    fn get(&self, path: &str) -> Result<SerializedPcd, CapabilityError> {
        let id = record_id(path).ok_or(CapabilityError::MissingId)?;
        let state = self.scope.context().state();
        state
            .pcds
            .get(id)
            .map(|stored| stored.pcd.clone())
            .ok_or_else(|| CapabilityError::NotFound { id: id.to_string() })
    }

    async fn put(&self, path: &str, content: Value) -> Result<(), CapabilityError> {
        debug!(
            target: SERVICES_TARGET,
            path,
            origin = self.scope.origin().unwrap_or("unknown"),
            "storing record"
        );
        self.scope
            .context()
            .dispatch(Action::AddPcds {
                folder: path.to_string(),
                pcds: vec![content],
                upsert: true,
            })
            .await?;
        Ok(())
    }
}

/// Last path segment, when it is not empty.
fn record_id(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|id| !id.is_empty())
}

pub(crate) fn service(scope: &Arc<ServiceScope>) -> ServiceBuilder {
    let fs = Arc::new(FileSystem {
        scope: Arc::clone(scope),
    });
    ServiceBuilder::new()
        .bind(&fs, "list", |fs: Arc<FileSystem>, (path,): (String,)| async move {
            Ok::<_, CapabilityError>(fs.list(&path))
        })
        .bind(&fs, "get", |fs: Arc<FileSystem>, (path,): (String,)| async move {
            fs.get(&path)
        })
        .bind(
            &fs,
            "put",
            |fs: Arc<FileSystem>, (path, content): (String, Value)| async move {
                fs.put(&path, content).await
            },
        )
        .method("delete", |_: Vec<Value>| async {
            Err::<(), _>(CapabilityError::NotImplemented)
        })
}
