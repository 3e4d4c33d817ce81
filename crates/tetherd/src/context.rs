//! Host state and the mutation interface capabilities act through.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Read and mutate access to host state shared by one session's methods.
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    /// Snapshot of the current state.
    fn state(&self) -> Arc<HostState>;

    /// Applies a named, payload-bearing mutation.
    async fn dispatch(&self, action: Action) -> Result<(), ContextError>;
}

/// Mutations understood by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    /// Store records under `folder`, replacing existing ids when `upsert`.
    AddPcds {
        folder: String,
        pcds: Vec<Value>,
        upsert: bool,
    },
}

/// Errors raised while applying an [`Action`].
#[derive(Debug, Error)]
pub enum ContextError {
    /// A record payload was not a serialized PCD.
    #[error("invalid serialized PCD: {source}")]
    InvalidPcd {
        #[source]
        source: serde_json::Error,
    },
    /// The record body carries no `id`.
    #[error("serialized {pcd_type} PCD has no id")]
    MissingPcdId { pcd_type: String },
    /// The id is taken and the action did not request an upsert.
    #[error("PCD with ID {id} already exists")]
    DuplicatePcd { id: String },
    /// The host could not apply the action.
    #[error("execution context unavailable: {0}")]
    Unavailable(String),
}

/// A PCD in its transportable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedPcd {
    /// Package name of the PCD type, e.g. `pod-pcd`.
    #[serde(rename = "type")]
    pub pcd_type: String,
    /// Type-specific JSON document, encoded as a string.
    pub pcd: String,
}

#[derive(Deserialize)]
struct IdField {
    id: String,
}

impl SerializedPcd {
    /// Record id: the `id` field of the document held in `pcd`.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        serde_json::from_str::<IdField>(&self.pcd)
            .ok()
            .map(|field| field.id)
            .filter(|id| !id.is_empty())
    }
}

/// Everything capability methods may read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostState {
    /// Stored records.
    pub pcds: PcdCollection,
}

/// Record stored together with the folder it was filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPcd {
    pub folder: String,
    pub pcd: SerializedPcd,
}

/// Records indexed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcdCollection {
    records: BTreeMap<String, StoredPcd>,
}

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FolderEntry {
    /// Immediate sub-folder.
    Folder { name: String },
    /// Record filed directly in the folder.
    Pcd {
        id: String,
        #[serde(rename = "pcdType")]
        pcd_type: String,
    },
}

impl PcdCollection {
    /// Looks a record up by id, whatever folder it is filed under.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StoredPcd> {
        self.records.get(id)
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Files `pcd` under `folder`.
    ///
    /// A `folder` whose last segment is the record's own id addresses the
    /// record itself, so it is filed in the parent of that path.
    ///
    /// # Errors
    ///
    /// Fails when the record has no id, or when the id exists and `upsert`
    /// is false.
    pub fn insert(
        &mut self,
        folder: &str,
        pcd: SerializedPcd,
        upsert: bool,
    ) -> Result<(), ContextError> {
        let id = pcd.id().ok_or_else(|| ContextError::MissingPcdId {
            pcd_type: pcd.pcd_type.clone(),
        })?;
        if !upsert && self.records.contains_key(&id) {
            return Err(ContextError::DuplicatePcd { id });
        }
        let folder = filing_folder(normalise_folder(folder), &id).to_string();
        self.records.insert(id, StoredPcd { folder, pcd });
        Ok(())
    }

    /// Sub-folders first, then the records filed directly in `folder`.
    #[must_use]
    pub fn list(&self, folder: &str) -> Vec<FolderEntry> {
        let folder = normalise_folder(folder);
        let mut folders = BTreeSet::new();
        let mut records = Vec::new();
        for (id, stored) in &self.records {
            if stored.folder == folder {
                records.push(FolderEntry::Pcd {
                    id: id.clone(),
                    pcd_type: stored.pcd.pcd_type.clone(),
                });
            } else if let Some(child) = child_folder(folder, &stored.folder) {
                folders.insert(child.to_string());
            }
        }
        folders
            .into_iter()
            .map(|name| FolderEntry::Folder { name })
            .chain(records)
            .collect()
    }
}

pub(crate) fn normalise_folder(folder: &str) -> &str {
    folder.trim_matches('/')
}

fn filing_folder<'a>(folder: &'a str, id: &str) -> &'a str {
    match folder.rsplit_once('/') {
        Some((parent, last)) if last == id => parent,
        None if folder == id => "",
        _ => folder,
    }
}

fn child_folder<'a>(parent: &str, candidate: &'a str) -> Option<&'a str> {
    let rest = if parent.is_empty() {
        candidate
    } else {
        candidate.strip_prefix(parent)?.strip_prefix('/')?
    };
    rest.split('/').next().filter(|name| !name.is_empty())
}

/// In-process context holding state behind a lock.
///
/// Actions are applied to a copy and swapped in whole, so a failing action
/// leaves the state untouched.
#[derive(Debug, Default)]
pub struct MemoryContext {
    state: RwLock<Arc<HostState>>,
}

impl MemoryContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context seeded with `state`.
    #[must_use]
    pub fn with_state(state: HostState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
        }
    }

    fn apply(&self, action: Action) -> Result<(), ContextError> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| ContextError::Unavailable("state lock poisoned".to_string()))?;
        let mut next = HostState::clone(&guard);
        match action {
            Action::AddPcds {
                folder,
                pcds,
                upsert,
            } => {
                for raw in pcds {
                    let pcd = serde_json::from_value::<SerializedPcd>(raw)
                        .map_err(|source| ContextError::InvalidPcd { source })?;
                    next.pcds.insert(&folder, pcd, upsert)?;
                }
            }
        }
        *guard = Arc::new(next);
        Ok(())
    }
}

#[async_trait]
impl ExecutionContext for MemoryContext {
    fn state(&self) -> Arc<HostState> {
        match self.state.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    async fn dispatch(&self, action: Action) -> Result<(), ContextError> {
        self.apply(action)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn pcd(id: &str) -> Value {
        json!({"type": "pod-pcd", "pcd": json!({"id": id, "claim": {}}).to_string()})
    }

    fn add(folder: &str, pcds: Vec<Value>, upsert: bool) -> Action {
        Action::AddPcds {
            folder: folder.to_string(),
            pcds,
            upsert,
        }
    }

    #[test]
    fn action_serializes_with_kebab_case_tag() {
        let value = serde_json::to_value(add("folder", vec![json!("x")], true)).expect("encode");
        assert_eq!(
            value,
            json!({"type": "add-pcds", "folder": "folder", "pcds": ["x"], "upsert": true})
        );
    }

    #[rstest]
    #[case::object_body(r#"{"id":"abc"}"#, Some("abc"))]
    #[case::missing_id(r#"{"name":"abc"}"#, None)]
    #[case::empty_id(r#"{"id":""}"#, None)]
    #[case::not_json("abc", None)]
    fn extracts_record_id(#[case] body: &str, #[case] expected: Option<&str>) {
        let pcd = SerializedPcd {
            pcd_type: "pod-pcd".to_string(),
            pcd: body.to_string(),
        };
        assert_eq!(pcd.id().as_deref(), expected);
    }

    #[tokio::test]
    async fn add_pcds_files_records_under_folder() {
        let context = MemoryContext::new();
        context
            .dispatch(add("/events/devcon/", vec![pcd("a"), pcd("b")], true))
            .await
            .expect("dispatch");

        let state = context.state();
        assert_eq!(state.pcds.len(), 2);
        assert_eq!(
            state.pcds.get("a").map(|stored| stored.folder.as_str()),
            Some("events/devcon")
        );
    }

    #[rstest]
    #[case::record_path("docs/abc", "docs")]
    #[case::nested_record_path("/a/b/abc", "a/b")]
    #[case::bare_id("abc", "")]
    #[case::plain_folder("docs/other", "docs/other")]
    fn record_paths_are_filed_in_their_parent(#[case] folder: &str, #[case] expected: &str) {
        let mut pcds = PcdCollection::default();
        let record = serde_json::from_value(pcd("abc")).expect("serialized pcd");
        pcds.insert(folder, record, true).expect("insert");

        assert_eq!(
            pcds.get("abc").map(|stored| stored.folder.as_str()),
            Some(expected)
        );
    }

    #[tokio::test]
    async fn failing_action_leaves_state_untouched() {
        let context = MemoryContext::new();
        context
            .dispatch(add("f", vec![pcd("a")], true))
            .await
            .expect("seed");

        let error = context
            .dispatch(add("f", vec![pcd("b"), pcd("a")], false))
            .await
            .expect_err("duplicate without upsert");
        assert!(matches!(error, ContextError::DuplicatePcd { ref id } if id == "a"));
        assert!(context.state().pcds.get("b").is_none());
    }

    #[tokio::test]
    async fn rejects_payloads_that_are_not_serialized_pcds() {
        let context = MemoryContext::new();
        let error = context
            .dispatch(add("f", vec![json!("<serialized-pcd>")], true))
            .await
            .expect_err("string payload");
        assert!(matches!(error, ContextError::InvalidPcd { .. }));
    }

    #[tokio::test]
    async fn lists_sub_folders_before_records() {
        let context = MemoryContext::new();
        context
            .dispatch(add("events", vec![pcd("top")], true))
            .await
            .expect("seed events");
        context
            .dispatch(add("events/devcon", vec![pcd("nested")], true))
            .await
            .expect("seed devcon");
        context
            .dispatch(add("events/devcon/day1", vec![pcd("deep")], true))
            .await
            .expect("seed day1");

        let state = context.state();
        assert_eq!(
            state.pcds.list("events"),
            vec![
                FolderEntry::Folder {
                    name: "devcon".to_string()
                },
                FolderEntry::Pcd {
                    id: "top".to_string(),
                    pcd_type: "pod-pcd".to_string()
                },
            ]
        );
        assert_eq!(
            state.pcds.list(""),
            vec![FolderEntry::Folder {
                name: "events".to_string()
            }]
        );
    }

    #[test]
    fn folder_entries_use_camel_case_type_field() {
        let value = serde_json::to_value(FolderEntry::Pcd {
            id: "a".to_string(),
            pcd_type: "pod-pcd".to_string(),
        })
        .expect("encode");
        assert_eq!(value, json!({"type": "pcd", "id": "a", "pcdType": "pod-pcd"}));
    }
}
