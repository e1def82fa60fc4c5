//! In-memory transactional data store.
//!
//! Each store holds one JSON tree guarded by a version counter. Readers
//! take an `Arc` snapshot of the tree; writers stage modifications against a
//! private working copy and go through the three-phase commit of
//! [`InMemoryCohort`](super::InMemoryCohort). Conflicts are detected
//! optimistically against a bounded log of recent commits; a transaction
//! based on a version older than the log is treated as conflicting.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};
use tokio::sync::broadcast;

use super::cohort::InMemoryCohort;
use super::schema_service::SchemaService;
use super::{DataPath, StoreKind, tree};
use crate::error::StoreError;

/// Capacity of a store's change broadcast channel.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Number of recent commits kept for conflict detection.
pub const DEFAULT_COMMIT_LOG_CAPACITY: usize = 1024;

/// One staged modification.
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    /// Replace the node at `path`.
    Put {
        /// Target path.
        path: DataPath,
        /// New value.
        value: Value,
    },
    /// Deep-merge into the node at `path`.
    Merge {
        /// Target path.
        path: DataPath,
        /// Value to merge.
        value: Value,
    },
    /// Remove the node at `path`.
    Delete {
        /// Target path.
        path: DataPath,
    },
}

impl Modification {
    /// Returns the path this modification touches.
    #[must_use]
    pub const fn path(&self) -> &DataPath {
        match self {
            Self::Put { path, .. } | Self::Merge { path, .. } | Self::Delete { path } => path,
        }
    }

    fn apply(&self, root: &mut Value) -> Result<(), StoreError> {
        match self {
            Self::Put { path, value } => tree::put_at(root, path, value.clone()),
            Self::Merge { path, value } => tree::merge_at(root, path, value.clone()),
            Self::Delete { path } => tree::delete_at(root, path),
        }
    }
}

/// Notification broadcast after every successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChange {
    /// Name of the store that changed.
    pub store: String,
    /// Store kind.
    pub kind: StoreKind,
    /// Store version after the commit.
    pub version: u64,
    /// Paths modified by the commit.
    pub paths: Vec<DataPath>,
}

/// Point-in-time view of a store.
#[derive(Debug, Clone)]
pub struct Snapshot {
    root: Arc<Value>,
    version: u64,
}

impl Snapshot {
    /// Returns the store version this snapshot was taken at.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Reads the node at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotTraversable`] if the path runs through a
    /// leaf value.
    pub fn read(&self, path: &DataPath) -> Result<Option<Value>, StoreError> {
        Ok(tree::read_at(&self.root, path)?.cloned())
    }
}

#[derive(Debug)]
struct StoreState {
    root: Arc<Value>,
    version: u64,
    /// `(version, paths)` of the most recent commits, oldest first.
    commits: VecDeque<(u64, Vec<DataPath>)>,
}

impl StoreState {
    /// Returns the first modified path overlapping a path committed after
    /// `base_version`.
    ///
    /// When the log no longer reaches back to `base_version` the first
    /// modified path is reported as conflicting.
    fn conflict(&self, base_version: u64, modifications: &[Modification]) -> Option<DataPath> {
        if self.version == base_version {
            return None;
        }
        let mut paths = modifications.iter().map(Modification::path);
        let covered = self
            .commits
            .front()
            .is_some_and(|(oldest, _)| *oldest <= base_version.saturating_add(1));
        if !covered {
            return paths.next().cloned();
        }
        paths
            .find(|path| {
                self.commits
                    .iter()
                    .filter(|(version, _)| *version > base_version)
                    .any(|(_, committed)| committed.iter().any(|c| c.overlaps(path)))
            })
            .cloned()
    }

    fn record(&mut self, version: u64, paths: Vec<DataPath>, capacity: usize) {
        self.commits.push_back((version, paths));
        while self.commits.len() > capacity.max(1) {
            self.commits.pop_front();
        }
    }
}

/// Pooled in-memory store for one (mount path, store kind) pair.
#[derive(Debug)]
pub struct InMemoryStore {
    name: String,
    kind: StoreKind,
    schema: Arc<dyn SchemaService>,
    state: RwLock<StoreState>,
    commit_log_capacity: usize,
    changes: broadcast::Sender<DataChange>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StoreKind, schema: Arc<dyn SchemaService>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            kind,
            schema,
            state: RwLock::new(StoreState {
                root: Arc::new(Value::Object(Map::new())),
                version: 0,
                commits: VecDeque::new(),
            }),
            commit_log_capacity: DEFAULT_COMMIT_LOG_CAPACITY,
            changes,
        }
    }

    /// Sets how many recent commits are kept for conflict detection.
    #[must_use]
    pub fn with_commit_log_capacity(mut self, capacity: usize) -> Self {
        self.commit_log_capacity = capacity.max(1);
        self
    }

    /// Returns the store name (`<mount-path>-DOM-CFG` or `-DOM-OPER`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the store kind.
    #[must_use]
    pub const fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Returns the schema service the store validates against.
    #[must_use]
    pub fn schema_service(&self) -> &Arc<dyn SchemaService> {
        &self.schema
    }

    /// Takes a snapshot of the current tree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the state lock is poisoned.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let state = self.read_state()?;
        Ok(Snapshot {
            root: Arc::clone(&state.root),
            version: state.version,
        })
    }

    /// Returns the current version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the state lock is poisoned.
    pub fn version(&self) -> Result<u64, StoreError> {
        Ok(self.read_state()?.version)
    }

    /// Opens a write transaction based on the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the state lock is poisoned.
    pub fn new_write_transaction(self: &Arc<Self>) -> Result<StoreWriteTransaction, StoreError> {
        let snapshot = self.snapshot()?;
        Ok(StoreWriteTransaction {
            store: Arc::clone(self),
            base_version: snapshot.version,
            working: (*snapshot.root).clone(),
            modifications: Vec::new(),
        })
    }

    /// Subscribes to committed changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DataChange> {
        self.changes.subscribe()
    }

    /// Rewrites a qualified top-level segment (`module:node` or
    /// `prefix:node`) to the bare node name the tree is keyed by.
    ///
    /// Unknown qualifiers are left untouched so validation can reject them.
    #[must_use]
    pub fn canonical_path(&self, path: DataPath) -> DataPath {
        let schema = self.schema.current_schema();
        let bare = path
            .top_level()
            .and_then(|top| schema.canonical_data_node(top).filter(|bare| *bare != top))
            .map(str::to_string);
        match bare {
            Some(bare) => path.with_top_level(bare),
            None => path,
        }
    }

    fn canonical_modification(&self, modification: Modification) -> Modification {
        match modification {
            Modification::Put { path, value } if path.is_empty() => Modification::Put {
                path,
                value: self.canonical_root(value),
            },
            Modification::Merge { path, value } if path.is_empty() => Modification::Merge {
                path,
                value: self.canonical_root(value),
            },
            Modification::Put { path, value } => Modification::Put {
                path: self.canonical_path(path),
                value,
            },
            Modification::Merge { path, value } => Modification::Merge {
                path: self.canonical_path(path),
                value,
            },
            Modification::Delete { path } => Modification::Delete {
                path: self.canonical_path(path),
            },
        }
    }

    fn canonical_root(&self, value: Value) -> Value {
        let Value::Object(children) = value else {
            return value;
        };
        let schema = self.schema.current_schema();
        Value::Object(
            children
                .into_iter()
                .map(|(key, child)| {
                    let name = schema.canonical_data_node(&key).map(str::to_string).unwrap_or(key);
                    (name, child)
                })
                .collect(),
        )
    }

    /// Checks every modification against the schema in force.
    pub(crate) fn validate(&self, modifications: &[Modification]) -> Result<(), StoreError> {
        let schema = self.schema.current_schema();
        for modification in modifications {
            let path = modification.path();
            match (path.top_level(), modification) {
                (Some(top), _) => {
                    if !schema.has_data_node(top) {
                        return Err(StoreError::Validation {
                            path: path.to_string(),
                            reason: format!("{top} is not a top-level data node of the mount point schema"),
                        });
                    }
                }
                (None, Modification::Delete { .. }) => {}
                (None, Modification::Put { value, .. } | Modification::Merge { value, .. }) => {
                    let Value::Object(children) = value else {
                        return Err(StoreError::Validation {
                            path: path.to_string(),
                            reason: "root value must be an object".to_string(),
                        });
                    };
                    if let Some(unknown) = children.keys().find(|key| !schema.has_data_node(key)) {
                        return Err(StoreError::Validation {
                            path: path.to_string(),
                            reason: format!("{unknown} is not a top-level data node of the mount point schema"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// CAN_COMMIT vote: `Ok(false)` on an optimistic conflict.
    pub(crate) fn can_commit(&self, base_version: u64, modifications: &[Modification]) -> Result<bool, StoreError> {
        self.validate(modifications)?;
        let state = self.read_state()?;
        if let Some(path) = state.conflict(base_version, modifications) {
            tracing::debug!(store = %self.name, %path, base_version, "can-commit found a conflicting change");
            return Ok(false);
        }
        Ok(true)
    }

    /// PRE_COMMIT: rebases the modifications onto the current tree.
    ///
    /// Returns the candidate tree and the version it was built against.
    pub(crate) fn prepare(
        &self,
        base_version: u64,
        modifications: &[Modification],
    ) -> Result<(Value, u64), StoreError> {
        let state = self.write_state()?;
        if let Some(path) = state.conflict(base_version, modifications) {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        let candidate = apply_all(&state.root, modifications)?;
        self.validate(modifications)?;
        Ok((candidate, state.version))
    }

    /// COMMIT: installs a prepared candidate.
    ///
    /// Commits installed since `prepared_version` that touch none of the
    /// modified paths do not invalidate the candidate; the modifications
    /// are replayed on top of them instead.
    ///
    /// Returns the new store version.
    pub(crate) fn install(
        &self,
        candidate: Value,
        prepared_version: u64,
        modifications: &[Modification],
    ) -> Result<u64, StoreError> {
        let mut state = self.write_state()?;
        let root = if state.version == prepared_version {
            candidate
        } else {
            if let Some(path) = state.conflict(prepared_version, modifications) {
                return Err(StoreError::Conflict {
                    path: path.to_string(),
                });
            }
            tracing::debug!(
                store = %self.name,
                prepared_version,
                current_version = state.version,
                "replaying prepared modifications onto newer commits"
            );
            apply_all(&state.root, modifications)?
        };
        state.version += 1;
        let version = state.version;
        state.root = Arc::new(root);
        let mut paths: Vec<DataPath> = Vec::with_capacity(modifications.len());
        for modification in modifications {
            let path = modification.path();
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        state.record(version, paths.clone(), self.commit_log_capacity);
        drop(state);

        tracing::debug!(store = %self.name, version, paths = paths.len(), "store commit installed");
        let receivers = self
            .changes
            .send(DataChange {
                store: self.name.clone(),
                kind: self.kind,
                version,
                paths,
            })
            .unwrap_or(0);
        tracing::trace!(store = %self.name, receivers, "data change broadcast");
        Ok(version)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Poisoned(self.name.clone()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Poisoned(self.name.clone()))
    }
}

fn apply_all(root: &Value, modifications: &[Modification]) -> Result<Value, StoreError> {
    let mut tree = root.clone();
    for modification in modifications {
        modification.apply(&mut tree)?;
    }
    Ok(tree)
}

/// Staged modifications against one store.
///
/// The working copy reflects every staged modification, so reads through
/// the transaction see its own writes.
#[derive(Debug)]
pub struct StoreWriteTransaction {
    store: Arc<InMemoryStore>,
    base_version: u64,
    working: Value,
    modifications: Vec<Modification>,
}

impl StoreWriteTransaction {
    /// Returns the store this transaction writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    /// Returns the staged modifications, in order.
    #[must_use]
    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    /// Stages a replace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotTraversable`] if the path runs through a
    /// leaf value of the working copy.
    pub fn put(&mut self, path: DataPath, value: Value) -> Result<(), StoreError> {
        self.stage(Modification::Put { path, value })
    }

    /// Stages a deep merge.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotTraversable`] if the path runs through a
    /// leaf value of the working copy.
    pub fn merge(&mut self, path: DataPath, value: Value) -> Result<(), StoreError> {
        self.stage(Modification::Merge { path, value })
    }

    /// Stages a removal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotTraversable`] if the path runs through a
    /// leaf value of the working copy.
    pub fn delete(&mut self, path: DataPath) -> Result<(), StoreError> {
        self.stage(Modification::Delete { path })
    }

    /// Reads from the working copy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotTraversable`] if the path runs through a
    /// leaf value.
    pub fn read(&self, path: &DataPath) -> Result<Option<Value>, StoreError> {
        let path = self.store.canonical_path(path.clone());
        Ok(tree::read_at(&self.working, &path)?.cloned())
    }

    /// Seals the staged modifications into a commit cohort.
    #[must_use]
    pub fn ready(self) -> InMemoryCohort {
        InMemoryCohort::new(self.store, self.base_version, self.modifications)
    }

    fn stage(&mut self, modification: Modification) -> Result<(), StoreError> {
        let modification = self.store.canonical_modification(modification);
        modification.apply(&mut self.working)?;
        self.modifications.push(modification);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::StaticSchemaService;
    use crate::store::test_support::{test_schema, test_store};

    fn commit_put(store: &InMemoryStore, path: &str) -> u64 {
        let mods = [Modification::Put {
            path: DataPath::parse(path),
            value: json!(1),
        }];
        let Ok(base) = store.version() else {
            panic!("version failed");
        };
        let Ok((candidate, version)) = store.prepare(base, &mods) else {
            panic!("prepare failed");
        };
        let Ok(installed) = store.install(candidate, version, &mods) else {
            panic!("install failed");
        };
        installed
    }

    #[test]
    fn working_copy_sees_staged_writes() {
        let store = test_store(StoreKind::Configuration);
        let Ok(mut tx) = store.new_write_transaction() else {
            panic!("open failed");
        };
        let path = DataPath::parse("system");
        assert!(tx.put(path.clone(), json!({"hostname": "r1"})).is_ok());
        assert!(tx.merge(path.clone(), json!({"domain": "lab"})).is_ok());
        let Ok(Some(value)) = tx.read(&path) else {
            panic!("read failed");
        };
        assert_eq!(value, json!({"hostname": "r1", "domain": "lab"}));
        assert_eq!(tx.modifications().len(), 2);

        // nothing visible outside the transaction
        let Ok(snapshot) = store.snapshot() else {
            panic!("snapshot failed");
        };
        assert!(matches!(snapshot.read(&path), Ok(None)));
    }

    #[test]
    fn unknown_top_level_node_fails_validation() {
        let store = test_store(StoreKind::Configuration);
        let mods = [Modification::Put {
            path: DataPath::parse("routing/static"),
            value: json!({}),
        }];
        assert!(matches!(
            store.can_commit(0, &mods),
            Err(StoreError::Validation { .. })
        ));
    }

    #[test]
    fn overlapping_commit_after_base_is_a_conflict() {
        let store = test_store(StoreKind::Configuration);
        let mods = [Modification::Put {
            path: DataPath::parse("interfaces/eth0"),
            value: json!({"mtu": 1500}),
        }];
        let Ok((candidate, version)) = store.prepare(0, &mods) else {
            panic!("prepare failed");
        };
        assert!(matches!(store.install(candidate, version, &mods), Ok(1)));

        // a transaction based on version 0 touching a parent path conflicts
        let parent = [Modification::Delete {
            path: DataPath::parse("interfaces"),
        }];
        assert!(matches!(store.can_commit(0, &parent), Ok(false)));
        // a disjoint path does not
        let disjoint = [Modification::Put {
            path: DataPath::parse("system"),
            value: json!({}),
        }];
        assert!(matches!(store.can_commit(0, &disjoint), Ok(true)));
    }

    #[tokio::test]
    async fn install_broadcasts_change() {
        let store = test_store(StoreKind::Operational);
        let mut changes = store.subscribe();
        let mods = [Modification::Merge {
            path: DataPath::parse("system"),
            value: json!({"uptime": 5}),
        }];
        let Ok((candidate, version)) = store.prepare(0, &mods) else {
            panic!("prepare failed");
        };
        assert!(store.install(candidate, version, &mods).is_ok());

        let Ok(change) = changes.recv().await else {
            panic!("no change received");
        };
        assert_eq!(change.version, 1);
        assert_eq!(change.kind, StoreKind::Operational);
        assert_eq!(change.paths, vec![DataPath::parse("system")]);
    }

    #[test]
    fn disjoint_commit_between_prepare_and_install_is_replayed() {
        let store = test_store(StoreKind::Configuration);
        let first = [Modification::Put {
            path: DataPath::parse("system/hostname"),
            value: json!("r1"),
        }];
        let second = [Modification::Put {
            path: DataPath::parse("interfaces/eth0"),
            value: json!({"mtu": 1500}),
        }];
        let (Ok((first_candidate, first_version)), Ok((second_candidate, second_version))) =
            (store.prepare(0, &first), store.prepare(0, &second))
        else {
            panic!("prepare failed");
        };
        assert!(matches!(store.install(first_candidate, first_version, &first), Ok(1)));
        assert!(matches!(store.install(second_candidate, second_version, &second), Ok(2)));

        let Ok(snapshot) = store.snapshot() else {
            panic!("snapshot failed");
        };
        let Ok(Some(root)) = snapshot.read(&DataPath::root()) else {
            panic!("root missing");
        };
        assert_eq!(
            root,
            json!({"system": {"hostname": "r1"}, "interfaces": {"eth0": {"mtu": 1500}}})
        );
    }

    #[test]
    fn overlapping_commit_between_prepare_and_install_conflicts() {
        let store = test_store(StoreKind::Configuration);
        let mods = [Modification::Merge {
            path: DataPath::parse("system"),
            value: json!({"domain": "lab"}),
        }];
        let Ok((candidate, version)) = store.prepare(0, &mods) else {
            panic!("prepare failed");
        };
        commit_put(&store, "system/hostname");
        assert!(matches!(
            store.install(candidate, version, &mods),
            Err(StoreError::Conflict { .. })
        ));
        assert!(matches!(store.version(), Ok(1)));
    }

    #[test]
    fn qualified_and_bare_spellings_address_one_node() {
        let store = test_store(StoreKind::Configuration);
        let (Ok(mut qualified), Ok(mut bare)) =
            (store.new_write_transaction(), store.new_write_transaction())
        else {
            panic!("open failed");
        };
        assert!(qualified.put(DataPath::parse("ex:system"), json!({"hostname": "a"})).is_ok());
        assert!(bare.put(DataPath::parse("system"), json!({"hostname": "b"})).is_ok());
        assert_eq!(
            qualified.modifications().first().map(Modification::path),
            Some(&DataPath::parse("system"))
        );

        let Ok((candidate, version)) = store.prepare(0, qualified.modifications()) else {
            panic!("prepare failed");
        };
        assert!(store.install(candidate, version, qualified.modifications()).is_ok());
        assert!(matches!(store.can_commit(0, bare.modifications()), Ok(false)));

        let Ok(snapshot) = store.snapshot() else {
            panic!("snapshot failed");
        };
        let Ok(Some(root)) = snapshot.read(&DataPath::root()) else {
            panic!("root missing");
        };
        assert_eq!(root, json!({"system": {"hostname": "a"}}));

        let Ok(reader) = store.new_write_transaction() else {
            panic!("open failed");
        };
        let Ok(Some(hostname)) = reader.read(&DataPath::parse("example:system/hostname")) else {
            panic!("qualified read failed");
        };
        assert_eq!(hostname, json!("a"));
    }

    #[test]
    fn base_older_than_commit_log_conflicts() {
        let store = InMemoryStore::new(
            "small-DOM-CFG",
            StoreKind::Configuration,
            Arc::new(StaticSchemaService::new(test_schema())),
        )
        .with_commit_log_capacity(2);
        assert_eq!(commit_put(&store, "system/a"), 1);
        assert_eq!(commit_put(&store, "system/b"), 2);
        assert_eq!(commit_put(&store, "system/c"), 3);

        let disjoint = [Modification::Put {
            path: DataPath::parse("interfaces"),
            value: json!({}),
        }];
        // versions 2 and 3 are still logged
        assert!(matches!(store.can_commit(1, &disjoint), Ok(true)));
        // version 1 was evicted, so a base of 0 cannot be checked
        assert!(matches!(store.can_commit(0, &disjoint), Ok(false)));
        assert!(matches!(
            store.prepare(0, &disjoint),
            Err(StoreError::Conflict { .. })
        ));
    }
}
