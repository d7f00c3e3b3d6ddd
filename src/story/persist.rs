use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::story::tree::DecisionTree;

/// Key the single decision tree snapshot is stored under.
pub const DECISION_TREE_STORAGE_KEY: &str = "chat_le_fataliste_decision_tree";

/// Bumped whenever the snapshot layout changes. Snapshots carrying any other
/// version are discarded on load.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Durable storage for one serialized tree.
pub trait SnapshotStore {
    fn load(&self) -> Result<Option<String>>;
    fn save(&mut self, snapshot: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    #[serde(flatten)]
    tree: &'a DecisionTree,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(flatten)]
    tree: DecisionTree,
}

pub fn encode(tree: &DecisionTree) -> Result<String> {
    serde_json::to_string(&SnapshotRef {
        version: SNAPSHOT_VERSION,
        tree,
    })
    .context("failed to serialize decision tree")
}

/// Parse a snapshot and check it still describes a well-formed tree.
pub fn decode(raw: &str) -> Result<DecisionTree> {
    let snapshot: Snapshot =
        serde_json::from_str(raw).context("snapshot is not a decision tree")?;
    if snapshot.version != SNAPSHOT_VERSION {
        bail!(
            "snapshot version {} (expected {})",
            snapshot.version,
            SNAPSHOT_VERSION
        );
    }
    snapshot
        .tree
        .validate()
        .context("snapshot breaks tree invariants")?;
    Ok(snapshot.tree)
}

/// Mirrors the live tree into a [`SnapshotStore`]. Storage failures are
/// logged and swallowed; they never reach the in-memory tree.
pub struct Synchronizer<S> {
    store: S,
}

impl<S: SnapshotStore> Synchronizer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The stored tree, if there is a readable one. Unreadable snapshots are
    /// deleted.
    pub fn load(&mut self) -> Option<DecisionTree> {
        let raw = match self.store.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No decision tree snapshot stored");
                return None;
            }
            Err(e) => {
                warn!("Could not read decision tree snapshot: {e:#}");
                return None;
            }
        };

        match decode(&raw) {
            Ok(tree) => {
                info!(
                    "Restored decision tree: session={}, {} nodes",
                    tree.session_id,
                    tree.node_count()
                );
                Some(tree)
            }
            Err(e) => {
                warn!("Discarding unreadable decision tree snapshot: {e:#}");
                self.clear();
                None
            }
        }
    }

    /// Overwrite the stored snapshot. Does nothing until the story has a root.
    pub fn save(&mut self, tree: &DecisionTree) {
        if !tree.has_story() {
            return;
        }
        let result = encode(tree).and_then(|snapshot| self.store.save(&snapshot));
        match result {
            Ok(()) => debug!("Saved decision tree ({} nodes)", tree.node_count()),
            Err(e) => warn!("Failed to save decision tree: {e:#}"),
        }
    }

    pub fn clear(&mut self) {
        match self.store.clear() {
            Ok(()) => debug!("Cleared decision tree snapshot"),
            Err(e) => warn!("Failed to clear decision tree snapshot: {e:#}"),
        }
    }
}

/// Keeps the snapshot as a JSON file named after the storage key.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir
                .as_ref()
                .join(format!("{DECISION_TREE_STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read {}", self.path.display()))
            }
        }
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, snapshot).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to remove {}", self.path.display()))
            }
        }
    }
}

/// In-memory store whose clones share one slot, so a test can keep a handle
/// after moving the store into a tree.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: std::rc::Rc<std::cell::RefCell<Option<String>>>,
    fail_writes: bool,
}

#[cfg(test)]
impl MemorySnapshotStore {
    pub fn with_snapshot(raw: impl Into<String>) -> Self {
        let store = Self::default();
        *store.slot.borrow_mut() = Some(raw.into());
        store
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Option<String> {
        self.slot.borrow().clone()
    }
}

#[cfg(test)]
impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot.borrow().clone())
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        if self.fail_writes {
            bail!("storage is full");
        }
        *self.slot.borrow_mut() = Some(snapshot.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}
