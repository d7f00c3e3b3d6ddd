use log::info;

use crate::story::node::NodeId;
use crate::story::persist::{SnapshotStore, Synchronizer};
use crate::story::tree::DecisionTree;

/// Owns the live decision tree and keeps its snapshot in step with every
/// mutation.
pub struct DecisionTreeStore<S> {
    tree: DecisionTree,
    sync: Synchronizer<S>,
}

impl<S: SnapshotStore> DecisionTreeStore<S> {
    /// Adopt the stored snapshot when there is a readable one, otherwise start
    /// from an empty tree.
    pub fn open(store: S) -> Self {
        let mut sync = Synchronizer::new(store);
        let tree = sync.load().unwrap_or_default();
        Self { tree, sync }
    }

    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    pub fn has_story(&self) -> bool {
        self.tree.has_story()
    }

    pub fn add_narrator_message(&mut self, content: &str, options: &[String]) -> NodeId {
        let id = self.tree.add_narrator_message(content, options);
        info!(
            "Narrator node {id} added with {} options ({} nodes)",
            options.len(),
            self.tree.node_count()
        );
        self.sync.save(&self.tree);
        id
    }

    pub fn select_option(&mut self, content: &str) -> Option<NodeId> {
        let id = self.tree.select_option(content)?;
        info!("Option selected: {id} \"{content}\"");
        self.sync.save(&self.tree);
        Some(id)
    }

    /// Start a new session: drop every node and delete the stored snapshot.
    pub fn reset_decision_tree(&mut self) {
        let previous = std::mem::take(&mut self.tree);
        info!(
            "Decision tree reset: session {} -> {} ({} nodes dropped)",
            previous.session_id,
            self.tree.session_id,
            previous.node_count()
        );
        self.sync.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::persist::{decode, MemorySnapshotStore};

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_nothing_written_before_story_starts() {
        let store = MemorySnapshotStore::default();
        let mut trees = DecisionTreeStore::open(store.clone());
        assert!(trees.select_option("Partir.").is_none());
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_every_mutation_is_written() {
        let store = MemorySnapshotStore::default();
        let mut trees = DecisionTreeStore::open(store.clone());

        trees.add_narrator_message("Il pleut.", &options(&["Abri.", "Pluie."]));
        let saved = decode(&store.snapshot().unwrap()).unwrap();
        assert_eq!(&saved, trees.tree());

        trees.select_option("Abri.");
        let saved = decode(&store.snapshot().unwrap()).unwrap();
        assert_eq!(saved.current_node().unwrap().content, "Abri.");
    }

    #[test]
    fn test_reopen_adopts_snapshot() {
        let store = MemorySnapshotStore::default();
        let mut trees = DecisionTreeStore::open(store.clone());
        trees.add_narrator_message("Il pleut.", &options(&["Abri."]));
        let expected = trees.tree().clone();

        let reopened = DecisionTreeStore::open(store);
        assert_eq!(reopened.tree(), &expected);
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let store = MemorySnapshotStore::with_snapshot("[1, 2, 3]");
        let trees = DecisionTreeStore::open(store.clone());
        assert!(!trees.has_story());
        assert_eq!(trees.tree().node_count(), 0);
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_reset_deletes_snapshot_and_renews_session() {
        let store = MemorySnapshotStore::default();
        let mut trees = DecisionTreeStore::open(store.clone());
        trees.add_narrator_message("Il pleut.", &options(&["Abri."]));
        let before = trees.tree().session_id.clone();

        trees.reset_decision_tree();
        let first = trees.tree().session_id.clone();
        assert!(store.snapshot().is_none());
        assert_eq!(trees.tree().node_count(), 0);
        assert!(trees.tree().root_id.is_none());
        assert!(trees.tree().current_node_id.is_none());
        assert_ne!(first, before);

        trees.reset_decision_tree();
        assert_eq!(trees.tree().node_count(), 0);
        assert_ne!(trees.tree().session_id, first);
    }

    #[test]
    fn test_write_failures_leave_tree_intact() {
        let store = MemorySnapshotStore::failing();
        let mut trees = DecisionTreeStore::open(store.clone());
        trees.add_narrator_message("Il pleut.", &options(&["Abri."]));
        trees.select_option("Abri.");
        assert_eq!(trees.tree().node_count(), 2);
        assert!(trees.tree().validate().is_ok());
        assert!(store.snapshot().is_none());
    }
}
