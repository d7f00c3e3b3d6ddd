use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::story::node::{DecisionNode, NodeId};

/// Shown by the outline when no narrator message exists yet.
pub const EMPTY_OUTLINE: &str = "L'histoire n'a pas encore commencé...";

/// Characters of narrator prose shown in the outline before truncation.
const PREVIEW_CHARS: usize = 60;

/// A structural defect found by [`DecisionTree::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("tree has no root but holds {0} nodes")]
    Detached(usize),
    #[error("expected exactly one parentless node, found {0}")]
    RootCount(usize),
    #[error("root {0} is not the parentless narrator node")]
    BadRoot(NodeId),
    #[error("node {child} references missing parent {parent}")]
    MissingParent { child: NodeId, parent: NodeId },
    #[error("node {child} is listed {count} times under {parent}")]
    ChildCount {
        child: NodeId,
        parent: NodeId,
        count: usize,
    },
    #[error("node {parent} lists child {child} that does not point back")]
    StrayChild { parent: NodeId, child: NodeId },
    #[error("node {0} has the same kind as its parent")]
    Alternation(NodeId),
    #[error("narrator node {0} has more than one selected option")]
    MultipleSelected(NodeId),
    #[error("node {0} is not reachable from the root")]
    Unreachable(NodeId),
}

/// The whole branching story: an id-keyed node map plus the root and the tip
/// of the path the user actually took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTree {
    pub nodes: HashMap<NodeId, DecisionNode>,
    pub root_id: Option<NodeId>,
    pub current_node_id: Option<NodeId>,
    pub session_id: String,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    /// An empty tree with a freshly generated session id.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            root_id: None,
            current_node_id: None,
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&DecisionNode> {
        self.nodes.get(id)
    }

    pub fn current_node(&self) -> Option<&DecisionNode> {
        self.current_node_id.as_ref().and_then(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True once the first narrator message has been recorded.
    pub fn has_story(&self) -> bool {
        self.root_id.is_some()
    }

    /// Record one narrator message and the options it proposes.
    ///
    /// The new node hangs under the current node (the option the user picked,
    /// or nothing for the very first message) and becomes the new tip.
    pub fn add_narrator_message(&mut self, content: &str, options: &[String]) -> NodeId {
        let timestamp = self.next_timestamp();
        let parent_id = self.current_node_id.clone();

        let mut narrator = DecisionNode::narrator(content, parent_id.clone(), timestamp);
        let narrator_id = narrator.id.clone();

        for (offset, option) in (1i64..).zip(options) {
            let node = DecisionNode::option(
                option.as_str(),
                narrator_id.clone(),
                false,
                timestamp + offset,
            );
            narrator.children.push(node.id.clone());
            self.nodes.insert(node.id.clone(), node);
        }
        self.nodes.insert(narrator_id.clone(), narrator);

        if let Some(parent) = parent_id.as_ref().and_then(|id| self.nodes.get_mut(id)) {
            if !parent.children.contains(&narrator_id) {
                parent.children.push(narrator_id.clone());
            }
        }

        if self.root_id.is_none() {
            self.root_id = Some(narrator_id.clone());
        }
        self.current_node_id = Some(narrator_id.clone());
        narrator_id
    }

    /// Mark the option with exactly this content as taken, creating it first
    /// when the user typed something that was never proposed.
    ///
    /// Returns `None` (and changes nothing) before the story has started.
    pub fn select_option(&mut self, content: &str) -> Option<NodeId> {
        let anchor_id = self.choice_anchor()?;
        let existing = self.nodes.get(&anchor_id)?.children.iter().find(|id| {
            self.nodes
                .get(*id)
                .is_some_and(|node| node.is_option && node.content == content)
        });

        let option_id = match existing.cloned() {
            Some(id) => id,
            None => {
                let timestamp = self.next_timestamp();
                let node = DecisionNode::option(content, anchor_id.clone(), true, timestamp);
                let id = node.id.clone();
                self.nodes.insert(id.clone(), node);
                if let Some(anchor) = self.nodes.get_mut(&anchor_id) {
                    anchor.children.push(id.clone());
                }
                id
            }
        };

        // Only one branch per narrator message counts as taken.
        let siblings = self
            .nodes
            .get(&anchor_id)
            .map(|anchor| anchor.children.clone())
            .unwrap_or_default();
        for sibling in siblings {
            if let Some(node) = self.nodes.get_mut(&sibling) {
                if node.is_option {
                    node.is_selected = sibling == option_id;
                }
            }
        }

        self.current_node_id = Some(option_id.clone());
        Some(option_id)
    }

    /// The narrator node whose options a new choice is made among. When the tip
    /// is an option still waiting for its narration, the choice replaces it
    /// among the same siblings.
    fn choice_anchor(&self) -> Option<NodeId> {
        let current = self.current_node()?;
        if current.is_narrator() {
            Some(current.id.clone())
        } else {
            current.parent_id.clone()
        }
    }

    fn next_timestamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let last = self.nodes.values().map(|n| n.timestamp).max();
        match last {
            Some(last) if last >= now => last + 1,
            _ => now,
        }
    }

    /// Children of `id` in creation order.
    pub fn sorted_children(&self, id: &NodeId) -> Vec<&DecisionNode> {
        let mut children: Vec<&DecisionNode> = self
            .nodes
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|child| self.nodes.get(child))
                    .collect()
            })
            .unwrap_or_default();
        children.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        children
    }

    /// Ids from the root down to the current node. Empty before the story
    /// starts or when the current node cannot be traced back to the root.
    pub fn path_to_current(&self) -> Vec<NodeId> {
        let Some(current) = self.current_node_id.clone() else {
            return Vec::new();
        };
        match self.trace_to_root(&current) {
            Some(mut path) => {
                path.reverse();
                path
            }
            None => Vec::new(),
        }
    }

    /// Follow parent links from `id` up to the root, checking that every hop is
    /// also a child edge. Returns the ids visited, `id` first.
    fn trace_to_root(&self, id: &NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![id.clone()];
        let mut node = self.nodes.get(id)?;
        while let Some(parent_id) = &node.parent_id {
            if path.len() > self.nodes.len() {
                return None;
            }
            let parent = self.nodes.get(parent_id)?;
            if !parent.children.contains(&node.id) {
                return None;
            }
            path.push(parent_id.clone());
            node = parent;
        }
        (Some(&node.id) == self.root_id.as_ref()).then_some(path)
    }

    /// Check the structural invariants, reporting the first violation.
    pub fn validate(&self) -> Result<(), TreeError> {
        let Some(root_id) = &self.root_id else {
            if self.nodes.is_empty() && self.current_node_id.is_none() {
                return Ok(());
            }
            return Err(TreeError::Detached(self.nodes.len()));
        };

        let roots: Vec<&DecisionNode> = self
            .nodes
            .values()
            .filter(|n| n.parent_id.is_none())
            .collect();
        if roots.len() != 1 {
            return Err(TreeError::RootCount(roots.len()));
        }
        if &roots[0].id != root_id || roots[0].is_option {
            return Err(TreeError::BadRoot(root_id.clone()));
        }

        for node in self.nodes.values() {
            if let Some(parent_id) = &node.parent_id {
                let parent = self
                    .nodes
                    .get(parent_id)
                    .ok_or_else(|| TreeError::MissingParent {
                        child: node.id.clone(),
                        parent: parent_id.clone(),
                    })?;
                let count = parent.children.iter().filter(|c| **c == node.id).count();
                if count != 1 {
                    return Err(TreeError::ChildCount {
                        child: node.id.clone(),
                        parent: parent_id.clone(),
                        count,
                    });
                }
                if parent.is_option == node.is_option {
                    return Err(TreeError::Alternation(node.id.clone()));
                }
            }

            for child_id in &node.children {
                let points_back = self
                    .nodes
                    .get(child_id)
                    .is_some_and(|child| child.parent_id.as_ref() == Some(&node.id));
                if !points_back {
                    return Err(TreeError::StrayChild {
                        parent: node.id.clone(),
                        child: child_id.clone(),
                    });
                }
            }

            if node.is_narrator() {
                let selected = node
                    .children
                    .iter()
                    .filter_map(|c| self.nodes.get(c))
                    .filter(|c| c.is_selected)
                    .count();
                if selected > 1 {
                    return Err(TreeError::MultipleSelected(node.id.clone()));
                }
            }

            if self.trace_to_root(&node.id).is_none() {
                return Err(TreeError::Unreachable(node.id.clone()));
            }
        }

        match &self.current_node_id {
            Some(current) if !self.nodes.contains_key(current) => {
                Err(TreeError::Unreachable(current.clone()))
            }
            None => Err(TreeError::Unreachable(root_id.clone())),
            _ => Ok(()),
        }
    }

    /// Text rendering of the story tree: narrator messages as previews,
    /// options ticked when taken. Untaken options are not expanded.
    pub fn render_outline(&self) -> String {
        let Some(root_id) = &self.root_id else {
            return EMPTY_OUTLINE.to_string();
        };
        let mut out = String::new();
        self.render_node(root_id, 0, &mut out);
        out
    }

    fn render_node(&self, id: &NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let tip = if self.current_node_id.as_ref() == Some(id) {
            " ◀"
        } else {
            ""
        };

        if node.is_narrator() {
            out.push_str(&format!("{indent}▸ {}{tip}\n", preview(&node.content)));
        } else {
            let mark = if node.is_selected { "[x]" } else { "[ ]" };
            out.push_str(&format!("{indent}{mark} {}{tip}\n", node.content));
        }

        if node.is_narrator() || node.is_selected {
            for child in self.sorted_children(id) {
                self.render_node(&child.id, depth + 1, out);
            }
        }
    }
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn content_of(tree: &DecisionTree, id: &NodeId) -> String {
        tree.get(id).unwrap().content.clone()
    }

    #[test]
    fn test_first_message_becomes_root() {
        let mut tree = DecisionTree::new();
        let id = tree.add_narrator_message("Il était une fois.", &strings(&["A.", "B."]));

        assert_eq!(tree.root_id, Some(id.clone()));
        assert_eq!(tree.current_node_id, Some(id.clone()));
        assert_eq!(tree.node_count(), 3);

        let root = tree.get(&id).unwrap();
        assert!(root.parent_id.is_none());
        assert!(root.is_selected);
        assert!(!root.is_option);

        let options = tree.sorted_children(&id);
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].content, "A.");
        assert_eq!(options[1].content, "B.");
        assert!(options.iter().all(|o| o.is_option && !o.is_selected));
        assert!(options[0].timestamp < options[1].timestamp);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_end_to_end_turn() {
        let mut tree = DecisionTree::new();
        let narrator = tree.add_narrator_message(
            "Il pleut.",
            &strings(&["Chercher un abri.", "Continuer sous la pluie."]),
        );
        tree.select_option("Chercher un abri.");

        let current = tree.current_node().unwrap();
        assert_eq!(current.content, "Chercher un abri.");
        assert!(current.is_selected);
        assert_eq!(current.parent_id, Some(narrator));
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_next_narration_links_under_choice() {
        let mut tree = DecisionTree::new();
        tree.add_narrator_message("Il pleut.", &strings(&["Abri.", "Pluie."]));
        let choice = tree.select_option("Abri.").unwrap();
        let next = tree.add_narrator_message("Une grange.", &strings(&["Entrer."]));

        assert_eq!(tree.get(&choice).unwrap().children, vec![next.clone()]);
        assert_eq!(tree.get(&next).unwrap().parent_id, Some(choice.clone()));
        assert_eq!(tree.path_to_current().len(), 3);
        assert_eq!(tree.path_to_current()[1], choice);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_free_text_creates_selected_option() {
        let mut tree = DecisionTree::new();
        let narrator = tree.add_narrator_message("Le bac attend.", &strings(&["Monter."]));
        let typed = tree.select_option("Nager jusqu'à l'autre rive.").unwrap();

        let node = tree.get(&typed).unwrap();
        assert!(node.is_option && node.is_selected);
        assert_eq!(node.parent_id, Some(narrator.clone()));
        assert_eq!(tree.get(&narrator).unwrap().children.len(), 2);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_reselection_does_not_duplicate() {
        let mut tree = DecisionTree::new();
        tree.add_narrator_message("Carrefour.", &strings(&["Gauche.", "Droite."]));
        let first = tree.select_option("Gauche.").unwrap();
        let count = tree.node_count();
        let second = tree.select_option("Gauche.").unwrap();

        assert_eq!(first, second);
        assert_eq!(tree.node_count(), count);
    }

    #[test]
    fn test_choosing_again_before_narration_switches_sibling() {
        let mut tree = DecisionTree::new();
        let narrator = tree.add_narrator_message("Carrefour.", &strings(&["Gauche.", "Droite."]));
        let left = tree.select_option("Gauche.").unwrap();
        let right = tree.select_option("Droite.").unwrap();

        assert!(!tree.get(&left).unwrap().is_selected);
        assert!(tree.get(&right).unwrap().is_selected);
        assert_eq!(tree.get(&right).unwrap().parent_id, Some(narrator.clone()));
        assert_eq!(tree.current_node_id, Some(right));
        assert_eq!(tree.node_count(), 3);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_select_before_story_is_noop() {
        let mut tree = DecisionTree::new();
        assert_eq!(tree.select_option("Partir."), None);
        assert_eq!(tree.node_count(), 0);
        assert!(tree.current_node_id.is_none());
    }

    #[test]
    fn test_terminal_beat_without_options() {
        let mut tree = DecisionTree::new();
        let id = tree.add_narrator_message("Fin.", &[]);
        assert!(tree.get(&id).unwrap().children.is_empty());
        assert_eq!(tree.node_count(), 1);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_current() {
        let mut tree = DecisionTree::new();
        tree.add_narrator_message("Début.", &[]);
        tree.current_node_id = Some(NodeId("ghost".into()));
        assert_eq!(
            tree.validate(),
            Err(TreeError::Unreachable(NodeId("ghost".into())))
        );
    }

    #[test]
    fn test_validate_rejects_missing_parent() {
        let mut tree = DecisionTree::new();
        let root = tree.add_narrator_message("Début.", &strings(&["A."]));
        let option = tree.get(&root).unwrap().children[0].clone();
        tree.nodes.get_mut(&option).unwrap().parent_id = Some(NodeId("nowhere".into()));
        assert!(matches!(
            tree.validate(),
            Err(TreeError::MissingParent { .. }) | Err(TreeError::StrayChild { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_nodes_without_root() {
        let mut tree = DecisionTree::new();
        tree.add_narrator_message("Début.", &[]);
        tree.root_id = None;
        assert_eq!(tree.validate(), Err(TreeError::Detached(1)));
    }

    #[test]
    fn test_outline_expands_taken_path_only() {
        let mut tree = DecisionTree::new();
        assert_eq!(tree.render_outline(), EMPTY_OUTLINE);

        tree.add_narrator_message("Il pleut.", &strings(&["Abri.", "Pluie."]));
        tree.select_option("Abri.");
        tree.add_narrator_message("Une grange.", &strings(&["Entrer."]));

        let outline = tree.render_outline();
        let lines: Vec<&str> = outline.lines().collect();
        assert_eq!(
            lines,
            vec![
                "▸ Il pleut.",
                "  [x] Abri.",
                "    ▸ Une grange. ◀",
                "      [ ] Entrer.",
                "  [ ] Pluie.",
            ]
        );
    }

    #[test]
    fn test_outline_truncates_long_prose() {
        let mut tree = DecisionTree::new();
        let long = "mot ".repeat(40);
        tree.add_narrator_message(&long, &[]);
        let outline = tree.render_outline();
        assert!(outline.contains("..."));
        assert!(outline.chars().count() < long.chars().count());
    }

    #[test]
    fn test_snapshot_field_names() {
        let mut tree = DecisionTree::new();
        tree.add_narrator_message("Début.", &strings(&["A."]));
        let json = serde_json::to_value(&tree).unwrap();
        assert!(json.get("rootId").is_some());
        assert!(json.get("currentNodeId").is_some());
        assert!(json.get("sessionId").is_some());
        let node = json["nodes"].as_object().unwrap().values().next().unwrap();
        for field in ["id", "content", "parentId", "children", "isOption", "isSelected", "timestamp"] {
            assert!(node.get(field).is_some(), "missing {field}");
        }
    }

    #[derive(Debug, Clone)]
    enum Op {
        Narrate(Vec<String>),
        Pick(usize),
        Type(String),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::vec("[a-c]{1,3}", 0..4).prop_map(Op::Narrate),
            (0usize..4).prop_map(Op::Pick),
            "[a-c]{1,3}".prop_map(Op::Type),
        ]
    }

    /// Contents the user could currently click on.
    fn offered(tree: &DecisionTree) -> Vec<String> {
        let Some(current) = tree.current_node() else {
            return Vec::new();
        };
        let anchor = if current.is_option {
            current.parent_id.clone().unwrap()
        } else {
            current.id.clone()
        };
        tree.get(&anchor)
            .unwrap()
            .children
            .iter()
            .map(|id| content_of(tree, id))
            .collect()
    }

    fn apply(tree: &mut DecisionTree, op: &Op) {
        match op {
            Op::Narrate(options) => {
                tree.add_narrator_message("beat", options);
            }
            Op::Pick(index) => {
                if let Some(content) = offered(tree).get(*index) {
                    tree.select_option(content);
                }
            }
            Op::Type(text) => {
                tree.select_option(text);
            }
        }
    }

    proptest! {
        #[test]
        fn structure_holds_for_any_sequence(ops in prop::collection::vec(op(), 0..40)) {
            let mut tree = DecisionTree::new();
            let mut previous = 0;
            for op in &ops {
                apply(&mut tree, op);

                prop_assert!(tree.node_count() >= previous);
                previous = tree.node_count();

                if tree.has_story() {
                    let roots = tree.nodes.values().filter(|n| n.parent_id.is_none()).count();
                    prop_assert_eq!(roots, 1);
                    let root = tree.get(tree.root_id.as_ref().unwrap()).unwrap();
                    prop_assert!(!root.is_option);
                }

                for node in tree.nodes.values() {
                    if let Some(parent) = &node.parent_id {
                        let listed = tree
                            .get(parent)
                            .map(|p| p.children.iter().filter(|c| **c == node.id).count());
                        prop_assert_eq!(listed, Some(1));
                    }
                }

                if let Some(current) = &tree.current_node_id {
                    let path = tree.path_to_current();
                    prop_assert_eq!(path.last(), Some(current));
                    prop_assert_eq!(path.first(), tree.root_id.as_ref());
                    prop_assert!(tree.current_node().unwrap().is_selected);
                }
            }
        }

        #[test]
        fn turn_shaped_sequences_validate(
            turns in prop::collection::vec(
                (prop::collection::vec("[a-c]{1,3}", 0..4), 0usize..5, "[a-c]{1,3}"),
                1..15,
            )
        ) {
            let mut tree = DecisionTree::new();
            for (options, pick, typed) in &turns {
                tree.add_narrator_message("beat", options);
                match options.get(*pick) {
                    Some(content) => tree.select_option(content),
                    None => tree.select_option(typed),
                };
                prop_assert_eq!(tree.validate(), Ok(()));
            }
        }
    }
}
