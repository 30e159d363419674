//! Incremental column inference over semi-structured rows.
//!
//! The tree is an arena: nodes are addressed by [`NodeId`] and by field path, children are
//! never removed, and counts only grow. Inference is split in three explicit steps so each is
//! testable on its own:
//!
//! 1. [`BatchSummary::from_rows`] counts shapes in a batch,
//! 2. [`ColumnTree::merge`] adds those counts to the long-lived tree,
//! 3. [`ColumnTree::reorder_siblings`] recomputes occurrence and sibling order.

use core::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::Row;

pub type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisplayState {
    #[default]
    Expanded,
    Collapsed,
}

impl DisplayState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Expanded => Self::Collapsed,
            Self::Collapsed => Self::Expanded,
        }
    }
}

/// Structural summary of one field path.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnInfo {
    pub name: String,
    /// Times a non-object value (including null and arrays) was seen here.
    pub primitive_count: u64,
    /// Times an object was seen here.
    pub object_count: u64,
    pub display: DisplayState,
    pub width: Option<u32>,
    occurrence: f64,
    children: BTreeMap<String, NodeId>,
    order: Vec<NodeId>,
}

impl ColumnInfo {
    fn new(name: String) -> Self {
        Self {
            name,
            primitive_count: 0,
            object_count: 0,
            display: DisplayState::Expanded,
            width: None,
            occurrence: 0.0,
            children: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Averaged occurrence as of the last [`ColumnTree::reorder_siblings`].
    pub fn occurrence(&self) -> f64 {
        self.occurrence
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    /// Children in display order.
    pub fn ordered_children(&self) -> &[NodeId] {
        &self.order
    }
}

/// Shape counts for one batch of rows, before merging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub primitive_count: u64,
    pub object_count: u64,
    pub children: BTreeMap<String, BatchSummary>,
}

impl BatchSummary {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a Row>) -> Self {
        let mut summary = Self::default();
        for row in rows {
            summary.observe(row);
        }
        summary
    }

    pub fn observe(&mut self, value: &Value) {
        match value {
            Value::Object(map) => {
                self.object_count += 1;
                for (k, v) in map {
                    self.children.entry(k.clone()).or_default().observe(v);
                }
            }
            _ => self.primitive_count += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primitive_count == 0 && self.object_count == 0
    }
}

/// A flattened display column.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Column {
    pub path: Vec<String>,
    pub node: NodeId,
}

impl Column {
    pub fn label(&self) -> String {
        self.path.join(".")
    }
}

/// The long-lived column tree owned by a viewer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnTree {
    nodes: Vec<ColumnInfo>,
}

impl Default for ColumnTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![ColumnInfo::new(String::new())],
        }
    }

    pub fn root(&self) -> &ColumnInfo {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> Option<&ColumnInfo> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeId> {
        let mut cur = ROOT;
        for field in path {
            cur = self.nodes[cur].child(field.as_ref())?;
        }
        Some(cur)
    }

    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&ColumnInfo> {
        self.find(path).map(|id| &self.nodes[id])
    }

    /// Adds `summary`'s counts into the tree, creating nodes on first sight.
    ///
    /// Merging the same rows twice counts them twice; callers merge each row once.
    pub fn merge(&mut self, summary: &BatchSummary) {
        self.merge_into(ROOT, summary);
    }

    fn merge_into(&mut self, id: NodeId, summary: &BatchSummary) {
        let node = &mut self.nodes[id];
        node.primitive_count += summary.primitive_count;
        node.object_count += summary.object_count;
        for (name, child_summary) in &summary.children {
            let child = match self.nodes[id].child(name) {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(ColumnInfo::new(name.clone()));
                    let parent = &mut self.nodes[id];
                    parent.children.insert(name.clone(), child);
                    parent.order.push(child);
                    child
                }
            };
            self.merge_into(child, child_summary);
        }
    }

    /// Recomputes occurrence bottom-up and re-sorts every sibling list.
    ///
    /// Siblings order by descending occurrence; among equal occurrence the primary key (top
    /// level only) comes first, then field names ascending. Widths and display states live on
    /// the nodes and are unaffected.
    pub fn reorder_siblings(&mut self, primary_key: Option<&str>) {
        self.reorder_node(ROOT, primary_key);
    }

    fn reorder_node(&mut self, id: NodeId, primary_key: Option<&str>) -> f64 {
        let mut order = core::mem::take(&mut self.nodes[id].order);
        let mut sum = 0.0;
        for &child in &order {
            sum += self.reorder_node(child, None);
        }

        let node = &self.nodes[id];
        let own = node.primitive_count as f64;
        let parts = order.len() + usize::from(node.primitive_count > 0);
        let occurrence = if parts == 0 {
            node.object_count as f64
        } else {
            (sum + own) / parts as f64
        };

        let nodes = &self.nodes;
        order.sort_by(|&a, &b| {
            let (a, b) = (&nodes[a], &nodes[b]);
            b.occurrence
                .total_cmp(&a.occurrence)
                .then_with(|| match primary_key {
                    Some(pk) if a.name == pk && b.name != pk => Ordering::Less,
                    Some(pk) if b.name == pk && a.name != pk => Ordering::Greater,
                    _ => Ordering::Equal,
                })
                .then_with(|| a.name.cmp(&b.name))
        });

        let node = &mut self.nodes[id];
        node.order = order;
        node.occurrence = occurrence;
        occurrence
    }

    /// Convenience for `merge` followed by `reorder_siblings`.
    pub fn observe<'a>(
        &mut self,
        rows: impl IntoIterator<Item = &'a Row>,
        primary_key: Option<&str>,
    ) {
        let summary = BatchSummary::from_rows(rows);
        if summary.is_empty() {
            return;
        }
        self.merge(&summary);
        self.reorder_siblings(primary_key);
    }

    /// The display columns, in order.
    ///
    /// A node yields a column when it is a leaf, when it is collapsed, or when primitives were
    /// seen at its path alongside nested fields. Children of collapsed nodes are skipped.
    pub fn columns(&self) -> Vec<Column> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        if self.nodes[ROOT].primitive_count > 0 {
            out.push(Column {
                path: Vec::new(),
                node: ROOT,
            });
        }
        self.collect_columns(ROOT, &mut path, &mut out);
        out
    }

    fn collect_columns(&self, id: NodeId, path: &mut Vec<String>, out: &mut Vec<Column>) {
        for &child in &self.nodes[id].order {
            let node = &self.nodes[child];
            path.push(node.name.clone());
            let expand = node.has_children() && node.display == DisplayState::Expanded;
            if !expand || node.primitive_count > 0 {
                out.push(Column {
                    path: path.clone(),
                    node: child,
                });
            }
            if expand {
                self.collect_columns(child, path, out);
            }
            path.pop();
        }
    }

    pub fn set_display<S: AsRef<str>>(&mut self, path: &[S], display: DisplayState) -> bool {
        let Some(id) = self.find(path) else {
            return false;
        };
        let node = &mut self.nodes[id];
        let changed = node.display != display;
        node.display = display;
        changed
    }

    /// Flips the display state at `path`, returning the new state.
    pub fn toggle_display<S: AsRef<str>>(&mut self, path: &[S]) -> Option<DisplayState> {
        let id = self.find(path)?;
        let node = &mut self.nodes[id];
        node.display = node.display.toggled();
        Some(node.display)
    }

    pub fn set_width(&mut self, id: NodeId, width: Option<u32>) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.width = width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(tree: &ColumnTree) -> Vec<String> {
        tree.columns().iter().map(Column::label).collect()
    }

    #[test]
    fn nested_object_becomes_dotted_leaf_columns() {
        let rows = [json!({"a": 1, "b": {"c": 2}}), json!({"a": 3})];
        let mut tree = ColumnTree::new();
        tree.observe(&rows, None);

        assert_eq!(paths(&tree), vec!["a", "b.c"]);
        assert_eq!(tree.get(&["a"]).unwrap().primitive_count, 2);
        assert_eq!(tree.get(&["b", "c"]).unwrap().primitive_count, 1);
        assert_eq!(tree.get(&["b"]).unwrap().object_count, 1);
    }

    #[test]
    fn occurrence_is_an_average_not_a_sum() {
        // `wide` has three fields seen once each; `x` is seen twice.
        let rows = [
            json!({"x": 1, "wide": {"p": 1, "q": 1, "r": 1}}),
            json!({"x": 2}),
        ];
        let mut tree = ColumnTree::new();
        tree.observe(&rows, None);
        assert_eq!(tree.get(&["wide"]).unwrap().occurrence(), 1.0);
        assert_eq!(tree.get(&["x"]).unwrap().occurrence(), 2.0);
        assert_eq!(paths(&tree), vec!["x", "wide.p", "wide.q", "wide.r"]);
    }

    #[test]
    fn primary_key_wins_ties_only() {
        let rows = [json!({"id": 1, "a": 1, "z": 1}), json!({"a": 2})];
        let mut tree = ColumnTree::new();
        tree.observe(&rows, Some("id"));
        assert_eq!(paths(&tree), vec!["a", "id", "z"]);

        let rows = [json!({"id": 1, "a": 1, "z": 1})];
        let mut tree = ColumnTree::new();
        tree.observe(&rows, Some("id"));
        assert_eq!(paths(&tree), vec!["id", "a", "z"]);
    }

    #[test]
    fn merging_twice_doubles_counts_and_keeps_order() {
        let rows = [
            json!({"id": 1, "name": "x", "tags": [1, 2], "meta": {"k": true}}),
            json!({"id": 2, "meta": {"k": false, "j": null}}),
            json!({"id": 3, "name": "y"}),
        ];
        let summary = BatchSummary::from_rows(&rows);

        let mut once = ColumnTree::new();
        once.merge(&summary);
        once.reorder_siblings(Some("id"));

        let mut twice = ColumnTree::new();
        twice.merge(&summary);
        twice.merge(&summary);
        twice.reorder_siblings(Some("id"));

        assert_eq!(once.columns(), twice.columns());
        for col in once.columns() {
            let a = once.get(&col.path).unwrap();
            let b = twice.get(&col.path).unwrap();
            assert_eq!(b.primitive_count, a.primitive_count * 2);
            assert_eq!(b.object_count, a.object_count * 2);
        }
    }

    #[test]
    fn collapsing_hides_children_without_forgetting_them() {
        let rows = [json!({"a": 1, "b": {"c": 2, "d": 3}})];
        let mut tree = ColumnTree::new();
        tree.observe(&rows, None);
        let before = tree.len();

        assert_eq!(tree.toggle_display(&["b"]), Some(DisplayState::Collapsed));
        assert_eq!(paths(&tree), vec!["a", "b"]);
        assert_eq!(tree.len(), before);

        assert!(tree.set_display(&["b"], DisplayState::Expanded));
        assert_eq!(paths(&tree), vec!["a", "b.c", "b.d"]);
    }

    #[test]
    fn mixed_shapes_count_on_the_same_node() {
        let rows = [json!({"v": 1}), json!({"v": {"w": 2}})];
        let mut tree = ColumnTree::new();
        tree.observe(&rows, None);
        let v = tree.get(&["v"]).unwrap();
        assert_eq!((v.primitive_count, v.object_count), (1, 1));
        assert_eq!(paths(&tree), vec!["v", "v.w"]);
    }

    #[test]
    fn fields_are_never_removed_and_widths_survive_reorder() {
        let mut tree = ColumnTree::new();
        tree.observe(&[json!({"a": 1, "b": 1})], None);
        let b = tree.find(&["b"]).unwrap();
        tree.set_width(b, Some(120));

        tree.observe(&[json!({"b": 1}), json!({"b": 2})], None);
        assert_eq!(paths(&tree), vec!["b", "a"]);
        assert_eq!(tree.get(&["b"]).unwrap().width, Some(120));
        assert!(tree.get(&["a"]).is_some());
    }

    #[test]
    fn empty_objects_still_create_a_column() {
        let mut tree = ColumnTree::new();
        tree.observe(&[json!({"e": {}})], None);
        assert_eq!(tree.get(&["e"]).unwrap().occurrence(), 1.0);
        assert_eq!(paths(&tree), vec!["e"]);
    }
}
