use tracing::warn;

use crate::tree::path::{self, PUBLIC_ROOT, ROOT};

/// Kind of tree node. Only the trailing slash of the path decides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    Leaf,
}

/// A node in the materialized tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    /// Ordered by path, which for siblings is the listing order.
    pub children: Vec<TreeNode>,
    /// A listing of this directory has been applied at least once.
    pub loaded: bool,
    pub expanded: bool,
    /// Transient marker while a listing request is in flight.
    pub loading: bool,
    /// Advisory: the subtree has changes not yet reconciled.
    pub has_diff: bool,
    pub depth: usize,
    /// Bumped on every close; listings issued under an older epoch are dropped.
    pub epoch: u64,
}

impl TreeNode {
    /// Create an unloaded, collapsed node for `path`.
    pub fn new(path: &str, depth: usize) -> Self {
        let kind = if path::is_directory(path) {
            NodeKind::Directory
        } else {
            NodeKind::Leaf
        };
        Self {
            name: path::name_of(path),
            path: path.to_string(),
            kind,
            children: Vec::new(),
            loaded: false,
            expanded: false,
            loading: false,
            has_diff: false,
            depth,
            epoch: 0,
        }
    }

    /// An always-present entry point; shown open from the start.
    fn entry_point(path: &str) -> Self {
        let mut node = Self::new(path, 0);
        node.expanded = true;
        node
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Whether any child is a directory. `None` until the listing is known.
    pub fn has_child_dirs(&self) -> Option<bool> {
        if self.loaded {
            Some(self.children.iter().any(|c| c.is_directory()))
        } else {
            None
        }
    }
}

/// What a row in the rendered tree represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Directory,
    Leaf,
    /// Virtual "Loading..." row below a directory with a request in flight.
    Loading,
}

/// A flattened representation of a tree node for rendering.
#[derive(Debug, Clone)]
pub struct FlatItem {
    pub name: String,
    pub path: String,
    pub kind: RowKind,
    pub depth: usize,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
    pub is_hidden: bool,
    pub is_current: bool,
    pub has_diff: bool,
    pub has_child_dirs: Option<bool>,
}

/// In-memory tree: the two entry points and everything loaded below them.
#[derive(Debug, Clone)]
pub struct TreeState {
    pub roots: Vec<TreeNode>,
    /// Path marked current by the last select; may not be materialized yet.
    pub current: Option<String>,
}

impl Default for TreeState {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeState {
    pub fn new() -> Self {
        Self {
            roots: vec![TreeNode::entry_point(ROOT), TreeNode::entry_point(PUBLIC_ROOT)],
            current: None,
        }
    }

    /// Find a node by path.
    pub fn find_node(&self, target: &str) -> Option<&TreeNode> {
        self.roots.iter().find_map(|root| Self::find_in(root, target))
    }

    fn find_in<'a>(node: &'a TreeNode, target: &str) -> Option<&'a TreeNode> {
        if node.path == target {
            return Some(node);
        }
        node.children
            .iter()
            .find(|c| {
                c.path == target
                    || (c.is_directory() && path::is_self_or_descendant(target, &c.path))
            })
            .and_then(|c| Self::find_in(c, target))
    }

    /// Find a mutable reference to a node by path.
    pub fn find_node_mut(&mut self, target: &str) -> Option<&mut TreeNode> {
        // "/public/" lives in its own root, not below "/".
        let root_idx = if path::entry_point_for(target) == PUBLIC_ROOT { 1 } else { 0 };
        Self::find_in_mut(&mut self.roots[root_idx], target)
    }

    fn find_in_mut<'a>(node: &'a mut TreeNode, target: &str) -> Option<&'a mut TreeNode> {
        if node.path == target {
            return Some(node);
        }
        for child in node.children.iter_mut() {
            if child.path == target
                || (child.is_directory() && path::is_self_or_descendant(target, &child.path))
            {
                return Self::find_in_mut(child, target);
            }
        }
        None
    }

    pub fn contains(&self, target: &str) -> bool {
        self.find_node(target).is_some()
    }

    pub fn is_loaded(&self, target: &str) -> bool {
        self.find_node(target).is_some_and(|n| n.loaded)
    }

    pub fn is_expanded(&self, target: &str) -> bool {
        self.find_node(target).is_some_and(|n| n.expanded)
    }

    pub fn epoch_of(&self, target: &str) -> Option<u64> {
        self.find_node(target).map(|n| n.epoch)
    }

    /// Set or clear the loading marker. Returns whether the node exists.
    pub fn set_loading(&mut self, target: &str, loading: bool) -> bool {
        match self.find_node_mut(target) {
            Some(node) => {
                node.loading = loading;
                true
            }
            None => false,
        }
    }

    /// Update the advisory diff flag. Returns whether it changed.
    pub fn set_has_diff(&mut self, target: &str, has_diff: bool) -> bool {
        match self.find_node_mut(target) {
            Some(node) if node.has_diff != has_diff => {
                node.has_diff = has_diff;
                true
            }
            _ => false,
        }
    }

    /// Materialize a listing of `dir` obtained under `epoch`.
    ///
    /// Entries without a node are created in listing order; existing nodes are
    /// left untouched; children missing from the listing are pruned. Returns
    /// the newly created paths, or `None` when the result is stale (node gone
    /// or closed since the request was issued) and was discarded.
    pub fn apply_listing(
        &mut self,
        dir: &str,
        epoch: u64,
        mut entries: Vec<String>,
    ) -> Option<Vec<String>> {
        let node = self.find_node_mut(dir)?;
        if node.epoch != epoch || !node.is_directory() {
            return None;
        }

        entries.sort();
        entries.dedup();
        entries.retain(|item| {
            let name = item.strip_suffix('/').unwrap_or(item);
            let ok = !name.is_empty() && !name.contains('/');
            if !ok {
                warn!(dir, item = item.as_str(), "skipping malformed listing entry");
            }
            ok
        });

        let listed: Vec<String> = entries.iter().map(|item| path::join(dir, item)).collect();
        node.children.retain(|child| listed.contains(&child.path));

        let depth = node.depth + 1;
        let mut created = Vec::new();
        for child_path in listed {
            // The public entry point is a root of its own.
            if path::is_entry_point(&child_path) {
                continue;
            }
            if node.children.iter().any(|c| c.path == child_path) {
                continue;
            }
            node.children.push(TreeNode::new(&child_path, depth));
            created.push(child_path);
        }
        node.children.sort_by(|a, b| a.path.cmp(&b.path));
        node.loaded = true;
        node.loading = false;
        Some(created)
    }

    /// Mark a loaded directory expanded. Returns whether it is now expanded.
    pub fn expand(&mut self, target: &str) -> bool {
        match self.find_node_mut(target) {
            Some(node) if node.loaded && node.is_directory() => {
                node.expanded = true;
                true
            }
            _ => false,
        }
    }

    /// Collapse a directory and discard its materialized children.
    ///
    /// Re-opening it triggers a fresh load. Returns whether the node exists.
    pub fn collapse(&mut self, target: &str) -> bool {
        match self.find_node_mut(target) {
            Some(node) => {
                node.expanded = false;
                node.loading = false;
                node.children.clear();
                node.loaded = false;
                node.epoch += 1;
                true
            }
            None => false,
        }
    }

    /// Collect expanded directory paths, ancestors before descendants.
    pub fn expanded_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for root in &self.roots {
            Self::collect_expanded(root, &mut out);
        }
        out.sort_by(|a, b| {
            path::segments(a)
                .len()
                .cmp(&path::segments(b).len())
                .then_with(|| a.cmp(b))
        });
        out
    }

    fn collect_expanded(node: &TreeNode, out: &mut Vec<String>) {
        if node.expanded && node.is_directory() {
            out.push(node.path.clone());
            for child in &node.children {
                Self::collect_expanded(child, out);
            }
        }
    }

    /// Build the rows to render, respecting `show_hidden`.
    ///
    /// Entry points are always included; children only below expanded nodes.
    pub fn flatten(&self, show_hidden: bool) -> Vec<FlatItem> {
        let mut items = Vec::new();
        let last = self.roots.len().saturating_sub(1);
        for (i, root) in self.roots.iter().enumerate() {
            self.flatten_node(root, &mut items, show_hidden, i == last);
        }
        items
    }

    fn flatten_node(
        &self,
        node: &TreeNode,
        items: &mut Vec<FlatItem>,
        show_hidden: bool,
        is_last: bool,
    ) {
        let is_hidden = node.name.starts_with('.');
        items.push(FlatItem {
            name: node.name.clone(),
            path: node.path.clone(),
            kind: match node.kind {
                NodeKind::Directory => RowKind::Directory,
                NodeKind::Leaf => RowKind::Leaf,
            },
            depth: node.depth,
            is_expanded: node.expanded,
            is_last_sibling: is_last,
            is_hidden,
            is_current: self.current.as_deref() == Some(node.path.as_str()),
            has_diff: node.has_diff,
            has_child_dirs: node.has_child_dirs(),
        });

        let visible: Vec<&TreeNode> = if node.expanded {
            node.children
                .iter()
                .filter(|c| show_hidden || !c.name.starts_with('.'))
                .collect()
        } else {
            Vec::new()
        };

        if node.loading {
            items.push(FlatItem {
                name: "Loading...".to_string(),
                path: node.path.clone(),
                kind: RowKind::Loading,
                depth: node.depth + 1,
                is_expanded: false,
                is_last_sibling: visible.is_empty(),
                is_hidden: false,
                is_current: false,
                has_diff: false,
                has_child_dirs: None,
            });
        }

        for (i, child) in visible.iter().enumerate() {
            self.flatten_node(child, items, show_hidden, i == visible.len() - 1);
        }
    }
}
