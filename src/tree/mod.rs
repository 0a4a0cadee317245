//! Virtual archive tree
//!
//! The tree mirrors the entry namespace of the currently open archive. It is
//! populated lazily: a node's children are fetched from the backend the
//! first time the node is expanded, and retained afterwards so collapsing
//! and re-expanding never re-queries the backend.
//!
//! Nodes live in a flat arena indexed by [`NodeId`]; parent links are plain
//! indices, so ownership runs strictly parent-to-child and there are no
//! reference cycles to manage.

mod path_index;

pub use path_index::materialize;

use crate::backend::{ArchiveBackend, BackendResult};

/// Index of a node in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a tree node represents inside the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A plain file entry
    File,
    /// A directory (explicit trailing-slash entry or implied by a deeper path)
    Folder,
    /// An entry that is itself an archive, openable by descending into it
    NestedArchive,
}

/// One path segment in the virtual tree
#[derive(Debug)]
pub struct ArchiveNode {
    /// Final path segment, no slashes
    pub name: String,
    pub kind: NodeKind,
    /// Slash-joined path from the tree root (root's is empty)
    pub full_path: String,
    /// Back-reference for path reconstruction and removal; never owning
    pub parent: Option<NodeId>,
    /// Child ids in first-seen order
    pub children: Vec<NodeId>,
    /// True once children have been fetched from the backend at least once
    pub populated: bool,
}

/// Arena-backed tree over the open archive's namespace
pub struct ArchiveTree {
    // Removed subtrees leave None slots behind; NodeIds are never reused.
    nodes: Vec<Option<ArchiveNode>>,
    nested_suffix: String,
}

impl ArchiveTree {
    /// Create an empty tree; `nested_suffix` marks nested-archive entries
    /// (matched case-insensitively against the final path segment).
    pub fn new(nested_suffix: &str) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            nested_suffix: nested_suffix.to_lowercase(),
        };
        tree.nodes.push(Some(ArchiveNode {
            name: String::new(),
            kind: NodeKind::Folder,
            full_path: String::new(),
            parent: None,
            children: Vec::new(),
            populated: false,
        }));
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&ArchiveNode> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut ArchiveNode> {
        self.nodes.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    pub(crate) fn nested_suffix(&self) -> &str {
        &self.nested_suffix
    }

    /// Discard everything except a fresh root (used when the active backend
    /// is swapped for another archive).
    pub fn clear(&mut self) {
        let suffix = self.nested_suffix.clone();
        *self = Self::new(&suffix);
    }

    /// Mark a node as populated without fetching (used when the caller has
    /// already materialized a listing it obtained out-of-band).
    pub(crate) fn mark_populated(&mut self, id: NodeId) {
        if let Some(n) = self.node_mut(id) {
            n.populated = true;
        }
    }

    /// Look up a direct child of `parent` by name
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let node = self.node(parent)?;
        node.children
            .iter()
            .copied()
            .find(|&c| self.node(c).is_some_and(|n| n.name == name))
    }

    /// Walk a slash-delimited path down from the root; empty path is the root
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let mut cur = self.root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            cur = self.child_by_name(cur, segment)?;
        }
        Some(cur)
    }

    /// Append a new child; caller must have checked the name is unused.
    pub(crate) fn add_child(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> NodeId {
        let full_path = {
            let p = self.node(parent).expect("parent node exists");
            if p.full_path.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", p.full_path, name)
            }
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(ArchiveNode {
            name: name.to_string(),
            kind,
            full_path,
            parent: Some(parent),
            children: Vec::new(),
            populated: false,
        }));
        self.node_mut(parent)
            .expect("parent node exists")
            .children
            .push(id);
        id
    }

    /// Fetch and attach the children of `id` from the backend, once.
    ///
    /// No-op for plain files and for nodes already populated. Collapsing in
    /// a view is not mirrored here: fetched children are deliberately kept
    /// so a re-expand never re-queries the backend.
    pub fn expand(&mut self, id: NodeId, backend: &mut dyn ArchiveBackend) -> BackendResult<()> {
        let prefix = match self.node(id) {
            Some(n) if n.kind != NodeKind::File && !n.populated => {
                if n.full_path.is_empty() {
                    String::new()
                } else {
                    format!("{}/", n.full_path)
                }
            }
            _ => return Ok(()),
        };
        let entries = backend.list_entries(&prefix)?;
        log::debug!("expand {:?}: {} entries under {:?}", id, entries.len(), prefix);
        materialize(self, id, &prefix, &entries);
        if let Some(n) = self.node_mut(id) {
            n.populated = true;
        }
        Ok(())
    }

    /// Flatten a subtree into the backend's entry addressing: files and
    /// nested archives yield their own path, folders recurse in child order.
    pub fn collect_descendant_paths(&self, id: NodeId) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_into(id, &mut out);
        out
    }

    fn collect_into(&self, id: NodeId, out: &mut Vec<String>) {
        let Some(node) = self.node(id) else { return };
        match node.kind {
            NodeKind::File | NodeKind::NestedArchive => out.push(node.full_path.clone()),
            NodeKind::Folder => {
                for &child in &node.children {
                    self.collect_into(child, out);
                }
            }
        }
    }

    /// Detach `id` from its parent and drop its subtree.
    ///
    /// Must only be called after the backend confirmed the corresponding
    /// entry removal, otherwise model and archive diverge. The root cannot
    /// be removed.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(cur.0).and_then(|slot| slot.take()) {
                stack.extend(node.children);
            }
        }
    }

    /// Create a user-visible folder node directly, without a backend entry
    /// behind it. Returns the existing child when the name is already taken.
    pub fn insert_synthetic_folder(&mut self, parent: NodeId, name: &str) -> NodeId {
        if let Some(existing) = self.child_by_name(parent, name) {
            return existing;
        }
        let id = self.add_child(parent, name, NodeKind::Folder);
        // Nothing to fetch for a folder the archive doesn't know about.
        if let Some(n) = self.node_mut(id) {
            n.populated = true;
        }
        id
    }
}
