//! Flat entry lists → incremental tree insertions
//!
//! Archive tools report their contents as flat slash-delimited paths. This
//! module turns such a listing into nodes under a given parent, creating
//! missing intermediate folders and classifying each created node.

use super::{ArchiveTree, NodeId, NodeKind};

/// Insert `entries` under `parent`, skipping entries outside `prefix`.
///
/// Each entry is matched against `prefix` as a literal string prefix, the
/// prefix is stripped, and the remainder is walked segment by segment.
/// Existing children are descended into rather than duplicated, so feeding
/// the same listing twice leaves the tree unchanged. Malformed (empty)
/// entries are skipped silently.
pub fn materialize(tree: &mut ArchiveTree, parent: NodeId, prefix: &str, entries: &[String]) {
    for entry in entries {
        if entry.is_empty() || !entry.starts_with(prefix) {
            continue;
        }
        let rel = &entry[prefix.len()..];
        let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();

        let mut cur = parent;
        for (i, segment) in segments.iter().enumerate() {
            if let Some(existing) = tree.child_by_name(cur, segment) {
                cur = existing;
                continue;
            }
            let last = i == segments.len() - 1;
            let kind = classify(tree.nested_suffix(), segment, last, entry.ends_with('/'));
            cur = tree.add_child(cur, segment, kind);
        }
    }
}

/// Classification applied at node creation time.
///
/// Intermediate segments are folders by construction; a final segment is a
/// folder when the original entry carries a trailing slash, a nested
/// archive when its name ends with the reserved suffix, a file otherwise.
fn classify(nested_suffix: &str, name: &str, last: bool, trailing_slash: bool) -> NodeKind {
    if !last || trailing_slash {
        NodeKind::Folder
    } else if !nested_suffix.is_empty() && name.to_lowercase().ends_with(nested_suffix) {
        NodeKind::NestedArchive
    } else {
        NodeKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn kind_of(tree: &ArchiveTree, path: &str) -> NodeKind {
        tree.node(tree.find_by_path(path).unwrap()).unwrap().kind
    }

    #[test]
    fn classifies_files_folders_and_nested_archives() {
        let mut tree = ArchiveTree::new(".vfsarc");
        let root = tree.root();
        materialize(
            &mut tree,
            root,
            "",
            &entries(&["pkg.vfsarc", "docs/", "readme.txt"]),
        );
        assert_eq!(kind_of(&tree, "pkg.vfsarc"), NodeKind::NestedArchive);
        assert_eq!(kind_of(&tree, "docs"), NodeKind::Folder);
        assert_eq!(kind_of(&tree, "readme.txt"), NodeKind::File);
    }

    #[test]
    fn nested_suffix_matches_case_insensitively() {
        let mut tree = ArchiveTree::new(".vfsarc");
        let root = tree.root();
        materialize(&mut tree, root, "", &entries(&["BUNDLE.VfsArc"]));
        assert_eq!(kind_of(&tree, "BUNDLE.VfsArc"), NodeKind::NestedArchive);
    }

    #[test]
    fn intermediate_segments_become_folders() {
        let mut tree = ArchiveTree::new(".vfsarc");
        let root = tree.root();
        materialize(&mut tree, root, "", &entries(&["a/b/c.txt"]));
        assert_eq!(kind_of(&tree, "a"), NodeKind::Folder);
        assert_eq!(kind_of(&tree, "a/b"), NodeKind::Folder);
        assert_eq!(kind_of(&tree, "a/b/c.txt"), NodeKind::File);
        assert_eq!(
            tree.node(tree.find_by_path("a/b/c.txt").unwrap()).unwrap().full_path,
            "a/b/c.txt"
        );
    }

    #[test]
    fn rematerializing_is_idempotent() {
        let list = entries(&["a/b.txt", "a/c/d.txt", "top.vfsarc"]);
        let mut tree = ArchiveTree::new(".vfsarc");
        let root = tree.root();
        materialize(&mut tree, root, "", &list);

        let count = |tree: &ArchiveTree| {
            let mut n = 0;
            let mut stack = vec![tree.root()];
            while let Some(id) = stack.pop() {
                n += 1;
                stack.extend(tree.node(id).unwrap().children.iter().copied());
            }
            n
        };
        let before = count(&tree);
        materialize(&mut tree, root, "", &list);
        assert_eq!(count(&tree), before);

        let a = tree.find_by_path("a").unwrap();
        let names: Vec<_> = tree
            .node(a)
            .unwrap()
            .children
            .iter()
            .map(|&c| tree.node(c).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["b.txt", "c"]);
    }

    #[test]
    fn sibling_names_stay_distinct() {
        let mut tree = ArchiveTree::new(".vfsarc");
        let root = tree.root();
        materialize(
            &mut tree,
            root,
            "",
            &entries(&["dir/", "dir/x.txt", "dir", "dir/x.txt"]),
        );
        let root_children = &tree.node(tree.root()).unwrap().children;
        assert_eq!(root_children.len(), 1);
        let dir = tree.find_by_path("dir").unwrap();
        assert_eq!(tree.node(dir).unwrap().children.len(), 1);
    }

    #[test]
    fn entries_outside_prefix_are_skipped() {
        let mut tree = ArchiveTree::new(".vfsarc");
        let root = tree.root();
        materialize(&mut tree, root, "", &entries(&["keep/", "drop/file.txt"]));
        let keep = tree.find_by_path("keep").unwrap();
        materialize(
            &mut tree,
            keep,
            "keep/",
            &entries(&["keep/in.txt", "drop/out.txt", ""]),
        );
        assert!(tree.find_by_path("keep/in.txt").is_some());
        assert!(tree.find_by_path("keep/drop").is_none());
        assert!(tree.find_by_path("keep/out.txt").is_none());
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let mut tree = ArchiveTree::new(".vfsarc");
        let root = tree.root();
        materialize(
            &mut tree,
            root,
            "",
            &entries(&["zeta.txt", "alpha/", "mid.vfsarc"]),
        );
        let names: Vec<_> = tree
            .node(tree.root())
            .unwrap()
            .children
            .iter()
            .map(|&c| tree.node(c).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["zeta.txt", "alpha", "mid.vfsarc"]);
    }
}
