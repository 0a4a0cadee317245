//! Nested-archive navigation
//!
//! The navigator owns the active backend, the tree built over it, and the
//! breadcrumb stack describing how the user got there. Opening a fresh
//! archive resets the stack to one frame; activating a nested-archive entry
//! extracts it, binds a brand-new backend over the extracted file and
//! pushes a frame. Every failure path leaves the previously active backend,
//! tree and stack exactly as they were.
//!
//! Ascending is an extension over the original forward-only flow: each
//! frame records the physical file it was opened from, and `ascend`
//! re-opens that file from scratch (intermediate expansion state is lost,
//! like re-opening by hand would lose it).

use std::path::{Path, PathBuf};

use crate::backend::ArchiveBackend;
use crate::errors::{AppError, AppResult};
use crate::manifest::{self, ManifestRecord};
use crate::password::{resolve, PasswordPrompt, Resolution, SessionPasswords};
use crate::tree::{materialize, ArchiveTree, NodeId, NodeKind};

/// Creates unbound backend instances; one is bound per open archive
pub type BackendFactory = Box<dyn Fn() -> Box<dyn ArchiveBackend>>;

/// One level of the descent stack
#[derive(Debug, Clone)]
pub struct NavigationFrame {
    /// Display label: "outer.vfsarc" or "outer.vfsarc:entry/path"
    pub label: String,
    /// Physical file this frame's archive was opened from
    pub file: PathBuf,
}

pub struct Navigator {
    factory: BackendFactory,
    manifest_entry: String,
    backend: Option<Box<dyn ArchiveBackend>>,
    tree: ArchiveTree,
    frames: Vec<NavigationFrame>,
    manifest: Option<ManifestRecord>,
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl Navigator {
    pub fn new(factory: BackendFactory, nested_suffix: &str, manifest_entry: &str) -> Self {
        Self {
            factory,
            manifest_entry: manifest_entry.to_string(),
            backend: None,
            tree: ArchiveTree::new(nested_suffix),
            frames: Vec::new(),
            manifest: None,
        }
    }

    pub fn tree(&self) -> &ArchiveTree {
        &self.tree
    }

    #[allow(dead_code)]
    pub fn frames(&self) -> &[NavigationFrame] {
        &self.frames
    }

    pub fn manifest(&self) -> Option<&ManifestRecord> {
        self.manifest.as_ref()
    }

    /// Breadcrumb labels joined for status display
    pub fn breadcrumb(&self) -> String {
        self.frames
            .iter()
            .map(|f| f.label.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }

    fn bind(&self, path: &Path) -> AppResult<Box<dyn ArchiveBackend>> {
        let mut backend = (self.factory)();
        backend.open(path)?;
        Ok(backend)
    }

    /// Resolve a password for `backend` and return the root listing that
    /// succeeded under it. Does not touch navigator state.
    fn resolve_root_listing(
        backend: &mut Box<dyn ArchiveBackend>,
        passwords: &mut SessionPasswords,
        prompt: &mut dyn PasswordPrompt,
    ) -> AppResult<Vec<String>> {
        let key = backend.archive_path().to_path_buf();
        let mut listing = Vec::new();
        let outcome = resolve(passwords, prompt, &key, |pw| {
            backend.set_password(pw);
            match backend.list_entries("") {
                Ok(entries) if !entries.is_empty() => {
                    listing = entries;
                    true
                }
                _ => false,
            }
        });
        match outcome {
            Resolution::Resolved(_) => Ok(listing),
            Resolution::Cancelled => Err(AppError::PasswordCancelled),
            Resolution::Exhausted => Err(AppError::PasswordExhausted(file_label(&key))),
        }
    }

    /// Swap in a freshly bound backend: rebuild the tree from `listing`,
    /// replace the frame stack, reload the manifest.
    fn install(
        &mut self,
        mut backend: Box<dyn ArchiveBackend>,
        listing: Vec<String>,
        frames: Vec<NavigationFrame>,
    ) {
        self.tree.clear();
        let root = self.tree.root();
        materialize(&mut self.tree, root, "", &listing);
        self.tree.mark_populated(root);
        self.manifest = Some(manifest::load_or_create(
            backend.as_mut(),
            &self.manifest_entry,
        ));
        self.backend = Some(backend);
        self.frames = frames;
    }

    /// Open a top-level archive, resetting the breadcrumb stack to one frame
    pub fn open_archive(
        &mut self,
        path: &Path,
        passwords: &mut SessionPasswords,
        prompt: &mut dyn PasswordPrompt,
    ) -> AppResult<()> {
        let mut backend = self.bind(path)?;
        let listing = Self::resolve_root_listing(&mut backend, passwords, prompt)?;
        let frame = NavigationFrame {
            label: file_label(path),
            file: backend.archive_path().to_path_buf(),
        };
        self.install(backend, listing, vec![frame]);
        log::debug!("opened {}", path.display());
        Ok(())
    }

    /// Descend into a nested-archive entry of the currently open archive.
    ///
    /// The entry may be password-protected independently of the archive it
    /// sits in, so extraction runs under the resolver too.
    pub fn descend(
        &mut self,
        entry_path: &str,
        passwords: &mut SessionPasswords,
        prompt: &mut dyn PasswordPrompt,
    ) -> AppResult<()> {
        let node = self
            .tree
            .find_by_path(entry_path)
            .ok_or_else(|| AppError::Operation(format!("no such entry: {entry_path}")))?;
        if self.tree.node(node).map(|n| n.kind) != Some(NodeKind::NestedArchive) {
            return Err(AppError::Operation(format!(
                "not a nested archive: {entry_path}"
            )));
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| AppError::Operation("no archive open".to_string()))?;

        let outer_key = backend.archive_path().to_path_buf();
        let mut extracted: Option<PathBuf> = None;
        let outcome = resolve(passwords, prompt, &outer_key, |pw| {
            backend.set_password(pw);
            match backend.extract_entry(entry_path) {
                Ok(path) => {
                    extracted = Some(path);
                    true
                }
                Err(_) => false,
            }
        });
        let temp = match outcome {
            Resolution::Resolved(_) => extracted.expect("extraction path recorded on success"),
            Resolution::Cancelled => return Err(AppError::PasswordCancelled),
            Resolution::Exhausted => {
                return Err(AppError::PasswordExhausted(entry_path.to_string()))
            }
        };

        let mut inner = self.bind(&temp)?;
        // A genuinely empty inner archive exhausts the resolver the same way
        // a wrong password does; the descent succeeds either way and shows
        // whatever the inner backend reports.
        let listing = match Self::resolve_root_listing(&mut inner, passwords, prompt) {
            Ok(listing) => listing,
            Err(AppError::PasswordExhausted(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut frames = self.frames.clone();
        frames.push(NavigationFrame {
            label: format!("{}:{}", file_label(&outer_key), entry_path),
            file: inner.archive_path().to_path_buf(),
        });
        self.install(inner, listing, frames);
        log::debug!("descended into {entry_path}");
        Ok(())
    }

    /// Return to the previous frame by re-opening its recorded file.
    pub fn ascend(
        &mut self,
        passwords: &mut SessionPasswords,
        prompt: &mut dyn PasswordPrompt,
    ) -> AppResult<()> {
        if self.frames.len() < 2 {
            return Err(AppError::Operation("already at the top".to_string()));
        }
        let mut restored = self.frames.clone();
        restored.pop();
        let target = restored.last().expect("at least one frame left").file.clone();
        self.open_archive(&target, passwords, prompt)?;
        // open_archive reset the stack to one frame; put the full path back.
        self.frames = restored;
        Ok(())
    }

    /// Ensure every node along `path` is populated, returning the last one
    pub fn expand_path(&mut self, path: &str) -> AppResult<NodeId> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| AppError::Operation("no archive open".to_string()))?;
        let mut cur = self.tree.root();
        self.tree.expand(cur, backend.as_mut())?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            cur = self
                .tree
                .child_by_name(cur, segment)
                .ok_or_else(|| AppError::Operation(format!("no such entry: {path}")))?;
            self.tree.expand(cur, backend.as_mut())?;
        }
        Ok(cur)
    }

    /// Extract one entry under the currently bound password
    pub fn read_entry(&mut self, path: &str) -> AppResult<PathBuf> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| AppError::Operation("no archive open".to_string()))?;
        Ok(backend.extract_entry(path)?)
    }

    /// Extract the whole archive into `dest`
    pub fn extract_all(&mut self, dest: &Path) -> AppResult<()> {
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| AppError::Operation("no archive open".to_string()))?;
        Ok(backend.extract_all(dest)?)
    }

    /// Remove a subtree: backend first, model only after it confirmed.
    /// Returns the flat entry paths that were removed.
    pub fn remove(&mut self, path: &str) -> AppResult<Vec<String>> {
        let node = self
            .tree
            .find_by_path(path)
            .ok_or_else(|| AppError::Operation(format!("no such entry: {path}")))?;
        if node == self.tree.root() {
            return Err(AppError::Operation(
                "cannot remove the archive root".to_string(),
            ));
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| AppError::Operation("no archive open".to_string()))?;
        let paths = self.tree.collect_descendant_paths(node);
        backend.remove_entries(&paths)?;
        self.tree.remove_node(node);
        Ok(paths)
    }

    /// Create a folder under `parent_path`.
    ///
    /// The backing format cannot represent an empty directory, so a
    /// placeholder entry is written through the backend and the model node
    /// is only inserted once that write succeeded.
    pub fn make_folder(&mut self, parent_path: &str, name: &str) -> AppResult<String> {
        if name.is_empty() || name.contains('/') {
            return Err(AppError::Operation(format!("invalid folder name: {name}")));
        }
        let parent = self
            .tree
            .find_by_path(parent_path)
            .ok_or_else(|| AppError::Operation(format!("no such entry: {parent_path}")))?;
        if self.tree.node(parent).map(|n| n.kind) == Some(NodeKind::File) {
            return Err(AppError::Operation(format!(
                "not a folder: {parent_path}"
            )));
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| AppError::Operation("no archive open".to_string()))?;

        let folder_path = if parent_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", parent_path.trim_matches('/'), name)
        };

        let staging = tempfile::tempdir().map_err(AppError::Io)?;
        let placeholder = staging.path().join(".placeholder");
        std::fs::write(&placeholder, b"")?;
        backend.add_files(&[placeholder], &folder_path)?;

        self.tree.insert_synthetic_folder(parent, name);
        Ok(folder_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::password::testing::ScriptedPrompt;
    use crate::password::PromptReply;
    use std::fs;

    fn factory() -> BackendFactory {
        Box::new(|| Box::new(MemoryBackend::new()))
    }

    fn navigator() -> Navigator {
        Navigator::new(factory(), ".vfsarc", ".manifest.json")
    }

    /// Stage an outer archive `A.vfsarc` holding `folder/inner.vfsarc`,
    /// where the inner archive is a full snapshot of its own.
    fn stage_nested(dir: &Path, inner_password: &str) -> PathBuf {
        let inner_file = dir.join("inner-staging.vfsarc");
        MemoryBackend::stage(
            &inner_file,
            inner_password,
            &[("inner.txt", b"deep"), ("sub/leaf.txt", b"leaf")],
        )
        .unwrap();
        let inner_bytes = fs::read(&inner_file).unwrap();

        let outer = dir.join("A.vfsarc");
        MemoryBackend::stage(
            &outer,
            "",
            &[
                ("folder/inner.vfsarc", inner_bytes.as_slice()),
                ("readme.txt", b"outer"),
            ],
        )
        .unwrap();
        outer
    }

    #[test]
    fn open_builds_tree_and_single_frame() {
        let dir = tempfile::tempdir().unwrap();
        let outer = stage_nested(dir.path(), "");
        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        let mut prompt = ScriptedPrompt::new(vec![PromptReply::Password(String::new())]);

        nav.open_archive(&outer, &mut passwords, &mut prompt).unwrap();

        assert_eq!(nav.breadcrumb(), "A.vfsarc");
        assert!(nav.tree().find_by_path("folder/inner.vfsarc").is_some());
        assert!(nav.tree().find_by_path("readme.txt").is_some());
        assert_eq!(nav.manifest().unwrap().tags, vec!["new"]);
    }

    #[test]
    fn descend_pushes_frame_and_rebuilds_tree() {
        let dir = tempfile::tempdir().unwrap();
        let outer = stage_nested(dir.path(), "");
        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        // One reply for the outer open, one for the inner root listing.
        let mut prompt = ScriptedPrompt::new(vec![
            PromptReply::Password(String::new()),
            PromptReply::Password(String::new()),
        ]);

        nav.open_archive(&outer, &mut passwords, &mut prompt).unwrap();
        nav.descend("folder/inner.vfsarc", &mut passwords, &mut prompt)
            .unwrap();

        let labels: Vec<_> = nav.frames().iter().map(|f| f.label.clone()).collect();
        assert_eq!(labels, vec!["A.vfsarc", "A.vfsarc:folder/inner.vfsarc"]);
        // Tree now reflects the inner archive's root listing.
        assert!(nav.tree().find_by_path("inner.txt").is_some());
        assert!(nav.tree().find_by_path("readme.txt").is_none());
    }

    #[test]
    fn descend_into_protected_inner_uses_the_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let outer = stage_nested(dir.path(), "deep-secret");
        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        let mut prompt = ScriptedPrompt::new(vec![
            PromptReply::Password(String::new()),
            PromptReply::Password("deep-secret".to_string()),
        ]);

        nav.open_archive(&outer, &mut passwords, &mut prompt).unwrap();
        nav.descend("folder/inner.vfsarc", &mut passwords, &mut prompt)
            .unwrap();

        assert!(nav.tree().find_by_path("inner.txt").is_some());
        // The inner password entered the session pool.
        assert_eq!(prompt.asks, 2);
    }

    #[test]
    fn descend_into_empty_inner_archive_shows_an_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let inner_file = dir.path().join("inner-staging.vfsarc");
        MemoryBackend::stage(&inner_file, "", &[]).unwrap();
        let inner_bytes = fs::read(&inner_file).unwrap();
        let outer = dir.path().join("A.vfsarc");
        MemoryBackend::stage(
            &outer,
            "",
            &[("folder/inner.vfsarc", inner_bytes.as_slice())],
        )
        .unwrap();

        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        // Nothing can make the empty inner archive list non-empty, so the
        // resolver exhausts; the descent must still go through.
        let mut prompt = ScriptedPrompt::new(vec![
            PromptReply::Password(String::new()),
            PromptReply::Password(String::new()),
        ]);

        nav.open_archive(&outer, &mut passwords, &mut prompt).unwrap();
        nav.descend("folder/inner.vfsarc", &mut passwords, &mut prompt)
            .unwrap();

        assert_eq!(
            nav.breadcrumb(),
            "A.vfsarc > A.vfsarc:folder/inner.vfsarc"
        );
        let root = nav.tree().root();
        assert!(nav.tree().node(root).unwrap().children.is_empty());
    }

    #[test]
    fn cancelled_inner_prompt_leaves_navigator_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let outer = stage_nested(dir.path(), "deep-secret");
        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        let mut prompt = ScriptedPrompt::new(vec![
            PromptReply::Password(String::new()),
            PromptReply::Cancelled,
        ]);

        nav.open_archive(&outer, &mut passwords, &mut prompt).unwrap();
        let err = nav
            .descend("folder/inner.vfsarc", &mut passwords, &mut prompt)
            .unwrap_err();

        assert!(matches!(err, AppError::PasswordCancelled));
        assert_eq!(nav.breadcrumb(), "A.vfsarc");
        assert!(nav.tree().find_by_path("readme.txt").is_some());
    }

    #[test]
    fn failed_open_keeps_previous_archive_active() {
        let dir = tempfile::tempdir().unwrap();
        let outer = stage_nested(dir.path(), "");
        let locked = dir.path().join("locked.vfsarc");
        MemoryBackend::stage(&locked, "nope", &[("x.txt", b"x")]).unwrap();

        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        let mut prompt = ScriptedPrompt::new(vec![
            PromptReply::Password(String::new()),
            PromptReply::Cancelled,
        ]);

        nav.open_archive(&outer, &mut passwords, &mut prompt).unwrap();
        let err = nav
            .open_archive(&locked, &mut passwords, &mut prompt)
            .unwrap_err();

        assert!(matches!(err, AppError::PasswordCancelled));
        assert_eq!(nav.breadcrumb(), "A.vfsarc");
        assert!(nav.tree().find_by_path("readme.txt").is_some());
    }

    #[test]
    fn ascend_reopens_the_recorded_outer_file() {
        let dir = tempfile::tempdir().unwrap();
        let outer = stage_nested(dir.path(), "");
        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        let mut prompt = ScriptedPrompt::new(vec![
            PromptReply::Password(String::new()),
            PromptReply::Password(String::new()),
        ]);

        nav.open_archive(&outer, &mut passwords, &mut prompt).unwrap();
        nav.descend("folder/inner.vfsarc", &mut passwords, &mut prompt)
            .unwrap();
        // Ascending re-opens the recorded outer file; its password is cached.
        nav.ascend(&mut passwords, &mut prompt).unwrap();

        assert_eq!(nav.breadcrumb(), "A.vfsarc");
        assert!(nav.tree().find_by_path("readme.txt").is_some());
        assert!(nav.tree().find_by_path("inner.txt").is_none());
    }

    #[test]
    fn remove_updates_backend_then_model() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("rm.vfsarc");
        MemoryBackend::stage(
            &archive,
            "",
            &[("a/b.txt", b"b"), ("a/c/d.txt", b"d"), ("keep.txt", b"k")],
        )
        .unwrap();

        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        let mut prompt = ScriptedPrompt::new(vec![PromptReply::Password(String::new())]);
        nav.open_archive(&archive, &mut passwords, &mut prompt).unwrap();
        nav.expand_path("a/c").unwrap();

        let removed = nav.remove("a").unwrap();
        assert_eq!(removed, vec!["a/b.txt".to_string(), "a/c/d.txt".to_string()]);
        assert!(nav.tree().find_by_path("a").is_none());
        assert!(nav.tree().find_by_path("keep.txt").is_some());
    }

    #[test]
    fn removing_the_root_is_rejected_before_the_backend_runs() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("root.vfsarc");
        MemoryBackend::stage(&archive, "", &[("keep.txt", b"k")]).unwrap();

        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        let mut prompt = ScriptedPrompt::new(vec![PromptReply::Password(String::new())]);
        nav.open_archive(&archive, &mut passwords, &mut prompt).unwrap();

        let err = nav.remove("").unwrap_err();
        assert!(matches!(err, AppError::Operation(_)));
        assert!(nav.tree().find_by_path("keep.txt").is_some());

        // The archive itself was not touched either.
        let mut check = MemoryBackend::new();
        check.open(&archive).unwrap();
        assert!(check
            .list_entries("")
            .unwrap()
            .contains(&"keep.txt".to_string()));
    }

    #[test]
    fn make_folder_writes_placeholder_before_model_insert() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("mk.vfsarc");
        MemoryBackend::stage(&archive, "", &[("top.txt", b"t")]).unwrap();

        let mut nav = navigator();
        let mut passwords = SessionPasswords::new();
        let mut prompt = ScriptedPrompt::new(vec![PromptReply::Password(String::new())]);
        nav.open_archive(&archive, &mut passwords, &mut prompt).unwrap();

        let created = nav.make_folder("", "drafts").unwrap();
        assert_eq!(created, "drafts");
        assert!(nav.tree().find_by_path("drafts").is_some());

        // The placeholder entry really landed in the archive.
        let mut check = MemoryBackend::new();
        check.open(&archive).unwrap();
        assert!(check
            .list_entries("")
            .unwrap()
            .contains(&"drafts/.placeholder".to_string()));
    }
}
