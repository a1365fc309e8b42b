//! The tree engine: lazy loading, open/close, restore and refresh.
//!
//! The engine is the only writer of the [`TreeState`]. Callers drive it through
//! its async operations and observe what changed by draining [`TreeEvent`]s.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::task::{Id, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::remote::listing::ListingOracle;
use crate::remote::RemoteStore;
use crate::tree::open_set::OpenSetStore;
use crate::tree::path::{self, PUBLIC_ROOT, ROOT};
use crate::tree::state::TreeState;

/// Notification for the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// A listing request for this directory went out.
    Loading(String),
    /// Node or its children changed; re-render.
    NodeChanged(String),
    /// A listing request failed; the node stays as it was.
    LoadFailed { path: String, message: String },
    /// This path became the current one.
    Selected(String),
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Recursively load every directory discovered by a load.
    pub eager_load: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { eager_load: true }
    }
}

type Fetch = (String, u64, Result<Vec<String>>);

pub struct TreeEngine {
    state: TreeState,
    listing: Arc<dyn ListingOracle>,
    open_set: OpenSetStore,
    options: EngineOptions,
    events: Vec<TreeEvent>,
}

impl TreeEngine {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        listing: Arc<dyn ListingOracle>,
        options: EngineOptions,
    ) -> Self {
        Self {
            state: TreeState::new(),
            listing,
            open_set: OpenSetStore::new(store),
            options,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> &TreeState {
        &self.state
    }

    /// Drain notifications accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Show the transient loading marker for `dir`.
    pub fn set_loading(&mut self, dir: &str) {
        if self.state.set_loading(dir, true) {
            self.events.push(TreeEvent::Loading(dir.to_string()));
        }
    }

    fn clear_loading(&mut self, dir: &str) {
        if self.state.set_loading(dir, false) {
            self.events.push(TreeEvent::NodeChanged(dir.to_string()));
        }
    }

    fn load_failed(&mut self, dir: &str, err: &AppError) {
        warn!(dir, error = %err, "listing failed");
        self.events.push(TreeEvent::LoadFailed {
            path: dir.to_string(),
            message: err.to_string(),
        });
    }

    fn epoch_of(&self, dir: &str) -> Result<u64> {
        self.state
            .epoch_of(dir)
            .ok_or_else(|| AppError::NodeNotFound(dir.to_string()))
    }

    /// Fetch a listing with the marker shown; the marker is cleared either way.
    async fn fetch(&mut self, dir: &str) -> Result<Vec<String>> {
        self.set_loading(dir);
        let result = self.listing.get_listing(dir).await;
        self.clear_loading(dir);
        if let Err(err) = &result {
            self.load_failed(dir, err);
        }
        result
    }

    /// Apply a listing and return the directories it created.
    async fn apply(&mut self, dir: &str, epoch: u64, entries: Vec<String>) -> Vec<String> {
        let Some(created) = self.state.apply_listing(dir, epoch, entries) else {
            debug!(dir, epoch, "discarding stale listing");
            return Vec::new();
        };
        self.listing.reconciled(dir);
        self.events.push(TreeEvent::NodeChanged(dir.to_string()));

        let new_dirs: Vec<String> = created
            .into_iter()
            .filter(|p| path::is_directory(p))
            .collect();
        self.refresh_diff(dir).await;
        for child in &new_dirs {
            self.refresh_diff(child).await;
        }
        new_dirs
    }

    async fn refresh_diff(&mut self, dir: &str) {
        let has_diff = match self.listing.has_diff(dir).await {
            Ok(flag) => flag,
            Err(err) => {
                debug!(dir, error = %err, "diff check failed");
                return;
            }
        };
        if self.state.set_has_diff(dir, has_diff) {
            self.events.push(TreeEvent::NodeChanged(dir.to_string()));
        }
    }

    /// Load the listing of `dir` into the tree.
    ///
    /// On failure the tree is unchanged and the error is returned. With eager
    /// loading, discovered directories are loaded too; their failures are
    /// reported as events but do not fail this call.
    pub async fn load_children(&mut self, dir: &str) -> Result<()> {
        path::validate(dir)?;
        if !path::is_directory(dir) {
            return Ok(());
        }
        let epoch = self.epoch_of(dir)?;
        let entries = self.fetch(dir).await?;
        let new_dirs = self.apply(dir, epoch, entries).await;
        if self.options.eager_load {
            self.load_descendants(new_dirs).await;
        }
        Ok(())
    }

    /// Load several directories concurrently, applying results as they arrive.
    async fn load_descendants(&mut self, dirs: Vec<String>) {
        let mut pending: JoinSet<Fetch> = JoinSet::new();
        let mut in_flight: HashMap<Id, String> = HashMap::new();
        for dir in dirs {
            self.spawn_fetch(&mut pending, &mut in_flight, dir);
        }

        while let Some(joined) = pending.join_next_with_id().await {
            let (dir, epoch, result) = match joined {
                Ok((id, fetch)) => {
                    in_flight.remove(&id);
                    fetch
                }
                Err(err) => {
                    warn!(error = %err, "listing task aborted");
                    if let Some(dir) = in_flight.remove(&err.id()) {
                        self.clear_loading(&dir);
                        self.load_failed(&dir, &AppError::Transport(err.to_string()));
                    }
                    continue;
                }
            };
            self.clear_loading(&dir);
            match result {
                Ok(entries) => {
                    for child in self.apply(&dir, epoch, entries).await {
                        self.spawn_fetch(&mut pending, &mut in_flight, child);
                    }
                }
                Err(err) => self.load_failed(&dir, &err),
            }
        }
    }

    fn spawn_fetch(
        &mut self,
        pending: &mut JoinSet<Fetch>,
        in_flight: &mut HashMap<Id, String>,
        dir: String,
    ) {
        let Some(epoch) = self.state.epoch_of(&dir) else {
            return;
        };
        self.set_loading(&dir);
        let listing = Arc::clone(&self.listing);
        let task_dir = dir.clone();
        let handle = pending.spawn(async move {
            let result = listing.get_listing(&task_dir).await;
            (task_dir, epoch, result)
        });
        in_flight.insert(handle.id(), dir);
    }

    /// Open a directory: persist it as open, expand it and load its children.
    ///
    /// A directory with an empty listing is left alone.
    pub async fn open(&mut self, dir: &str) -> Result<()> {
        path::validate(dir)?;
        if !path::is_directory(dir) {
            return Ok(());
        }
        let epoch = self.epoch_of(dir)?;
        let entries = self.fetch(dir).await?;
        if entries.is_empty() {
            debug!(dir, "nothing to show; not opening");
            return Ok(());
        }

        self.open_set.store_opened(dir, true).await?;
        let new_dirs = self.apply(dir, epoch, entries).await;
        if self.state.expand(dir) {
            info!(dir, "opened");
            self.events.push(TreeEvent::NodeChanged(dir.to_string()));
        }
        if self.options.eager_load {
            self.load_descendants(new_dirs).await;
        }
        Ok(())
    }

    /// Close a directory: forget it and its descendants in the open-set,
    /// collapse it and discard its children.
    ///
    /// Closing the root leaves the public tree open.
    pub async fn close(&mut self, dir: &str) -> Result<()> {
        path::validate(dir)?;
        self.open_set.store_opened(dir, false).await?;
        if self.state.collapse(dir) {
            info!(dir, "closed");
            self.events.push(TreeEvent::NodeChanged(dir.to_string()));
        }
        Ok(())
    }

    /// Expand every directory from the entry point down to `target`.
    ///
    /// Stops quietly at the first ancestor that does not exist (anymore).
    pub async fn open_dir_up_to(&mut self, target: &str) -> Result<()> {
        path::validate(target)?;
        let entry = path::entry_point_for(target);
        if !self.state.is_loaded(entry) {
            self.load_children(entry).await?;
        }
        for dir in path::ancestors(target) {
            if path::is_entry_point(&dir) || self.state.is_expanded(&dir) {
                continue;
            }
            if !self.state.contains(&dir) {
                debug!(path = target, missing = dir.as_str(), "ancestor not in tree");
                return Ok(());
            }
            self.open(&dir).await?;
        }
        Ok(())
    }

    /// Re-expand everything recorded in the open-set.
    ///
    /// Every path is attempted; the first failure is returned at the end.
    pub async fn restore_opened(&mut self) -> Result<()> {
        let open_set = self.open_set.load().await?;
        if open_set.is_empty() {
            debug!("nothing to restore");
            return Ok(());
        }
        info!(count = open_set.len(), "restoring open directories");
        let mut first_err = None;
        for dir in open_set.paths() {
            if let Err(err) = self.open_dir_up_to(dir).await {
                warn!(dir, error = %err, "could not restore");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Make `target` the current path, expanding its parent chain.
    ///
    /// Selection is not persisted.
    pub async fn select(&mut self, target: &str) -> Result<()> {
        path::validate(target)?;
        if let Some(previous) = self.state.current.take() {
            self.events.push(TreeEvent::NodeChanged(previous));
        }
        let parent = path::parent_of(target).unwrap_or(ROOT).to_string();
        let result = if self.state.is_expanded(&parent) && self.state.is_loaded(&parent) {
            Ok(())
        } else {
            self.open_dir_up_to(&parent).await
        };
        self.state.current = Some(target.to_string());
        self.events.push(TreeEvent::Selected(target.to_string()));
        result
    }

    /// Reload both entry points and every expanded directory in place.
    pub async fn refresh(&mut self) -> Result<()> {
        let mut first_err = None;
        for entry in [ROOT, PUBLIC_ROOT] {
            if let Err(err) = self.load_children(entry).await {
                first_err.get_or_insert(err);
            }
        }
        for dir in self.state.expanded_paths() {
            if path::is_entry_point(&dir) || !self.state.is_expanded(&dir) {
                continue;
            }
            if let Err(err) = self.load_children(&dir).await {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// React to paths the store reported as changed.
    ///
    /// Changes are recorded for the diff markers, and every loaded directory
    /// containing one is reloaded. A change reported at the root means "too
    /// much changed" and refreshes everything.
    pub async fn handle_store_change(&mut self, changed: &[String]) -> Result<()> {
        if changed.iter().any(|p| p == ROOT) {
            return self.refresh().await;
        }

        let mut reload = BTreeSet::new();
        let mut touched = BTreeSet::new();
        for p in changed {
            if path::validate(p).is_err() {
                warn!(path = p.as_str(), "ignoring change outside the store");
                continue;
            }
            self.listing.record_change(p);
            let parent = path::parent_of(p).unwrap_or(ROOT).to_string();
            if path::is_directory(p) && self.state.is_loaded(p) {
                reload.insert(p.clone());
            }
            if self.state.is_loaded(&parent) {
                reload.insert(parent.clone());
            }
            touched.insert(ROOT.to_string());
            touched.extend(path::ancestors(&parent));
        }

        let mut first_err = None;
        for dir in reload {
            if let Err(err) = self.load_children(&dir).await {
                first_err.get_or_insert(err);
            }
        }
        for dir in touched {
            self.refresh_diff(&dir).await;
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::listing::{DiffTracker, StoreListing};
    use crate::remote::memory::MemoryStore;
    use crate::remote::Body;
    use crate::tree::open_set::OPEN_SET_PATH;
    use serde_json::json;

    fn file(store: &MemoryStore, path: &str) {
        store.insert(path, Body::text("x", "text/plain"));
    }

    fn engine_with(store: Arc<MemoryStore>, eager_load: bool) -> TreeEngine {
        let listing = Arc::new(StoreListing::new(store.clone(), DiffTracker::new()));
        TreeEngine::new(store, listing, EngineOptions { eager_load })
    }

    fn sample_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        file(&store, "/docs/a.txt");
        file(&store, "/notes.txt");
        store
    }

    fn deep_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        file(&store, "/a/b/c.txt");
        file(&store, "/a/d.txt");
        file(&store, "/public/shared/s.txt");
        store
    }

    fn open_set_doc(store: &MemoryStore) -> Option<serde_json::Value> {
        store.body(OPEN_SET_PATH).and_then(|b| b.as_json().cloned())
    }

    fn child_paths(engine: &TreeEngine, dir: &str) -> Vec<String> {
        engine
            .state()
            .find_node(dir)
            .map(|n| n.children.iter().map(|c| c.path.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn refresh_then_open_end_to_end() {
        let store = sample_store();
        let mut engine = engine_with(store.clone(), true);

        engine.refresh().await.unwrap();
        engine.open("/docs/").await.unwrap();

        let docs = engine.state().find_node("/docs/").unwrap();
        assert!(docs.expanded);
        assert_eq!(docs.children.len(), 1);
        assert_eq!(docs.children[0].name, "a.txt");
        assert!(!docs.children[0].is_directory());
        assert_eq!(open_set_doc(&store), Some(json!({"/docs/": true})));
    }

    #[tokio::test]
    async fn load_children_twice_creates_no_duplicates() {
        let store = sample_store();
        let mut engine = engine_with(store, true);
        engine.load_children("/").await.unwrap();
        let once = child_paths(&engine, "/");
        engine.load_children("/").await.unwrap();
        assert_eq!(child_paths(&engine, "/"), once);
        assert_eq!(once, vec!["/docs/", "/notes.txt"]);
    }

    #[tokio::test]
    async fn eager_load_cascades_into_new_directories() {
        let store = deep_store();
        let mut engine = engine_with(store, true);
        engine.load_children("/").await.unwrap();
        assert!(engine.state().is_loaded("/a/"));
        assert!(engine.state().is_loaded("/a/b/"));
        assert!(engine.state().contains("/a/b/c.txt"));
        assert!(!engine.state().is_expanded("/a/"));
    }

    #[tokio::test]
    async fn lazy_load_defers_children() {
        let store = deep_store();
        let mut engine = engine_with(store, false);
        engine.load_children("/").await.unwrap();
        assert!(engine.state().contains("/a/"));
        assert!(!engine.state().is_loaded("/a/"));
    }

    #[tokio::test]
    async fn failed_load_leaves_tree_unchanged() {
        let store = sample_store();
        store.set_failing("/", true);
        let mut engine = engine_with(store, true);

        let err = engine.load_children("/").await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
        let root = engine.state().find_node("/").unwrap();
        assert!(root.children.is_empty());
        assert!(!root.loading);
        assert!(!root.loaded);
        assert!(engine
            .take_events()
            .iter()
            .any(|e| matches!(e, TreeEvent::LoadFailed { path, .. } if path == "/")));
    }

    #[tokio::test]
    async fn failed_open_stays_collapsed_without_marker() {
        let store = sample_store();
        let mut engine = engine_with(store.clone(), true);
        engine.load_children("/").await.unwrap();
        store.set_failing("/docs/", true);

        assert!(engine.open("/docs/").await.is_err());
        let docs = engine.state().find_node("/docs/").unwrap();
        assert!(!docs.expanded);
        assert!(!docs.loading);
        assert_eq!(open_set_doc(&store), None);
    }

    #[tokio::test]
    async fn open_empty_directory_is_noop() {
        let store = sample_store();
        let mut engine = engine_with(store.clone(), false);
        engine.load_children("/").await.unwrap();
        engine.open("/public/").await.unwrap();
        assert_eq!(open_set_doc(&store), None);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn open_unknown_node_is_an_error() {
        let mut engine = engine_with(sample_store(), true);
        assert!(matches!(
            engine.open("/ghost/").await,
            Err(AppError::NodeNotFound(_))
        ));
        assert!(matches!(
            engine.open("docs/").await,
            Err(AppError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn open_close_restore_round_trip() {
        let store = deep_store();
        let mut engine = engine_with(store.clone(), true);
        engine.refresh().await.unwrap();
        engine.open("/a/").await.unwrap();
        engine.close("/a/").await.unwrap();

        let mut reloaded = engine_with(store, true);
        reloaded.refresh().await.unwrap();
        reloaded.restore_opened().await.unwrap();
        assert!(!reloaded.state().is_expanded("/a/"));
    }

    #[tokio::test]
    async fn restore_reopens_full_ancestor_chain() {
        let store = deep_store();
        let mut engine = engine_with(store.clone(), false);
        engine.refresh().await.unwrap();
        engine.open("/a/").await.unwrap();
        engine.open("/a/b/").await.unwrap();

        // Simulated reload: fresh engine, nothing loaded yet.
        let mut reloaded = engine_with(store, false);
        reloaded.restore_opened().await.unwrap();
        assert!(reloaded.state().is_expanded("/a/"));
        assert!(reloaded.state().is_expanded("/a/b/"));
        assert!(reloaded.state().contains("/a/b/c.txt"));
    }

    #[tokio::test]
    async fn restore_deep_path_opens_ancestors() {
        let store = deep_store();
        store.insert(OPEN_SET_PATH, Body::json(json!({"/a/b/": true})));
        let mut engine = engine_with(store.clone(), false);
        engine.restore_opened().await.unwrap();
        assert!(engine.state().is_expanded("/a/"));
        assert!(engine.state().is_expanded("/a/b/"));
        assert_eq!(
            open_set_doc(&store),
            Some(json!({"/a/": true, "/a/b/": true}))
        );
    }

    #[tokio::test]
    async fn restore_in_public_tree() {
        let store = deep_store();
        store.insert(OPEN_SET_PATH, Body::json(json!({"/public/shared/": true})));
        let mut engine = engine_with(store, false);
        engine.restore_opened().await.unwrap();
        assert!(engine.state().is_expanded("/public/shared/"));
        assert!(engine.state().contains("/public/shared/s.txt"));
    }

    #[tokio::test]
    async fn closing_parent_forgets_descendants() {
        let store = deep_store();
        let mut engine = engine_with(store.clone(), true);
        engine.refresh().await.unwrap();
        engine.open("/a/").await.unwrap();
        engine.open("/a/b/").await.unwrap();
        engine.close("/a/").await.unwrap();
        assert_eq!(open_set_doc(&store), Some(json!({})));

        let mut reloaded = engine_with(store, true);
        reloaded.refresh().await.unwrap();
        reloaded.restore_opened().await.unwrap();
        assert!(!reloaded.state().is_expanded("/a/"));
        assert!(!reloaded.state().is_expanded("/a/b/"));
    }

    #[tokio::test]
    async fn closing_root_keeps_public_folders_open() {
        let store = deep_store();
        let mut engine = engine_with(store.clone(), true);
        engine.refresh().await.unwrap();
        engine.open("/a/").await.unwrap();
        engine.open("/public/shared/").await.unwrap();

        engine.close("/").await.unwrap();
        assert_eq!(open_set_doc(&store), Some(json!({"/public/shared/": true})));
        assert!(engine.state().is_expanded("/public/shared/"));

        let mut reloaded = engine_with(store, true);
        reloaded.refresh().await.unwrap();
        reloaded.restore_opened().await.unwrap();
        assert!(reloaded.state().is_expanded("/public/shared/"));
        assert!(!reloaded.state().is_expanded("/a/"));
    }

    /// Listing source whose task dies while fetching one directory.
    struct CrashingListing {
        inner: StoreListing,
        crash_on: &'static str,
    }

    #[async_trait::async_trait]
    impl ListingOracle for CrashingListing {
        async fn get_listing(&self, path: &str) -> Result<Vec<String>> {
            if path == self.crash_on {
                panic!("listing task crashed");
            }
            self.inner.get_listing(path).await
        }

        async fn has_diff(&self, path: &str) -> Result<bool> {
            self.inner.has_diff(path).await
        }
    }

    #[tokio::test]
    async fn aborted_descendant_load_clears_marker() {
        let store = deep_store();
        let listing = Arc::new(CrashingListing {
            inner: StoreListing::new(store.clone(), DiffTracker::new()),
            crash_on: "/a/b/",
        });
        let mut engine = TreeEngine::new(store, listing, EngineOptions { eager_load: true });

        engine.load_children("/").await.unwrap();

        let node = engine.state().find_node("/a/b/").unwrap();
        assert!(!node.loading);
        assert!(!node.loaded);
        assert!(engine
            .take_events()
            .iter()
            .any(|e| matches!(e, TreeEvent::LoadFailed { path, .. } if path == "/a/b/")));
    }

    #[tokio::test]
    async fn restore_ignores_malformed_keys_and_vanished_paths() {
        let store = deep_store();
        store.insert(
            OPEN_SET_PATH,
            Body::json(json!({"relative/": true, "/gone/deeper/": true, "/a/": true})),
        );
        let mut engine = engine_with(store, false);
        engine.restore_opened().await.unwrap();
        assert!(engine.state().is_expanded("/a/"));
        assert!(!engine.state().contains("/gone/"));
    }

    #[tokio::test]
    async fn close_discards_children_and_reopen_reloads() {
        let store = sample_store();
        let mut engine = engine_with(store.clone(), true);
        engine.refresh().await.unwrap();
        engine.open("/docs/").await.unwrap();
        engine.close("/docs/").await.unwrap();
        assert!(child_paths(&engine, "/docs/").is_empty());

        file(&store, "/docs/b.txt");
        engine.open("/docs/").await.unwrap();
        assert_eq!(
            child_paths(&engine, "/docs/"),
            vec!["/docs/a.txt", "/docs/b.txt"]
        );
    }

    #[tokio::test]
    async fn select_expands_parent_chain_without_persisting() {
        let store = deep_store();
        let mut engine = engine_with(store.clone(), false);
        engine.select("/a/b/c.txt").await.unwrap();
        assert!(engine.state().is_expanded("/a/"));
        assert!(engine.state().is_expanded("/a/b/"));
        assert_eq!(engine.state().current.as_deref(), Some("/a/b/c.txt"));

        engine.select("/a/d.txt").await.unwrap();
        assert_eq!(engine.state().current.as_deref(), Some("/a/d.txt"));
        let rows = engine.state().flatten(false);
        assert_eq!(rows.iter().filter(|r| r.is_current).count(), 1);
        // Only the ancestors opened on the way are in the open-set.
        assert_eq!(
            open_set_doc(&store),
            Some(json!({"/a/": true, "/a/b/": true}))
        );
    }

    #[tokio::test]
    async fn refresh_keeps_expanded_directories_and_reloads_them() {
        let store = sample_store();
        let mut engine = engine_with(store.clone(), false);
        engine.refresh().await.unwrap();
        engine.open("/docs/").await.unwrap();

        file(&store, "/docs/new.txt");
        engine.refresh().await.unwrap();
        assert!(engine.state().is_expanded("/docs/"));
        assert!(engine.state().contains("/docs/new.txt"));
    }

    #[tokio::test]
    async fn store_change_reloads_parent_and_marks_diff() {
        let store = sample_store();
        let diffs = DiffTracker::new();
        let listing = Arc::new(StoreListing::new(store.clone(), diffs.clone()));
        let mut engine = TreeEngine::new(
            store.clone(),
            listing,
            EngineOptions { eager_load: false },
        );
        engine.refresh().await.unwrap();

        // Change below a directory that was never loaded: flagged, not reloaded.
        file(&store, "/docs/late.txt");
        engine
            .handle_store_change(&["/docs/late.txt".to_string()])
            .await
            .unwrap();
        assert!(engine.state().find_node("/docs/").unwrap().has_diff);
        assert!(!engine.state().contains("/docs/late.txt"));

        // Change in a loaded directory: reloaded in place and reconciled.
        file(&store, "/fresh.txt");
        engine
            .handle_store_change(&["/fresh.txt".to_string()])
            .await
            .unwrap();
        assert!(engine.state().contains("/fresh.txt"));
        assert!(!diffs.has_diff("/fresh.txt"));

        engine.open("/docs/").await.unwrap();
        assert!(!engine.state().find_node("/docs/").unwrap().has_diff);
    }

    #[tokio::test]
    async fn root_change_refreshes_everything() {
        let store = sample_store();
        let mut engine = engine_with(store.clone(), false);
        engine.refresh().await.unwrap();
        engine.open("/docs/").await.unwrap();

        file(&store, "/docs/z.txt");
        file(&store, "/top.txt");
        engine
            .handle_store_change(&["/".to_string()])
            .await
            .unwrap();
        assert!(engine.state().contains("/docs/z.txt"));
        assert!(engine.state().contains("/top.txt"));
    }

    #[tokio::test]
    async fn conflicting_open_set_write_keeps_local() {
        let store = sample_store();
        store.insert(OPEN_SET_PATH, Body::json(json!({})));
        let mut engine = engine_with(store.clone(), true);
        engine.refresh().await.unwrap();

        store.simulate_concurrent_write(
            OPEN_SET_PATH,
            Body::json(json!({"/elsewhere/": true})),
        );
        engine.open("/docs/").await.unwrap();
        assert_eq!(open_set_doc(&store), Some(json!({"/docs/": true})));
    }

    #[tokio::test]
    async fn events_report_loading_and_changes() {
        let store = sample_store();
        let mut engine = engine_with(store, false);
        engine.load_children("/").await.unwrap();
        let events = engine.take_events();
        assert_eq!(events.first(), Some(&TreeEvent::Loading("/".to_string())));
        assert!(events.contains(&TreeEvent::NodeChanged("/".to_string())));
        assert!(engine.take_events().is_empty());
    }
}
