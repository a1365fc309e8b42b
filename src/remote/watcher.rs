use std::path::{Component, Path};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::Event;
use crate::tree::path::ROOT;

/// Path components never reported as store changes.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[".git", ".open-trees", ".DS_Store"];

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Changes per debounce window above which a batch collapses to a full refresh.
pub const DEFAULT_FLOOD_THRESHOLD: usize = 100;

/// Watches the directory behind a local store and reports changed store paths.
pub struct StoreWatcher {
    active: Arc<AtomicBool>,
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl StoreWatcher {
    /// Watch `root` recursively, sending [`Event::StoreChanged`] on `event_tx`.
    pub fn new(
        root: &Path,
        debounce: Duration,
        ignore_patterns: Vec<String>,
        flood_threshold: usize,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> notify::Result<Self> {
        let active = Arc::new(AtomicBool::new(true));
        let active_clone = active.clone();
        let root_path = root.to_path_buf();

        let mut debouncer = new_debouncer(
            debounce,
            move |result: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                if !active_clone.load(Ordering::Relaxed) {
                    return;
                }
                match result {
                    Ok(events) => {
                        let paths: Vec<String> = events
                            .iter()
                            .filter(|e| e.kind == DebouncedEventKind::Any)
                            .filter(|e| !should_ignore(&e.path, &ignore_patterns))
                            .filter_map(|e| store_path(&root_path, &e.path, e.path.is_dir()))
                            .collect();
                        if let Some(batch) = collapse_batch(paths, flood_threshold) {
                            debug!(count = batch.len(), "store changed");
                            let _ = event_tx.send(Event::StoreChanged(batch));
                        }
                    }
                    Err(err) => warn!(error = %err, "watcher error"),
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(root, notify::RecursiveMode::Recursive)?;

        Ok(Self {
            active,
            _debouncer: debouncer,
        })
    }

    pub fn pause(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.active.store(true, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

/// A path is ignored if any of its components matches a pattern exactly.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|p| name == p.as_str())
        }
        _ => false,
    })
}

/// Map a filesystem path below `root` to its store path.
///
/// Returns `None` for paths outside `root`. The root itself maps to `/`.
pub fn store_path(root: &Path, fs_path: &Path, is_dir: bool) -> Option<String> {
    let relative = fs_path.strip_prefix(root).ok()?;
    let mut out = String::from(ROOT);
    let mut parts = 0;
    for component in relative.components() {
        let Component::Normal(name) = component else {
            return None;
        };
        if parts > 0 {
            out.push('/');
        }
        out.push_str(&name.to_string_lossy());
        parts += 1;
    }
    if parts > 0 && is_dir {
        out.push('/');
    }
    Some(out)
}

/// Deduplicate a batch; too many changes collapse to the root.
pub fn collapse_batch(mut paths: Vec<String>, flood_threshold: usize) -> Option<Vec<String>> {
    if paths.is_empty() {
        return None;
    }
    if paths.len() > flood_threshold {
        return Some(vec![ROOT.to_string()]);
    }
    paths.sort();
    paths.dedup();
    Some(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn patterns() -> Vec<String> {
        DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ignores_vcs_and_open_set() {
        assert!(should_ignore(Path::new("/data/.git/HEAD"), &patterns()));
        assert!(should_ignore(Path::new("/data/.open-trees"), &patterns()));
        assert!(!should_ignore(Path::new("/data/docs/a.txt"), &patterns()));
    }

    #[test]
    fn partial_name_does_not_match() {
        assert!(!should_ignore(Path::new("/data/.gitignore"), &patterns()));
    }

    #[test]
    fn store_paths_relative_to_root() {
        let root = Path::new("/data");
        assert_eq!(
            store_path(root, Path::new("/data/docs/a.txt"), false).as_deref(),
            Some("/docs/a.txt")
        );
        assert_eq!(
            store_path(root, Path::new("/data/docs"), true).as_deref(),
            Some("/docs/")
        );
        assert_eq!(store_path(root, Path::new("/data"), true).as_deref(), Some("/"));
        assert_eq!(store_path(root, Path::new("/elsewhere/x"), false), None);
    }

    #[test]
    fn flood_collapses_to_root() {
        let paths: Vec<String> = (0..200).map(|i| format!("/f{}", i)).collect();
        assert_eq!(collapse_batch(paths, 100), Some(vec!["/".to_string()]));
    }

    #[test]
    fn small_batches_are_deduplicated() {
        let paths = vec!["/b".to_string(), "/a".to_string(), "/b".to_string()];
        assert_eq!(
            collapse_batch(paths, 100),
            Some(vec!["/a".to_string(), "/b".to_string()])
        );
        assert_eq!(collapse_batch(Vec::new(), 100), None);
    }

    #[tokio::test]
    async fn reports_changes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let root: PathBuf = dir.path().canonicalize().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watcher = StoreWatcher::new(
            &root,
            Duration::from_millis(50),
            patterns(),
            DEFAULT_FLOOD_THRESHOLD,
            tx,
        )
        .unwrap();

        std::fs::write(root.join("note.txt"), "hi").unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            Event::StoreChanged(paths) => assert!(paths.contains(&"/note.txt".to_string())),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
