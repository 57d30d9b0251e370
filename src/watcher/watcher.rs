// Project watcher: recursive watches fanned out to subscribed listeners

use super::config::WatcherConfig;
use super::error::{Result, WatcherError};
use super::types::{ChangeKind, ChangeListener, FileChangeEvent, SubscriptionId};
use chrono::Utc;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    listeners: BTreeMap<SubscriptionId, ChangeListener>,
    /// Subscription owned by `on_change`
    primary: Option<SubscriptionId>,
}

impl Subscribers {
    fn insert(&mut self, listener: ChangeListener) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.insert(id, listener);
        id
    }
}

/// Watches project directories and delivers change events to every subscriber.
///
/// Events are not debounced; each OS notification yields one event per path.
pub struct ProjectWatcher {
    config: Arc<WatcherConfig>,
    watches: HashMap<PathBuf, RecommendedWatcher>,
    subscribers: Arc<RwLock<Subscribers>>,
}

impl ProjectWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config: Arc::new(config),
            watches: HashMap::new(),
            subscribers: Arc::new(RwLock::new(Subscribers::default())),
        }
    }

    /// Add a listener; events go to all listeners in subscription order
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&FileChangeEvent) + Send + Sync + 'static,
    {
        let id = self.subscribers_mut().insert(Arc::new(listener));
        debug!(subscription = %id, "watcher listener subscribed");
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers_mut();
        if subs.primary == Some(id) {
            subs.primary = None;
        }
        subs.listeners.remove(&id).is_some()
    }

    /// Replace the primary listener. The last registration wins.
    pub fn on_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&FileChangeEvent) + Send + Sync + 'static,
    {
        let mut subs = self.subscribers_mut();
        if let Some(previous) = subs.primary.take() {
            subs.listeners.remove(&previous);
        }
        let id = subs.insert(Arc::new(listener));
        subs.primary = Some(id);
        id
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    /// Start a recursive watch. Watching the exact same path again is a no-op.
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        if self.watches.contains_key(&path) {
            debug!(path = %path.display(), "already watching");
            return Ok(());
        }
        if !path.is_dir() {
            return Err(WatcherError::NotADirectory(path));
        }

        // notify reports paths under the resolved root
        let resolved = path.canonicalize().unwrap_or_else(|_| path.clone());
        let root = path.clone();
        let config = self.config.clone();
        let subscribers = self.subscribers.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate(&event, &root, &resolved, &config) {
                    deliver(&subscribers, &change);
                }
            }
            Err(e) => warn!(path = %root.display(), error = %e, "watch error"),
        })?;

        if let Err(e) = watcher.watch(&path, RecursiveMode::Recursive) {
            warn!(path = %path.display(), error = %e, "failed to watch");
            return Err(e.into());
        }

        info!(path = %path.display(), "watching");
        self.watches.insert(path, watcher);
        Ok(())
    }

    /// Stop watching a path. Returns false if it was not watched.
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.watches.remove(path) {
            Some(watcher) => {
                drop(watcher);
                info!(path = %path.display(), "unwatched");
                true
            }
            None => false,
        }
    }

    pub fn unwatch_all(&mut self) {
        let count = self.watches.len();
        self.watches.clear();
        if count > 0 {
            info!(count = count, "unwatched all paths");
        }
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.watches.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        self.watches.contains_key(path.as_ref())
    }

    fn subscribers_mut(&self) -> std::sync::RwLockWriteGuard<'_, Subscribers> {
        self.subscribers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProjectWatcher {
    fn drop(&mut self) {
        self.unwatch_all();
    }
}

/// Map a notify event kind onto change/rename; access events are dropped
pub(crate) fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(_) | EventKind::Remove(_) => Some(ChangeKind::Rename),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(ChangeKind::Change),
    }
}

/// Turn one notify event into filtered change events, one per path
pub(crate) fn translate(
    event: &Event,
    root: &Path,
    resolved_root: &Path,
    config: &WatcherConfig,
) -> Vec<FileChangeEvent> {
    let Some(kind) = classify(&event.kind) else {
        return Vec::new();
    };

    event
        .paths
        .iter()
        .filter_map(|path| {
            let relative = path
                .strip_prefix(resolved_root)
                .or_else(|_| path.strip_prefix(root))
                .ok()?;
            if relative.as_os_str().is_empty() {
                return None;
            }
            if config.is_noise(&relative.to_string_lossy()) {
                return None;
            }
            Some(FileChangeEvent {
                kind,
                path: root.join(relative),
                timestamp: Utc::now(),
            })
        })
        .collect()
}

fn deliver(subscribers: &RwLock<Subscribers>, event: &FileChangeEvent) {
    // Listeners run outside the lock so they may unsubscribe
    let listeners: Vec<ChangeListener> = subscribers
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .listeners
        .values()
        .cloned()
        .collect();

    for listener in listeners {
        listener(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RenameMode};
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::time::Duration;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Rename)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(ChangeKind::Rename)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ChangeKind::Change)
        );
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn test_noise_is_substring_match() {
        let config = WatcherConfig::default();
        let root = Path::new("/proj");
        let ev = event(
            EventKind::Modify(ModifyKind::Any),
            &[
                "/proj/src/main.rs",
                "/proj/node_modules/x/index.js",
                "/proj/anode_modules/x",
                "/proj/.git/HEAD",
                "/proj/my.git/config",
                "/proj/.gitignore",
            ],
        );

        let paths: Vec<PathBuf> = translate(&ev, root, root, &config)
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("/proj/src/main.rs"), PathBuf::from("/proj/.gitignore")]
        );
    }

    #[test]
    fn test_paths_reported_under_given_root() {
        let config = WatcherConfig::default();
        let ev = event(
            EventKind::Create(CreateKind::File),
            &["/private/tmp/proj/a.txt", "/elsewhere/b.txt"],
        );

        let events = translate(
            &ev,
            Path::new("/tmp/proj"),
            Path::new("/private/tmp/proj"),
            &config,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, PathBuf::from("/tmp/proj/a.txt"));
        assert_eq!(events[0].kind, ChangeKind::Rename);
    }

    #[test]
    fn test_on_change_replaces_primary_only() {
        let watcher = ProjectWatcher::new(WatcherConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        watcher.subscribe(move |_| s.lock().unwrap().push("sub"));
        let s = seen.clone();
        watcher.on_change(move |_| s.lock().unwrap().push("first"));
        let s = seen.clone();
        watcher.on_change(move |_| s.lock().unwrap().push("second"));
        assert_eq!(watcher.subscriber_count(), 2);

        let ev = FileChangeEvent {
            kind: ChangeKind::Change,
            path: PathBuf::from("/x"),
            timestamp: Utc::now(),
        };
        deliver(&watcher.subscribers, &ev);

        assert_eq!(*seen.lock().unwrap(), vec!["sub", "second"]);
    }

    #[test]
    fn test_unsubscribe() {
        let watcher = ProjectWatcher::new(WatcherConfig::default());
        let id = watcher.subscribe(|_| {});
        assert!(watcher.unsubscribe(id));
        assert!(!watcher.unsubscribe(id));
        assert_eq!(watcher.subscriber_count(), 0);
    }

    #[test]
    fn test_watch_rejects_missing_directory() {
        let mut watcher = ProjectWatcher::new(WatcherConfig::default());
        let err = watcher.watch("/definitely/not/here").unwrap_err();
        assert!(matches!(err, WatcherError::NotADirectory(_)));
        assert!(watcher.watched_paths().is_empty());
    }

    #[test]
    fn test_watch_is_idempotent_and_unwatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = ProjectWatcher::new(WatcherConfig::default());

        watcher.watch(dir.path()).unwrap();
        watcher.watch(dir.path()).unwrap();
        assert_eq!(watcher.watched_paths(), vec![dir.path().to_path_buf()]);

        assert!(watcher.unwatch(dir.path()));
        assert!(!watcher.unwatch(dir.path()));
        assert!(!watcher.is_watching(dir.path()));
    }

    #[test]
    fn test_delivers_real_changes_and_filters_noise() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();

        let mut watcher = ProjectWatcher::new(WatcherConfig::default());
        let (tx, rx) = mpsc::channel::<FileChangeEvent>();
        let tx = Mutex::new(tx);
        watcher.subscribe(move |ev| {
            let _ = tx.lock().unwrap().send(ev.clone());
        });
        watcher.watch(dir.path()).unwrap();

        std::fs::write(dir.path().join("node_modules").join("dep.js"), "x").unwrap();
        std::fs::write(dir.path().join(".git").join("HEAD"), "ref").unwrap();
        std::fs::write(dir.path().join("marker.txt"), "hello").unwrap();

        let marker = dir.path().join("marker.txt");
        let mut seen = Vec::new();
        while let Ok(ev) = rx.recv_timeout(Duration::from_secs(5)) {
            let done = ev.path == marker;
            seen.push(ev);
            if done {
                break;
            }
        }

        assert!(seen.iter().any(|e| e.path == marker), "no event for marker: {:?}", seen);
        for ev in &seen {
            let p = ev.path.to_string_lossy();
            assert!(!p.contains("node_modules") && !p.contains(".git/"), "noise leaked: {}", p);
        }
    }
}
