// Data types for Watcher module

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Contents or metadata changed
    Change,
    /// Entry appeared, disappeared or was renamed
    Rename,
}

/// One filesystem change under a watched root
#[derive(Debug, Clone, Serialize)]
pub struct FileChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

/// Handle returned by `ProjectWatcher::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Change listener; invoked on the notification thread
pub type ChangeListener = Arc<dyn Fn(&FileChangeEvent) + Send + Sync>;
