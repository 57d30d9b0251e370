// Watcher module - recursive filesystem change notifications

pub mod config;
pub mod error;
pub mod types;
pub mod watcher;

pub use config::WatcherConfig;
pub use error::{Result, WatcherError};
pub use types::{ChangeKind, ChangeListener, FileChangeEvent, SubscriptionId};
pub use watcher::ProjectWatcher;
