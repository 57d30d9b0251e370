// Watcher configuration

/// Substrings that mark a path as noise
pub const DEFAULT_NOISE_PATTERNS: [&str; 2] = ["node_modules", ".git/"];

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Events whose path (relative to the watched root) contains any of these are dropped
    pub noise_patterns: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            noise_patterns: DEFAULT_NOISE_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl WatcherConfig {
    /// Substring match, not path-component match: `my.git/config` is noise too
    pub fn is_noise(&self, relative_path: &str) -> bool {
        self.noise_patterns
            .iter()
            .any(|pattern| relative_path.contains(pattern.as_str()))
    }
}
