use std::time::Duration;

/// Lines between two progress reports
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100;
/// Sleep between two empty reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Consecutive empty reads before checking for rotation (~10s at 100ms)
pub const DEFAULT_RELOAD_THRESHOLD: u32 = 100;

/// Configuration for the line follower
#[derive(Debug, Clone)]
pub struct FollowConfig {
    /// Stop at the first empty read instead of waiting for more input
    pub batch: bool,
    /// Check for rotation after `reload_threshold` idle polls
    pub auto_reload: bool,
    pub poll_interval: Duration,
    pub reload_threshold: u32,
    pub progress_interval: u64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        FollowConfig {
            batch: false,
            auto_reload: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reload_threshold: DEFAULT_RELOAD_THRESHOLD,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}
