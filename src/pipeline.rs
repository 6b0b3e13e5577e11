// src/pipeline.rs
pub mod config;
pub mod context;
pub mod dispatch;
pub mod follow;

pub use config::FollowConfig;
pub use context::{FieldValue, ProcessingStats, Progress, Record};
pub use dispatch::{DispatchFailure, DispatchPipeline, DispatchReport};
pub use follow::{LineFollower, Sleeper, ThreadSleeper};
