//! Playback queue, scheduler and session control

pub mod queue;
pub mod scheduler;
pub mod session;

pub use queue::{PlaybackQueue, QueueStats, Watermarks};
pub use scheduler::{PlaybackScheduler, SchedulerSettings, SchedulerSummary};
pub use session::{PlaybackSession, SessionOptions, SessionReport};
