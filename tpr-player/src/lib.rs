//! # TPR Session Replay Player (tpr-player)
//!
//! Replays captured remote-session recordings at the recording's own
//! cadence, scaled by a speed factor, with pause/resume, stop and
//! idle-gap compression.
//!
//! **Architecture:** two worker threads joined by a bounded queue:
//! files → `RecordSource` → `PlaybackQueue` → `PlaybackScheduler` → `Sink`.
//! Control flows back through a shared `ControlState` owned by the
//! `PlaybackSession`.

pub mod config;
pub mod control;
pub mod error;
pub mod notification;
pub mod playback;
pub mod record;

pub use control::{ControlState, SessionState};
pub use error::{Error, Result};
pub use notification::{CollectingSink, Notification, Sink};
pub use playback::{PlaybackSession, SessionOptions, SessionReport};
pub use record::{Packet, PacketKind, Recording};
