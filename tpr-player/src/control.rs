//! Shared session control state
//!
//! One external writer (the controller) and two readers (the record source
//! and the scheduler). Every field is a plain atomic; workers re-read them
//! once per polling slice, so a change becomes visible within one slice.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Lifecycle of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Stopped,
    Ended,
}

impl SessionState {
    /// Stopped and Ended accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Ended)
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Running => 1,
            SessionState::Paused => 2,
            SessionState::Stopped => 3,
            SessionState::Ended => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Running,
            2 => SessionState::Paused,
            3 => SessionState::Stopped,
            4 => SessionState::Ended,
            _ => SessionState::Idle,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Running => write!(f, "running"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Stopped => write!(f, "stopped"),
            SessionState::Ended => write!(f, "ended"),
        }
    }
}

/// Control flags shared by handle between the controller and both workers
#[derive(Debug)]
pub struct ControlState {
    /// One-way latch, never reset once set
    stop: AtomicBool,
    paused: AtomicBool,
    /// `f64` bit pattern; always finite and > 0
    speed_bits: AtomicU64,
    skip_idle: AtomicBool,
    state: AtomicU8,
}

impl ControlState {
    /// Create control state; `speed` must already be validated
    pub fn new(speed: f64, skip_idle: bool) -> Self {
        debug_assert!(speed.is_finite() && speed > 0.0);
        Self {
            stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            speed_bits: AtomicU64::new(speed.to_bits()),
            skip_idle: AtomicBool::new(skip_idle),
            state: AtomicU8::new(SessionState::Idle.as_u8()),
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Caller guarantees `speed` is finite and positive
    pub(crate) fn set_speed(&self, speed: f64) {
        self.speed_bits.store(speed.to_bits(), Ordering::Release);
    }

    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed_bits.load(Ordering::Acquire))
    }

    pub fn set_skip_idle(&self, skip_idle: bool) {
        self.skip_idle.store(skip_idle, Ordering::Release);
    }

    pub fn skip_idle(&self) -> bool {
        self.skip_idle.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Publish a new session state.
    ///
    /// Terminal states are sticky: once Stopped or Ended is stored, later
    /// writes are ignored. Returns whether the write took effect.
    pub(crate) fn set_state(&self, next: SessionState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if SessionState::from_u8(current).is_terminal() {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}
