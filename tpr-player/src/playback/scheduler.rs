//! Playback scheduler
//!
//! Consumer side of the replay pipeline. Pops notifications from the
//! playback queue and forwards them to the sink, holding each packet back
//! until the recording's own cadence (scaled by the speed factor) says it
//! is due.
//!
//! **Timing model:**
//! - `last_offset`: recording offset of the last dispatched packet
//! - `last_wallclock`: real time of that dispatch
//! - A packet at offset `O` is due once
//!   `speed * (now - last_wallclock) >= O - last_offset`
//! - With skip-idle on, the gap is capped at the idle cap (3000ms)
//! - While paused, `last_wallclock` moves forward by the measured pause
//!   duration, so paused time never counts as elapsed playback
//!
//! Every wait is sliced (10ms gate, 20ms idle, 50ms pause) and control
//! flags are re-read between slices.

use crate::control::{ControlState, SessionState};
use crate::error::{Error, Result};
use crate::notification::{Notification, Sink};
use crate::playback::queue::QueueConsumer;
use crate::record::Packet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Sleep when the queue is empty
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Sleep per pause check
pub const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Longest single sleep inside the timing gate
pub const GATE_SLICE: Duration = Duration::from_millis(10);

/// Skip-idle ceiling for a single inter-packet gap
pub const DEFAULT_IDLE_CAP_MS: u64 = 3000;

/// Minimum virtual-time advance between PROGRESS notifications
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 200;

/// Sent once, before the first forwarded notification
pub const SESSION_STARTED_MESSAGE: &str = "session started";

/// Sent immediately before END
pub const PLAYBACK_FINISHED_MESSAGE: &str = "playback finished";

/// Tunables for the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub idle_cap_ms: u64,
    pub progress_interval_ms: u64,
    /// Declared recording duration; PROGRESS never exceeds it
    pub total_ms: Option<u64>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            idle_cap_ms: DEFAULT_IDLE_CAP_MS,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            total_ms: None,
        }
    }
}

/// Result of a scheduler run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSummary {
    /// Stopped or Ended
    pub final_state: SessionState,
    /// DATA/KEYFRAME packets forwarded to the sink
    pub packets: u64,
    /// Virtual position at exit
    pub played_ms: u64,
}

/// Why the main loop ended
enum Exit {
    Stopped,
    /// END forwarded
    Ended,
    /// Producer closed without END (after an ERROR); queue is empty
    Drained,
}

/// Timestamp-gated consumer driving the sink
pub struct PlaybackScheduler {
    consumer: QueueConsumer,
    sink: Box<dyn Sink>,
    control: Arc<ControlState>,
    settings: SchedulerSettings,

    played_ms: u64,
    last_offset: u64,
    last_wallclock: Instant,
    last_progress_reported: u64,
    progress_reported: bool,
    started: bool,
    paused_published: bool,
    packets: u64,
}

impl PlaybackScheduler {
    pub fn new(
        consumer: QueueConsumer,
        sink: Box<dyn Sink>,
        control: Arc<ControlState>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            consumer,
            sink,
            control,
            settings,
            played_ms: 0,
            last_offset: 0,
            last_wallclock: Instant::now(),
            last_progress_reported: 0,
            progress_reported: false,
            started: false,
            paused_published: false,
            packets: 0,
        }
    }

    /// Spawn the scheduler on its own named thread
    pub fn spawn(self) -> Result<JoinHandle<SchedulerSummary>> {
        thread::Builder::new()
            .name("tpr-scheduler".to_string())
            .spawn(move || self.run())
            .map_err(Error::Io)
    }

    /// Run until stop, END, or drain-after-error
    pub fn run(mut self) -> SchedulerSummary {
        info!(
            "Playback scheduler started: speed={}, skip_idle={}",
            self.control.speed(),
            self.control.skip_idle()
        );
        self.last_wallclock = Instant::now();

        let exit = self.main_loop();

        let final_state = match exit {
            Exit::Stopped => SessionState::Stopped,
            Exit::Ended | Exit::Drained => SessionState::Ended,
        };
        self.control.set_state(final_state);

        let leftover = self.consumer.occupied_len();
        if leftover > 0 {
            debug!("Discarding {} queued notification(s)", leftover);
        }

        info!(
            "Playback scheduler {}: {} packet(s), played {}ms",
            final_state, self.packets, self.played_ms
        );

        SchedulerSummary {
            final_state,
            packets: self.packets,
            played_ms: self.played_ms,
        }
    }

    fn main_loop(&mut self) -> Exit {
        loop {
            if self.control.stop_requested() {
                return Exit::Stopped;
            }

            if self.control.is_paused() {
                self.pause_slice();
                continue;
            }
            self.publish_paused(false);

            let notification = match self.consumer.try_pop() {
                Some(notification) => notification,
                None => {
                    // Closed is set after the producer's last push, so an
                    // empty queue seen after it is final
                    if self.consumer.is_closed() && self.consumer.is_empty() {
                        self.finish(false);
                        return Exit::Drained;
                    }
                    thread::sleep(IDLE_POLL_INTERVAL);
                    continue;
                }
            };

            if !self.started {
                self.started = true;
                self.sink
                    .notify(Notification::Message(SESSION_STARTED_MESSAGE.to_string()));
            }

            match notification {
                Notification::Data(packet) => {
                    if !self.dispatch_packet(packet) {
                        return Exit::Stopped;
                    }
                }
                Notification::End => {
                    if self.control.stop_requested() {
                        return Exit::Stopped;
                    }
                    self.finish(true);
                    return Exit::Ended;
                }
                other => {
                    trace!("Forwarding {} notification", other.kind_name());
                    self.sink.notify(other);
                }
            }
        }
    }

    /// Wait until `packet` is due, then forward it.
    ///
    /// Returns false if stop was observed first; the packet is dropped.
    fn dispatch_packet(&mut self, packet: Packet) -> bool {
        let offset = u64::from(packet.offset_ms);
        let gap = offset.saturating_sub(self.last_offset);

        let dispatched_at = loop {
            if self.control.stop_requested() {
                return false;
            }
            if self.control.is_paused() {
                self.pause_slice();
                continue;
            }
            self.publish_paused(false);

            // Re-read each slice so speed/skip-idle changes apply to the
            // packet already waiting
            let speed = self.control.speed();
            let delta = self.effective_gap(gap) as f64;

            let now = Instant::now();
            let elapsed_ms = now.duration_since(self.last_wallclock).as_secs_f64() * 1000.0;
            let scaled_ms = speed * elapsed_ms;

            self.update_progress(self.last_offset + scaled_ms.min(delta) as u64);

            if scaled_ms >= delta {
                break now;
            }

            // Cap in f64 first: at tiny speeds the full wait overflows Duration
            let slice_ms = GATE_SLICE.as_secs_f64() * 1000.0;
            let remaining_ms = ((delta - scaled_ms) / speed).min(slice_ms);
            thread::sleep(Duration::from_secs_f64(remaining_ms / 1000.0));
        };

        trace!(
            "Dispatching {:?} at {}ms ({} bytes)",
            packet.kind,
            offset,
            packet.payload.len()
        );
        self.sink.notify(Notification::Data(packet));
        self.packets += 1;

        self.last_offset = offset;
        self.last_wallclock = dispatched_at;
        self.update_progress(offset);
        true
    }

    /// Recorded gap after applying skip-idle
    fn effective_gap(&self, gap: u64) -> u64 {
        if self.control.skip_idle() && gap > self.settings.idle_cap_ms {
            self.settings.idle_cap_ms
        } else {
            gap
        }
    }

    /// Sleep one pause slice and push the wall-clock baseline forward by
    /// exactly the time spent asleep
    fn pause_slice(&mut self) {
        self.publish_paused(true);
        let slice_start = Instant::now();
        thread::sleep(PAUSE_SLICE);
        self.last_wallclock += slice_start.elapsed();
    }

    fn publish_paused(&mut self, paused: bool) {
        if self.paused_published == paused {
            return;
        }
        let next = if paused {
            SessionState::Paused
        } else {
            SessionState::Running
        };
        if self.control.set_state(next) {
            debug!("Playback {}", next);
        }
        self.paused_published = paused;
    }

    /// Advance the virtual position and emit PROGRESS once it has moved
    /// at least one progress interval past the last report
    fn update_progress(&mut self, position_ms: u64) {
        let position_ms = match self.settings.total_ms {
            Some(total) => position_ms.min(total),
            None => position_ms,
        };
        if position_ms > self.played_ms {
            self.played_ms = position_ms;
        }

        if self.played_ms >= self.last_progress_reported + self.settings.progress_interval_ms {
            self.report_progress();
        }
    }

    fn report_progress(&mut self) {
        self.sink.notify(Notification::Progress(self.played_ms));
        self.last_progress_reported = self.played_ms;
        self.progress_reported = true;
    }

    /// Flush the final position and, for a normal end, the closing
    /// MESSAGE and END
    fn finish(&mut self, forward_end: bool) {
        if !self.progress_reported || self.played_ms > self.last_progress_reported {
            self.report_progress();
        }

        if forward_end {
            self.sink
                .notify(Notification::Message(PLAYBACK_FINISHED_MESSAGE.to_string()));
            self.sink.notify(Notification::End);
            debug!("END forwarded at {}ms", self.played_ms);
        } else {
            debug!("Input closed without END at {}ms", self.played_ms);
        }
    }
}
