//! Playback session controller
//!
//! Owns the shared control state and both worker threads. The controller
//! is the single writer of the control flags; `stop()` is the join point
//! for the workers and must be called from outside them.

use crate::control::{ControlState, SessionState};
use crate::error::{Error, Result};
use crate::notification::Sink;
use crate::playback::queue::{PlaybackQueue, QueueMonitor, QueueStats, Watermarks};
use crate::playback::scheduler::{PlaybackScheduler, SchedulerSettings, SchedulerSummary};
use crate::record::source::{RecordSource, SourceSummary};
use crate::record::Recording;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, info, warn};

/// Parameters for a playback session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub speed: f64,
    pub skip_idle: bool,
    pub watermarks: Watermarks,
    pub scheduler: SchedulerSettings,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            skip_idle: false,
            watermarks: Watermarks::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

/// Outcome of a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub state: SessionState,
    /// None if the source never ran or panicked
    pub source: Option<SourceSummary>,
    /// None if the scheduler never ran or panicked
    pub scheduler: Option<SchedulerSummary>,
}

/// Inputs held until `start()`
struct Pending {
    recording: Recording,
    sink: Box<dyn Sink>,
}

struct Workers {
    source: JoinHandle<SourceSummary>,
    scheduler: JoinHandle<SchedulerSummary>,
    source_id: ThreadId,
    scheduler_id: ThreadId,
}

/// A replay of one recording, driven by an external controller
pub struct PlaybackSession {
    control: Arc<ControlState>,
    options: SessionOptions,
    pending: Option<Pending>,
    workers: Option<Workers>,
    monitor: Option<QueueMonitor>,
    report: Option<SessionReport>,
}

impl PlaybackSession {
    /// Create an idle session. Fails if `options.speed` is not a finite
    /// positive number.
    pub fn new(recording: Recording, sink: impl Sink, options: SessionOptions) -> Result<Self> {
        validate_speed(options.speed)?;

        Ok(Self {
            control: Arc::new(ControlState::new(options.speed, options.skip_idle)),
            options,
            pending: Some(Pending {
                recording,
                sink: Box::new(sink),
            }),
            workers: None,
            monitor: None,
            report: None,
        })
    }

    /// Idle → Running: spawn the record source and the scheduler.
    ///
    /// No-op on a finished session; `InvalidState` if already started.
    pub fn start(&mut self) -> Result<()> {
        if self.state().is_terminal() {
            debug!("start() on {} session ignored", self.state());
            return Ok(());
        }
        let Some(pending) = self.pending.take() else {
            return Err(Error::InvalidState("session already started".to_string()));
        };

        let mut settings = self.options.scheduler;
        if settings.total_ms.is_none() {
            settings.total_ms = pending.recording.total_ms();
        }

        let queue = PlaybackQueue::new(self.options.watermarks);
        self.monitor = Some(queue.monitor());
        let (producer, consumer) = queue.split();

        self.control.set_state(SessionState::Running);

        let source =
            match RecordSource::new(pending.recording, producer, Arc::clone(&self.control)).spawn()
            {
                Ok(handle) => handle,
                Err(e) => {
                    error!("Failed to spawn record source: {}", e);
                    self.control.set_state(SessionState::Stopped);
                    return Err(e);
                }
            };
        let scheduler = PlaybackScheduler::new(
            consumer,
            pending.sink,
            Arc::clone(&self.control),
            settings,
        );
        let scheduler = match scheduler.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to spawn scheduler: {}", e);
                self.control.request_stop();
                if source.join().is_err() {
                    error!("Record source panicked during aborted start");
                }
                self.control.set_state(SessionState::Stopped);
                return Err(e);
            }
        };

        info!(
            "Playback session started: speed={}, skip_idle={}",
            self.control.speed(),
            self.control.skip_idle()
        );

        self.workers = Some(Workers {
            source_id: source.thread().id(),
            scheduler_id: scheduler.thread().id(),
            source,
            scheduler,
        });
        Ok(())
    }

    pub fn pause(&self) {
        if self.state().is_terminal() {
            return;
        }
        debug!("Pause requested");
        self.control.set_paused(true);
    }

    pub fn resume(&self) {
        if self.state().is_terminal() {
            return;
        }
        debug!("Resume requested");
        self.control.set_paused(false);
    }

    /// Change the speed factor; rejected unless finite and positive
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        validate_speed(speed)?;
        if self.state().is_terminal() {
            return Ok(());
        }
        debug!("Speed set to {}", speed);
        self.control.set_speed(speed);
        Ok(())
    }

    pub fn set_skip_idle(&self, skip_idle: bool) {
        if self.state().is_terminal() {
            return;
        }
        debug!("Skip-idle set to {}", skip_idle);
        self.control.set_skip_idle(skip_idle);
    }

    /// Request stop and wait for both workers to exit.
    ///
    /// Must not be called from a worker thread (it would wait on itself);
    /// that case returns `InvalidState`. Repeated calls return the same
    /// report.
    pub fn stop(&mut self) -> Result<SessionReport> {
        self.ensure_not_worker()?;

        self.control.request_stop();
        if self.workers.is_none() && self.report.is_none() {
            self.pending = None;
            self.control.set_state(SessionState::Stopped);
        }

        let report = self.join_workers();
        info!("Playback session stopped ({})", report.state);
        Ok(report)
    }

    /// Wait for a started session to finish on its own
    pub fn wait(&mut self) -> Result<SessionReport> {
        self.ensure_not_worker()?;
        if self.workers.is_none() && self.report.is_none() {
            return Err(Error::InvalidState("session not started".to_string()));
        }
        Ok(self.join_workers())
    }

    pub fn state(&self) -> SessionState {
        self.control.state()
    }

    pub fn speed(&self) -> f64 {
        self.control.speed()
    }

    pub fn skip_idle(&self) -> bool {
        self.control.skip_idle()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// Queue statistics, once the session has started
    pub fn queue_stats(&self) -> Option<QueueStats> {
        self.monitor.as_ref().map(QueueMonitor::stats)
    }

    fn ensure_not_worker(&self) -> Result<()> {
        if let Some(workers) = &self.workers {
            let current = thread::current().id();
            if current == workers.source_id || current == workers.scheduler_id {
                return Err(Error::InvalidState(
                    "stop/wait called from a playback worker thread".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn join_workers(&mut self) -> SessionReport {
        if let Some(report) = self.report {
            return report;
        }

        let (source, scheduler) = match self.workers.take() {
            Some(workers) => {
                let scheduler = match workers.scheduler.join() {
                    Ok(summary) => Some(summary),
                    Err(e) => {
                        error!("Playback scheduler panicked: {:?}", e);
                        None
                    }
                };

                // Scheduler is gone; nothing will drain the queue any more
                self.control.request_stop();

                let source = match workers.source.join() {
                    Ok(summary) => Some(summary),
                    Err(e) => {
                        error!("Record source panicked: {:?}", e);
                        None
                    }
                };
                debug!("Playback workers joined");
                (source, scheduler)
            }
            None => (None, None),
        };

        if !self.state().is_terminal() {
            warn!("Workers exited without a terminal state; marking stopped");
            self.control.set_state(SessionState::Stopped);
        }

        let report = SessionReport {
            state: self.state(),
            source,
            scheduler,
        };
        self.report = Some(report);
        report
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if self.workers.is_none() {
            return;
        }
        if let Err(e) = self.stop() {
            // Dropped on a worker thread: cannot join, only signal
            warn!("Playback session dropped without join: {}", e);
            self.control.request_stop();
        }
    }
}

fn validate_speed(speed: f64) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidSpeed(speed))
    }
}
