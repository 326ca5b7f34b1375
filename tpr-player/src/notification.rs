//! Notifications delivered to the sink
//!
//! The record source, the playback queue and the scheduler all exchange
//! [`Notification`] values; the scheduler forwards them to a [`Sink`] in
//! production order.

use crate::record::Packet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Unit exchanged between the queue, the scheduler and the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A recording packet (DATA or KEYFRAME) due for presentation
    Data(Packet),
    /// Informational text for the operator
    Message(String),
    /// Error text for the operator
    Error(String),
    /// Virtual playback position in milliseconds
    Progress(u64),
    /// End of the session
    End,
}

impl Notification {
    /// Short tag used in log lines
    pub fn kind_name(&self) -> &'static str {
        match self {
            Notification::Data(_) => "data",
            Notification::Message(_) => "message",
            Notification::Error(_) => "error",
            Notification::Progress(_) => "progress",
            Notification::End => "end",
        }
    }
}

/// Receiver of the ordered notification stream.
///
/// Called from the scheduler thread; implementations should return quickly
/// since time spent here delays pacing of the next packet.
pub trait Sink: Send + 'static {
    fn notify(&mut self, notification: Notification);
}

impl<F> Sink for F
where
    F: FnMut(Notification) + Send + 'static,
{
    fn notify(&mut self, notification: Notification) {
        self(notification)
    }
}

impl Sink for std::sync::mpsc::Sender<Notification> {
    fn notify(&mut self, notification: Notification) {
        // Receiver gone means nobody is listening; not an error for playback
        let _ = self.send(notification);
    }
}

impl Sink for tokio::sync::mpsc::UnboundedSender<Notification> {
    fn notify(&mut self, notification: Notification) {
        let _ = self.send(notification);
    }
}

/// Sink that records every notification with its arrival time.
///
/// Clones share the same log, so one clone can be handed to a session
/// while another is inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    log: Arc<Mutex<Vec<(Instant, Notification)>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far
    pub fn entries(&self) -> Vec<(Instant, Notification)> {
        match self.log.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Received notifications without timestamps
    pub fn notifications(&self) -> Vec<Notification> {
        self.entries().into_iter().map(|(_, n)| n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for CollectingSink {
    fn notify(&mut self, notification: Notification) {
        let entry = (Instant::now(), notification);
        match self.log.lock() {
            Ok(mut log) => log.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
