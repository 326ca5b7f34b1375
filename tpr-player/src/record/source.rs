//! Record source worker
//!
//! Reads the recording's data files in order on a dedicated thread and
//! feeds the playback queue, holding off while the queue is above its
//! high watermark.
//!
//! **Failure handling:**
//! - An unopenable or corrupt file produces one ERROR notification and
//!   ends production; packets already queued are left alone
//! - A declared packet total that was not reached adds a
//!   "recording incomplete" MESSAGE
//! - END is queued only when input ran out cleanly (or an END-marker
//!   packet was read)
//! - A stop request abandons input at the next check; a packet read but
//!   not yet queued is dropped

use crate::control::ControlState;
use crate::error::{Error, Result};
use crate::notification::Notification;
use crate::playback::queue::QueueProducer;
use crate::record::{PacketKind, PacketReader, Recording};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Sleep between backpressure checks
pub const SOURCE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How the source finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOutcome {
    /// All input read (or END-marker reached); END was queued
    Completed,
    /// A file could not be opened or was corrupt; ERROR was queued
    Failed,
    /// Stop was requested before input ran out
    Cancelled,
}

/// Summary returned by the source thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSummary {
    pub outcome: SourceOutcome,
    /// Packets queued for playback
    pub packets: u64,
    /// Data files opened
    pub files_opened: usize,
}

/// Producer side of the replay pipeline
pub struct RecordSource {
    recording: Recording,
    producer: QueueProducer,
    control: Arc<ControlState>,
    poll_interval: Duration,
    packets: u64,
    files_opened: usize,
}

impl RecordSource {
    pub fn new(recording: Recording, producer: QueueProducer, control: Arc<ControlState>) -> Self {
        Self {
            recording,
            producer,
            control,
            poll_interval: SOURCE_POLL_INTERVAL,
            packets: 0,
            files_opened: 0,
        }
    }

    /// Spawn the source on its own named thread
    pub fn spawn(self) -> Result<JoinHandle<SourceSummary>> {
        thread::Builder::new()
            .name("tpr-source".to_string())
            .spawn(move || self.run())
            .map_err(Error::Io)
    }

    /// Produce until input is exhausted, fails, or stop is requested.
    ///
    /// Consumes the source; dropping the queue producer on return marks
    /// the queue closed.
    pub fn run(mut self) -> SourceSummary {
        let started = Instant::now();
        info!(
            "Record source started: {} file(s)",
            self.recording.files().len()
        );

        let outcome = self.produce();

        if outcome != SourceOutcome::Cancelled {
            self.report_incomplete();
        }
        if outcome == SourceOutcome::Completed {
            self.enqueue(Notification::End);
        }

        info!(
            "Record source finished: {:?}, {} packet(s) from {} file(s) in {:.2}s",
            outcome,
            self.packets,
            self.files_opened,
            started.elapsed().as_secs_f64()
        );

        SourceSummary {
            outcome,
            packets: self.packets,
            files_opened: self.files_opened,
        }
    }

    fn produce(&mut self) -> SourceOutcome {
        let files = self.recording.files().to_vec();

        for path in &files {
            if self.control.stop_requested() {
                debug!("Record source cancelled between files");
                return SourceOutcome::Cancelled;
            }

            let mut reader = match PacketReader::open(path) {
                Ok(reader) => reader,
                Err(e) => return self.fail(e),
            };
            self.files_opened += 1;
            debug!("Reading {}", path.display());

            loop {
                if !self.wait_for_room() {
                    debug!("Record source cancelled while queue was full");
                    return SourceOutcome::Cancelled;
                }

                let packet = match reader.next_packet() {
                    Ok(Some(packet)) => packet,
                    Ok(None) => break,
                    Err(e) => return self.fail(e),
                };

                match packet.kind {
                    PacketKind::End => {
                        debug!(
                            "END-marker at {}ms in {}, ignoring remaining input",
                            packet.offset_ms,
                            path.display()
                        );
                        return SourceOutcome::Completed;
                    }
                    PacketKind::Keyframe => debug!("Key frame at {}ms", packet.offset_ms),
                    PacketKind::Data => {}
                }

                if !self.enqueue(Notification::Data(packet)) {
                    return SourceOutcome::Cancelled;
                }
                self.packets += 1;
            }

            debug!(
                "Finished {} ({} packet(s))",
                path.display(),
                reader.packets_read()
            );
        }

        SourceOutcome::Completed
    }

    fn fail(&mut self, e: Error) -> SourceOutcome {
        error!("Record source stopped: {}", e);
        self.enqueue(Notification::Error(e.to_string()));
        SourceOutcome::Failed
    }

    /// Queue the advisory when fewer packets were produced than declared
    fn report_incomplete(&mut self) {
        if let Some(total) = self.recording.total_packets() {
            if self.packets < total {
                warn!(
                    "Recording incomplete: {} of {} declared packets",
                    self.packets, total
                );
                let text = format!(
                    "recording incomplete: {} of {} packets available",
                    self.packets, total
                );
                self.enqueue(Notification::Message(text));
            }
        }
    }

    /// Block (in poll slices) while the queue is stalled. False on stop.
    fn wait_for_room(&mut self) -> bool {
        loop {
            if self.control.stop_requested() {
                return false;
            }
            if !self.producer.is_stalled() {
                return true;
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Push, retrying while the ring is full. False on stop.
    fn enqueue(&mut self, mut notification: Notification) -> bool {
        loop {
            if self.control.stop_requested() {
                return false;
            }
            match self.producer.try_push(notification) {
                Ok(()) => return true,
                Err(rejected) => {
                    notification = rejected;
                    thread::sleep(self.poll_interval);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::queue::{PlaybackQueue, QueueConsumer, Watermarks};
    use crate::record::format::PacketHeader;
    use crate::record::RecordingInfo;
    use std::path::{Path, PathBuf};

    fn write_file(dir: &Path, name: &str, packets: &[(PacketKind, u32, &str)]) -> PathBuf {
        let mut bytes = Vec::new();
        for (kind, offset_ms, payload) in packets {
            let header = PacketHeader {
                kind: *kind,
                offset_ms: *offset_ms,
                payload_size: payload.len() as u32,
            };
            bytes.extend_from_slice(&header.encode());
            bytes.extend_from_slice(payload.as_bytes());
        }
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn drain(cons: &mut QueueConsumer) -> Vec<Notification> {
        std::iter::from_fn(|| cons.try_pop()).collect()
    }

    fn run_source(recording: Recording) -> (SourceSummary, Vec<Notification>) {
        let (prod, mut cons) = PlaybackQueue::new(Watermarks::default()).split();
        let control = Arc::new(ControlState::new(1.0, false));
        let summary = RecordSource::new(recording, prod, control).run();
        (summary, drain(&mut cons))
    }

    #[test]
    fn test_reads_files_in_order_then_end() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(
            dir.path(),
            "a",
            &[(PacketKind::Data, 0, "a0"), (PacketKind::Data, 10, "a1")],
        );
        let b = write_file(dir.path(), "b", &[(PacketKind::Keyframe, 20, "b0")]);

        let (summary, out) = run_source(Recording::from_files(vec![a, b]));

        assert_eq!(summary.outcome, SourceOutcome::Completed);
        assert_eq!(summary.packets, 3);
        assert_eq!(summary.files_opened, 2);
        let offsets: Vec<u32> = out
            .iter()
            .filter_map(|n| match n {
                Notification::Data(p) => Some(p.offset_ms),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![0, 10, 20]);
        assert_eq!(out.last(), Some(&Notification::End));
    }

    #[test]
    fn test_missing_file_reports_error_without_end() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a", &[(PacketKind::Data, 0, "x")]);
        let missing = dir.path().join("missing.tpd");

        let (summary, out) = run_source(Recording::from_files(vec![a, missing]));

        assert_eq!(summary.outcome, SourceOutcome::Failed);
        assert_eq!(out.len(), 2);
        match &out[1] {
            Notification::Error(text) => assert!(text.starts_with("cannot open recording file")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_end_marker_stops_reading() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(
            dir.path(),
            "a",
            &[
                (PacketKind::Data, 0, "x"),
                (PacketKind::End, 5, ""),
                (PacketKind::Data, 10, "ignored"),
            ],
        );
        let b = write_file(dir.path(), "b", &[(PacketKind::Data, 20, "ignored")]);

        let (summary, out) = run_source(Recording::from_files(vec![a, b]));

        assert_eq!(summary.outcome, SourceOutcome::Completed);
        assert_eq!(summary.packets, 1);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Notification::End);
    }

    #[test]
    fn test_incomplete_advisory_precedes_end() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a", &[(PacketKind::Data, 0, "x")]);
        let recording = Recording::from_files(vec![a]).with_info(RecordingInfo {
            total_ms: 1000,
            total_packets: 4,
            file_count: 1,
        });

        let (_, out) = run_source(recording);

        assert_eq!(out.len(), 3);
        match &out[1] {
            Notification::Message(text) => assert!(text.starts_with("recording incomplete")),
            other => panic!("expected advisory, got {:?}", other),
        }
        assert_eq!(out[2], Notification::End);
    }

    #[test]
    fn test_stop_before_run_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a", &[(PacketKind::Data, 0, "x")]);
        let (prod, mut cons) = PlaybackQueue::new(Watermarks::default()).split();
        let control = Arc::new(ControlState::new(1.0, false));
        control.request_stop();

        let summary = RecordSource::new(Recording::from_files(vec![a]), prod, control).run();

        assert_eq!(summary.outcome, SourceOutcome::Cancelled);
        assert!(drain(&mut cons).is_empty());
        assert!(cons.is_closed());
    }

    #[test]
    fn test_backpressure_stalls_at_high_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let packets: Vec<(PacketKind, u32, &str)> =
            (0..20).map(|i| (PacketKind::Data, i * 10, "p")).collect();
        let a = write_file(dir.path(), "a", &packets);

        let queue = PlaybackQueue::new(Watermarks::new(2, 5).unwrap());
        let monitor = queue.monitor();
        let (prod, mut cons) = queue.split();
        let control = Arc::new(ControlState::new(1.0, false));
        let handle = RecordSource::new(Recording::from_files(vec![a]), prod, Arc::clone(&control))
            .spawn()
            .unwrap();

        // Give the producer time to hit the watermark
        thread::sleep(Duration::from_millis(100));
        assert_eq!(monitor.stats().depth, 5);
        assert!(monitor.stats().stalls >= 1);

        let mut received = Vec::new();
        while received.last() != Some(&Notification::End) {
            match cons.try_pop() {
                Some(n) => received.push(n),
                None => thread::sleep(Duration::from_millis(5)),
            }
        }

        let summary = handle.join().unwrap();
        assert_eq!(summary.packets, 20);
        assert_eq!(received.len(), 21);
        assert!(monitor.stats().peak_depth <= 5);
    }
}
