//! Test helpers for tpr-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - RecordingBuilder: write synthetic recordings (good, truncated,
//!   malformed) into a temporary directory
//! - Sink inspection helpers for dispatch order and timing

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use tpr_player::record::format::{data_file_name, PacketHeader, INFO_FILE_NAME};
use tpr_player::record::RecordingInfo;
use tpr_player::{CollectingSink, Notification, PacketKind};

/// Encode one packet (header + payload)
pub fn encode_packet(kind: PacketKind, offset_ms: u32, payload: &[u8]) -> Vec<u8> {
    let header = PacketHeader {
        kind,
        offset_ms,
        payload_size: payload.len() as u32,
    };
    let mut bytes = header.encode().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// Payload carrying a sequence number, so order checks survive equal offsets
pub fn numbered_payload(seq: u32) -> Vec<u8> {
    seq.to_le_bytes().to_vec()
}

/// Read back the sequence number written by `numbered_payload`
pub fn payload_seq(payload: &[u8]) -> u32 {
    u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
}

/// Synthetic recording directory
pub struct RecordingBuilder {
    temp_dir: TempDir,
    next_seq: u32,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            next_seq: 0,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write data file `n` (1-based) with DATA packets at `offsets`.
    /// Payloads are numbered continuously across files.
    pub fn data_file(&mut self, n: usize, offsets: &[u32]) -> PathBuf {
        let mut bytes = Vec::new();
        for &offset in offsets {
            bytes.extend(encode_packet(
                PacketKind::Data,
                offset,
                &numbered_payload(self.next_seq),
            ));
            self.next_seq += 1;
        }
        self.raw_file(&data_file_name(n), &bytes)
    }

    /// Like `data_file`, but the final packet's payload is cut short
    pub fn data_file_truncated_last(&mut self, n: usize, offsets: &[u32]) -> PathBuf {
        let (last, good) = offsets.split_last().unwrap();
        let mut bytes = Vec::new();
        for &offset in good {
            bytes.extend(encode_packet(
                PacketKind::Data,
                offset,
                &numbered_payload(self.next_seq),
            ));
            self.next_seq += 1;
        }

        let full = encode_packet(PacketKind::Data, *last, &[0xAB; 64]);
        bytes.extend_from_slice(&full[..full.len() - 20]);
        self.raw_file(&data_file_name(n), &bytes)
    }

    pub fn raw_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    pub fn info(&self, info: RecordingInfo) -> PathBuf {
        self.raw_file(INFO_FILE_NAME, &info.encode())
    }
}

/// Sequence numbers of the DATA notifications, in sink order
pub fn data_seqs(notifications: &[Notification]) -> Vec<u32> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::Data(packet) => Some(payload_seq(&packet.payload)),
            _ => None,
        })
        .collect()
}

/// Arrival times of the DATA notifications
pub fn data_times(sink: &CollectingSink) -> Vec<Instant> {
    sink.entries()
        .into_iter()
        .filter(|(_, n)| matches!(n, Notification::Data(_)))
        .map(|(t, _)| t)
        .collect()
}

/// PROGRESS values in order
pub fn progress_values(notifications: &[Notification]) -> Vec<u64> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::Progress(ms) => Some(*ms),
            _ => None,
        })
        .collect()
}

/// Poll `sink` until `count` DATA notifications have arrived
pub fn wait_for_data(sink: &CollectingSink, count: usize, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while data_times(sink).len() < count {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {} data notification(s)",
            count
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Assert `actual` lies within `[expected - below, expected + above]`
pub fn assert_duration_near(actual: Duration, expected_ms: u64, below_ms: u64, above_ms: u64) {
    let low = Duration::from_millis(expected_ms.saturating_sub(below_ms));
    let high = Duration::from_millis(expected_ms + above_ms);
    assert!(
        actual >= low && actual <= high,
        "expected ~{}ms (-{}/+{}), got {:?}",
        expected_ms,
        below_ms,
        above_ms,
        actual
    );
}
