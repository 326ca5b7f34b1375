//! On-disk recording layout
//!
//! A data file is a flat sequence of records, each a fixed 12-byte header
//! followed by `payload_size` bytes of opaque payload. All integers are
//! little-endian.
//!
//! ```text
//! 0      1          4            8               12
//! +------+----------+------------+---------------+-------------
//! | type | reserved | offset_ms  | payload_size  | payload ...
//! +------+----------+------------+---------------+-------------
//! ```
//!
//! A recording may also carry an info file (`tp-rdp.tpr`) declaring its
//! total duration, total packet count and number of data files.

/// Size of the fixed packet header in bytes
pub const PACKET_HEADER_LEN: usize = 12;

/// Size of the recording info file in bytes
pub const RECORDING_INFO_LEN: usize = 20;

/// Largest payload a header may declare (16 MiB)
///
/// Anything larger is treated as a corrupt length field.
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Magic number at the start of the info file ("TPPR")
pub const RECORDING_INFO_MAGIC: u32 = u32::from_le_bytes(*b"TPPR");

/// Supported info file version
pub const RECORDING_INFO_VERSION: u16 = 1;

/// Info file name inside a recording directory
pub const INFO_FILE_NAME: &str = "tp-rdp.tpr";

const TYPE_DATA: u8 = 0x01;
const TYPE_KEYFRAME: u8 = 0x02;
const TYPE_END: u8 = 0xFF;

/// Data file name for the 1-based index `n`
pub fn data_file_name(n: usize) -> String {
    format!("tp-rdp-{}.tpd", n)
}

/// Packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Ordinary session data
    Data,
    /// Synchronization point (diagnostic significance only)
    Keyframe,
    /// Explicit end of the logical stream
    End,
}

impl PacketKind {
    /// Decode the on-disk type byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            TYPE_DATA => Some(PacketKind::Data),
            TYPE_KEYFRAME => Some(PacketKind::Keyframe),
            TYPE_END => Some(PacketKind::End),
            _ => None,
        }
    }

    /// On-disk type byte
    pub fn as_byte(self) -> u8 {
        match self {
            PacketKind::Data => TYPE_DATA,
            PacketKind::Keyframe => TYPE_KEYFRAME,
            PacketKind::End => TYPE_END,
        }
    }
}

/// Decoded fixed-size packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub kind: PacketKind,
    pub offset_ms: u32,
    pub payload_size: u32,
}

impl PacketHeader {
    /// Decode a header, returning a description of the defect on failure
    pub fn decode(buf: &[u8; PACKET_HEADER_LEN]) -> Result<Self, String> {
        let kind = PacketKind::from_byte(buf[0])
            .ok_or_else(|| format!("unknown packet type 0x{:02x}", buf[0]))?;
        let offset_ms = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let payload_size = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);

        if payload_size > MAX_PAYLOAD_SIZE {
            return Err(format!(
                "declared payload size {} exceeds limit {}",
                payload_size, MAX_PAYLOAD_SIZE
            ));
        }

        Ok(Self {
            kind,
            offset_ms,
            payload_size,
        })
    }

    /// Encode to the on-disk representation (reserved bytes zeroed)
    pub fn encode(&self) -> [u8; PACKET_HEADER_LEN] {
        let mut buf = [0u8; PACKET_HEADER_LEN];
        buf[0] = self.kind.as_byte();
        buf[4..8].copy_from_slice(&self.offset_ms.to_le_bytes());
        buf[8..12].copy_from_slice(&self.payload_size.to_le_bytes());
        buf
    }
}

/// One decoded recording packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    /// Milliseconds since recording start (non-decreasing within a recording)
    pub offset_ms: u32,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(kind: PacketKind, offset_ms: u32, payload: Vec<u8>) -> Self {
        Self {
            kind,
            offset_ms,
            payload,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        self.kind == PacketKind::Keyframe
    }
}

/// Contents of the recording info file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingInfo {
    /// Total recording duration in milliseconds
    pub total_ms: u32,
    /// Number of packets across all data files
    pub total_packets: u32,
    /// Number of data files (`tp-rdp-1.tpd` ..)
    pub file_count: u32,
}

impl RecordingInfo {
    pub fn decode(buf: &[u8; RECORDING_INFO_LEN]) -> Result<Self, String> {
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != RECORDING_INFO_MAGIC {
            return Err(format!("bad magic 0x{:08x}", magic));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != RECORDING_INFO_VERSION {
            return Err(format!("unsupported version {}", version));
        }

        let info = Self {
            total_ms: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            total_packets: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            file_count: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
        };

        if info.file_count == 0 {
            return Err("declares zero data files".to_string());
        }

        Ok(info)
    }

    pub fn encode(&self) -> [u8; RECORDING_INFO_LEN] {
        let mut buf = [0u8; RECORDING_INFO_LEN];
        buf[0..4].copy_from_slice(&RECORDING_INFO_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&RECORDING_INFO_VERSION.to_le_bytes());
        buf[8..12].copy_from_slice(&self.total_ms.to_le_bytes());
        buf[12..16].copy_from_slice(&self.total_packets.to_le_bytes());
        buf[16..20].copy_from_slice(&self.file_count.to_le_bytes());
        buf
    }
}
