//! Recording files and the packet producer
//!
//! A recording is one or more data files read as a single logical packet
//! stream, optionally described by an info file.

pub mod format;
pub mod reader;
pub mod source;

pub use format::{Packet, PacketKind, RecordingInfo};
pub use reader::PacketReader;
pub use source::RecordSource;

use crate::error::{Error, Result};
use format::{data_file_name, INFO_FILE_NAME, RECORDING_INFO_LEN};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An ordered set of data files plus optional recording metadata
#[derive(Debug, Clone)]
pub struct Recording {
    files: Vec<PathBuf>,
    info: Option<RecordingInfo>,
}

impl Recording {
    /// Build a recording from an explicit, ordered list of data files
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self { files, info: None }
    }

    /// Attach metadata (declared totals) to the recording
    pub fn with_info(mut self, info: RecordingInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Open a recording directory.
    ///
    /// With an info file the declared number of data files is listed (a
    /// missing one surfaces later as `FileOpen` during playback). Without
    /// one, `tp-rdp-1.tpd`, `tp-rdp-2.tpd`, ... are discovered up to the
    /// first gap.
    pub fn open(dir: &Path) -> Result<Self> {
        let info = read_info(&dir.join(INFO_FILE_NAME))?;

        let files: Vec<PathBuf> = match info {
            Some(info) => (1..=info.file_count as usize)
                .map(|n| dir.join(data_file_name(n)))
                .collect(),
            None => (1..)
                .map(|n| dir.join(data_file_name(n)))
                .take_while(|path| path.is_file())
                .collect(),
        };

        if files.is_empty() {
            return Err(Error::FileOpen {
                path: dir.join(data_file_name(1)),
                source: std::io::Error::new(ErrorKind::NotFound, "no data files in recording"),
            });
        }

        info!(
            "Opened recording {}: {} data file(s), info={:?}",
            dir.display(),
            files.len(),
            info
        );

        Ok(Self { files, info })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn info(&self) -> Option<&RecordingInfo> {
        self.info.as_ref()
    }

    /// Declared total packet count, if known
    pub fn total_packets(&self) -> Option<u64> {
        self.info.map(|i| u64::from(i.total_packets))
    }

    /// Declared total duration, if known
    pub fn total_ms(&self) -> Option<u64> {
        self.info.map(|i| u64::from(i.total_ms))
    }
}

/// Read the info file; absence is not an error, a malformed file is
fn read_info(path: &Path) -> Result<Option<RecordingInfo>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No info file at {}", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(Error::FileOpen {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut buf = [0u8; RECORDING_INFO_LEN];
    file.read_exact(&mut buf)
        .map_err(|e| Error::corrupt(path, format!("short info file: {}", e)))?;

    RecordingInfo::decode(&buf)
        .map(Some)
        .map_err(|reason| Error::corrupt(path, reason))
}
