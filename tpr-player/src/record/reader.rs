//! Sequential packet reader for one data file

use crate::error::{Error, Result};
use crate::record::format::{Packet, PacketHeader, PACKET_HEADER_LEN};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Reads packets from a single data file in on-disk order.
///
/// A clean end of file between records yields `Ok(None)`. A header or
/// payload cut short is a `CorruptRecording` error; the partial packet is
/// never returned.
pub struct PacketReader<R> {
    inner: R,
    path: PathBuf,
    packets_read: u64,
}

impl PacketReader<BufReader<File>> {
    /// Open a data file, mapping failures to `FileOpen`
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: Read> PacketReader<R> {
    /// Wrap an arbitrary byte source; `path` is only used in error messages
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            packets_read: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Packets successfully decoded so far
    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    /// Read the next packet
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        let mut header_buf = [0u8; PACKET_HEADER_LEN];
        let n = self.read_full(&mut header_buf)?;
        if n == 0 {
            return Ok(None);
        }
        if n < PACKET_HEADER_LEN {
            return Err(Error::corrupt(
                &self.path,
                format!("short header read ({} of {} bytes)", n, PACKET_HEADER_LEN),
            ));
        }

        let header =
            PacketHeader::decode(&header_buf).map_err(|reason| Error::corrupt(&self.path, reason))?;

        let size = header.payload_size as usize;
        let mut payload = vec![0u8; size];
        let n = self.read_full(&mut payload)?;
        if n < size {
            return Err(Error::corrupt(
                &self.path,
                format!("short payload read ({} of {} bytes)", n, size),
            ));
        }

        self.packets_read += 1;
        trace!(
            "Read packet {:?} offset={}ms size={} from {}",
            header.kind,
            header.offset_ms,
            size,
            self.path.display()
        );

        Ok(Some(Packet::new(header.kind, header.offset_ms, payload)))
    }

    /// Fill `buf` as far as the source allows, returning the byte count.
    /// Only a true end of input stops short.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(Error::corrupt(&self.path, format!("read failed: {}", e)));
                }
            }
        }
        Ok(filled)
    }
}
