//! # Frame Synchronizer
//!
//! Locates frame boundaries in the raw stream. The link has no reliable
//! framing, so the synchronizer scans byte by byte for the init marker and
//! only accepts it when the following header byte carries a valid CRC-4.

use tracing::{debug, trace};

use super::protocol::{FrameHeader, INIT_MARKER};
use crate::crc::engine::{compute_over_integer, CrcParams};
use crate::crc::remainder::check_over_integer;
use crate::error::{ChecksumKind, ForceSensorError, Result};
use crate::serial::ByteSource;

/// Default number of single-byte reads before giving up
pub const DEFAULT_MAX_SCAN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Looking for the init marker
    Searching,
    /// Header consumed; the frame body is next on the wire
    Synchronized,
}

/// Check a header's CRC-4 over `INIT_MARKER << 4 | sequence_counter`
pub fn check_header(header: &FrameHeader) -> bool {
    check_over_integer(
        header.protected_value(),
        u32::from(header.header_crc),
        CrcParams::CRC4,
    )
}

/// Two-state synchronizer with a bounded scan budget
#[derive(Debug, Clone)]
pub struct FrameSynchronizer {
    state: SyncState,
    max_scan: usize,
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCAN)
    }
}

impl FrameSynchronizer {
    pub fn new(max_scan: usize) -> Self {
        Self {
            state: SyncState::Searching,
            max_scan,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn max_scan(&self) -> usize {
        self.max_scan
    }

    /// Scan for the next valid frame header
    ///
    /// Each iteration reads one byte; reads that time out empty still count
    /// against the budget, so this never waits longer than `max_scan` read
    /// timeouts. On success the header has been consumed and the frame body
    /// is next on the wire.
    ///
    /// # Errors
    ///
    /// - [`ForceSensorError::SynchronizationTimeout`] if no marker turned up
    /// - [`ForceSensorError::ChecksumMismatch`] if a marker was followed by a
    ///   header failing its CRC-4; the next call resumes the search
    /// - [`ForceSensorError::Io`] if the source fails
    pub async fn synchronize<S>(&mut self, source: &mut S) -> Result<FrameHeader>
    where
        S: ByteSource + ?Sized,
    {
        self.state = SyncState::Searching;

        for scanned in 1..=self.max_scan {
            let byte = source.read(1).await?;
            if byte.first() != Some(&INIT_MARKER) {
                continue;
            }

            let next = source.read(1).await?;
            let Some(&raw) = next.first() else {
                trace!("Init marker at byte {} but header byte timed out", scanned);
                continue;
            };

            let header = FrameHeader::from_byte(raw);
            if !check_header(&header) {
                let expected = compute_over_integer(header.protected_value(), CrcParams::CRC4);
                debug!(
                    "Rejected header 0x{:02X} after {} bytes (CRC-4 0x{:X}, expected 0x{:X})",
                    raw, scanned, header.header_crc, expected
                );
                return Err(ForceSensorError::ChecksumMismatch {
                    kind: ChecksumKind::Header,
                    expected,
                    actual: u32::from(header.header_crc),
                });
            }

            trace!("Synchronized after {} bytes, sequence {}", scanned, header.sequence_counter);
            self.state = SyncState::Synchronized;
            return Ok(header);
        }

        Err(ForceSensorError::SynchronizationTimeout {
            scanned: self.max_scan,
        })
    }
}
