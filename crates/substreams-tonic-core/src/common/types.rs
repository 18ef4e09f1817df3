//! # Block range types
//!
//! A substreams run covers a contiguous range of blocks. The start block is
//! always known; the stop block is optional, and its absence means the
//! service keeps streaming new blocks for as long as the session lives.
//!
//! On the wire the range is encoded as `start_block_num` (`int64`) and
//! `stop_block_num` (`uint64`, where `0` means "unbounded"). [`RequestedRange`]
//! holds the validated form so request assembly never sees a range the
//! service would interpret differently from what the caller asked for.

use crate::{Error, Result};

/// Validated `[start, stop)` block range for a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedRange {
    start: u64,
    stop: Option<u64>,
}

impl RequestedRange {
    /// Creates a range, rejecting a stop block that is not strictly greater
    /// than the start block and a start block the wire format cannot carry.
    pub fn new(start: u64, stop: Option<u64>) -> Result<Self> {
        if i64::try_from(start).is_err() {
            return Err(Error::invalid_config(format!(
                "start block {start} exceeds the maximum of {}",
                i64::MAX
            )));
        }
        match stop {
            Some(stop) if stop <= start => Err(Error::invalid_config(format!(
                "stop block ({stop}) must be greater than start block ({start})"
            ))),
            _ => Ok(Self { start, stop }),
        }
    }

    /// Range with no stop block: the session streams until it is ended
    /// externally.
    pub fn open_ended(start: u64) -> Result<Self> {
        Self::new(start, None)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn stop(&self) -> Option<u64> {
        self.stop
    }

    pub fn is_open_ended(&self) -> bool {
        self.stop.is_none()
    }

    /// `start_block_num` as carried on the wire.
    pub(crate) fn wire_start(&self) -> i64 {
        // Checked in `new`.
        self.start as i64
    }

    /// `stop_block_num` as carried on the wire, `0` when unbounded.
    pub(crate) fn wire_stop(&self) -> u64 {
        self.stop.unwrap_or(0)
    }
}
