//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::entity::DynamicEntity;
use crate::error::{Result, TableError};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest payload a frame may claim before it is treated as corrupt
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
///
/// `Write` carries the full post-write state of every entity it touches, so
/// replaying it twice is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a table
    CreateTable { table: String },

    /// Store entities (one frame per single write or per batch)
    Write {
        table: String,
        entities: Vec<DynamicEntity>,
        /// Highest entity version assigned so far
        version: u64,
    },
}

/// Borrowed twin of [`WalEntry`] so appends don't clone the operation
#[derive(Serialize)]
struct WalEntryRef<'a> {
    lsn: u64,
    operation: &'a Operation,
    timestamp: u64,
}

/// Frame header as read from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub fn decode(mut bytes: &[u8]) -> Self {
        Self {
            lsn: bytes.get_u64_le(),
            crc: bytes.get_u32_le(),
            len: bytes.get_u32_le(),
        }
    }
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self {
            lsn,
            operation,
            timestamp: now_millis(),
        }
    }

    /// Encode this entry as a complete frame
    pub fn encode(&self) -> Result<Bytes> {
        encode_frame(self.lsn, &self.operation, self.timestamp)
    }

    /// Decode a payload whose header has already been read
    pub fn decode(header: &FrameHeader, payload: &[u8]) -> Result<Self> {
        let crc = crc32fast::hash(payload);
        if crc != header.crc {
            return Err(TableError::WalCorruption(format!(
                "CRC mismatch at LSN {}: expected {:08x}, got {:08x}",
                header.lsn, header.crc, crc
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload).map_err(|e| {
            TableError::WalCorruption(format!("undecodable entry at LSN {}: {}", header.lsn, e))
        })?;

        if entry.lsn != header.lsn {
            return Err(TableError::WalCorruption(format!(
                "header LSN {} does not match entry LSN {}",
                header.lsn, entry.lsn
            )));
        }

        Ok(entry)
    }
}

/// Build a frame: LSN (8) | CRC32 of payload (4) | payload len (4) | payload
pub fn encode_frame(lsn: u64, operation: &Operation, timestamp: u64) -> Result<Bytes> {
    let payload = bincode::serialize(&WalEntryRef {
        lsn,
        operation,
        timestamp,
    })?;

    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(TableError::Storage(format!(
            "WAL entry too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u64_le(lsn);
    frame.put_u32_le(crc32fast::hash(&payload));
    frame.put_u32_le(payload.len() as u32);
    frame.put_slice(&payload);

    Ok(frame.freeze())
}

pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
