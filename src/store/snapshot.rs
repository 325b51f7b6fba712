//! Snapshot file
//!
//! Full image of every table, written when the WAL is checkpointed.
//!
//! ## File Format
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────────┬──────────┐
//! │Magic (4) │Version(2)│ Len (8)  │ bincode(image)   │ CRC32(4) │
//! └──────────┴──────────┴──────────┴──────────────────┴──────────┘
//! ```
//! Integers are little-endian; the CRC covers the image bytes. The file is
//! written to a temporary name and renamed into place.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::entity::DynamicEntity;
use crate::error::{Result, TableError};

pub const MAGIC: &[u8; 4] = b"TKVS";
pub const VERSION: u16 = 1;
const HEADER_SIZE: usize = 4 + 2 + 8;
const FOOTER_SIZE: usize = 4;

/// Everything needed to rebuild the store without the WAL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Highest entity version assigned
    pub version: u64,

    /// LSN of the last WAL entry folded into this image
    pub last_lsn: u64,

    pub tables: Vec<TableImage>,
}

/// One table inside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableImage {
    pub name: String,
    pub entities: Vec<DynamicEntity>,
}

/// Write a snapshot atomically
pub fn write(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let image = bincode::serialize(snapshot)?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + image.len() + FOOTER_SIZE);
    buf.put_slice(MAGIC);
    buf.put_u16_le(VERSION);
    buf.put_u64_le(image.len() as u64);
    buf.put_slice(&image);
    buf.put_u32_le(crc32fast::hash(&image));

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Read and verify a snapshot
pub fn read(path: &Path) -> Result<Snapshot> {
    let data = fs::read(path)?;

    if data.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(TableError::SnapshotCorruption(format!(
            "{} is only {} bytes",
            path.display(),
            data.len()
        )));
    }

    let mut header = &data[..HEADER_SIZE];
    if &header[..4] != MAGIC {
        return Err(TableError::SnapshotCorruption("bad magic".to_string()));
    }
    header.advance(4);

    let version = header.get_u16_le();
    if version != VERSION {
        return Err(TableError::SnapshotCorruption(format!(
            "unsupported version {}",
            version
        )));
    }

    let len = header.get_u64_le() as usize;
    if data.len() != HEADER_SIZE + len + FOOTER_SIZE {
        return Err(TableError::SnapshotCorruption(format!(
            "expected {} image bytes, file holds {}",
            len,
            data.len().saturating_sub(HEADER_SIZE + FOOTER_SIZE)
        )));
    }

    let image = &data[HEADER_SIZE..HEADER_SIZE + len];
    let mut footer = &data[HEADER_SIZE + len..];
    let stored_crc = footer.get_u32_le();
    if crc32fast::hash(image) != stored_crc {
        return Err(TableError::SnapshotCorruption("CRC mismatch".to_string()));
    }

    Ok(bincode::deserialize(image)?)
}
