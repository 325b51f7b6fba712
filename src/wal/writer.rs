//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! Each frame goes to the file in a single unbuffered write. If that write
//! (or its fsync) fails, the file is cut back to the end of the last good
//! frame before the error is returned, so a torn frame never sits in front
//! of later ones.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::entry::{encode_frame, now_millis};
use super::Operation;
use crate::config::WalSyncStrategy;
use crate::error::Result;

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries written since the last fsync
    unsynced: usize,
    /// Bytes of complete frames in the file
    size: u64,
    /// Set when a failed append may have left bytes past `size`
    torn: bool,
}

impl WalWriter {
    /// Open or create a WAL file, appending after any existing frames
    ///
    /// `next_lsn` is the LSN the next appended entry receives.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
            size,
            torn: false,
        })
    }

    /// Append an operation; returns its LSN
    ///
    /// The frame always reaches the OS before this returns; fsync follows the
    /// sync strategy. On error nothing is appended and the LSN is not used.
    pub fn append(&mut self, operation: &Operation) -> Result<u64> {
        if self.torn {
            self.rollback()?;
        }

        let lsn = self.next_lsn;
        let frame = encode_frame(lsn, operation, now_millis())?;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count.max(1),
        };

        let written = self.file.write_all(&frame).and_then(|()| {
            if due {
                self.file.sync_data()
            } else {
                Ok(())
            }
        });

        if let Err(e) = written {
            self.torn = true;
            if let Err(rollback) = self.rollback() {
                tracing::warn!(
                    "WAL {}: rollback after failed append of LSN {} failed: {}",
                    self.path.display(),
                    lsn,
                    rollback
                );
            }
            return Err(e.into());
        }

        self.next_lsn += 1;
        self.size += frame.len() as u64;
        self.unsynced = if due { 0 } else { self.unsynced + 1 };

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every frame (after a snapshot made them redundant)
    ///
    /// LSNs keep counting from where they were.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.size = 0;
        self.unsynced = 0;
        self.torn = false;
        Ok(())
    }

    /// LSN of the last appended entry (0 if none yet)
    pub fn last_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    /// Current file size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cut the file back to the end of the last complete frame
    fn rollback(&mut self) -> Result<()> {
        self.file.set_len(self.size)?;
        self.file.sync_data()?;
        self.torn = false;
        tracing::debug!(
            "WAL {}: rolled back to {} bytes",
            self.path.display(),
            self.size
        );
        Ok(())
    }
}
