//! Append-only block file writer
//!
//! Records are only ever appended. Each block is written with a single
//! `write_all` followed by `sync_all`, so a block is durable before its
//! locations are published.
//!
//! The file never extends past `current_offset` once an append returns: a
//! failed write or fsync truncates the partial bytes away, and any tail left
//! beyond the offset is cut before the next append.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use super::errors::{BlockStoreError, BlockStoreResult};
use super::record::TxRecord;
use super::types::FileLocPointer;

/// Name of the block file inside the store directory.
pub const BLOCK_FILE_NAME: &str = "blocks.dat";

/// Writer holding the block file open for append.
pub struct BlockFileWriter {
    path: PathBuf,
    file: File,
    current_offset: u64,
}

impl BlockFileWriter {
    /// Opens or creates `<dir>/blocks.dat`, creating `dir` if missing.
    pub fn open(dir: &Path) -> BlockStoreResult<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                BlockStoreError::io(format!("failed to create {}", dir.display()), e)
            })?;
        }

        let path = dir.join(BLOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| BlockStoreError::io(format!("failed to open {}", path.display()), e))?;

        let current_offset = file
            .metadata()
            .map_err(|e| BlockStoreError::io("failed to read block file metadata", e))?
            .len();

        Ok(Self {
            path,
            file,
            current_offset,
        })
    }

    /// Path of the block file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset the next record will be written at.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Appends `records` and fsyncs.
    ///
    /// Returns the location of each record, in input order. On error the file
    /// is truncated back to the offset it had before the call.
    pub fn append(&mut self, records: &[TxRecord]) -> BlockStoreResult<Vec<FileLocPointer>> {
        self.truncate_torn_tail()?;

        let mut buf = Vec::new();
        let mut locations = Vec::with_capacity(records.len());
        let mut offset = self.current_offset;

        for record in records {
            let bytes = record.serialize();
            locations.push(FileLocPointer::new(offset, bytes.len() as u64));
            offset += bytes.len() as u64;
            buf.extend(bytes);
        }

        if let Err(e) = self.file.write_all(&buf) {
            self.roll_back();
            return Err(BlockStoreError::io("failed to append block records", e));
        }
        if let Err(e) = self.file.sync_all() {
            self.roll_back();
            return Err(BlockStoreError::io("fsync failed after appending block", e));
        }

        self.current_offset = offset;
        Ok(locations)
    }

    /// Cuts bytes past `current_offset` left by an append that failed
    /// without being rolled back.
    fn truncate_torn_tail(&mut self) -> BlockStoreResult<()> {
        let len = self
            .file
            .metadata()
            .map_err(|e| BlockStoreError::io("failed to read block file metadata", e))?
            .len();
        if len == self.current_offset {
            return Ok(());
        }

        warn!(
            path = %self.path.display(),
            len,
            offset = self.current_offset,
            "truncating torn block file tail"
        );
        self.file
            .set_len(self.current_offset)
            .and_then(|_| self.file.sync_all())
            .map_err(|e| BlockStoreError::io("failed to truncate torn block file tail", e))
    }

    fn roll_back(&mut self) {
        if let Err(e) = self
            .file
            .set_len(self.current_offset)
            .and_then(|_| self.file.sync_all())
        {
            // Retried by truncate_torn_tail on the next append.
            error!(
                path = %self.path.display(),
                offset = self.current_offset,
                error = %e,
                "failed to roll back partial append"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockstore::BlockFileReader;
    use tempfile::TempDir;

    #[test]
    fn test_creates_directory_and_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("chain");
        let writer = BlockFileWriter::open(&dir).unwrap();
        assert!(writer.path().exists());
        assert_eq!(writer.current_offset(), 0);
    }

    #[test]
    fn test_append_reports_contiguous_locations() {
        let tmp = TempDir::new().unwrap();
        let mut writer = BlockFileWriter::open(tmp.path()).unwrap();

        let records = vec![
            TxRecord::new(0, 0, b"first".to_vec()),
            TxRecord::new(0, 1, b"second-payload".to_vec()),
        ];
        let locs = writer.append(&records).unwrap();

        assert_eq!(locs[0].offset, 0);
        assert_eq!(locs[0].length, records[0].encoded_len() as u64);
        assert_eq!(locs[1].offset, locs[0].length);
        assert_eq!(writer.current_offset(), locs[1].offset + locs[1].length);
    }

    #[test]
    fn test_append_cuts_partial_tail() {
        let tmp = TempDir::new().unwrap();
        let mut writer = BlockFileWriter::open(tmp.path()).unwrap();
        let first = writer.append(&[TxRecord::new(0, 0, b"genesis".to_vec())]).unwrap();
        let end = writer.current_offset();

        // Leftover of an append that died halfway through its write.
        {
            let mut file = OpenOptions::new().append(true).open(writer.path()).unwrap();
            file.write_all(&[0x55; 100]).unwrap();
        }

        let record = TxRecord::new(1, 0, b"next".to_vec());
        let locs = writer.append(&[record.clone()]).unwrap();
        assert_eq!(locs[0].offset, end);
        assert_eq!(
            fs::metadata(writer.path()).unwrap().len(),
            end + record.encoded_len() as u64
        );

        let mut reader = BlockFileReader::open(writer.path()).unwrap();
        assert_eq!(reader.read_at(first[0]).unwrap().block_num, 0);
        assert_eq!(reader.read_at(locs[0]).unwrap(), record);
    }

    #[test]
    fn test_reopen_resumes_at_end() {
        let tmp = TempDir::new().unwrap();
        let end = {
            let mut writer = BlockFileWriter::open(tmp.path()).unwrap();
            writer.append(&[TxRecord::new(0, 0, vec![7; 10])]).unwrap();
            writer.current_offset()
        };

        let writer = BlockFileWriter::open(tmp.path()).unwrap();
        assert_eq!(writer.current_offset(), end);
    }
}
