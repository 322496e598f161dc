//! Block file reader
//!
//! Every read validates the record checksum. Sequential scans are used to
//! rebuild the location index on open; positioned reads serve lookups.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::errors::{BlockStoreError, BlockStoreResult};
use super::record::{TxRecord, RECORD_OVERHEAD};
use super::types::FileLocPointer;

/// Reader over the block file.
pub struct BlockFileReader {
    path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl BlockFileReader {
    /// Opens the block file for reading.
    pub fn open(path: &Path) -> BlockStoreResult<Self> {
        let file = File::open(path)
            .map_err(|e| BlockStoreError::io(format!("failed to open {}", path.display()), e))?;
        let file_size = file
            .metadata()
            .map_err(|e| BlockStoreError::io("failed to read block file metadata", e))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next record of a sequential scan.
    ///
    /// Returns `Ok(None)` at end of file. A partial record at the tail is
    /// reported as corruption.
    pub fn read_next(&mut self) -> BlockStoreResult<Option<(FileLocPointer, TxRecord)>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < RECORD_OVERHEAD as u64 {
            return Err(BlockStoreError::corruption(
                self.current_offset,
                format!("truncated block file: {} trailing bytes", remaining),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            BlockStoreError::corruption(
                self.current_offset,
                format!("failed to read record length: {}", e),
            )
        })?;
        let length = u32::from_le_bytes(len_buf) as u64;

        if length < RECORD_OVERHEAD as u64 || length > remaining {
            return Err(BlockStoreError::corruption(
                self.current_offset,
                format!("record length {} out of bounds ({} remaining)", length, remaining),
            ));
        }

        let mut buf = vec![0u8; length as usize];
        buf[..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut buf[4..]).map_err(|e| {
            BlockStoreError::corruption(
                self.current_offset,
                format!("failed to read record body: {}", e),
            )
        })?;

        let (record, consumed) = TxRecord::deserialize(&buf, self.current_offset)?;
        let location = FileLocPointer::new(self.current_offset, consumed as u64);
        self.current_offset += consumed as u64;

        Ok(Some((location, record)))
    }

    /// Reads the record at `location`, validating its checksum and length.
    pub fn read_at(&mut self, location: FileLocPointer) -> BlockStoreResult<TxRecord> {
        self.reader
            .seek(SeekFrom::Start(location.offset))
            .map_err(|e| {
                BlockStoreError::io(format!("failed to seek to offset {}", location.offset), e)
            })?;

        let mut buf = vec![0u8; location.length as usize];
        self.reader.read_exact(&mut buf).map_err(|e| {
            BlockStoreError::corruption(
                location.offset,
                format!("failed to read {} bytes: {}", location.length, e),
            )
        })?;
        self.current_offset = location.offset + location.length;

        let (record, consumed) = TxRecord::deserialize(&buf, location.offset)?;
        if consumed as u64 != location.length {
            return Err(BlockStoreError::corruption(
                location.offset,
                format!(
                    "record length {} does not match location length {}",
                    consumed, location.length
                ),
            ));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::super::writer::BlockFileWriter;
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_records(dir: &Path, records: &[TxRecord]) -> (PathBuf, Vec<FileLocPointer>) {
        let mut writer = BlockFileWriter::open(dir).unwrap();
        let locs = writer.append(records).unwrap();
        (writer.path().to_path_buf(), locs)
    }

    #[test]
    fn test_sequential_scan() {
        let tmp = TempDir::new().unwrap();
        let records = vec![
            TxRecord::new(0, 0, b"a".to_vec()),
            TxRecord::new(1, 0, b"bb".to_vec()),
            TxRecord::new(1, 1, b"ccc".to_vec()),
        ];
        let (path, locs) = write_records(tmp.path(), &records);

        let mut reader = BlockFileReader::open(&path).unwrap();
        let mut scanned = Vec::new();
        while let Some(entry) = reader.read_next().unwrap() {
            scanned.push(entry);
        }

        assert_eq!(scanned.len(), 3);
        for (i, (loc, record)) in scanned.iter().enumerate() {
            assert_eq!(*loc, locs[i]);
            assert_eq!(*record, records[i]);
        }
    }

    #[test]
    fn test_read_at() {
        let tmp = TempDir::new().unwrap();
        let records = vec![
            TxRecord::new(4, 0, b"zero".to_vec()),
            TxRecord::new(4, 1, b"one".to_vec()),
        ];
        let (path, locs) = write_records(tmp.path(), &records);

        let mut reader = BlockFileReader::open(&path).unwrap();
        assert_eq!(reader.read_at(locs[1]).unwrap(), records[1]);
        assert_eq!(reader.read_at(locs[0]).unwrap(), records[0]);
    }

    #[test]
    fn test_read_at_wrong_length_fails() {
        let tmp = TempDir::new().unwrap();
        let (path, locs) = write_records(
            tmp.path(),
            &[
                TxRecord::new(0, 0, b"x".to_vec()),
                TxRecord::new(0, 1, b"y".to_vec()),
            ],
        );

        let mut reader = BlockFileReader::open(&path).unwrap();
        let wide = FileLocPointer::new(locs[0].offset, locs[0].length + locs[1].length);
        assert!(reader.read_at(wide).unwrap_err().is_corruption());
    }

    #[test]
    fn test_truncated_tail_detected() {
        let tmp = TempDir::new().unwrap();
        let (path, _) = write_records(tmp.path(), &[TxRecord::new(0, 0, b"ok".to_vec())]);
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[1, 2, 3]).unwrap();
        }

        let mut reader = BlockFileReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_some());
        assert!(reader.read_next().unwrap_err().is_corruption());
    }
}
