//! An append/random-read-by-page file with a fixed-size page unit (§3,
//! §6). Page 0 is reserved for metadata (currently just the record page
//! count) and is written on `close`. Generalizes the teacher's read-only
//! `pager::Pager` (same on-demand page cache, same `PageNum` newtype
//! idea) to support appending new pages, which this engine's write path
//! needs and the teacher's SQLite reader did not.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub type PageNum = usize;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to open paged file {0}: {1}")]
    OpenFailed(PathBuf, std::io::Error),
    #[error("failed to read page {0}: {1}")]
    ReadFailed(PageNum, std::io::Error),
    #[error("failed to write page: {0}")]
    WriteFailed(std::io::Error),
    #[error("page number {0} is beyond the file's page count ({1})")]
    PageNumberBeyondLimits(PageNum, usize),
    #[error("page must be exactly {expected} bytes, got {actual}")]
    WrongPageSize { expected: usize, actual: usize },
}

/// An append/random-read file of fixed-size pages. Record page indices
/// are 0-based and exclude the reserved metadata page (file page 0).
pub struct PagedFile {
    file: File,
    page_size: usize,
    record_page_count: usize,
    cache: Vec<Option<Vec<u8>>>,
}

impl PagedFile {
    pub fn create(path: impl AsRef<Path>, page_size: usize) -> Result<PagedFile, Error> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::OpenFailed(path.to_path_buf(), e))?;
        file.write_all(&vec![0u8; page_size]).map_err(Error::WriteFailed)?;
        Ok(PagedFile { file, page_size, record_page_count: 0, cache: vec![] })
    }

    pub fn open(path: impl AsRef<Path>, page_size: usize) -> Result<PagedFile, Error> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| Error::OpenFailed(path.to_path_buf(), e))?;
        let mut meta = vec![0u8; page_size];
        file.seek(SeekFrom::Start(0)).map_err(Error::WriteFailed)?;
        file.read_exact(&mut meta).map_err(|e| Error::ReadFailed(0, e))?;
        let record_page_count = u32::from_le_bytes(meta[0..4].try_into().unwrap()) as usize;
        Ok(PagedFile { file, page_size, record_page_count, cache: vec![None; record_page_count] })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.record_page_count
    }

    /// Appends a page of exactly `page_size` bytes, returning its
    /// (0-based) record page index. Once appended, `get_page(k)` for that
    /// index is stable for the remainder of the file's life.
    pub fn append_page(&mut self, bytes: &[u8]) -> Result<PageNum, Error> {
        if bytes.len() != self.page_size {
            return Err(Error::WrongPageSize { expected: self.page_size, actual: bytes.len() });
        }
        let file_offset = (self.record_page_count as u64 + 1) * self.page_size as u64;
        self.file.seek(SeekFrom::Start(file_offset)).map_err(Error::WriteFailed)?;
        self.file.write_all(bytes).map_err(Error::WriteFailed)?;
        let idx = self.record_page_count;
        self.record_page_count += 1;
        self.cache.push(Some(bytes.to_vec()));
        Ok(idx)
    }

    pub fn get_page(&mut self, idx: PageNum) -> Result<&[u8], Error> {
        if idx >= self.record_page_count {
            return Err(Error::PageNumberBeyondLimits(idx, self.record_page_count));
        }
        if self.cache[idx].is_none() {
            let file_offset = (idx as u64 + 1) * self.page_size as u64;
            self.file.seek(SeekFrom::Start(file_offset)).map_err(|e| Error::ReadFailed(idx, e))?;
            let mut buf = vec![0u8; self.page_size];
            self.file.read_exact(&mut buf).map_err(|e| Error::ReadFailed(idx, e))?;
            self.cache[idx] = Some(buf);
        }
        Ok(self.cache[idx].as_ref().unwrap())
    }

    /// Writes the metadata page (record page count) and flushes. Must be
    /// called for the record page count to be recovered on a later
    /// `open`; page 0 is otherwise left as it was at `create` time.
    pub fn close(&mut self) -> Result<(), Error> {
        let mut meta = vec![0u8; self.page_size];
        meta[0..4].copy_from_slice(&(self.record_page_count as u32).to_le_bytes());
        self.file.seek(SeekFrom::Start(0)).map_err(Error::WriteFailed)?;
        self.file.write_all(&meta).map_err(Error::WriteFailed)?;
        self.file.flush().map_err(Error::WriteFailed)?;
        Ok(())
    }
}
