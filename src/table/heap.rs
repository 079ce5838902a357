//! Heap table (§4.4): an unordered append log of pages, backed by one
//! `PagedFile`. Reads happen in insertion order. Grounded on the
//! source's `Heap.cc`/`Heap.h`; the teacher's read-only `table.rs` gave
//! the read-cursor shape (`(page_index, in_page_iterator)`), generalized
//! here to also support writes.

use crate::page::Page;
use crate::paged_file::PagedFile;
use crate::predicate::{self, AndList};
use crate::record::Record;
use crate::schema::Schema;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    PagedFile(#[from] crate::paged_file::Error),
    #[error(transparent)]
    Record(#[from] crate::record::Error),
}

pub struct HeapTable {
    file: PagedFile,
    schema: Schema,
    path: PathBuf,
    page_size: usize,
    write_page: Page,
    dirty: bool,
    read_page_idx: usize,
    read_page: Option<Page>,
}

impl HeapTable {
    pub fn create(path: impl AsRef<Path>, schema: Schema, page_size: usize) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = PagedFile::create(&path, page_size)?;
        Ok(HeapTable {
            file,
            schema,
            path,
            page_size,
            write_page: Page::empty(page_size),
            dirty: false,
            read_page_idx: 0,
            read_page: None,
        })
    }

    pub fn open(path: impl AsRef<Path>, schema: Schema, page_size: usize) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = PagedFile::open(&path, page_size)?;
        Ok(HeapTable {
            file,
            schema,
            path,
            page_size,
            write_page: Page::empty(page_size),
            dirty: false,
            read_page_idx: 0,
            read_page: None,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.file.page_count()
    }

    /// Appends a record to the resident write page, flushing it to the
    /// file and starting a fresh page when full.
    pub fn add(&mut self, record: Record) -> Result<(), Error> {
        match self.write_page.append(record) {
            Ok(()) => {
                self.dirty = true;
                Ok(())
            }
            Err(record) => {
                self.flush_write_page()?;
                self.write_page.append(record).expect("a single record must fit an empty page");
                self.dirty = true;
                Ok(())
            }
        }
    }

    /// Any read first flushes the dirty resident page so the on-disk
    /// view is consistent (§4.4).
    fn flush_write_page(&mut self) -> Result<(), Error> {
        if self.dirty && !self.write_page.is_empty() {
            self.file.append_page(&self.write_page.serialize())?;
            self.write_page = Page::empty(self.page_size);
            self.dirty = false;
        }
        Ok(())
    }

    pub fn move_first(&mut self) -> Result<(), Error> {
        self.flush_write_page()?;
        self.read_page_idx = 0;
        self.read_page = None;
        Ok(())
    }

    /// Repositions the read cursor to start at page `idx`, for the
    /// sorted table's binary-probed scan. Caller is responsible for
    /// calling `move_first` first if a fresh flush is needed.
    pub fn seek_to_page(&mut self, idx: usize) -> Result<(), Error> {
        self.read_page_idx = idx;
        self.read_page = None;
        Ok(())
    }

    pub fn get_next(&mut self) -> Result<Option<Record>, Error> {
        loop {
            if let Some(p) = self.read_page.as_mut() {
                if let Some(r) = p.get_first() {
                    return Ok(Some(r));
                }
            }
            if self.read_page_idx >= self.file.page_count() {
                return Ok(None);
            }
            let bytes = self.file.get_page(self.read_page_idx)?;
            self.read_page = Some(Page::deserialize(bytes));
            self.read_page_idx += 1;
        }
    }

    /// Naive filtered scan: advances `get_next` until the predicate
    /// holds or the table is exhausted.
    pub fn get_next_matching(&mut self, pred: &AndList) -> Result<Option<Record>, Error> {
        loop {
            match self.get_next()? {
                None => return Ok(None),
                Some(r) => {
                    if predicate::evaluate(pred, &r, None) {
                        return Ok(Some(r));
                    }
                }
            }
        }
    }

    /// Reads a raw page by index, for the sorted table's binary probe.
    pub fn raw_page(&mut self, idx: usize) -> Result<Page, Error> {
        Ok(Page::deserialize(self.file.get_page(idx)?))
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.flush_write_page()?;
        self.file.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::types::{Type, Value::Int};

    fn schema() -> Schema {
        Schema::new("t", vec![Attribute::new("a", Type::Int)])
    }

    #[test]
    fn write_then_read_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bin");
        {
            let mut t = HeapTable::create(&path, schema(), 256).unwrap();
            for i in 0..10 {
                t.add(Record::new(&[Int(i)], 256).unwrap()).unwrap();
            }
            t.close().unwrap();
        }
        let mut t = HeapTable::open(&path, schema(), 256).unwrap();
        t.move_first().unwrap();
        let mut seen = vec![];
        while let Some(r) = t.get_next().unwrap() {
            if let Int(v) = r.get(0).unwrap() {
                seen.push(v);
            }
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn read_flushes_dirty_resident_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bin");
        let mut t = HeapTable::create(&path, schema(), 256).unwrap();
        t.add(Record::new(&[Int(1)], 256).unwrap()).unwrap();
        t.move_first().unwrap();
        assert_eq!(t.get_next().unwrap().unwrap().get(0).unwrap(), Int(1));
        assert_eq!(t.get_next().unwrap(), None);
    }

    #[test]
    fn get_next_matching_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bin");
        let mut t = HeapTable::create(&path, schema(), 256).unwrap();
        for i in 0..5 {
            t.add(Record::new(&[Int(i)], 256).unwrap()).unwrap();
        }
        t.move_first().unwrap();
        use crate::predicate::{Comparison, CompareOp, Operand, Side};
        let pred: AndList = vec![vec![Comparison {
            op: CompareOp::Eq,
            left: Operand::Attribute { side: Side::Left, index: 0 },
            right: Operand::Literal(Int(3)),
        }]];
        let r = t.get_next_matching(&pred).unwrap().unwrap();
        assert_eq!(r.get(0).unwrap(), Int(3));
        assert_eq!(t.get_next_matching(&pred).unwrap(), None);
    }
}
