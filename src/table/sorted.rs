//! Sorted table (§4.5): a `Heap` table plus an order spec, cycling
//! between a `{reading, writing}` mode. Writing hands records to a
//! background sort-engine worker over a pipe; the write→read transition
//! joins that worker and merges its sorted output against the existing
//! (already sorted) base into a new heap file. Grounded on the source's
//! `Sorted.cc`/`Sorted.h`, generalized from its fixed-path scratch-file
//! bookkeeping to this crate's `Pipe`/`sort::run` abstractions.

use crate::page::Page;
use crate::predicate::{self, derive_query_order, order_compare, AndList};
use crate::record::Record;
use crate::schema::Schema;
use crate::table::heap::HeapTable;
use crate::types::Value;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Heap(#[from] crate::table::heap::Error),
    #[error(transparent)]
    PagedFile(#[from] crate::paged_file::Error),
    #[error(transparent)]
    Record(#[from] crate::record::Error),
    #[error(transparent)]
    Sort(#[from] crate::sort::Error),
    #[error("sort worker thread panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

enum Mode {
    Reading,
    Writing,
}

struct WriteSession {
    input: crate::pipe::Pipe<Record>,
    output: crate::pipe::Pipe<Record>,
    handle: JoinHandle<Result<(), crate::sort::Error>>,
}

pub struct SortedTable {
    base: HeapTable,
    order: Vec<usize>,
    page_size: usize,
    pipe_capacity: usize,
    sort_pages: usize,
    mode: Mode,
    write_session: Option<WriteSession>,
}

impl SortedTable {
    pub fn create(
        path: impl AsRef<Path>,
        schema: Schema,
        order: Vec<usize>,
        page_size: usize,
        pipe_capacity: usize,
        sort_pages: usize,
    ) -> Result<Self, Error> {
        let base = HeapTable::create(path, schema, page_size)?;
        Ok(SortedTable { base, order, page_size, pipe_capacity, sort_pages, mode: Mode::Reading, write_session: None })
    }

    pub fn open(
        path: impl AsRef<Path>,
        schema: Schema,
        order: Vec<usize>,
        page_size: usize,
        pipe_capacity: usize,
        sort_pages: usize,
    ) -> Result<Self, Error> {
        let base = HeapTable::open(path, schema, page_size)?;
        Ok(SortedTable { base, order, page_size, pipe_capacity, sort_pages, mode: Mode::Reading, write_session: None })
    }

    pub fn schema(&self) -> &Schema {
        self.base.schema()
    }

    pub fn sort_order(&self) -> &[usize] {
        &self.order
    }

    pub fn path(&self) -> &Path {
        self.base.path()
    }

    fn ensure_writing(&mut self) {
        if let Mode::Reading = self.mode {
            let input: crate::pipe::Pipe<Record> = crate::pipe::Pipe::new(self.pipe_capacity);
            let output: crate::pipe::Pipe<Record> = crate::pipe::Pipe::new(self.pipe_capacity);
            let worker_input = input.clone();
            let worker_output = output.clone();
            let order = self.order.clone();
            let sort_pages = self.sort_pages;
            let page_size = self.page_size;
            let handle = thread::spawn(move || {
                let result = crate::sort::run(&worker_input, &worker_output, &order, sort_pages, page_size);
                worker_output.shutdown();
                result
            });
            self.write_session = Some(WriteSession { input, output, handle });
            self.mode = Mode::Writing;
        }
    }

    /// Hands a record to the background sort engine. Transitions the
    /// table into writing mode if it was reading.
    pub fn add(&mut self, record: Record) -> Result<(), Error> {
        self.ensure_writing();
        self.write_session.as_ref().expect("writing mode guarantees a session").input.insert(record);
        Ok(())
    }

    /// Write → read transition: closes the input side, waits for the
    /// sort engine to finish, then merges its sorted output stream
    /// against the existing (already sorted) base into a fresh heap
    /// file, replacing the base in place.
    pub fn flush(&mut self) -> Result<(), Error> {
        let session = match self.write_session.take() {
            Some(s) => s,
            None => {
                self.mode = Mode::Reading;
                self.base.move_first()?;
                return Ok(());
            }
        };
        session.input.shutdown();
        session.handle.join().map_err(|_| Error::WorkerPanicked)??;

        self.base.move_first()?;
        let merged_path = self.merge_scratch_path();
        let mut merged = HeapTable::create(&merged_path, self.base.schema().clone(), self.page_size)?;

        let mut left = self.base.get_next()?;
        let mut right = session.output.remove();
        loop {
            match (left.take(), right.take()) {
                (None, None) => break,
                (Some(l), None) => {
                    merged.add(l)?;
                    left = self.base.get_next()?;
                }
                (None, Some(r)) => {
                    merged.add(r)?;
                    right = session.output.remove();
                }
                (Some(l), Some(r)) => {
                    if order_compare(&l, &self.order, &r, &self.order) != Ordering::Greater {
                        merged.add(l)?;
                        left = self.base.get_next()?;
                        right = Some(r);
                    } else {
                        merged.add(r)?;
                        right = session.output.remove();
                        left = Some(l);
                    }
                }
            }
        }
        merged.close()?;

        let final_path = self.base.path().to_path_buf();
        self.base.close()?;
        std::fs::remove_file(&final_path).ok();
        std::fs::rename(&merged_path, &final_path)?;
        self.base = HeapTable::open(&final_path, self.base.schema().clone(), self.page_size)?;
        self.base.move_first()?;
        self.mode = Mode::Reading;
        Ok(())
    }

    fn merge_scratch_path(&self) -> PathBuf {
        use rand::Rng;
        let suffix: u64 = rand::thread_rng().gen();
        self.base.path().with_extension(format!("merge-{suffix:016x}.bin"))
    }

    pub fn move_first(&mut self) -> Result<(), Error> {
        self.flush()?;
        self.base.move_first()?;
        Ok(())
    }

    pub fn get_next(&mut self) -> Result<Option<Record>, Error> {
        if let Mode::Writing = self.mode {
            self.flush()?;
        }
        Ok(self.base.get_next()?)
    }

    /// Finds the first page whose first record's matched prefix is not
    /// less than `target`, by binary search over page boundaries.
    fn probe_start_page(&mut self, target: &[(usize, Value)]) -> Result<usize, Error> {
        let npages = self.base.page_count();
        let mut lo = 0usize;
        let mut hi = npages;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let page: Page = self.base.raw_page(mid)?;
            let first = page.first();
            let below = match first {
                None => true,
                Some(r) => prefix_cmp(r, target) == Ordering::Less,
            };
            if below {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Selection pushdown (§4.1/§4.5): if the predicate pins a leading
    /// prefix of the sort order to literals, binary-probes for the first
    /// matching page and linear-scans forward only while the prefix
    /// still matches. Falls back to a full `base` scan (Open Question
    /// #3) when no leading sort attribute is pinned.
    pub fn get_next_matching(&mut self, pred: &AndList) -> Result<Option<Record>, Error> {
        if let Mode::Writing = self.mode {
            self.flush()?;
        }
        let matched = derive_query_order(&self.order, pred);
        if matched.is_empty() {
            return Ok(self.base.get_next_matching(pred)?);
        }
        Ok(self.get_next_matching_probed(pred, &matched)?)
    }

    fn get_next_matching_probed(&mut self, pred: &AndList, matched: &[(usize, Value)]) -> Result<Option<Record>, Error> {
        loop {
            match self.base.get_next()? {
                None => return Ok(None),
                Some(r) => {
                    if prefix_cmp(&r, matched) == Ordering::Greater {
                        return Ok(None);
                    }
                    if predicate::evaluate(pred, &r, None) {
                        return Ok(Some(r));
                    }
                }
            }
        }
    }

    /// Positions the read cursor at the binary-probed start page for the
    /// given matched prefix. Must be called (instead of `move_first`)
    /// before `get_next_matching_probed` to get the index benefit rather
    /// than a full scan from page 0.
    pub fn seek_matching(&mut self, pred: &AndList) -> Result<(), Error> {
        if let Mode::Writing = self.mode {
            self.flush()?;
        }
        let matched = derive_query_order(&self.order, pred);
        if matched.is_empty() {
            self.base.move_first()?;
            return Ok(());
        }
        let start = self.probe_start_page(&matched)?;
        self.base.move_first()?;
        self.base.seek_to_page(start)?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.flush()?;
        self.base.close()?;
        Ok(())
    }
}

fn prefix_cmp(record: &Record, matched: &[(usize, Value)]) -> Ordering {
    for (idx, target) in matched {
        let v = record.get(*idx).expect("sort order index out of range");
        let o = crate::record::compare_values(&v, target);
        if o != Ordering::Equal {
            return o;
        }
    }
    Ordering::Equal
}
