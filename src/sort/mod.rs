//! Two-phase multiway merge sort (§4.2). Converts an unbounded stream of
//! records read from a `Pipe` into a globally sorted stream written to
//! another `Pipe`, using bounded memory (`run_pages` pages resident at
//! once in phase 1, one page per run plus a write page in phase 2).
//!
//! Run boundaries are tracked as a `Vec<usize>` of per-run page counts
//! rather than the source's fixed `i·(R+1)` scratch stride — an internal
//! bookkeeping choice with no externally observable format, so there is
//! no reason to replicate the source's fixed-stride allocation.

use crate::page::Page;
use crate::paged_file::PagedFile;
use crate::pipe::Pipe;
use crate::predicate::self_compare;
use crate::record::Record;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("sort scratch file error: {0}")]
    Scratch(#[from] crate::paged_file::Error),
}

fn scratch_path() -> std::path::PathBuf {
    use rand::Rng;
    let suffix: u64 = rand::thread_rng().gen();
    std::env::temp_dir().join(format!("microql-sort-{suffix:016x}.tmp"))
}

/// Drains all records currently buffered in `pages` into a flat `Vec`, in
/// page order then in-page order — used once a run's worth of pages is
/// collected and needs to be sorted as a whole.
fn drain_pages(pages: Vec<Page>) -> Vec<Record> {
    let mut out = vec![];
    for mut p in pages {
        while let Some(r) = p.get_first() {
            out.push(r);
        }
    }
    out
}

fn repage_sorted(records: Vec<Record>, page_size: usize, scratch: &mut PagedFile) -> Result<usize, Error> {
    let mut page = Page::empty(page_size);
    let mut written = 0;
    for r in records {
        match page.append(r) {
            Ok(()) => {}
            Err(r) => {
                scratch.append_page(&page.serialize())?;
                written += 1;
                page = Page::empty(page_size);
                page.append(r).expect("a single record must fit an empty page");
            }
        }
    }
    if !page.is_empty() {
        scratch.append_page(&page.serialize())?;
        written += 1;
    }
    Ok(written)
}

/// Phase 1: consumes `input` to EOF, producing a sequence of sorted,
/// contiguous runs in `scratch`. Returns the page count of each run, in
/// the order they were written.
fn generate_runs(
    input: &Pipe<Record>,
    order: &[usize],
    run_pages: usize,
    page_size: usize,
    scratch: &mut PagedFile,
) -> Result<Vec<usize>, Error> {
    let mut run_lengths = vec![];
    let mut pending: Option<Record> = None;

    loop {
        let mut full_pages: Vec<Page> = vec![];
        let mut cur = Page::empty(page_size);
        if let Some(r) = pending.take() {
            cur.append(r).expect("a single record must fit an empty page");
        }

        let mut eof = false;
        loop {
            match input.remove() {
                None => {
                    eof = true;
                    break;
                }
                Some(r) => match cur.append(r) {
                    Ok(()) => {}
                    Err(overflowed) => {
                        full_pages.push(std::mem::replace(&mut cur, Page::empty(page_size)));
                        if full_pages.len() == run_pages {
                            pending = Some(overflowed);
                            break;
                        }
                        cur.append(overflowed).expect("a single record must fit an empty page");
                    }
                },
            }
        }
        if !cur.is_empty() {
            full_pages.push(cur);
        }
        if full_pages.is_empty() {
            break;
        }

        let records = drain_pages(full_pages);
        let mut sorted = records;
        sorted.sort_by(|a, b| self_compare(a, b, order));
        let written = repage_sorted(sorted, page_size, scratch)?;
        run_lengths.push(written);

        if eof {
            break;
        }
    }
    Ok(run_lengths)
}

struct RunCursor {
    start_page: usize,
    length: usize,
    next_page_in_run: usize,
    current: Option<Page>,
}

impl RunCursor {
    fn new(start_page: usize, length: usize) -> Self {
        RunCursor { start_page, length, next_page_in_run: 0, current: None }
    }

    fn load_next_page(&mut self, scratch: &mut PagedFile) -> Result<bool, Error> {
        if self.next_page_in_run >= self.length {
            return Ok(false);
        }
        let bytes = scratch.get_page(self.start_page + self.next_page_in_run)?;
        self.current = Some(Page::deserialize(bytes));
        self.next_page_in_run += 1;
        Ok(true)
    }

    fn next_record(&mut self, scratch: &mut PagedFile) -> Result<Option<Record>, Error> {
        loop {
            if let Some(page) = self.current.as_mut() {
                if let Some(r) = page.get_first() {
                    return Ok(Some(r));
                }
            }
            if !self.load_next_page(scratch)? {
                return Ok(None);
            }
        }
    }
}

struct HeapEntry {
    run: usize,
    record: Record,
    order: Vec<usize>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self_compare(&self.record, &other.record, &self.order)
    }
}

/// Phase 2: if a single run was produced, streams it out directly
/// (already sorted); otherwise drives a min-heap k-way merge across all
/// runs, each contributing at most one resident page at a time.
fn merge_runs(
    output: &Pipe<Record>,
    order: &[usize],
    run_lengths: &[usize],
    page_size: usize,
    scratch: &mut PagedFile,
) -> Result<(), Error> {
    if run_lengths.len() <= 1 {
        if let Some(&len) = run_lengths.first() {
            let mut cursor = RunCursor::new(0, len);
            while let Some(r) = cursor.next_record(scratch)? {
                output.insert(r);
            }
        }
        return Ok(());
    }

    let mut starts = vec![0usize; run_lengths.len()];
    for i in 1..run_lengths.len() {
        starts[i] = starts[i - 1] + run_lengths[i - 1];
    }
    let mut cursors: Vec<RunCursor> =
        starts.iter().zip(run_lengths.iter()).map(|(&s, &l)| RunCursor::new(s, l)).collect();

    let _ = page_size; // page size is implicit in the scratch file itself.
    let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();
    for (i, cursor) in cursors.iter_mut().enumerate() {
        if let Some(r) = cursor.next_record(scratch)? {
            heap.push(Reverse(HeapEntry { run: i, record: r, order: order.to_vec() }));
        }
    }

    while let Some(Reverse(top)) = heap.pop() {
        output.insert(top.record);
        if let Some(r) = cursors[top.run].next_record(scratch)? {
            heap.push(Reverse(HeapEntry { run: top.run, record: r, order: order.to_vec() }));
        }
    }
    Ok(())
}

/// Runs both phases of TPMMS, consuming `input` to EOF and writing every
/// record, globally ordered by `order`, into `output`. Does not shut
/// down `output`; the caller (the operator that owns this sort) does
/// that once it has also finished whatever post-processing it layers on
/// top (e.g. Distinct's adjacent-duplicate suppression).
pub fn run(input: &Pipe<Record>, output: &Pipe<Record>, order: &[usize], run_pages: usize, page_size: usize) -> Result<(), Error> {
    let path = scratch_path();
    let mut scratch = PagedFile::create(&path, page_size)?;
    let run_lengths = generate_runs(input, order, run_pages, page_size, &mut scratch)?;
    merge_runs(output, order, &run_lengths, page_size, &mut scratch)?;
    drop(scratch);
    let _ = std::fs::remove_file(&path);
    Ok(())
}
