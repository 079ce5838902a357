//! The table abstraction (§4.4, §4.5, §6): a tagged variant over the two
//! storage organizations, `Heap` and `Sorted`, dispatched through one
//! small enum rather than a trait object — per the design note in §9
//! ("model storage organization as a tagged variant; `Sorted` holds a
//! `Heap` by composition, not by inheritance").
//!
//! Each named table is a pair of files in the data directory: `<name>.bin`
//! (the paged file) and `<name>.bin.meta` (a plain-text sidecar recording
//! which variant it is, and for `Sorted`, its order spec).

pub mod heap;
pub mod sorted;

use crate::predicate::AndList;
use crate::record::Record;
use crate::schema::Schema;
use crate::types::Type;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Heap(#[from] heap::Error),
    #[error(transparent)]
    Sorted(#[from] sorted::Error),
    #[error("failed to read table metadata {0}: {1}")]
    MetaRead(PathBuf, std::io::Error),
    #[error("failed to write table metadata {0}: {1}")]
    MetaWrite(PathBuf, std::io::Error),
    #[error("malformed table metadata file {0}")]
    MetaMalformed(PathBuf),
}

pub enum Table {
    Heap(heap::HeapTable),
    Sorted(sorted::SortedTable),
}

fn meta_path(bin_path: &Path) -> PathBuf {
    let mut s = bin_path.as_os_str().to_os_string();
    s.push(".meta");
    PathBuf::from(s)
}

fn write_meta(bin_path: &Path, sorted: Option<(&[usize], &Schema, usize)>) -> Result<(), Error> {
    let path = meta_path(bin_path);
    let mut f = std::fs::File::create(&path).map_err(|e| Error::MetaWrite(path.clone(), e))?;
    match sorted {
        None => writeln!(f, "heap").map_err(|e| Error::MetaWrite(path.clone(), e))?,
        Some((order, schema, run_length)) => {
            writeln!(f, "sorted").map_err(|e| Error::MetaWrite(path.clone(), e))?;
            writeln!(f, "{}", run_length).map_err(|e| Error::MetaWrite(path.clone(), e))?;
            writeln!(f, "{}", order.len()).map_err(|e| Error::MetaWrite(path.clone(), e))?;
            for &idx in order {
                writeln!(f, "{} {}", idx, schema.attributes[idx].r#type)
                    .map_err(|e| Error::MetaWrite(path.clone(), e))?;
            }
        }
    }
    Ok(())
}

enum MetaKind {
    Heap,
    Sorted { order: Vec<usize>, run_length: usize },
}

fn read_meta(bin_path: &Path) -> Result<MetaKind, Error> {
    let path = meta_path(bin_path);
    let f = std::fs::File::open(&path).map_err(|e| Error::MetaRead(path.clone(), e))?;
    let mut lines = std::io::BufReader::new(f).lines();
    let kind = lines.next().ok_or_else(|| Error::MetaMalformed(path.clone()))?.map_err(|e| Error::MetaRead(path.clone(), e))?;
    match kind.trim() {
        "heap" => Ok(MetaKind::Heap),
        "sorted" => {
            let run_length: usize = lines
                .next()
                .ok_or_else(|| Error::MetaMalformed(path.clone()))?
                .map_err(|e| Error::MetaRead(path.clone(), e))?
                .trim()
                .parse()
                .map_err(|_| Error::MetaMalformed(path.clone()))?;
            let count: usize = lines
                .next()
                .ok_or_else(|| Error::MetaMalformed(path.clone()))?
                .map_err(|e| Error::MetaRead(path.clone(), e))?
                .trim()
                .parse()
                .map_err(|_| Error::MetaMalformed(path.clone()))?;
            let mut order = Vec::with_capacity(count);
            for _ in 0..count {
                let line = lines.next().ok_or_else(|| Error::MetaMalformed(path.clone()))?.map_err(|e| Error::MetaRead(path.clone(), e))?;
                let (idx_str, type_str) = line.trim().split_once(' ').ok_or_else(|| Error::MetaMalformed(path.clone()))?;
                let idx: usize = idx_str.parse().map_err(|_| Error::MetaMalformed(path.clone()))?;
                let _: Type = type_str.parse().map_err(|_| Error::MetaMalformed(path.clone()))?;
                order.push(idx);
            }
            Ok(MetaKind::Sorted { order, run_length })
        }
        _ => Err(Error::MetaMalformed(path)),
    }
}

impl Table {
    pub fn create_heap(path: impl AsRef<Path>, schema: Schema, page_size: usize) -> Result<Self, Error> {
        let path = path.as_ref();
        write_meta(path, None)?;
        Ok(Table::Heap(heap::HeapTable::create(path, schema, page_size)?))
    }

    pub fn create_sorted(
        path: impl AsRef<Path>,
        schema: Schema,
        order: Vec<usize>,
        page_size: usize,
        pipe_capacity: usize,
        sort_pages: usize,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        write_meta(path, Some((&order, &schema, sort_pages)))?;
        Ok(Table::Sorted(sorted::SortedTable::create(path, schema, order, page_size, pipe_capacity, sort_pages)?))
    }

    /// Reopens a table whose variant, and (for `Sorted`) order spec and
    /// run length, are recovered from its `.bin.meta` sidecar.
    pub fn open(
        path: impl AsRef<Path>,
        schema: Schema,
        page_size: usize,
        pipe_capacity: usize,
        default_sort_pages: usize,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        match read_meta(path)? {
            MetaKind::Heap => Ok(Table::Heap(heap::HeapTable::open(path, schema, page_size)?)),
            MetaKind::Sorted { order, run_length } => Ok(Table::Sorted(sorted::SortedTable::open(
                path,
                schema,
                order,
                page_size,
                pipe_capacity,
                if run_length > 0 { run_length } else { default_sort_pages },
            )?)),
        }
    }

    pub fn schema(&self) -> &Schema {
        match self {
            Table::Heap(t) => t.schema(),
            Table::Sorted(t) => t.schema(),
        }
    }

    pub fn sort_order(&self) -> Option<&[usize]> {
        match self {
            Table::Heap(_) => None,
            Table::Sorted(t) => Some(t.sort_order()),
        }
    }

    pub fn add(&mut self, record: Record) -> Result<(), Error> {
        match self {
            Table::Heap(t) => Ok(t.add(record)?),
            Table::Sorted(t) => Ok(t.add(record)?),
        }
    }

    pub fn move_first(&mut self) -> Result<(), Error> {
        match self {
            Table::Heap(t) => Ok(t.move_first()?),
            Table::Sorted(t) => Ok(t.move_first()?),
        }
    }

    pub fn get_next(&mut self) -> Result<Option<Record>, Error> {
        match self {
            Table::Heap(t) => Ok(t.get_next()?),
            Table::Sorted(t) => Ok(t.get_next()?),
        }
    }

    /// Positions for a filtered scan, using the sorted binary probe when
    /// available and falling back to the heap's naive linear scan
    /// otherwise.
    pub fn seek_matching(&mut self, pred: &AndList) -> Result<(), Error> {
        match self {
            Table::Heap(t) => Ok(t.move_first()?),
            Table::Sorted(t) => Ok(t.seek_matching(pred)?),
        }
    }

    pub fn get_next_matching(&mut self, pred: &AndList) -> Result<Option<Record>, Error> {
        match self {
            Table::Heap(t) => Ok(t.get_next_matching(pred)?),
            Table::Sorted(t) => Ok(t.get_next_matching(pred)?),
        }
    }

    pub fn close(&mut self) -> Result<(), Error> {
        match self {
            Table::Heap(t) => Ok(t.close()?),
            Table::Sorted(t) => Ok(t.close()?),
        }
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
    fn heap_roundtrips_through_meta_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bin");
        {
            let mut t = Table::create_heap(&path, schema(), 256).unwrap();
            t.add(Record::new(&[Int(1)], 256).unwrap()).unwrap();
            t.close().unwrap();
        }
        let mut t = Table::open(&path, schema(), 256, 16, 4).unwrap();
        assert!(matches!(t, Table::Heap(_)));
        t.move_first().unwrap();
        assert_eq!(t.get_next().unwrap().unwrap().get(0).unwrap(), Int(1));
    }

    #[test]
    fn sorted_roundtrips_through_meta_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bin");
        {
            let mut t = Table::create_sorted(&path, schema(), vec![0], 256, 16, 4).unwrap();
            for v in [3, 1, 2] {
                t.add(Record::new(&[Int(v)], 256).unwrap()).unwrap();
            }
            t.close().unwrap();
        }
        let mut t = Table::open(&path, schema(), 256, 16, 4).unwrap();
        assert_eq!(t.sort_order(), Some(&[0usize][..]));
        t.move_first().unwrap();
        let mut seen = vec![];
        while let Some(r) = t.get_next().unwrap() {
            if let Int(v) = r.get(0).unwrap() {
                seen.push(v);
            }
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
