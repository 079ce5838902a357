//! Distinct (§4.6): sorts the whole input on every attribute and
//! suppresses adjacent equal rows, reusing the TPMMS sort engine rather
//! than a hash-based approach — consistent with the source, which has no
//! hashing machinery at all.

use super::Error;
use crate::pipe::Pipe;
use crate::record::Record;
use crate::schema::Schema;
use std::thread::{self, JoinHandle};

pub struct Distinct {
    input: Pipe<Record>,
    order: Vec<usize>,
    page_size: usize,
    pipe_capacity: usize,
    sort_pages: usize,
    output: Pipe<Record>,
    handle: Option<JoinHandle<Result<(), Error>>>,
}

impl Distinct {
    pub fn new(input: Pipe<Record>, schema: &Schema, page_size: usize, pipe_capacity: usize, sort_pages: usize) -> Distinct {
        let order = (0..schema.len()).collect();
        Distinct { input, order, page_size, pipe_capacity, sort_pages, output: Pipe::new(pipe_capacity), handle: None }
    }

    pub fn output(&self) -> &Pipe<Record> {
        &self.output
    }

    pub fn use_n_pages(&mut self, n: usize) {
        self.sort_pages = n;
    }

    pub fn run(&mut self) {
        let input = self.input.clone();
        let order = self.order.clone();
        let page_size = self.page_size;
        let sort_pages = self.sort_pages;
        let pipe_capacity = self.pipe_capacity;
        let output = self.output.clone();
        let handle = thread::spawn(move || -> Result<(), Error> {
            let sorted: Pipe<Record> = Pipe::new(pipe_capacity);
            crate::sort::run(&input, &sorted, &order, sort_pages, page_size)?;
            sorted.shutdown();
            let mut prev: Option<Record> = None;
            while let Some(r) = sorted.remove() {
                let dup = prev.as_ref().is_some_and(|p| *p == r);
                if !dup {
                    prev = Some(r.clone());
                    output.insert(r);
                } else {
                    prev = Some(r);
                }
            }
            output.shutdown();
            Ok(())
        });
        self.handle = Some(handle);
    }

    pub fn wait_until_done(&mut self) -> Result<(), Error> {
        self.handle.take().expect("Distinct::run must be called before wait_until_done").join().map_err(|_| Error::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::types::{Type, Value::Int};

    #[test]
    fn suppresses_duplicate_rows() {
        let schema = Schema::new("r", vec![Attribute::new("a", Type::Int)]);
        let input: Pipe<Record> = Pipe::new(16);
        for v in [3, 1, 3, 2, 1] {
            input.insert(Record::new(&[Int(v)], 4096).unwrap());
        }
        input.shutdown();
        let mut op = Distinct::new(input, &schema, 4096, 16, 4);
        let output = op.output().clone();
        op.run();
        let mut seen = vec![];
        while let Some(r) = output.remove() {
            if let Int(v) = r.get(0).unwrap() {
                seen.push(v);
            }
        }
        op.wait_until_done().unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
