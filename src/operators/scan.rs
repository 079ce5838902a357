//! Scan (SelectFile, §4.6): reads an open table end to end, pushing
//! records that satisfy a selection predicate into an output pipe. Uses
//! the table's binary probe when it is sorted and the predicate's query
//! order is non-empty; a naive linear scan otherwise — both paths are
//! already implemented by `Table::seek_matching`/`get_next_matching`.

use super::Error;
use crate::pipe::Pipe;
use crate::predicate::AndList;
use crate::record::Record;
use crate::table::Table;
use std::thread::{self, JoinHandle};

pub struct Scan {
    table: Option<Table>,
    pred: AndList,
    output: Pipe<Record>,
    handle: Option<JoinHandle<Result<(), Error>>>,
}

impl Scan {
    pub fn new(table: Table, pred: AndList, pipe_capacity: usize) -> Scan {
        Scan { table: Some(table), pred, output: Pipe::new(pipe_capacity), handle: None }
    }

    pub fn output(&self) -> &Pipe<Record> {
        &self.output
    }

    pub fn use_n_pages(&mut self, _n: usize) {
        // Scan has no internal working set of its own to size.
    }

    pub fn run(&mut self) {
        let mut table = self.table.take().expect("Scan::run called more than once");
        let pred = self.pred.clone();
        let output = self.output.clone();
        let handle = thread::spawn(move || -> Result<(), Error> {
            table.seek_matching(&pred)?;
            while let Some(r) = table.get_next_matching(&pred)? {
                output.insert(r);
            }
            output.shutdown();
            Ok(())
        });
        self.handle = Some(handle);
    }

    pub fn wait_until_done(&mut self) -> Result<(), Error> {
        self.handle.take().expect("Scan::run must be called before wait_until_done").join().map_err(|_| Error::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{CompareOp, Comparison, Operand, Side};
    use crate::schema::{Attribute, Schema};
    use crate::types::{Type, Value::Int};

    fn schema() -> Schema {
        Schema::new("r", vec![Attribute::new("a", Type::Int)])
    }

    #[test]
    fn scans_matching_rows_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.bin");
        let mut t = Table::create_heap(&path, schema(), 256).unwrap();
        for v in 0..5 {
            t.add(Record::new(&[Int(v)], 256).unwrap()).unwrap();
        }
        t.close().unwrap();
        let t = Table::open(&path, schema(), 256, 16, 4).unwrap();

        let pred: AndList = vec![vec![Comparison {
            op: CompareOp::Gt,
            left: Operand::Attribute { side: Side::Left, index: 0 },
            right: Operand::Literal(Int(2)),
        }]];
        let mut scan = Scan::new(t, pred, 16);
        let output = scan.output().clone();
        scan.run();
        let mut seen = vec![];
        while let Some(r) = output.remove() {
            if let Int(v) = r.get(0).unwrap() {
                seen.push(v);
            }
        }
        scan.wait_until_done().unwrap();
        assert_eq!(seen, vec![3, 4]);
    }
}
