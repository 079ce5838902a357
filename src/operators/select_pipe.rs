//! SelectPipe (§4.6): filters a record stream through the comparison
//! engine, same predicate model as Scan but reading from an upstream
//! pipe instead of a table — used once a relation already has a subtree
//! in the plan.

use super::Error;
use crate::pipe::Pipe;
use crate::predicate::{self, AndList};
use crate::record::Record;
use std::thread::{self, JoinHandle};

pub struct SelectPipe {
    input: Pipe<Record>,
    pred: AndList,
    output: Pipe<Record>,
    handle: Option<JoinHandle<()>>,
}

impl SelectPipe {
    pub fn new(input: Pipe<Record>, pred: AndList, pipe_capacity: usize) -> SelectPipe {
        SelectPipe { input, pred, output: Pipe::new(pipe_capacity), handle: None }
    }

    pub fn output(&self) -> &Pipe<Record> {
        &self.output
    }

    pub fn use_n_pages(&mut self, _n: usize) {}

    pub fn run(&mut self) {
        let input = self.input.clone();
        let pred = self.pred.clone();
        let output = self.output.clone();
        let handle = thread::spawn(move || {
            while let Some(r) = input.remove() {
                if predicate::evaluate(&pred, &r, None) {
                    output.insert(r);
                }
            }
            output.shutdown();
        });
        self.handle = Some(handle);
    }

    pub fn wait_until_done(&mut self) -> Result<(), Error> {
        self.handle.take().expect("SelectPipe::run must be called before wait_until_done").join().map_err(|_| Error::WorkerPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{CompareOp, Comparison, Operand, Side};
    use crate::types::Value::Int;

    #[test]
    fn filters_stream() {
        let input: Pipe<Record> = Pipe::new(16);
        for v in 0..5 {
            input.insert(Record::new(&[Int(v)], 4096).unwrap());
        }
        input.shutdown();
        let pred: AndList = vec![vec![Comparison {
            op: CompareOp::Lt,
            left: Operand::Attribute { side: Side::Left, index: 0 },
            right: Operand::Literal(Int(3)),
        }]];
        let mut op = SelectPipe::new(input, pred, 16);
        let output = op.output().clone();
        op.run();
        let mut seen = vec![];
        while let Some(r) = output.remove() {
            if let Int(v) = r.get(0).unwrap() {
                seen.push(v);
            }
        }
        op.wait_until_done().unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
