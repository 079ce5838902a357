//! Sum (§4.6): evaluates an arithmetic expression over every input
//! record, accumulating into a single numeric total, and emits exactly
//! one output row with schema `{sum: Int|Double}`.

use super::{eval_expr, Error, Expr, Numeric};
use crate::pipe::Pipe;
use crate::record::Record;
use crate::schema::{Attribute, Schema};
use crate::types::Type;
use std::thread::{self, JoinHandle};

pub struct Sum {
    input: Pipe<Record>,
    expr: Expr,
    page_size: usize,
    output: Pipe<Record>,
    handle: Option<JoinHandle<Result<(), Error>>>,
}

impl Sum {
    pub fn new(input: Pipe<Record>, expr: Expr, page_size: usize, pipe_capacity: usize) -> Sum {
        Sum { input, expr, page_size, output: Pipe::new(pipe_capacity), handle: None }
    }

    pub fn output(&self) -> &Pipe<Record> {
        &self.output
    }

    pub fn use_n_pages(&mut self, _n: usize) {}

    pub fn output_schema(&self, result: Numeric) -> Schema {
        let ty = match result {
            Numeric::Int(_) => Type::Int,
            Numeric::Double(_) => Type::Double,
        };
        Schema::new("sum", vec![Attribute::new("sum", ty)])
    }

    pub fn run(&mut self) {
        let input = self.input.clone();
        let expr = self.expr.clone();
        let page_size = self.page_size;
        let output = self.output.clone();
        let handle = thread::spawn(move || -> Result<(), Error> {
            let mut total = Numeric::zero();
            while let Some(r) = input.remove() {
                total = total.add(eval_expr(&expr, &r)?);
            }
            output.insert(Record::new(&[total.into_value()], page_size)?);
            output.shutdown();
            Ok(())
        });
        self.handle = Some(handle);
    }

    pub fn wait_until_done(&mut self) -> Result<(), Error> {
        self.handle.take().expect("Sum::run must be called before wait_until_done").join().map_err(|_| Error::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value::Int;

    #[test]
    fn sums_attribute_across_rows() {
        let input: Pipe<Record> = Pipe::new(16);
        for v in [1, 2, 3] {
            input.insert(Record::new(&[Int(v)], 4096).unwrap());
        }
        input.shutdown();
        let mut op = Sum::new(input, Expr::Attribute(0), 4096, 16);
        let output = op.output().clone();
        op.run();
        let r = output.remove().unwrap();
        assert_eq!(r.get(0).unwrap(), Int(6));
        assert!(output.remove().is_none());
        op.wait_until_done().unwrap();
    }
}
