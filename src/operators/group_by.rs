//! GroupBy (§4.6): sorts the input by the group key, then runs a
//! disposable child Sum per maximal run of equal keys. To avoid the
//! documented deadlock — the caller joining this operator's worker while
//! that same worker is blocked writing to a full output pipe the caller
//! hasn't started draining yet — the main worker only ever builds an
//! in-memory list of finished group rows; a second, dedicated worker
//! (spawned once the list is complete) is the only thread that ever
//! touches the output pipe.

use super::sum::Sum;
use super::Error;
use crate::pipe::Pipe;
use crate::predicate::self_compare;
use crate::record::Record;
use crate::types::Value;
use std::thread::{self, JoinHandle};

pub struct GroupBy {
    input: Pipe<Record>,
    group_order: Vec<usize>,
    expr: super::Expr,
    page_size: usize,
    pipe_capacity: usize,
    sort_pages: usize,
    output: Pipe<Record>,
    handle: Option<JoinHandle<Result<JoinHandle<()>, Error>>>,
}

impl GroupBy {
    pub fn new(
        input: Pipe<Record>,
        group_order: Vec<usize>,
        expr: super::Expr,
        page_size: usize,
        pipe_capacity: usize,
        sort_pages: usize,
    ) -> GroupBy {
        GroupBy { input, group_order, expr, page_size, pipe_capacity, sort_pages, output: Pipe::new(pipe_capacity), handle: None }
    }

    pub fn output(&self) -> &Pipe<Record> {
        &self.output
    }

    pub fn use_n_pages(&mut self, n: usize) {
        self.sort_pages = n;
    }

    pub fn run(&mut self) {
        let input = self.input.clone();
        let group_order = self.group_order.clone();
        let expr = self.expr.clone();
        let page_size = self.page_size;
        let pipe_capacity = self.pipe_capacity;
        let sort_pages = self.sort_pages;
        let output = self.output.clone();

        let handle = thread::spawn(move || -> Result<JoinHandle<()>, Error> {
            let sorted: Pipe<Record> = Pipe::new(pipe_capacity);
            crate::sort::run(&input, &sorted, &group_order, sort_pages, page_size)?;
            sorted.shutdown();

            let mut rows = vec![];
            let mut current_group: Vec<Record> = vec![];
            while let Some(r) = sorted.remove() {
                if let Some(last) = current_group.last() {
                    if self_compare(last, &r, &group_order) != std::cmp::Ordering::Equal {
                        rows.push(finish_group(std::mem::take(&mut current_group), &group_order, &expr, page_size, pipe_capacity)?);
                    }
                }
                current_group.push(r);
            }
            if !current_group.is_empty() {
                rows.push(finish_group(current_group, &group_order, &expr, page_size, pipe_capacity)?);
            }

            let drain_output = output.clone();
            let drain = thread::spawn(move || {
                for r in rows {
                    drain_output.insert(r);
                }
                drain_output.shutdown();
            });
            Ok(drain)
        });
        self.handle = Some(handle);
    }

    pub fn wait_until_done(&mut self) -> Result<(), Error> {
        let drain = self.handle.take().expect("GroupBy::run must be called before wait_until_done").join().map_err(|_| Error::WorkerPanicked)??;
        drain.join().map_err(|_| Error::WorkerPanicked)
    }
}

/// Runs a disposable child Sum over one group's rows — its input pipe is
/// sized exactly to the group and shut immediately, forcing the child to
/// terminate once it has consumed the whole group.
fn finish_group(
    group_rows: Vec<Record>,
    group_order: &[usize],
    expr: &super::Expr,
    page_size: usize,
    pipe_capacity: usize,
) -> Result<Record, Error> {
    let key_values: Vec<Value> = group_order.iter().map(|&i| group_rows[0].get(i)).collect::<Result<_, _>>()?;

    let child_input: Pipe<Record> = Pipe::new(group_rows.len().max(1));
    for r in &group_rows {
        child_input.insert(r.clone());
    }
    child_input.shutdown();
    let mut child = Sum::new(child_input, expr.clone(), page_size, pipe_capacity);
    child.run();
    let output = child.output().clone();
    let sum_row = output.remove().expect("Sum always emits exactly one row");
    child.wait_until_done()?;

    let mut values = vec![sum_row.get(0)?];
    values.extend(key_values);
    Ok(Record::new(&values, page_size)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value::Int;

    #[test]
    fn groups_and_sums_per_key() {
        let input: Pipe<Record> = Pipe::new(16);
        // (group, value): (1,10) (2,20) (1,30) (2,40)
        for (g, v) in [(1, 10), (2, 20), (1, 30), (2, 40)] {
            input.insert(Record::new(&[Int(g), Int(v)], 4096).unwrap());
        }
        input.shutdown();
        let mut op = GroupBy::new(input, vec![0], super::super::Expr::Attribute(1), 4096, 16, 4);
        let output = op.output().clone();
        op.run();
        let mut rows = vec![];
        while let Some(r) = output.remove() {
            rows.push(r.values().unwrap());
        }
        op.wait_until_done().unwrap();
        rows.sort_by_key(|v| match v[1] {
            Int(g) => g,
            _ => unreachable!(),
        });
        assert_eq!(rows, vec![vec![Int(40), Int(1)], vec![Int(60), Int(2)]]);
    }
}
