//! Join (§4.6): picks between two execution paths depending on whether
//! the join predicate reduces to a pure equijoin.
//!
//! - **Sort-merge** (derivation succeeds): two independent sort-engine
//!   workers order each side, then a merge walk accumulates same-key
//!   runs on both sides and emits their Cartesian product.
//! - **Block-nested-loop** (derivation fails): the left input is spooled
//!   to a scratch heap table (the planner is responsible for handing
//!   Join the smaller side as `left` in this path); the right input is
//!   consumed in byte-budgeted blocks, each block re-scanning the
//!   spooled left side.
//!
//! Grounded on the source's `RelOp.cc` join implementation.

use super::Error;
use crate::pipe::Pipe;
use crate::predicate::{self, derive_join_order, order_compare, AndList};
use crate::record::Record;
use crate::schema::Schema;
use crate::table::heap::HeapTable;
use std::cmp::Ordering;
use std::thread::{self, JoinHandle};

pub struct Join {
    left: Pipe<Record>,
    right: Pipe<Record>,
    pred: AndList,
    left_schema: Schema,
    page_size: usize,
    pipe_capacity: usize,
    sort_pages: usize,
    block_pages: usize,
    output: Pipe<Record>,
    handle: Option<JoinHandle<Result<(), Error>>>,
}

impl Join {
    pub fn new(
        left: Pipe<Record>,
        right: Pipe<Record>,
        pred: AndList,
        left_schema: Schema,
        page_size: usize,
        pipe_capacity: usize,
        sort_pages: usize,
        block_pages: usize,
    ) -> Join {
        Join { left, right, pred, left_schema, page_size, pipe_capacity, sort_pages, block_pages, output: Pipe::new(pipe_capacity), handle: None }
    }

    pub fn output(&self) -> &Pipe<Record> {
        &self.output
    }

    pub fn use_n_pages(&mut self, n: usize) {
        self.block_pages = n;
        self.sort_pages = n;
    }

    pub fn run(&mut self) {
        let left = self.left.clone();
        let right = self.right.clone();
        let pred = self.pred.clone();
        let left_schema = self.left_schema.clone();
        let page_size = self.page_size;
        let pipe_capacity = self.pipe_capacity;
        let sort_pages = self.sort_pages;
        let block_pages = self.block_pages;
        let output = self.output.clone();

        let handle = thread::spawn(move || -> Result<(), Error> {
            match derive_join_order(&pred) {
                Some((left_order, right_order)) => {
                    sort_merge_join(&left, &right, &left_order, &right_order, sort_pages, page_size, pipe_capacity, &output)?
                }
                None => block_nested_loop_join(&left, &right, &pred, &left_schema, block_pages, page_size, &output)?,
            }
            output.shutdown();
            Ok(())
        });
        self.handle = Some(handle);
    }

    pub fn wait_until_done(&mut self) -> Result<(), Error> {
        self.handle.take().expect("Join::run must be called before wait_until_done").join().map_err(|_| Error::WorkerPanicked)?
    }
}

fn sort_merge_join(
    left: &Pipe<Record>,
    right: &Pipe<Record>,
    left_order: &[usize],
    right_order: &[usize],
    sort_pages: usize,
    page_size: usize,
    pipe_capacity: usize,
    output: &Pipe<Record>,
) -> Result<(), Error> {
    let sorted_left: Pipe<Record> = Pipe::new(pipe_capacity);
    let sorted_right: Pipe<Record> = Pipe::new(pipe_capacity);
    let (l_in, l_out, l_order) = (left.clone(), sorted_left.clone(), left_order.to_vec());
    let left_worker = thread::spawn(move || crate::sort::run(&l_in, &l_out, &l_order, sort_pages, page_size));
    let (r_in, r_out, r_order) = (right.clone(), sorted_right.clone(), right_order.to_vec());
    let right_worker = thread::spawn(move || crate::sort::run(&r_in, &r_out, &r_order, sort_pages, page_size));
    left_worker.join().map_err(|_| Error::WorkerPanicked)??;
    sorted_left.shutdown();
    right_worker.join().map_err(|_| Error::WorkerPanicked)??;
    sorted_right.shutdown();

    let mut l = sorted_left.remove();
    let mut r = sorted_right.remove();
    loop {
        let (lr, rr) = match (&l, &r) {
            (Some(lr), Some(rr)) => (lr, rr),
            _ => break,
        };
        match order_compare(lr, left_order, rr, right_order) {
            Ordering::Less => l = sorted_left.remove(),
            Ordering::Greater => r = sorted_right.remove(),
            Ordering::Equal => {
                let key_l = lr.clone();
                let mut left_group = vec![lr.clone()];
                let mut next_l = sorted_left.remove();
                while let Some(nl) = next_l.as_ref() {
                    if order_compare(nl, left_order, &key_l, left_order) == Ordering::Equal {
                        left_group.push(nl.clone());
                        next_l = sorted_left.remove();
                    } else {
                        break;
                    }
                }
                let key_r = rr.clone();
                let mut right_group = vec![rr.clone()];
                let mut next_r = sorted_right.remove();
                while let Some(nr) = next_r.as_ref() {
                    if order_compare(nr, right_order, &key_r, right_order) == Ordering::Equal {
                        right_group.push(nr.clone());
                        next_r = sorted_right.remove();
                    } else {
                        break;
                    }
                }
                for lrow in &left_group {
                    for rrow in &right_group {
                        output.insert(lrow.concat(rrow, page_size)?);
                    }
                }
                l = next_l;
                r = next_r;
            }
        }
    }
    Ok(())
}

fn block_nested_loop_join(
    left: &Pipe<Record>,
    right: &Pipe<Record>,
    pred: &AndList,
    left_schema: &Schema,
    block_pages: usize,
    page_size: usize,
    output: &Pipe<Record>,
) -> Result<(), Error> {
    use rand::Rng;
    let suffix: u64 = rand::thread_rng().gen();
    let scratch_path = std::env::temp_dir().join(format!("microql-bnl-{:016x}.bin", suffix));
    let mut scratch = HeapTable::create(&scratch_path, left_schema.clone(), page_size)?;
    while let Some(r) = left.remove() {
        scratch.add(r)?;
    }

    let block_byte_budget = block_pages * page_size;
    loop {
        let mut block = vec![];
        let mut used = 0usize;
        let mut eof = false;
        loop {
            match right.remove() {
                None => {
                    eof = true;
                    break;
                }
                Some(r) => {
                    used += r.byte_len();
                    block.push(r);
                    if used >= block_byte_budget {
                        break;
                    }
                }
            }
        }
        if !block.is_empty() {
            scratch.move_first()?;
            while let Some(inner) = scratch.get_next()? {
                for outer in &block {
                    if predicate::evaluate(pred, &inner, Some(outer)) {
                        output.insert(inner.concat(outer, page_size)?);
                    }
                }
            }
        }
        if eof {
            break;
        }
    }
    scratch.close()?;
    let _ = std::fs::remove_file(&scratch_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{CompareOp, Comparison, Operand, Side};
    use crate::schema::Attribute;
    use crate::types::Type;
    use crate::types::Value::Int;

    fn left_schema() -> Schema {
        Schema::new("l", vec![Attribute::new("id", Type::Int)])
    }

    #[test]
    fn sort_merge_join_emits_cartesian_product_per_key() {
        let left: Pipe<Record> = Pipe::new(16);
        for v in [1, 2, 2] {
            left.insert(Record::new(&[Int(v)], 4096).unwrap());
        }
        left.shutdown();
        let right: Pipe<Record> = Pipe::new(16);
        for v in [2, 3, 2] {
            right.insert(Record::new(&[Int(v)], 4096).unwrap());
        }
        right.shutdown();

        let pred: AndList = vec![vec![Comparison {
            op: CompareOp::Eq,
            left: Operand::Attribute { side: Side::Left, index: 0 },
            right: Operand::Attribute { side: Side::Right, index: 0 },
        }]];
        let mut join = Join::new(left, right, pred, left_schema(), 4096, 16, 4, 4);
        let output = join.output().clone();
        join.run();
        let mut rows = vec![];
        while let Some(r) = output.remove() {
            rows.push(r.values().unwrap());
        }
        join.wait_until_done().unwrap();
        assert_eq!(rows.len(), 4); // two left-2's times two right-2's
    }

    #[test]
    fn block_nested_loop_join_handles_inequality_predicate() {
        let left: Pipe<Record> = Pipe::new(16);
        for v in [1, 2] {
            left.insert(Record::new(&[Int(v)], 4096).unwrap());
        }
        left.shutdown();
        let right: Pipe<Record> = Pipe::new(16);
        for v in [1, 2, 3] {
            right.insert(Record::new(&[Int(v)], 4096).unwrap());
        }
        right.shutdown();

        let pred: AndList = vec![vec![Comparison {
            op: CompareOp::Lt,
            left: Operand::Attribute { side: Side::Left, index: 0 },
            right: Operand::Attribute { side: Side::Right, index: 0 },
        }]];
        let mut join = Join::new(left, right, pred, left_schema(), 4096, 16, 4, 1);
        let output = join.output().clone();
        join.run();
        let mut rows = vec![];
        while let Some(r) = output.remove() {
            rows.push(r.values().unwrap());
        }
        join.wait_until_done().unwrap();
        // (1,2) (1,3) (2,3)
        assert_eq!(rows.len(), 3);
    }
}
