//! Project (§4.6): rewrites each record to retain only the specified
//! attributes, in the specified order, recomputing the offset table via
//! `Record::project`.

use super::Error;
use crate::pipe::Pipe;
use crate::record::Record;
use std::thread::{self, JoinHandle};

pub struct Project {
    input: Pipe<Record>,
    indices: Vec<usize>,
    page_size: usize,
    output: Pipe<Record>,
    handle: Option<JoinHandle<Result<(), Error>>>,
}

impl Project {
    pub fn new(input: Pipe<Record>, indices: Vec<usize>, page_size: usize, pipe_capacity: usize) -> Project {
        Project { input, indices, page_size, output: Pipe::new(pipe_capacity), handle: None }
    }

    pub fn output(&self) -> &Pipe<Record> {
        &self.output
    }

    pub fn use_n_pages(&mut self, _n: usize) {}

    pub fn run(&mut self) {
        let input = self.input.clone();
        let indices = self.indices.clone();
        let page_size = self.page_size;
        let output = self.output.clone();
        let handle = thread::spawn(move || -> Result<(), Error> {
            while let Some(r) = input.remove() {
                output.insert(r.project(&indices, page_size)?);
            }
            output.shutdown();
            Ok(())
        });
        self.handle = Some(handle);
    }

    pub fn wait_until_done(&mut self) -> Result<(), Error> {
        self.handle.take().expect("Project::run must be called before wait_until_done").join().map_err(|_| Error::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value::Int;

    #[test]
    fn keeps_and_reorders_attributes() {
        let input: Pipe<Record> = Pipe::new(16);
        input.insert(Record::new(&[Int(1), Int(2), Int(3)], 4096).unwrap());
        input.shutdown();
        let mut op = Project::new(input, vec![2, 0], 4096, 16);
        let output = op.output().clone();
        op.run();
        let r = output.remove().unwrap();
        assert_eq!(r.values().unwrap(), vec![Int(3), Int(1)]);
        op.wait_until_done().unwrap();
    }
}
