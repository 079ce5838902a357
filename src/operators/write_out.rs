//! WriteOut (§4.6): the terminal operator of every plan tree. Renders
//! each record as a column-padded text line, matching the teacher's
//! `formatting::print_table_qot` layout, and writes it to whatever byte
//! sink `SET OUTPUT` selected (a file, or nothing, with stdout as the
//! default).

use super::Error;
use crate::pipe::Pipe;
use crate::record::Record;
use crate::schema::Schema;
use std::io::Write;
use std::thread::{self, JoinHandle};

pub struct WriteOut<W: Write + Send + 'static> {
    input: Pipe<Record>,
    schema: Schema,
    sink: Option<W>,
    handle: Option<JoinHandle<Result<(), Error>>>,
}

impl<W: Write + Send + 'static> WriteOut<W> {
    pub fn new(input: Pipe<Record>, schema: Schema, sink: W) -> WriteOut<W> {
        WriteOut { input, schema, sink: Some(sink), handle: None }
    }

    pub fn use_n_pages(&mut self, _n: usize) {}

    pub fn run(&mut self) {
        let input = self.input.clone();
        let schema = self.schema.clone();
        let mut sink = self.sink.take().expect("WriteOut::run must be called at most once");
        let handle = thread::spawn(move || -> Result<(), Error> {
            writeln!(
                sink,
                "   | {} |",
                schema.attributes.iter().map(|a| format!("{:15}", a.name)).collect::<Vec<_>>().join(" | ")
            )?;
            let mut row_id = 0usize;
            while let Some(r) = input.remove() {
                let values = r.values()?;
                write!(sink, "{:2} |", row_id)?;
                for v in &values {
                    write!(sink, " {:15} |", v)?;
                }
                writeln!(sink)?;
                row_id += 1;
            }
            sink.flush()?;
            Ok(())
        });
        self.handle = Some(handle);
    }

    pub fn wait_until_done(&mut self) -> Result<(), Error> {
        self.handle.take().expect("WriteOut::run must be called before wait_until_done").join().map_err(|_| Error::WorkerPanicked)?
    }
}
