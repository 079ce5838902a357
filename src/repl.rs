//! REPL dispatcher (§6, §10): reads one command per line, parses it,
//! and dispatches to the catalog/loader/planner, printing a diagnostic
//! on recoverable failure and continuing (§7). Thin and sparsely
//! documented, like the teacher's own `pt_to_ast.rs` glue, rather than
//! one of the three dense core subsystems.

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{Error, Severity};
use crate::loader;
use crate::operators::write_out::WriteOut;
use crate::parse::{self, CreateTable, DropTable, InsertInto, Organization, OutputTarget, Statement, UpdateStatistics};
use crate::planner;
use crate::schema::Attribute;
use crate::stats::Statistics;
use crate::table::Table;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};
use std::path::PathBuf;

const STATS_FILE: &str = "stats.txt";

pub struct Repl {
    catalog: Catalog,
    stats: Statistics,
    config: Config,
    output_target: OutputTarget,
}

impl Repl {
    pub fn new(config: Config) -> Result<Repl, Error> {
        std::fs::create_dir_all(&config.data_dir)?;
        let catalog = Catalog::load(&config.data_dir)?;
        let stats = Statistics::load(Self::stats_path(&config))?;
        Ok(Repl { catalog, stats, config, output_target: OutputTarget::Stdout })
    }

    fn stats_path(config: &Config) -> PathBuf {
        config.data_dir.join(STATS_FILE)
    }

    fn bin_path(&self, name: &str) -> PathBuf {
        self.config.data_dir.join(format!("{name}.bin"))
    }

    /// Runs to completion, reading one command per line from `input` and
    /// writing prompts/diagnostics to `diag`. Returns the process exit
    /// code (§6): 0 on clean `QUIT` or end of input, 1 on a fatal error.
    pub fn run<R: BufRead>(&mut self, input: R, diag: &mut dyn Write) -> i32 {
        for line in input.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    let _ = writeln!(diag, "fatal: {e}");
                    return 1;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match self.dispatch(&line) {
                Ok(true) => return 0,
                Ok(false) => {}
                Err(e) => {
                    let _ = writeln!(diag, "error: {e}");
                    if e.severity() == Severity::Fatal {
                        return 1;
                    }
                }
            }
        }
        0
    }

    /// Dispatches one command. Returns `Ok(true)` on `QUIT`.
    fn dispatch(&mut self, line: &str) -> Result<bool, Error> {
        let stmt = parse::parse(line).map_err(Error::Parse)?;
        match stmt {
            Statement::CreateTable(ct) => self.do_create(ct)?,
            Statement::InsertInto(ins) => self.do_insert(ins)?,
            Statement::DropTable(d) => self.do_drop(d)?,
            Statement::SetOutput(t) => self.output_target = t,
            Statement::UpdateStatistics(u) => self.do_update_statistics(u)?,
            Statement::Select(q) => self.do_select(q)?,
            Statement::Quit => return Ok(true),
        }
        Ok(false)
    }

    fn do_create(&mut self, ct: CreateTable) -> Result<(), Error> {
        let attributes: Vec<Attribute> = ct.attributes.iter().map(|(n, t)| Attribute::new(n.clone(), *t)).collect();
        let schema = self.catalog.create_table(&ct.name, attributes)?;
        let path = self.bin_path(&ct.name);
        match ct.organization {
            Organization::Heap => {
                Table::create_heap(&path, schema, self.config.page_size)?.close()?;
            }
            Organization::Sorted(cols) => {
                let order: Vec<usize> = cols.iter().map(|c| schema.index_of(c)).collect::<Result<_, _>>()?;
                Table::create_sorted(&path, schema, order, self.config.page_size, self.config.pipe_capacity, self.config.sort_pages)?.close()?;
            }
        }
        Ok(())
    }

    fn do_insert(&mut self, ins: InsertInto) -> Result<(), Error> {
        let schema = self.catalog.schema(&ins.name)?.clone();
        let path = self.bin_path(&ins.name);
        let mut table = Table::open(&path, schema, self.config.page_size, self.config.pipe_capacity, self.config.sort_pages)?;
        loader::load_file(&ins.path, ',', &mut table, self.config.page_size)?;
        table.close()?;
        Ok(())
    }

    fn do_drop(&mut self, d: DropTable) -> Result<(), Error> {
        self.catalog.drop_table(&d.name)?;
        let bin_path = self.bin_path(&d.name);
        let mut meta_os = bin_path.as_os_str().to_os_string();
        meta_os.push(".meta");
        std::fs::remove_file(&bin_path).ok();
        std::fs::remove_file(PathBuf::from(meta_os)).ok();
        Ok(())
    }

    /// Rescans `name` end to end, recording its tuple count and, per
    /// attribute, the count of distinct textual representations seen —
    /// `Value` has no `Hash`/`Eq` impl (a `Double` can't support one),
    /// so distinctness is judged on `Display` output, same as the
    /// planner's cross-type-safe `compare_values` sidesteps float
    /// equality rather than ever attempting it.
    fn do_update_statistics(&mut self, u: UpdateStatistics) -> Result<(), Error> {
        let schema = self.catalog.schema(&u.name)?.clone();
        let path = self.bin_path(&u.name);
        let mut table = Table::open(&path, schema.clone(), self.config.page_size, self.config.pipe_capacity, self.config.sort_pages)?;
        table.move_first()?;
        let mut count = 0.0;
        let mut distinct: Vec<HashSet<String>> = vec![HashSet::new(); schema.len()];
        while let Some(record) = table.get_next()? {
            count += 1.0;
            for (i, set) in distinct.iter_mut().enumerate() {
                set.insert(record.get(i)?.to_string());
            }
        }
        table.close()?;
        let distinct_counts: HashMap<String, f64> =
            schema.attributes.iter().zip(distinct.iter()).map(|(a, set)| (a.name.clone(), set.len() as f64)).collect();
        self.stats.set_relation(u.name, count, distinct_counts);
        self.stats.save(Self::stats_path(&self.config))?;
        Ok(())
    }

    fn open_output(&self) -> Result<Box<dyn Write + Send>, Error> {
        match &self.output_target {
            OutputTarget::Stdout => Ok(Box::new(std::io::stdout())),
            OutputTarget::None => Ok(Box::new(std::io::sink())),
            OutputTarget::Path(p) => {
                let f = std::fs::File::create(p).map_err(|e| Error::OutputOpen(PathBuf::from(p), e))?;
                Ok(Box::new(f))
            }
        }
    }

    fn do_select(&mut self, q: crate::parse::SelectQuery) -> Result<(), Error> {
        let plan = planner::plan_select(&q, &self.catalog, &mut self.stats).map_err(Error::Planner)?;
        let (out_pipe, handles) = planner::execute(&plan, &self.catalog, &self.config).map_err(Error::Planner)?;
        let sink = self.open_output()?;
        let mut writer = WriteOut::new(out_pipe, plan.schema.clone(), sink);
        writer.run();
        writer.wait_until_done()?;
        for h in handles {
            h.wait_until_done().map_err(Error::Planner)?;
        }
        Ok(())
    }
}
