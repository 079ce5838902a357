pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod operators;
pub mod page;
pub mod paged_file;
pub mod parse;
pub mod pipe;
pub mod planner;
pub mod predicate;
pub mod record;
pub mod repl;
pub mod schema;
pub mod sort;
pub mod stats;
pub mod table;
pub mod types;

extern crate pest;
#[macro_use]
extern crate pest_derive;
