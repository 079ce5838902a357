//! Crate-wide error aggregation for the REPL boundary (§7). Every
//! submodule keeps its own `thiserror` enum (as the teacher does in
//! `pager.rs`/`table.rs`); this module composes them into one type so
//! `repl.rs` can classify a failure's propagation policy — continue,
//! abort the current command, or exit — without matching on each
//! submodule's enum individually.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] crate::parse::Error),
    #[error(transparent)]
    Catalog(#[from] crate::catalog::Error),
    #[error(transparent)]
    Table(#[from] crate::table::Error),
    #[error(transparent)]
    Schema(#[from] crate::schema::Error),
    #[error(transparent)]
    Record(#[from] crate::record::Error),
    #[error(transparent)]
    Planner(#[from] crate::planner::Error),
    #[error(transparent)]
    Operator(#[from] crate::operators::Error),
    #[error(transparent)]
    Loader(#[from] crate::loader::Error),
    #[error(transparent)]
    Stats(#[from] crate::stats::Error),
    #[error("opening output sink {0}: {1}")]
    OutputOpen(PathBuf, #[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which of §7's propagation policies applies to a given failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Report on stderr, keep accepting further commands.
    Recoverable,
    /// Report and abort the current query only; table state is untouched.
    AbortQuery,
    /// Unrecoverable; the process should exit non-zero.
    Fatal,
}

impl Error {
    pub fn severity(&self) -> Severity {
        use crate::operators::Error as OpError;
        match self {
            Error::Parse(_) => Severity::Recoverable,
            Error::Catalog(_) => Severity::Recoverable,
            Error::Stats(_) => Severity::Recoverable,
            Error::Loader(crate::loader::Error::FieldCountMismatch { .. }) => Severity::Recoverable,
            Error::Loader(crate::loader::Error::FieldCast { .. }) => Severity::Recoverable,
            Error::Loader(_) => Severity::Fatal,
            Error::Schema(_) => Severity::AbortQuery,
            Error::Planner(_) => Severity::AbortQuery,
            Error::Operator(OpError::WorkerPanicked) | Error::Operator(OpError::NonNumericExpression) => Severity::AbortQuery,
            Error::Operator(_) => Severity::Fatal,
            Error::Record(_) => Severity::AbortQuery,
            Error::Table(_) => Severity::Fatal,
            Error::OutputOpen(..) => Severity::AbortQuery,
            Error::Io(_) => Severity::Fatal,
        }
    }
}
