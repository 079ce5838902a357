//! Centralizes the tunables that the teacher scatters as module-level
//! `const`s (e.g. `pager::PAGE_SIZE`). This system has enough knobs —
//! page size, pipe capacity, sort working set, join block size, the
//! range-selectivity heuristic — that a single struct threaded through
//! construction is clearer than a pile of free constants.

#[derive(Debug, Clone)]
pub struct Config {
    /// Size in bytes of one page of a paged file. Deployment-chosen; the
    /// spec suggests 128 KiB for production use, but tests use something
    /// much smaller to force multi-page and multi-run behavior cheaply.
    pub page_size: usize,
    /// Capacity, in records, of a bounded pipe between two operators.
    pub pipe_capacity: usize,
    /// Default working-set size, in pages, for the sort engine's phase 1
    /// run generation, used when an operator doesn't call `use_n_pages`.
    pub sort_pages: usize,
    /// Default block size, in pages, for the block-nested-loop join's
    /// outer (larger) side.
    pub bnl_block_pages: usize,
    /// The uncalibrated constant used for range-selection cardinality
    /// estimates (§4.8). The source hardcodes 1/3; this implementation
    /// keeps the value but makes it configurable.
    pub range_selectivity: f64,
    /// Directory holding `<table>.bin`, `<table>.bin.meta`, and
    /// `<table>.schema` files.
    pub data_dir: std::path::PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_size: 128 * 1024,
            pipe_capacity: 100,
            sort_pages: 16,
            bnl_block_pages: 16,
            range_selectivity: 1.0 / 3.0,
            data_dir: std::path::PathBuf::from("."),
        }
    }
}
