// dispatch_core/src/lib.rs

//! Incremental import of 5-minute generator dispatch data into a grid-indexed store
//! with derived 30-minute and daily summaries.

pub mod row;
pub mod grid;
pub mod store;
pub mod utils;
pub mod ingest;
pub mod format;
pub mod matrix;
pub mod archive;
pub mod bulk_csv;
pub mod live_csv;
pub mod registry;
pub mod settings;
pub mod generators;
pub mod aggregation;
pub mod completeness;
