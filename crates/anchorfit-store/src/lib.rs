//! Batch storage: CSV and Parquet files in, refinement results out.

mod error;
mod table;

pub mod input;
pub mod output;
pub mod stats;

pub use error::{BatchInputError, BatchOutputError};
pub use input::{InputRow, Selection, load_requests, read_rows, select_requests};
pub use output::{StoredResult, read_results, results_to_batch, write_results};
pub use stats::ResultStats;
pub use table::BatchFormat;
