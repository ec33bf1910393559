//! Batch output: refinement results ↔ CSV/Parquet files.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anchorfit_core::batch::{self, results_schema};
use anchorfit_core::{Decision, RefinementResult};
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::csv::WriterBuilder;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{BatchInputError, BatchOutputError};
use crate::table::{BatchFormat, read_table, require_columns, score_column, text_column};

/// One row of a results file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredResult {
    pub anchor: String,
    pub original_text: String,
    pub improved_text: String,
    pub tag: String,
    pub old_score: f64,
    pub new_score: f64,
    pub percent_change: Option<f64>,
    pub decision: Decision,
    pub attempts: u32,
}

impl From<&RefinementResult> for StoredResult {
    fn from(r: &RefinementResult) -> Self {
        Self {
            anchor: r.anchor.clone(),
            original_text: r.original_text.clone(),
            improved_text: r.final_text.clone(),
            tag: r.tag.as_str().to_string(),
            old_score: r.baseline_score,
            new_score: r.final_score,
            percent_change: r.percent_change,
            decision: r.decision,
            attempts: r.attempts,
        }
    }
}

/// Build one record batch in input order.
pub fn results_to_batch(results: &[RefinementResult]) -> Result<RecordBatch, ArrowError> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(results.iter().map(|r| r.anchor.as_str()))),
        Arc::new(StringArray::from_iter_values(
            results.iter().map(|r| r.original_text.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            results.iter().map(|r| r.final_text.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(results.iter().map(|r| r.tag.as_str()))),
        Arc::new(Float64Array::from_iter_values(
            results.iter().map(|r| r.baseline_score),
        )),
        Arc::new(Float64Array::from_iter_values(results.iter().map(|r| r.final_score))),
        Arc::new(results.iter().map(|r| r.percent_change).collect::<Float64Array>()),
        Arc::new(StringArray::from_iter_values(
            results.iter().map(|r| r.decision.as_str()),
        )),
        Arc::new(UInt32Array::from_iter_values(results.iter().map(|r| r.attempts))),
    ];
    RecordBatch::try_new(Arc::new(results_schema()), columns)
}

/// Write results to `path`; the extension picks CSV or Parquet. Parent
/// directories are created. Returns the number of rows written.
pub fn write_results(path: &Path, results: &[RefinementResult]) -> Result<usize, BatchOutputError> {
    let format = BatchFormat::from_path(path)
        .ok_or_else(|| BatchOutputError::UnsupportedFormat(path.to_path_buf()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let batch = results_to_batch(results)?;
    let file = File::create(path)?;
    match format {
        BatchFormat::Csv => {
            let mut writer = WriterBuilder::new().with_header(true).build(file);
            writer.write(&batch)?;
        }
        BatchFormat::Parquet => {
            let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
            writer.write(&batch)?;
            writer.close()?;
        }
    }
    info!(path = %path.display(), rows = batch.num_rows(), "wrote results");
    Ok(batch.num_rows())
}

/// Read a results file written by [`write_results`]. Rows with an unknown
/// decision label are skipped.
pub fn read_results(path: &Path) -> Result<Vec<StoredResult>, BatchInputError> {
    let (schema, batches) = read_table(path)?;
    let names = [
        batch::ANCHOR,
        batch::ORIGINAL_TEXT,
        batch::IMPROVED_TEXT,
        batch::TAG,
        batch::OLD_SCORE,
        batch::NEW_SCORE,
        batch::PERCENT_CHANGE,
        batch::DECISION,
        batch::ATTEMPTS,
    ];
    let idx = require_columns(&schema, &names)?;

    let mut out = Vec::new();
    for rb in &batches {
        let cols: Vec<Vec<String>> = idx
            .iter()
            .map(|&i| text_column(rb, i))
            .collect::<Result<_, _>>()?;
        let old_scores = score_column(rb, idx[4])?;
        let new_scores = score_column(rb, idx[5])?;
        let changes = score_column(rb, idx[6])?;
        for row in 0..rb.num_rows() {
            let Some(decision) = Decision::from_label(&cols[7][row]) else {
                warn!(row, label = %cols[7][row], "skipping row with unknown decision");
                continue;
            };
            out.push(StoredResult {
                anchor: cols[0][row].clone(),
                original_text: cols[1][row].clone(),
                improved_text: cols[2][row].clone(),
                tag: cols[3][row].clone(),
                old_score: old_scores[row].unwrap_or(0.0),
                new_score: new_scores[row].unwrap_or(0.0),
                percent_change: changes[row],
                decision,
                attempts: cols[8][row].trim().parse().unwrap_or(0),
            });
        }
    }
    Ok(out)
}
