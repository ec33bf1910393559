//! Batch input: upstream rows → refinement requests.
//!
//! Column presence is checked before any row is touched, so a malformed
//! file fails fast instead of producing a partial run.

use std::path::Path;

use anchorfit_core::{BatchConfig, ColumnNames, RefinementRequest, StructuralTag};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::error::BatchInputError;
use crate::table::{read_table, require_columns, score_column, text_column};

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("invalid score regex"));

/// One upstream row, all fields as text.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRow {
    pub tag: String,
    pub content: String,
    pub anchor: String,
    pub similarity: Option<f64>,
    pub status: String,
}

/// Rows selected for refinement, plus why the others were skipped.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub requests: Vec<RefinementRequest>,
    pub total_rows: usize,
    pub incompatible: usize,
    pub out_of_band: usize,
}

/// Read every row of a CSV or Parquet batch file.
pub fn read_rows(path: &Path, columns: &ColumnNames) -> Result<Vec<InputRow>, BatchInputError> {
    let (schema, batches) = read_table(path)?;
    let idx = require_columns(&schema, &columns.all())?;

    let mut rows = Vec::new();
    for batch in &batches {
        let tag = text_column(batch, idx[0])?;
        let content = text_column(batch, idx[1])?;
        let anchor = text_column(batch, idx[2])?;
        let similarity = score_column(batch, idx[3])?;
        let status = text_column(batch, idx[4])?;

        for i in 0..batch.num_rows() {
            rows.push(InputRow {
                tag: tag[i].clone(),
                content: content[i].clone(),
                anchor: anchor[i].clone(),
                similarity: similarity[i],
                status: status[i].clone(),
            });
        }
    }
    info!(path = %path.display(), rows = rows.len(), "read batch input");
    Ok(rows)
}

/// Keep rows whose status matches the compatible label and whose score lies
/// in the near-miss band.
pub fn select_requests(rows: &[InputRow], config: &BatchConfig, max_attempts: u32) -> Selection {
    let compatible = normalize_status(&config.compatible_status);
    let mut selection = Selection {
        total_rows: rows.len(),
        ..Selection::default()
    };

    for row in rows {
        if normalize_status(&row.status) != compatible {
            selection.incompatible += 1;
            continue;
        }
        let Some(score) = row.similarity.filter(|s| config.band.contains(*s)) else {
            selection.out_of_band += 1;
            continue;
        };
        selection.requests.push(
            RefinementRequest::new(
                row.anchor.trim(),
                row.content.trim(),
                StructuralTag::from_label(&row.tag),
                score,
            )
            .with_max_attempts(max_attempts),
        );
    }

    if selection.requests.is_empty() && !rows.is_empty() {
        warn!(
            rows = rows.len(),
            incompatible = selection.incompatible,
            out_of_band = selection.out_of_band,
            "no rows left after filtering"
        );
    }
    selection
}

/// Read a batch file and select the rows to refine.
pub fn load_requests(
    path: &Path,
    config: &BatchConfig,
    max_attempts: u32,
) -> Result<Selection, BatchInputError> {
    let rows = read_rows(path, &config.columns)?;
    let selection = select_requests(&rows, config, max_attempts);
    info!(
        selected = selection.requests.len(),
        total = selection.total_rows,
        band_min = config.band.min,
        band_max = config.band.max,
        "selected near-miss rows"
    );
    Ok(selection)
}

/// Parse a similarity score. Plain float text (exponent form included) is
/// taken as is; otherwise `%` is dropped, `,` is a decimal separator, and the
/// first number in the text wins.
pub fn parse_score(raw: &str) -> Option<f64> {
    if let Ok(score) = raw.trim().parse::<f64>() {
        return Some(score).filter(|s| s.is_finite());
    }
    let cleaned = raw.replace('%', "").replace(',', ".");
    LEADING_NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|s| s.is_finite())
}

/// Trim, lowercase and collapse inner whitespace.
pub fn normalize_status(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
