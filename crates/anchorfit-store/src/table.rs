//! Format detection and column access shared by the batch reader and the
//! results reader.

use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Float64Type, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use crate::error::BatchInputError;
use crate::input::parse_score;

/// Tabular file format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFormat {
    Csv,
    Parquet,
}

impl BatchFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "parquet" | "pq" => Some(Self::Parquet),
            _ => None,
        }
    }
}

/// Read a CSV or Parquet file. CSV columns are all read as text so that
/// scores like `72%` or `0,7` survive until they are parsed leniently.
pub(crate) fn read_table(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>), BatchInputError> {
    if !path.exists() {
        return Err(BatchInputError::NotFound(path.to_path_buf()));
    }
    let format = BatchFormat::from_path(path)
        .ok_or_else(|| BatchInputError::UnsupportedFormat(path.to_path_buf()))?;

    let (schema, batches) = match format {
        BatchFormat::Csv => read_csv(path)?,
        BatchFormat::Parquet => read_parquet(path)?,
    };
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    debug!(path = %path.display(), rows, columns = schema.fields().len(), "read table");
    Ok((schema, batches))
}

fn read_csv(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>), BatchInputError> {
    let mut file = File::open(path)?;
    let (inferred, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, Some(100))?;
    file.rewind()?;

    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    let schema: SchemaRef = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .build(file)?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok((schema, batches?))
}

fn read_parquet(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>), BatchInputError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok((schema, batches?))
}

/// Column indices for `names`, or the full list of names that are missing.
pub(crate) fn require_columns(
    schema: &Schema,
    names: &[&str],
) -> Result<Vec<usize>, BatchInputError> {
    let missing: Vec<String> = names
        .iter()
        .filter(|n| schema.index_of(n).is_err())
        .map(|n| n.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(BatchInputError::MissingColumns {
            missing,
            available: schema.fields().iter().map(|f| f.name().clone()).collect(),
        });
    }
    names
        .iter()
        .map(|n| schema.index_of(n).map_err(BatchInputError::from))
        .collect()
}

/// A column cast to text; nulls become empty strings.
pub(crate) fn text_column(batch: &RecordBatch, index: usize) -> Result<Vec<String>, ArrowError> {
    let array = cast(batch.column(index), &DataType::Utf8)?;
    let strings = array.as_string::<i32>();
    Ok((0..strings.len())
        .map(|i| {
            if strings.is_null(i) {
                String::new()
            } else {
                strings.value(i).to_string()
            }
        })
        .collect())
}

/// Read a score column. Numeric columns are cast to `Float64` and read
/// directly; text columns go through [`parse_score`]. Nulls read as `None`.
pub(crate) fn score_column(
    batch: &RecordBatch,
    index: usize,
) -> Result<Vec<Option<f64>>, ArrowError> {
    let column = batch.column(index);
    if !column.data_type().is_numeric() {
        return Ok(text_column(batch, index)?
            .iter()
            .map(|cell| parse_score(cell))
            .collect());
    }
    let array = cast(column, &DataType::Float64)?;
    let floats = array.as_primitive::<Float64Type>();
    Ok(floats
        .iter()
        .map(|v| v.filter(|s| s.is_finite()))
        .collect())
}
