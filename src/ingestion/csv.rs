//! CSV loading implementation.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{DataSet, DataType, Schema, Value};

use super::inference::{infer_schema, parse_date, parse_timestamp};

/// Options controlling how a delimited file is read and typed.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    /// Field delimiter byte (default `,`).
    pub delimiter: u8,
    /// Cell values (after trimming) that are read as [`Value::Null`].
    pub null_values: Vec<String>,
    /// Column types forced by the caller, replacing the inferred type.
    pub type_overrides: Vec<(String, DataType)>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            null_values: ["", "NA", "N/A", "NULL", "null", "NaN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            type_overrides: Vec::new(),
        }
    }
}

impl CsvOptions {
    fn is_null(&self, trimmed: &str) -> bool {
        self.null_values.iter().any(|n| n == trimmed)
    }

    fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(true).delimiter(self.delimiter);
        builder
    }
}

/// Load a CSV file into an in-memory [`DataSet`], inferring column types.
///
/// Rules:
///
/// - The file must exist ([`Error::FileAccess`] otherwise) and start with a header row.
/// - Every record must have as many fields as the header ([`Error::Csv`] otherwise).
/// - The resulting schema has one field per header column, in header order.
pub fn load_csv_from_path(path: impl AsRef<Path>, options: &CsvOptions) -> Result<DataSet> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rdr = options.reader_builder().from_reader(file);
    load_csv_from_reader(&mut rdr, options)
}

/// Load CSV data from an existing CSV reader, inferring column types.
pub fn load_csv_from_reader<R: Read>(
    rdr: &mut csv::Reader<R>,
    options: &CsvOptions,
) -> Result<DataSet> {
    let headers = read_headers(rdr)?;
    let records = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;

    let mut schema = infer_schema(&headers, &records, |cell| options.is_null(cell));
    for (column, data_type) in &options.type_overrides {
        let idx = schema
            .index_of(column)
            .ok_or_else(|| Error::SchemaMismatch {
                message: format!(
                    "type override for unknown column '{column}'. headers={headers:?}"
                ),
            })?;
        schema.fields[idx].data_type = *data_type;
    }

    let col_idxs: Vec<usize> = (0..schema.len()).collect();
    let rows = parse_records(&records, &schema, &col_idxs, options)?;
    Ok(DataSet::new(schema, rows))
}

/// Load CSV data using a caller-declared [`Schema`] instead of inference.
///
/// Headers must contain all schema fields (order can differ); extra CSV columns are ignored.
pub fn load_csv_with_schema<R: Read>(
    rdr: &mut csv::Reader<R>,
    schema: &Schema,
    options: &CsvOptions,
) -> Result<DataSet> {
    let headers = read_headers(rdr)?;

    // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
    let mut col_idxs = Vec::with_capacity(schema.len());
    for field in &schema.fields {
        match headers.iter().position(|h| *h == field.name) {
            Some(idx) => col_idxs.push(idx),
            None => {
                return Err(Error::SchemaMismatch {
                    message: format!(
                        "missing required column '{field}'. headers={headers:?}",
                        field = field.name
                    ),
                });
            }
        }
    }

    let records = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;
    let rows = parse_records(&records, schema, &col_idxs, options)?;
    Ok(DataSet::new(schema.clone(), rows))
}

fn read_headers<R: Read>(rdr: &mut csv::Reader<R>) -> Result<Vec<String>> {
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_owned).collect();

    if headers.is_empty() || (headers.len() == 1 && headers[0].trim().is_empty()) {
        return Err(Error::SchemaMismatch {
            message: "header row is empty".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(Error::SchemaMismatch {
                message: format!("column {} has an empty name", idx + 1),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(Error::SchemaMismatch {
                message: format!("duplicate column '{name}'"),
            });
        }
    }
    Ok(headers)
}

fn parse_records(
    records: &[csv::StringRecord],
    schema: &Schema,
    col_idxs: &[usize],
    options: &CsvOptions,
) -> Result<Vec<Vec<Value>>> {
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(records.len());
    for (row_idx0, record) in records.iter().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;

        let mut row: Vec<Value> = Vec::with_capacity(schema.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_typed_value(
                user_row,
                &field.name,
                field.data_type,
                raw,
                options,
            )?);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: DataType,
    raw: &str,
    options: &CsvOptions,
) -> Result<Value> {
    let trimmed = raw.trim();
    if options.is_null(trimmed) {
        return Ok(Value::Null);
    }

    let parse_error = |message: String| Error::ParseError {
        row,
        column: column.to_owned(),
        raw: raw.to_owned(),
        message,
    };

    match data_type {
        // Text keeps surrounding whitespace; trimming only applies to nulls and typed parses.
        DataType::Utf8 => Ok(Value::Utf8(raw.to_owned())),
        DataType::Int64 => trimmed
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| parse_error(e.to_string())),
        DataType::Float64 => trimmed
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| parse_error(e.to_string())),
        DataType::Bool => parse_bool(trimmed).map(Value::Bool).map_err(parse_error),
        DataType::Date => parse_date(trimmed)
            .map(Value::Date)
            .ok_or_else(|| parse_error("expected date (YYYY-MM-DD)".to_string())),
        DataType::Timestamp => parse_timestamp(trimmed)
            .map(Value::Timestamp)
            .ok_or_else(|| parse_error("expected timestamp (YYYY-MM-DD HH:MM:SS)".to_string())),
    }
}

fn parse_bool(s: &str) -> std::result::Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}
