//! Loader: reads a delimited text file fully into an in-memory [`crate::types::DataSet`].
//!
//! Most callers should use [`load_csv_from_path`], which infers column types from the cell
//! contents (see [`inference`] for the rules). [`load_csv_with_schema`] is available when the
//! caller already knows the schema.

pub mod csv;
pub mod inference;

pub use self::csv::{CsvOptions, load_csv_from_path, load_csv_from_reader, load_csv_with_schema};
pub use inference::{infer_column_type, infer_schema};
