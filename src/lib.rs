//! `csv-snowflake-loader` loads a delimited text file into memory and bulk-inserts it into a
//! Snowflake table.
//!
//! The workflow is a single linear pipeline:
//!
//! 1. **Loader** ([`ingestion`]): reads the file into a [`types::DataSet`], inferring a
//!    [`types::Schema`] from the header and cell contents.
//! 2. **Session** ([`warehouse::Session`]): one authenticated connection, opened from
//!    [`warehouse::ConnectionParams`] and released on every exit path.
//! 3. **Uploader** ([`warehouse::write_dataset`]): optionally creates the table, then inserts the
//!    rows in batches inside one transaction.
//! 4. **Reporter** ([`reporting`]): human-readable progress lines.
//!
//! [`pipeline::run_load`] wires the four together.
//!
//! ## Column types
//!
//! | inferred | Snowflake column | binding |
//! |---|---|---|
//! | [`types::DataType::Int64`] | `NUMBER(38,0)` | `FIXED` |
//! | [`types::DataType::Float64`] | `FLOAT` | `REAL` |
//! | [`types::DataType::Bool`] | `BOOLEAN` | `BOOLEAN` |
//! | [`types::DataType::Utf8`] | `VARCHAR` | `TEXT` |
//! | [`types::DataType::Date`] | `DATE` | `DATE` |
//! | [`types::DataType::Timestamp`] | `TIMESTAMP_NTZ` | `TIMESTAMP_NTZ` |
//!
//! ## Quick example
//!
//! ```no_run
//! use csv_snowflake_loader::ingestion::{CsvOptions, load_csv_from_path};
//! use csv_snowflake_loader::warehouse::{ConnectionParams, UploadOptions, with_session, write_dataset};
//!
//! # fn main() -> csv_snowflake_loader::Result<()> {
//! # let params: ConnectionParams = unimplemented!();
//! let ds = load_csv_from_path("orders.csv", &CsvOptions::default())?;
//! let result = with_session(&params, |session| {
//!     write_dataset(session, &ds, "ORDERS", &UploadOptions::default())
//! })?;
//! println!("Inserted {} rows in {} batch(es).", result.nrows, result.nchunks);
//! # Ok(())
//! # }
//! ```
//!
//! Re-running an append load inserts the rows again; loads are not idempotent.

pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod reporting;
pub mod types;
pub mod warehouse;

pub use error::{ConnectionFailure, Error, ErrorCategory, Result};
