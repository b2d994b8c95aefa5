//! Uploader: writes a [`DataSet`] into a warehouse table over an open [`Session`].
//!
//! The write is all-or-nothing. Auto-creation runs first (DDL commits on its own in the
//! warehouse), then every batch is inserted inside one explicit transaction; any failure rolls
//! the transaction back so no rows from a failed upload remain in the table.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::DataSet;

use super::protocol::{self, Binding};
use super::session::Session;
use super::sql::{self, TableType};

/// Rows per `INSERT` batch unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 16_384;

/// Options controlling how a dataset is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Create the destination table from the dataset schema when it does not exist.
    pub auto_create_table: bool,
    /// Delete existing rows (inside the upload transaction) before inserting.
    pub overwrite: bool,
    /// Maximum rows per batch; must be > 0.
    pub chunk_size: usize,
    /// Quote table and column names so they keep their exact case.
    pub quote_identifiers: bool,
    /// Kind of table created by auto-creation.
    pub table_type: TableType,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            auto_create_table: true,
            overwrite: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            quote_identifiers: true,
            table_type: TableType::Permanent,
        }
    }
}

impl UploadOptions {
    /// Reject option values no upload can run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be > 0"));
        }
        Ok(())
    }
}

/// Extra details about a finished upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMetadata {
    /// Destination table, as named by the caller.
    pub table: String,
    /// `true` when the table was created by this upload.
    pub created: bool,
    /// Query ids of the `INSERT` statements, in batch order.
    pub query_ids: Vec<String>,
}

/// Outcome of [`write_dataset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadResult {
    /// `true` once the upload transaction committed.
    pub success: bool,
    /// Number of batches sent.
    pub nchunks: usize,
    /// Number of rows inserted.
    pub nrows: u64,
    pub metadata: UploadMetadata,
}

/// Statements an upload would run, rendered without connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    pub statements: Vec<String>,
    pub nchunks: usize,
    pub nrows: usize,
}

/// Render the statements [`write_dataset`] would send for `dataset`.
///
/// The existence check is omitted; `CREATE TABLE IF NOT EXISTS` is listed whenever
/// auto-creation is enabled.
pub fn plan_upload(dataset: &DataSet, table: &str, options: &UploadOptions) -> Result<UploadPlan> {
    options.validate()?;
    let quote = options.quote_identifiers;
    let batches = dataset.batches(options.chunk_size);

    let mut statements = Vec::with_capacity(batches.len() + 4);
    if options.auto_create_table {
        statements.push(sql::create_table_sql(
            table,
            &dataset.schema,
            quote,
            options.table_type,
        )?);
    }
    statements.push("BEGIN".to_string());
    if options.overwrite {
        statements.push(sql::delete_sql(table, quote)?);
    }
    let insert = sql::insert_sql(table, &dataset.schema, quote)?;
    for range in &batches {
        statements.push(format!("{insert} -- rows {}..{}", range.start + 1, range.end));
    }
    statements.push("COMMIT".to_string());

    Ok(UploadPlan {
        statements,
        nchunks: batches.len(),
        nrows: dataset.row_count(),
    })
}

/// Write `dataset` into `table`.
///
/// - Missing table with `auto_create_table` disabled fails with [`Error::Upload`] before any
///   row is sent.
/// - Rows are appended unless `overwrite` is set; re-running an append duplicates the data.
/// - On any failure after `BEGIN` the transaction is rolled back and the error reports
///   `rows_committed: 0`.
pub fn write_dataset(
    session: &mut Session,
    dataset: &DataSet,
    table: &str,
    options: &UploadOptions,
) -> Result<UploadResult> {
    options.validate()?;
    let quote = options.quote_identifiers;
    // Render everything up front so identifier errors surface before any statement runs.
    let insert = sql::insert_sql(table, &dataset.schema, quote)?;
    let create = sql::create_table_sql(table, &dataset.schema, quote, options.table_type)?;
    let delete = sql::delete_sql(table, quote)?;

    let exists = table_exists(session, table, quote).map_err(|e| upload_error(table, e))?;
    let mut created = false;
    if !exists {
        if !options.auto_create_table {
            return Err(Error::Upload {
                table: table.to_string(),
                message: "table does not exist and auto_create_table is disabled".to_string(),
                rows_committed: 0,
            });
        }
        session
            .execute(&create)
            .map_err(|e| upload_error(table, e))?;
        info!("Created table {table}");
        created = true;
    }

    session
        .execute("BEGIN")
        .map_err(|e| upload_error(table, e))?;
    let delete = options.overwrite.then_some(delete.as_str());
    match insert_batches(session, dataset, &insert, delete, options.chunk_size) {
        Ok((nchunks, nrows, query_ids)) => {
            session
                .execute("COMMIT")
                .map_err(|e| rollback(session, table, e))?;
            info!("Committed {nrows} rows into {table} in {nchunks} batch(es)");
            Ok(UploadResult {
                success: true,
                nchunks,
                nrows,
                metadata: UploadMetadata {
                    table: table.to_string(),
                    created,
                    query_ids,
                },
            })
        }
        Err(e) => Err(rollback(session, table, e)),
    }
}

fn table_exists(session: &mut Session, table: &str, quote: bool) -> Result<bool> {
    let bindings = protocol::positional([Binding::text(sql::stored_table_name(table, quote))]);
    let result = session.execute_with_bindings(sql::TABLE_EXISTS_SQL, &bindings)?;
    let count = result
        .first_value()
        .ok_or_else(|| Error::protocol("existence check returned no rows"))?
        .parse::<u64>()
        .map_err(|e| Error::protocol(format!("existence check returned a non-count: {e}")))?;
    Ok(count > 0)
}

fn insert_batches(
    session: &mut Session,
    dataset: &DataSet,
    insert: &str,
    delete: Option<&str>,
    chunk_size: usize,
) -> Result<(usize, u64, Vec<String>)> {
    if let Some(delete) = delete {
        session.execute(delete)?;
    }

    let batches = dataset.batches(chunk_size);
    let mut nrows = 0u64;
    let mut query_ids = Vec::with_capacity(batches.len());
    for (idx, range) in batches.iter().enumerate() {
        let len = range.len() as u64;
        let bindings = sql::batch_bindings(dataset, range.clone())?;
        let result = session.execute_with_bindings(insert, &bindings)?;
        // The warehouse reports the inserted count as the single result cell.
        let inserted = result
            .first_value()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(len);
        debug!("Batch {}/{} inserted {inserted} rows", idx + 1, batches.len());
        nrows += inserted;
        if let Some(id) = result.query_id {
            query_ids.push(id);
        }
    }
    Ok((batches.len(), nrows, query_ids))
}

fn rollback(session: &mut Session, table: &str, cause: Error) -> Error {
    if let Err(e) = session.execute("ROLLBACK") {
        warn!("ROLLBACK on {table} failed: {e}");
    }
    upload_error(table, cause)
}

fn upload_error(table: &str, cause: Error) -> Error {
    match cause {
        Error::Config { .. } | Error::Upload { .. } => cause,
        other => Error::Upload {
            table: table.to_string(),
            message: other.to_string(),
            rows_committed: 0,
        },
    }
}
