//! The load workflow: Loader → Session → Uploader → Reporter → teardown.

use std::path::PathBuf;

use tracing::warn;

use crate::error::{Error, Result};
use crate::ingestion::{CsvOptions, load_csv_from_path};
use crate::reporting::{LoadEvent, Reporter, Stage};
use crate::warehouse::sql::render_identifier;
use crate::warehouse::{
    ConnectionParams, Session, UploadOptions, UploadPlan, UploadResult, plan_upload,
    write_dataset,
};

/// Everything needed to load one file into one table.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Input delimited-text file.
    pub path: PathBuf,
    /// Destination table.
    pub table: String,
    pub connection: ConnectionParams,
    pub csv: CsvOptions,
    pub upload: UploadOptions,
}

/// Run the whole load.
///
/// Configuration is checked before the file is read, and the file is fully loaded before a
/// session is opened, so bad input never costs a login. Once opened, the session is closed on
/// every path. Each failure is reported with the stage it happened in and then returned.
pub fn run_load(request: &LoadRequest, reporter: &dyn Reporter) -> Result<UploadResult> {
    report_started(reporter);

    request
        .connection
        .validate()
        .map_err(|e| fail(reporter, Stage::Connect, e))?;
    request
        .upload
        .validate()
        .and_then(|_| render_identifier(&request.table, request.upload.quote_identifiers))
        .map_err(|e| fail(reporter, Stage::Upload, e))?;

    let dataset = load_csv_from_path(&request.path, &request.csv)
        .map_err(|e| fail(reporter, Stage::Load, e))?;
    reporter.report(&LoadEvent::Loaded {
        path: &request.path,
        rows: dataset.row_count(),
        columns: dataset.column_count(),
    });

    let params = &request.connection;
    let mut session = Session::open(params).map_err(|e| fail(reporter, Stage::Connect, e))?;
    reporter.report(&LoadEvent::Connected {
        account: &params.account,
        warehouse: &params.warehouse,
        database: &params.database,
        schema: &params.schema,
    });

    let uploaded = write_dataset(&mut session, &dataset, &request.table, &request.upload);
    let closed = session.close();

    let result = uploaded.map_err(|e| fail(reporter, Stage::Upload, e))?;
    if result.metadata.created {
        reporter.report(&LoadEvent::TableCreated {
            table: &request.table,
        });
    }
    reporter.report(&LoadEvent::Uploaded {
        table: &request.table,
        nrows: result.nrows,
        nchunks: result.nchunks,
    });

    match closed {
        Ok(()) => reporter.report(&LoadEvent::Closed),
        // The rows are already committed; a failed logout does not undo the load.
        Err(e) => {
            warn!("Upload committed but closing the session failed: {e}");
            let _ = fail(reporter, Stage::Close, e);
        }
    }
    Ok(result)
}

/// Load the file and render the upload statements without connecting.
pub fn plan_load(request: &LoadRequest, reporter: &dyn Reporter) -> Result<UploadPlan> {
    report_started(reporter);

    let dataset = load_csv_from_path(&request.path, &request.csv)
        .map_err(|e| fail(reporter, Stage::Load, e))?;
    reporter.report(&LoadEvent::Loaded {
        path: &request.path,
        rows: dataset.row_count(),
        columns: dataset.column_count(),
    });

    let plan = plan_upload(&dataset, &request.table, &request.upload)
        .map_err(|e| fail(reporter, Stage::Upload, e))?;
    reporter.report(&LoadEvent::DryRun {
        statements: &plan.statements,
    });
    Ok(plan)
}

fn report_started(reporter: &dyn Reporter) {
    reporter.report(&LoadEvent::Started {
        executable: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    });
}

fn fail(reporter: &dyn Reporter, stage: Stage, err: Error) -> Error {
    reporter.report(&LoadEvent::Failed {
        stage,
        category: err.category(),
        message: err.to_string(),
    });
    err
}
