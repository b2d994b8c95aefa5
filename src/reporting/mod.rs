//! Reporter: human-readable progress lines for a load.
//!
//! The pipeline emits one [`LoadEvent`] after each step. Reporters are purely observational and
//! never affect control flow.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};

use crate::error::ErrorCategory;

/// Workflow step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Connect,
    Upload,
    Close,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Connect => "connect",
            Stage::Upload => "upload",
            Stage::Close => "close",
        };
        f.write_str(name)
    }
}

/// Progress events emitted by [`crate::pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent<'a> {
    Started {
        executable: &'a str,
        version: &'a str,
    },
    Loaded {
        path: &'a Path,
        rows: usize,
        columns: usize,
    },
    Connected {
        account: &'a str,
        warehouse: &'a str,
        database: &'a str,
        schema: &'a str,
    },
    TableCreated {
        table: &'a str,
    },
    Uploaded {
        table: &'a str,
        nrows: u64,
        nchunks: usize,
    },
    Closed,
    DryRun {
        statements: &'a [String],
    },
    Failed {
        stage: Stage,
        category: ErrorCategory,
        message: String,
    },
}

impl fmt::Display for LoadEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadEvent::Started {
                executable,
                version,
            } => write!(f, "Running {executable} version {version}"),
            LoadEvent::Loaded {
                path,
                rows,
                columns,
            } => write!(
                f,
                "Loaded {rows} rows and {columns} columns from {}",
                path.display()
            ),
            LoadEvent::Connected {
                account,
                warehouse,
                database,
                schema,
            } => write!(
                f,
                "Connected to account {account} (warehouse {warehouse}, schema {database}.{schema})"
            ),
            LoadEvent::TableCreated { table } => write!(f, "Created table {table}"),
            LoadEvent::Uploaded { nrows, nchunks, .. } => {
                write!(f, "Inserted {nrows} rows in {nchunks} batch(es).")
            }
            LoadEvent::Closed => write!(f, "Connection closed."),
            LoadEvent::DryRun { statements } => {
                write!(f, "Dry run, {} statement(s) would run:", statements.len())?;
                for s in statements.iter() {
                    write!(f, "\n  {s}")?;
                }
                Ok(())
            }
            LoadEvent::Failed {
                stage,
                category,
                message,
            } => write!(f, "{stage} failed ({category:?}): {message}"),
        }
    }
}

impl LoadEvent<'_> {
    /// Short machine-readable tag for the event.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadEvent::Started { .. } => "started",
            LoadEvent::Loaded { .. } => "loaded",
            LoadEvent::Connected { .. } => "connected",
            LoadEvent::TableCreated { .. } => "table_created",
            LoadEvent::Uploaded { .. } => "uploaded",
            LoadEvent::Closed => "closed",
            LoadEvent::DryRun { .. } => "dry_run",
            LoadEvent::Failed { .. } => "failed",
        }
    }
}

/// Receives [`LoadEvent`]s.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &LoadEvent<'_>);
}

/// Prints each event as a line on stdout.
#[derive(Debug, Default)]
pub struct StdOutReporter;

impl Reporter for StdOutReporter {
    fn report(&self, event: &LoadEvent<'_>) {
        println!("{event}");
    }
}

/// Appends events to a local log file as tab-separated `time<TAB>kind<TAB>text` records.
///
/// The file is opened on the first event. Open and write failures are ignored so a broken log
/// never stops a load.
#[derive(Debug)]
pub struct FileReporter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileReporter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }
}

impl Reporter for FileReporter {
    fn report(&self, event: &LoadEvent<'_>) {
        let Ok(mut slot) = self.file.lock() else {
            return;
        };
        if slot.is_none() {
            *slot = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .ok();
        }
        let Some(file) = slot.as_mut() else {
            return;
        };

        let at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let kind = event.kind();
        let record = match event {
            // One record per statement.
            LoadEvent::DryRun { statements } => statements
                .iter()
                .map(|s| format!("{at}\t{kind}\t{s}\n"))
                .collect::<String>(),
            _ => format!("{at}\t{kind}\t{event}\n"),
        };
        let _ = file.write_all(record.as_bytes());
    }
}

/// Fans events out to several reporters, in order.
#[derive(Default)]
pub struct CompositeReporter {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl CompositeReporter {
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        Self { reporters }
    }

    pub fn push(&mut self, reporter: Arc<dyn Reporter>) {
        self.reporters.push(reporter);
    }
}

impl Reporter for CompositeReporter {
    fn report(&self, event: &LoadEvent<'_>) {
        self.reporters.iter().for_each(|r| r.report(event));
    }
}
