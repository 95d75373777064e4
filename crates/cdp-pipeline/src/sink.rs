//! Append-only CSV output tables shared by extraction tasks
//!
//! Every field is quoted, numbers included, and rows end in CRLF.
//!
//! Each append encodes its rows up front, then opens the file in append mode,
//! writes the whole batch with a single `write_all`, and closes it again, all
//! while holding the sink's lock. Rows from concurrent appenders therefore
//! never interleave.

use crate::record::Record;
use cdp_common::{CdpError, Result};
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;

/// File name of the `(id, level)` table
pub const FIRST_SINK_FILE: &str = "first.csv";

/// File name of the `(id, object_name)` table
pub const SECOND_SINK_FILE: &str = "second.csv";

/// Row of the first table
#[derive(Debug, Clone, Serialize)]
pub struct LevelRow<'a> {
    pub id: &'a str,
    pub level: u8,
}

/// Row of the second table
#[derive(Debug, Clone, Serialize)]
pub struct ObjectRow<'a> {
    pub id: &'a str,
    pub object_name: &'a str,
}

/// One CSV file, appended to atomically
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl OutputSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `rows` as one atomic batch, returning how many were written
    pub fn append<S: Serialize>(&self, rows: &[S]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let encoded = encode_rows(rows)?;

        let _guard = self
            .lock
            .lock()
            .map_err(|e| CdpError::poisoned("output sink", e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&encoded)?;
        file.flush()?;

        trace!(sink = %self.path.display(), rows = rows.len(), "Appended rows");
        Ok(rows.len())
    }

    /// Number of rows currently in the file; a missing file counts as empty
    pub fn row_count(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;

        let mut count = 0;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }
}

fn encode_rows<S: Serialize>(rows: &[S]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    for row in rows {
        writer.serialize(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| CdpError::Io(e.into_error()))
}

/// The two output tables of an extraction run
///
/// Both appends for one record happen under a single lock shared by every
/// task of the run, so a record's level row and object rows are written as
/// one unit relative to other records.
#[derive(Debug)]
pub struct ExtractionSinks {
    levels: OutputSink,
    objects: OutputSink,
    lock: Mutex<()>,
}

impl ExtractionSinks {
    /// Sinks at `first.csv` / `second.csv` inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            levels: OutputSink::new(dir.join(FIRST_SINK_FILE)),
            objects: OutputSink::new(dir.join(SECOND_SINK_FILE)),
            lock: Mutex::new(()),
        }
    }

    pub fn levels(&self) -> &OutputSink {
        &self.levels
    }

    pub fn objects(&self) -> &OutputSink {
        &self.objects
    }

    /// Append the rows of one record, returning `(level_rows, object_rows)`
    pub fn append_record(&self, record: &Record) -> Result<(usize, usize)> {
        let level_rows = [LevelRow {
            id: &record.id,
            level: record.level,
        }];
        let object_rows: Vec<ObjectRow<'_>> = record
            .objects
            .iter()
            .map(|object| ObjectRow {
                id: &record.id,
                object_name: &object.name,
            })
            .collect();

        let _guard = self
            .lock
            .lock()
            .map_err(|e| CdpError::poisoned("extraction sinks", e))?;

        let levels = self.levels.append(&level_rows)?;
        let objects = self.objects.append(&object_rows)?;
        Ok((levels, objects))
    }
}
