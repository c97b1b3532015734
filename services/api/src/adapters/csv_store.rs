//! services/api/src/adapters/csv_store.rs
//!
//! This module contains the file-backed store, the concrete implementation of the
//! `RecordStore` port from the `core` crate. Passages are appended to one CSV file,
//! and the learner's progress is kept as the single row of another.
//!
//! Nested values (vocabulary, questions, learned words) are flattened into single
//! cells by the core codec; the `csv` crate quotes any cell that needs it, so commas, quotes and
//! line breaks in free text never break row framing.

use chrono::{DateTime, Utc};
use csv::{ByteRecord, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use reading_adventure_core::codec::{
    decode_questions, decode_vocab_learned, decode_vocabulary, encode_questions,
    encode_vocab_learned, encode_vocabulary, format_timestamp, parse_timestamp,
};
use reading_adventure_core::domain::{PassageRecord, ProgressRecord};
use reading_adventure_core::ports::{PortError, PortResult, RecordStore};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const PASSAGES_FILE: &str = "passages.csv";
pub const PROGRESS_FILE: &str = "user_progress.csv";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A store that implements the `RecordStore` port on top of two CSV files.
#[derive(Clone, Debug)]
pub struct CsvStore {
    passages_path: PathBuf,
    progress_path: PathBuf,
}

impl CsvStore {
    /// Creates a new `CsvStore` backed by the given files.
    pub fn new(passages_path: impl Into<PathBuf>, progress_path: impl Into<PathBuf>) -> Self {
        Self {
            passages_path: passages_path.into(),
            progress_path: progress_path.into(),
        }
    }

    /// Uses the default file names inside `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self::new(dir.join(PASSAGES_FILE), dir.join(PROGRESS_FILE))
    }

    pub fn passages_path(&self) -> &Path {
        &self.passages_path
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }
}

//=========================================================================================
// "Impure" Row Structs
//=========================================================================================

// Field order is the column order of the file.
#[derive(Serialize, Deserialize)]
struct PassageRow {
    passage: String,
    vocabulary: String,
    questions: String,
    created_at: String,
}

impl PassageRow {
    fn from_domain(record: &PassageRecord) -> Self {
        Self {
            passage: record.passage.clone(),
            vocabulary: encode_vocabulary(&record.vocabulary),
            questions: encode_questions(&record.questions),
            created_at: format_timestamp(&record.created_at),
        }
    }

    fn to_domain(self) -> Result<PassageRecord, String> {
        if self.passage.trim().is_empty() {
            return Err("passage is empty".to_string());
        }
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| format!("invalid created_at '{}'", self.created_at))?;
        Ok(PassageRecord {
            passage: self.passage,
            vocabulary: decode_vocabulary(&self.vocabulary),
            questions: decode_questions(&self.questions),
            created_at,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct ProgressRow {
    points: u64,
    passages_completed: u64,
    vocab_learned: String,
    last_updated: String,
}

impl ProgressRow {
    fn from_domain(record: &ProgressRecord) -> Self {
        Self {
            points: record.points,
            passages_completed: record.passages_completed,
            vocab_learned: encode_vocab_learned(&record.vocab_learned),
            last_updated: record
                .last_updated
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_default(),
        }
    }

    fn to_domain(self) -> Result<ProgressRecord, String> {
        let last_updated: Option<DateTime<Utc>> = if self.last_updated.trim().is_empty() {
            None
        } else {
            Some(
                parse_timestamp(&self.last_updated)
                    .ok_or_else(|| format!("invalid last_updated '{}'", self.last_updated))?,
            )
        };
        Ok(ProgressRecord {
            points: self.points,
            passages_completed: self.passages_completed,
            vocab_learned: decode_vocab_learned(&self.vocab_learned),
            last_updated,
        })
    }
}

//=========================================================================================
// Load Diagnostics
//=========================================================================================

/// A row left out of a load, with the reason it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line on which the row starts (0 if unknown).
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct PassageLoad {
    pub passages: Vec<PassageRecord>,
    pub skipped: Vec<SkippedRow>,
}

//=========================================================================================
// Passages
//=========================================================================================

/// Appends one passage row, writing the header first if the file is new or empty.
///
/// The header and row go out in a single write so an interrupted append can at
/// worst leave one torn row, which later loads skip.
pub fn append_passage(record: &PassageRecord, path: &Path) -> PortResult<()> {
    ensure_parent_dir(path)?;

    let existing_len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(storage_error(path, e)),
    };
    let needs_header = existing_len == 0;

    let mut buffer = Vec::new();
    if !needs_header {
        let repair = torn_row_repair(path).map_err(|e| storage_error(path, e))?;
        if !repair.is_empty() {
            warn!(path = %path.display(), "Closing a torn last row before appending");
            buffer.extend_from_slice(repair);
        }
    }
    let mut writer = WriterBuilder::new()
        .has_headers(needs_header)
        .terminator(Terminator::CRLF)
        .from_writer(buffer);
    writer
        .serialize(PassageRow::from_domain(record))
        .map_err(|e| storage_error(path, e))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| storage_error(path, e.error()))?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| storage_error(path, e))?;
    file.write_all(&bytes).map_err(|e| storage_error(path, e))?;
    file.flush().map_err(|e| storage_error(path, e))?;

    debug!(path = %path.display(), header = needs_header, "Appended passage row");
    Ok(())
}

/// Loads every readable passage, in file order. Never fails.
pub fn load_all_passages(path: &Path) -> Vec<PassageRecord> {
    load_all_passages_with_diagnostics(path).passages
}

/// Like [`load_all_passages`], also reporting the rows that were skipped.
pub fn load_all_passages_with_diagnostics(path: &Path) -> PassageLoad {
    let mut load = PassageLoad::default();
    let Some((headers, rows)) = read_rows(path) else {
        return load;
    };

    for row in rows {
        let parsed = row.and_then(|(line, record)| {
            record
                .deserialize::<PassageRow>(Some(&headers))
                .map_err(|e| (line, e.to_string()))
                .and_then(|r| r.to_domain().map_err(|reason| (line, reason)))
        });
        match parsed {
            Ok(passage) => load.passages.push(passage),
            Err((line, reason)) => {
                warn!(path = %path.display(), line, %reason, "Skipping unreadable passage row");
                load.skipped.push(SkippedRow { line, reason });
            }
        }
    }

    info!(
        path = %path.display(),
        loaded = load.passages.len(),
        skipped = load.skipped.len(),
        "Loaded passages"
    );
    load
}

//=========================================================================================
// Progress
//=========================================================================================

/// Replaces the progress file with a header and one row.
///
/// The row is written to a temporary file in the same directory, synced, then
/// renamed over the destination.
pub fn save_progress(record: &ProgressRecord, path: &Path) -> PortResult<()> {
    let dir = ensure_parent_dir(path)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| storage_error(path, e))?;
    {
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::CRLF)
            .from_writer(&mut temp);
        writer
            .serialize(ProgressRow::from_domain(record))
            .map_err(|e| storage_error(path, e))?;
        writer.flush().map_err(|e| storage_error(path, e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| storage_error(path, e))?;
    temp.persist(path).map_err(|e| storage_error(path, e.error))?;

    debug!(path = %path.display(), points = record.points, "Saved progress");
    Ok(())
}

/// Loads the stored progress, or the zero-valued default if the file is
/// missing or holds no readable row. When several rows exist the last
/// readable one wins.
pub fn load_progress(path: &Path) -> ProgressRecord {
    let Some((headers, rows)) = read_rows(path) else {
        return ProgressRecord::default();
    };

    let mut latest = None;
    for row in rows {
        let parsed = row.and_then(|(line, record)| {
            record
                .deserialize::<ProgressRow>(Some(&headers))
                .map_err(|e| (line, e.to_string()))
                .and_then(|r| r.to_domain().map_err(|reason| (line, reason)))
        });
        match parsed {
            Ok(progress) => latest = Some(progress),
            Err((line, reason)) => {
                warn!(path = %path.display(), line, %reason, "Skipping unreadable progress row");
            }
        }
    }

    match latest {
        Some(progress) => progress,
        None => {
            warn!(path = %path.display(), "No readable progress row, starting from zero");
            ProgressRecord::default()
        }
    }
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

impl RecordStore for CsvStore {
    fn append_passage(&self, record: &PassageRecord) -> PortResult<()> {
        append_passage(record, &self.passages_path)
    }

    fn load_all_passages(&self) -> Vec<PassageRecord> {
        load_all_passages(&self.passages_path)
    }

    fn save_progress(&self, record: &ProgressRecord) -> PortResult<()> {
        save_progress(record, &self.progress_path)
    }

    fn load_progress(&self) -> ProgressRecord {
        load_progress(&self.progress_path)
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

type RowResult = Result<(u64, StringRecord), (u64, String)>;

/// Opens `path` and returns the header row plus each data row with the line
/// it starts on. Returns `None` when there is nothing to read.
fn read_rows(path: &Path) -> Option<(StringRecord, Vec<RowResult>)> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Store file does not exist yet");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), "Could not open store file: {}", e);
            return None;
        }
    };

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(BufReader::new(file));
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            warn!(path = %path.display(), "Could not read header row: {}", e);
            return None;
        }
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                rows.push(Ok((line, record)));
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                let is_io = matches!(e.kind(), csv::ErrorKind::Io(_));
                rows.push(Err((line, e.to_string())));
                if is_io {
                    break;
                }
            }
        }
    }
    Some((headers, rows))
}

fn ensure_parent_dir(path: &Path) -> PortResult<&Path> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| storage_error(path, e))?;
    Ok(dir)
}

/// Returns the bytes that must precede a new row so the file's last row
/// cannot swallow it. A row cut off inside a quoted field gets its quote
/// closed; a row cut off anywhere else gets a line break.
fn torn_row_repair(path: &Path) -> io::Result<&'static [u8]> {
    let content = fs::read(path)?;
    let tail = &content[last_record_start(&content)..];
    if !record_is_closed(tail) {
        Ok(b"\"\r\n")
    } else if content.is_empty() || content.ends_with(b"\n") {
        Ok(b"")
    } else {
        Ok(b"\r\n")
    }
}

/// Byte offset at which the last record of `content` starts.
fn last_record_start(content: &[u8]) -> usize {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);
    let mut record = ByteRecord::new();
    let mut start = 0;
    while let Ok(true) = reader.read_byte_record(&mut record) {
        if let Some(position) = record.position() {
            start = position.byte();
        }
    }
    usize::try_from(start).unwrap_or(0).min(content.len())
}

/// Whether a line break after `tail` ends its record, i.e. the record is not
/// left inside an open quoted field. Checked by parsing `tail` followed by a
/// line break and a marker field: the marker only stands as its own record if
/// the break was outside quotes.
fn record_is_closed(tail: &[u8]) -> bool {
    let mut probe = tail.to_vec();
    probe.extend_from_slice(b"\n#");
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(probe.as_slice());
    let last = reader.byte_records().filter_map(Result::ok).last();
    matches!(last, Some(record) if record.len() == 1 && &record[0] == b"#")
}

fn storage_error(path: &Path, e: impl Display) -> PortError {
    PortError::Storage(format!("{}: {}", path.display(), e))
}
