//! Reading sales spreadsheets into a single raw [`RecordSet`].
//!
//! A source that cannot be read never aborts the batch: it is recorded as a
//! [`SourceFailure`] and the remaining sources are still concatenated. Only
//! "nothing to read" and "nothing readable" are fatal.

use crate::config::ReportConfig;
use crate::error::{Result, SalesReportError};
use crate::run_log::RunLog;
use crate::schema::{CellValue, RecordSet};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Prefix of the lock files Office leaves next to open workbooks.
const LOCK_FILE_PREFIX: &str = "~$";

/// An in-memory source, as handed over by an upload form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn sha256(&self) -> String {
        sha256_hex(&self.bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    pub sha256: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub name: String,
    pub reason: String,
}

/// Concatenated raw rows plus the per-source bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct IngestionResult {
    pub records: RecordSet,
    pub sources: Vec<SourceInfo>,
    pub failures: Vec<SourceFailure>,
}

impl IngestionResult {
    pub fn readable_count(&self) -> usize {
        self.sources.len()
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Lists candidate input files in `folder`, sorted by name.
///
/// Office lock files (`~$...`) and files with an extension outside
/// [`ReportConfig::extensions`] are skipped.
pub fn discover_input_files(folder: &Path, config: &ReportConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() || !config.accepts_extension(&path) {
            continue;
        }
        if file_name(&path).starts_with(LOCK_FILE_PREFIX) {
            continue;
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}

/// Reads every candidate file of `folder`.
///
/// Each file's SHA-256 is logged before it is parsed. Fails with
/// [`SalesReportError::NoInputFiles`] when the folder holds no candidate and
/// with [`SalesReportError::NoReadableInput`] when every candidate failed.
pub fn read_folder(folder: &Path, config: &ReportConfig, log: &mut RunLog) -> Result<IngestionResult> {
    let files = discover_input_files(folder, config)?;
    log.info(format!(
        "{} fichier(s) détecté(s) dans {}",
        files.len(),
        folder.display()
    ));

    if files.is_empty() {
        return Err(SalesReportError::NoInputFiles(folder.display().to_string()));
    }

    let uploads = files.iter().map(|path| {
        let name = file_name(path);
        std::fs::read(path)
            .map(|bytes| Upload::new(name.clone(), bytes))
            .map_err(|e| SourceFailure {
                name,
                reason: e.to_string(),
            })
    });

    collect_sources(uploads, log)
}

/// Reads in-memory uploads with the same failure policy as [`read_folder`].
pub fn read_uploads(uploads: &[Upload], log: &mut RunLog) -> Result<IngestionResult> {
    if uploads.is_empty() {
        return Err(SalesReportError::NoInputFiles("upload".to_string()));
    }
    collect_sources(uploads.iter().cloned().map(Ok), log)
}

fn collect_sources<I>(uploads: I, log: &mut RunLog) -> Result<IngestionResult>
where
    I: Iterator<Item = std::result::Result<Upload, SourceFailure>>,
{
    let mut sets = Vec::new();
    let mut sources = Vec::new();
    let mut failures = Vec::new();

    for upload in uploads {
        let upload = match upload {
            Ok(upload) => upload,
            Err(failure) => {
                log.error(format!("KO lecture: {} | {}", failure.name, failure.reason));
                failures.push(failure);
                continue;
            }
        };

        let sha256 = upload.sha256();
        log.info(format!("Fichier: {} | SHA256: {}", upload.name, sha256));

        match read_source_bytes(&upload.name, &upload.bytes) {
            Ok(set) => {
                log.info(format!("OK lecture: {} ({} lignes)", upload.name, set.len()));
                sources.push(SourceInfo {
                    name: upload.name,
                    sha256,
                    rows: set.len(),
                });
                sets.push(set);
            }
            Err(e) => {
                log.error(format!("KO lecture: {} | {}", upload.name, e));
                failures.push(SourceFailure {
                    name: upload.name,
                    reason: e.to_string(),
                });
            }
        }
    }

    if sets.is_empty() {
        return Err(SalesReportError::NoReadableInput {
            failures: failures.into_iter().map(|f| (f.name, f.reason)).collect(),
        });
    }

    if !failures.is_empty() {
        log.warn(format!("Fichiers en erreur: {}", failures.len()));
    }

    Ok(IngestionResult {
        records: RecordSet::concat(sets),
        sources,
        failures,
    })
}

/// Reads one file from disk.
pub fn read_source(path: &Path) -> Result<RecordSet> {
    let bytes = std::fs::read(path)?;
    read_source_bytes(&file_name(path), &bytes)
}

/// Reads the first worksheet (or the CSV body) of a source; the first row is the header.
pub fn read_source_bytes(name: &str, bytes: &[u8]) -> Result<RecordSet> {
    let is_csv = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        read_csv(name, bytes)
    } else {
        read_workbook(name, bytes)
    }
}

fn read_workbook(name: &str, bytes: &[u8]) -> Result<RecordSet> {
    let read_error = |details: String| SalesReportError::SourceRead {
        source_name: name.to_string(),
        details,
    };

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| read_error(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| read_error("workbook contains no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| read_error(format!("sheet '{}': {}", sheet_name, e)))?;

    Ok(range_to_records(&range))
}

fn range_to_records(range: &Range<Data>) -> RecordSet {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return RecordSet::default();
    };

    let columns = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| header_name(idx, &convert_cell(cell)))
        .collect();

    let mut set = RecordSet::new(columns);
    for row in rows {
        set.push_row(row.iter().map(convert_cell).collect());
    }
    set
}

fn read_csv(name: &str, bytes: &[u8]) -> Result<RecordSet> {
    let read_error = |details: String| SalesReportError::SourceRead {
        source_name: name.to_string(),
        details,
    };

    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    let delimiter = if semicolons > commas { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let columns = reader
        .headers()
        .map_err(|e| read_error(e.to_string()))?
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            let h = h.trim_start_matches('\u{feff}');
            header_name(idx, &CellValue::from(h))
        })
        .collect();

    let mut set = RecordSet::new(columns);
    for record in reader.records() {
        let record = record.map_err(|e| read_error(e.to_string()))?;
        set.push_row(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::from(field)
                    }
                })
                .collect(),
        );
    }
    Ok(set)
}

fn header_name(idx: usize, cell: &CellValue) -> String {
    if cell.is_blank() {
        format!("Unnamed: {}", idx)
    } else {
        cell.to_text()
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // Durations and bare times carry no calendar date.
        Data::DateTime(dt) if dt.is_duration() => CellValue::Number(dt.as_f64()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => CellValue::DateTime(value),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

/// Rewrites a technical read error as a short message for non-technical users.
pub fn friendly_read_error(reason: &str) -> &'static str {
    let reason = reason.to_lowercase();

    if reason.contains("cannot detect file format") || reason.contains("file format") {
        "Format Excel non reconnu (fichier probablement cassé, mauvais format, ou renommé en .xlsx)."
    } else if reason.contains("password") || reason.contains("encrypted") {
        "Fichier protégé par mot de passe / chiffré (impossible à lire automatiquement)."
    } else if reason.contains("permission") || reason.contains("access is denied") {
        "Accès refusé (droits / fichier verrouillé)."
    } else if reason.contains("zip") {
        "Fichier Excel corrompu (structure interne illisible)."
    } else if reason.contains("xlsx") || reason.contains("xml") {
        "Erreur de lecture Excel (fichier potentiellement incompatible / corrompu)."
    } else {
        "Le fichier n’est pas un vrai .xlsx (souvent : fichier renommé en .xlsx ou fichier corrompu)."
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
