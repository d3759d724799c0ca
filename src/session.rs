//! Upload-driven report generation.
//!
//! A [`ReportSession`] holds the uploaded sources, lets the caller pick a
//! [`ColumnMapping`], and keeps the outcome of the latest run next to the last
//! successful one.

use crate::config::ReportConfig;
use crate::error::{Result, SalesReportError};
use crate::export;
use crate::ingestion::{friendly_read_error, read_uploads, IngestionResult, Upload};
use crate::reconcile::{reconcile_columns, ColumnMapping};
use crate::run_log::RunLog;
use crate::schema::SalesRecord;
use crate::{SalesReport, SalesReportProcessor};
use chrono::{Local, NaiveDateTime};
use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;

/// Uploaded files, with byte-identical content kept once.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    uploads: Vec<Upload>,
    hashes: HashSet<String>,
    duplicates: Vec<String>,
    received: usize,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an upload; returns `false` when the same content was already added.
    pub fn add(&mut self, upload: Upload) -> bool {
        self.received += 1;
        if self.hashes.insert(upload.sha256()) {
            self.uploads.push(upload);
            true
        } else {
            debug!("Duplicate upload ignored: {}", upload.name);
            self.duplicates.push(upload.name);
            false
        }
    }

    pub fn unique(&self) -> &[Upload] {
        &self.uploads
    }

    /// Names of uploads dropped as duplicates, in arrival order.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }
}

impl FromIterator<Upload> for UploadBatch {
    fn from_iter<I: IntoIterator<Item = Upload>>(iter: I) -> Self {
        let mut batch = UploadBatch::new();
        for upload in iter {
            batch.add(upload);
        }
        batch
    }
}

/// Downloadable artefacts of a successful run.
#[derive(Debug, Clone)]
pub struct ReportBundle {
    pub report: SalesReport,
    pub workbook: Vec<u8>,
    pub pdf: Vec<u8>,
    pub log_text: String,
}

impl ReportBundle {
    pub fn tag(&self) -> String {
        self.report.tag()
    }

    pub fn workbook_name(&self) -> String {
        export::workbook_file_name(&self.tag())
    }

    pub fn pdf_name(&self) -> String {
        export::pdf_file_name(&self.tag())
    }

    pub fn log_name(&self) -> String {
        export::log_file_name(&self.tag())
    }
}

/// What is left of a failed run: the error and the log up to the failure.
#[derive(Debug, Clone)]
pub struct FailureBundle {
    pub error: String,
    pub log_text: String,
    /// Run timestamp, `YYYY-MM-DD_HH-MM-SS`.
    pub tag: String,
}

impl FailureBundle {
    pub fn log_name(&self) -> String {
        export::log_file_name(&self.tag)
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Success(Arc<ReportBundle>),
    Failure(FailureBundle),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    pub fn log_text(&self) -> &str {
        match self {
            RunOutcome::Success(bundle) => &bundle.log_text,
            RunOutcome::Failure(failure) => &failure.log_text,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Generated(RunOutcome),
}

#[derive(Debug, Clone)]
struct LoadedSources {
    ingested: IngestionResult,
    columns: Vec<String>,
    received: usize,
    duplicates: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportSession {
    config: ReportConfig,
    loaded: Option<LoadedSources>,
    state: SessionState,
    last_success: Option<Arc<ReportBundle>>,
}

impl ReportSession {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Reads the batch and returns the reconciled column names offered for mapping.
    ///
    /// Unreadable uploads are kept as failures as long as one upload is
    /// readable. The previous outcome is cleared; the last success is not.
    pub fn load(&mut self, batch: &UploadBatch) -> Result<&[String]> {
        self.loaded = None;
        self.state = SessionState::Idle;

        let mut log = RunLog::new();
        let ingested = read_uploads(batch.unique(), &mut log)?;
        let columns = reconcile_columns(&ingested.records).columns().to_vec();
        info!(
            "Loaded {} readable upload(s), {} column(s)",
            ingested.readable_count(),
            columns.len()
        );

        let loaded = self.loaded.insert(LoadedSources {
            ingested,
            columns,
            received: batch.received(),
            duplicates: batch.duplicates().to_vec(),
        });
        Ok(&loaded.columns)
    }

    pub fn columns(&self) -> &[String] {
        self.loaded.as_ref().map(|l| l.columns.as_slice()).unwrap_or(&[])
    }

    pub fn default_mapping(&self) -> Option<ColumnMapping> {
        ColumnMapping::detect(self.columns())
    }

    /// Unreadable uploads with a message meant for the person who sent them.
    pub fn failures(&self) -> Vec<(String, &'static str)> {
        self.loaded
            .iter()
            .flat_map(|l| l.ingested.failures.iter())
            .map(|f| (f.name.clone(), friendly_read_error(&f.reason)))
            .collect()
    }

    /// Runs the pipeline on the loaded sources with `mapping`.
    pub fn submit(&mut self, mapping: &ColumnMapping) -> RunOutcome {
        let outcome = self.run(mapping, Local::now().naive_local());

        if let RunOutcome::Success(bundle) = &outcome {
            self.last_success = Some(Arc::clone(bundle));
        }
        self.state = SessionState::Generated(outcome.clone());
        outcome
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn last_outcome(&self) -> Option<&RunOutcome> {
        match &self.state {
            SessionState::Generated(outcome) => Some(outcome),
            SessionState::Idle => None,
        }
    }

    /// Latest successful bundle, still available after a later failure.
    pub fn last_success(&self) -> Option<&ReportBundle> {
        self.last_success.as_deref()
    }

    /// First cleaned rows of the last successful run.
    pub fn preview(&self) -> &[SalesRecord] {
        match self.last_success() {
            Some(bundle) => {
                let records = &bundle.report.dataset.records;
                &records[..records.len().min(self.config.preview_rows)]
            }
            None => &[],
        }
    }

    fn run(&self, mapping: &ColumnMapping, now: NaiveDateTime) -> RunOutcome {
        let mut log = RunLog::new();
        log.section("LOG D'EXECUTION");
        log.info(format!("Date/heure: {}", now.format("%Y-%m-%d %H:%M:%S")));

        match self.generate(mapping, now, &mut log) {
            Ok(bundle) => RunOutcome::Success(Arc::new(bundle)),
            Err(e) => {
                log.error(format!("ERREUR: {}", e));
                RunOutcome::Failure(FailureBundle {
                    error: e.to_string(),
                    log_text: log.render(),
                    tag: now.format("%Y-%m-%d_%H-%M-%S").to_string(),
                })
            }
        }
    }

    fn generate(&self, mapping: &ColumnMapping, now: NaiveDateTime, log: &mut RunLog) -> Result<ReportBundle> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| SalesReportError::NoInputFiles("upload".to_string()))?;

        log.info(format!("Fichiers uploadés: {}", loaded.received));
        log.info(format!(
            "Fichiers uniques (après dédoublonnage): {}",
            loaded.ingested.sources.len() + loaded.ingested.failures.len()
        ));
        if !loaded.duplicates.is_empty() {
            log.warn(format!("Doublons ignorés (même contenu): {:?}", loaded.duplicates));
        }
        for source in &loaded.ingested.sources {
            log.info(format!(
                "Fichier: {} | SHA256: {} | {} lignes",
                source.name, source.sha256, source.rows
            ));
        }
        if !loaded.ingested.failures.is_empty() {
            log.section("FICHIERS EN ERREUR");
            for failure in &loaded.ingested.failures {
                log.error(format!(
                    "{}: {}",
                    failure.name,
                    friendly_read_error(&failure.reason)
                ));
            }
        }

        let report = SalesReportProcessor::process_ingestion(&loaded.ingested, Some(mapping), log)?;
        let workbook = export::workbook_bytes(&report, &self.config)?;
        let pdf = export::pdf_bytes(&report, &self.config, now.date())?;
        log.info(format!("Rapport généré: {}", report.tag()));

        Ok(ReportBundle {
            report,
            workbook,
            pdf,
            log_text: log.render(),
        })
    }
}
