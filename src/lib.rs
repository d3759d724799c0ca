//! # Sales Report Builder
//!
//! A library for consolidating sales spreadsheets exported by different people,
//! with different habits, into one clean monthly and per-agent report.
//!
//! ## Core Concepts
//!
//! - **Reconciliation**: headers are trimmed and lower-cased; columns that end up
//!   with the same name are merged, keeping the first non-blank value per row
//! - **Field parsing**: dates are day-first (`15/01/2025`), amounts accept a comma
//!   decimal separator and non-breaking-space thousands grouping
//! - **Quality metrics**: invalid dates, empty amounts and invalid amounts are
//!   counted before cleaning, never raised
//! - **Cleaning**: a row without a valid date is dropped; an unreadable amount is
//!   kept as absent and excluded from every total
//! - **Aggregation**: totals per `YYYY-MM` month and per agent, sorted by key
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_report_builder::*;
//!
//! let records = RecordSet::from_text(
//!     &["Date", " Montant ", "Commercial"],
//!     &[
//!         &["15/01/2025", "100,50", "alice martin"],
//!         &["32/13/2025", "200", "bob leroy"],
//!         &["16/01/2025", "N/A", "bob leroy"],
//!     ],
//! );
//!
//! let mut log = RunLog::new();
//! let report = process_sales_report(&records, &mut log).unwrap();
//!
//! assert_eq!(report.dataset.len(), 2);
//! assert_eq!(report.by_month.get("2025-01"), Some(100.5));
//! assert_eq!(report.quality.invalid_amounts, 1);
//! ```

pub mod cleaner;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod parsing;
pub mod quality;
pub mod reconcile;
pub mod run_log;
pub mod schema;
pub mod session;
pub mod utils;

pub use cleaner::{clean_records, CleaningOutcome, CleaningStats};
pub use config::ReportConfig;
pub use engine::{total_by_agent, total_by_month};
pub use error::{Result, SalesReportError};
pub use ingestion::{read_folder, read_uploads, IngestionResult, SourceFailure, SourceInfo, Upload};
pub use quality::{audit_quality, compute_quality_metrics, QualityAudit};
pub use reconcile::{reconcile_columns, ColumnMapping};
pub use run_log::{LogEntry, LogLevel, RunLog};
pub use schema::*;
pub use session::{ReportSession, RunOutcome, SessionState, UploadBatch};
pub use utils::{format_eur_fr, resolve_period, ReportPeriod};

use log::debug;
use serde::{Deserialize, Serialize};

/// Everything one pipeline run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesReport {
    pub dataset: CleanedDataset,
    pub by_month: Aggregate,
    pub by_agent: Aggregate,
    pub quality: QualityMetrics,
    pub stats: CleaningStats,
    pub period: ReportPeriod,
    pub total_amount: f64,
    pub agent_count: usize,
}

impl SalesReport {
    pub fn tag(&self) -> String {
        self.period.tag()
    }
}

pub struct SalesReportProcessor;

impl SalesReportProcessor {
    /// Runs reconciliation, quality audit, cleaning, aggregation and period
    /// resolution over raw rows.
    ///
    /// With a `mapping`, the chosen columns are renamed to `date`, `montant`
    /// and `commercial` after reconciliation; without one the canonical names
    /// are expected in the data already.
    pub fn process(
        records: &RecordSet,
        mapping: Option<&ColumnMapping>,
        log: &mut RunLog,
    ) -> Result<SalesReport> {
        debug!(
            "Processing {} raw row(s) across {} column(s)",
            records.len(),
            records.columns().len()
        );

        let duplicates = reconcile::duplicate_columns(records);
        if !duplicates.is_empty() {
            log.warn(format!(
                "Colonnes dupliquées après normalisation: {:?} (fusion des valeurs)",
                duplicates
            ));
        }
        let reconciled = reconcile_columns(records);

        let mapped = match mapping {
            Some(mapping) => {
                let mapped = mapping.apply(&reconciled)?;
                log.section("MAPPING");
                log.info(format!("DATE: {} -> {}", mapping.date, DATE_COLUMN));
                log.info(format!("MONTANT: {} -> {}", mapping.amount, AMOUNT_COLUMN));
                log.info(format!(
                    "COMMERCIAL: {} -> {}",
                    mapping.agent.as_deref().unwrap_or("(aucune)"),
                    if mapping.agent.is_some() { AGENT_COLUMN } else { "(aucune)" }
                ));
                mapped
            }
            None => reconciled,
        };

        let audit = audit_quality(&reconcile_columns(&mapped));
        log_quality(&audit, log);

        let CleaningOutcome { dataset, stats } = clean_records(&mapped, log)?;

        let by_month = total_by_month(&dataset);
        let by_agent = total_by_agent(&dataset);
        let period = resolve_period(&by_month).ok_or(SalesReportError::NoReportableRows)?;

        let total_amount = dataset.total_amount();
        let agent_count = dataset.distinct_agents();

        log.section("RESULTATS");
        log.info(format!("Lignes (avant nettoyage): {}", stats.rows_before));
        log.info(format!("Lignes (après nettoyage): {}", stats.rows_after));
        log.info(format!("Lignes supprimées: {}", stats.rows_dropped()));
        log.info(
            "Règle: lignes sans date valide supprimées ; montants vides conservés (absents) et exclus du CA",
        );
        log.info(format!("Période détectée: {} -> {}", period.start, period.end));
        log.info(format!("Chiffre d'affaires total: {}", format_eur_fr(total_amount)));
        if dataset.has_agent {
            log.info(format!("Nombre de commerciaux: {}", agent_count));
        }

        Ok(SalesReport {
            dataset,
            by_month,
            by_agent,
            quality: audit.metrics,
            stats,
            period,
            total_amount,
            agent_count,
        })
    }

    pub fn process_ingestion(
        ingested: &IngestionResult,
        mapping: Option<&ColumnMapping>,
        log: &mut RunLog,
    ) -> Result<SalesReport> {
        Self::process(&ingested.records, mapping, log)
    }
}

pub fn process_sales_report(records: &RecordSet, log: &mut RunLog) -> Result<SalesReport> {
    SalesReportProcessor::process(records, None, log)
}

fn log_quality(audit: &QualityAudit, log: &mut RunLog) {
    log.section("QUALITE DES DONNEES (avant nettoyage final)");
    log.info(format!(
        "Dates invalides (format incorrect ou date inexistante): {}",
        audit.metrics.invalid_dates
    ));
    log.info(format!("Montants vides (source): {}", audit.metrics.empty_amounts));
    log.info(format!(
        "Montants invalides (hors vides): {}",
        audit.metrics.invalid_amounts
    ));
}
