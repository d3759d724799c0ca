//! Batch report generation: every spreadsheet of the data folder goes into
//! one yearly report.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use sales_report_builder::export::{log_file_name, write_pdf, write_workbook};
use sales_report_builder::{read_folder, ReportConfig, RunLog, SalesReportProcessor};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sales-report")]
#[command(author, version, about = "Consolidated sales reporting from spreadsheet exports")]
struct Cli {
    /// Folder holding the source spreadsheets (default: data)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Folder receiving reports and logs (default: output)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// JSON settings file; flags take precedence over it
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn resolve_config(&self) -> Result<ReportConfig> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::from_json_file(path)
                .with_context(|| format!("Configuration illisible: {}", path.display()))?,
            None => ReportConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run(&Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Erreur: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = cli.resolve_config()?;
    let today = Local::now().date_naive();
    let log_path = config
        .output_dir
        .join(log_file_name(&today.format("%Y-%m-%d").to_string()));

    let mut log = RunLog::new();
    log.section("DEBUT TRAITEMENT");

    let result = generate(&config, today, &mut log);
    match &result {
        Ok(()) => {}
        Err(e) if e.is_nothing_to_process() => log.warn(format!("Aucun fichier à traiter: {}", e)),
        Err(e) => log.error(format!("ERREUR: {}", e)),
    }

    log.section("FIN TRAITEMENT");
    log.write_to(&log_path)
        .with_context(|| format!("Écriture du log impossible: {}", log_path.display()))?;

    Ok(ExitCode::from(exit_status(&result)))
}

/// 0 when the run succeeded or found nothing to process, 1 on any other error.
fn exit_status(result: &sales_report_builder::Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) if e.is_nothing_to_process() => 0,
        Err(_) => 1,
    }
}

fn generate(
    config: &ReportConfig,
    today: chrono::NaiveDate,
    log: &mut RunLog,
) -> sales_report_builder::Result<()> {
    let ingested = read_folder(&config.data_dir, config, log)?;
    let report = SalesReportProcessor::process_ingestion(&ingested, None, log)?;

    let year_dir = config.output_dir.join(report.period.year());
    let workbook = write_workbook(&report, config, &year_dir)?;
    log.info(format!("Fichier Excel généré: {}", workbook.display()));
    let pdf = write_pdf(&report, config, &year_dir, today)?;
    log.info(format!("PDF généré: {}", pdf.display()));

    Ok(())
}
