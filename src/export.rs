//! Workbook and PDF rendering of a [`SalesReport`].
//!
//! Summary tables keep `montant` internally; the user-facing header comes
//! from [`ReportConfig::amount_label`].

use crate::config::ReportConfig;
use crate::error::{Result, SalesReportError};
use crate::schema::{Aggregate, CellValue, AGENT_COLUMN, AMOUNT_COLUMN, DATE_COLUMN, MONTH_COLUMN};
use crate::SalesReport;
use chrono::{Datelike, NaiveDate};
use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};
use std::path::{Path, PathBuf};

pub const RAW_SHEET: &str = "Donnees_brutes";
pub const MONTH_SHEET: &str = "Total_par_mois";
pub const AGENT_SHEET: &str = "Total_par_commercial";

const DATE_NUM_FORMAT: &str = "dd/mm/yyyy";
const EUR_NUM_FORMAT: &str = "[$EUR ]#,##0.00_-";

const MIN_COLUMN_WIDTH: usize = 12;
const AMOUNT_COLUMN_WIDTH: usize = 18;
const MAX_COLUMN_WIDTH: usize = 40;

pub fn workbook_file_name(tag: &str) -> String {
    format!("reporting_{}.xlsx", tag)
}

pub fn pdf_file_name(tag: &str) -> String {
    format!("rapport_{}.pdf", tag)
}

pub fn log_file_name(tag: &str) -> String {
    format!("log_{}.txt", tag)
}

/// Column width rule: content length plus padding, clamped, wider for amounts.
pub fn column_width(header: &str, longest_cell: usize) -> usize {
    let mut width = (header.chars().count().max(longest_cell) + 4).max(MIN_COLUMN_WIDTH);
    let header = header.to_lowercase();
    if header.contains("montant") || header.contains("euro") {
        width = width.max(AMOUNT_COLUMN_WIDTH);
    }
    width.min(MAX_COLUMN_WIDTH)
}

/// A worksheet being filled row by row, tracking content widths.
struct SheetBuilder {
    sheet: Worksheet,
    headers: Vec<String>,
    widths: Vec<usize>,
    row: u32,
    date_format: Format,
    money_format: Format,
}

impl SheetBuilder {
    fn new(name: &str, headers: Vec<String>) -> Result<Self> {
        let mut sheet = Worksheet::new();
        sheet.set_name(name)?;

        let bold = Format::new().set_bold();
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, header, &bold)?;
        }
        sheet.set_freeze_panes(1, 0)?;

        Ok(Self {
            sheet,
            widths: vec![0; headers.len()],
            headers,
            row: 1,
            date_format: Format::new().set_num_format(DATE_NUM_FORMAT),
            money_format: Format::new().set_num_format(EUR_NUM_FORMAT),
        })
    }

    fn is_money_column(&self, col: usize) -> bool {
        self.headers[col] == AMOUNT_COLUMN || self.headers[col].contains("euros")
    }

    fn write_cell(&mut self, col: usize, value: &CellValue) -> Result<()> {
        let (row, c) = (self.row, col as u16);
        let text_len = match value {
            CellValue::Empty => 0,
            CellValue::Text(s) => {
                self.sheet.write_string(row, c, s)?;
                s.chars().count()
            }
            CellValue::Number(n) => {
                if self.is_money_column(col) {
                    self.sheet.write_number_with_format(row, c, *n, &self.money_format)?;
                } else {
                    self.sheet.write_number(row, c, *n)?;
                }
                n.to_string().len()
            }
            CellValue::Bool(b) => {
                self.sheet.write_boolean(row, c, *b)?;
                b.to_string().len()
            }
            CellValue::DateTime(dt) => {
                self.write_date(col, dt.date())?;
                return Ok(());
            }
        };
        self.widths[col] = self.widths[col].max(text_len);
        Ok(())
    }

    fn write_date(&mut self, col: usize, date: NaiveDate) -> Result<()> {
        // Years outside u16 fall through to the crate's own range error.
        let year = u16::try_from(date.year()).unwrap_or(0);
        let value = ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8)?;
        self.sheet
            .write_datetime_with_format(self.row, col as u16, &value, &self.date_format)?;
        self.widths[col] = self.widths[col].max(DATE_NUM_FORMAT.len());
        Ok(())
    }

    fn next_row(&mut self) {
        self.row += 1;
    }

    fn finish(mut self) -> Result<Worksheet> {
        for (col, header) in self.headers.iter().enumerate() {
            let width = column_width(header, self.widths[col]);
            self.sheet.set_column_width(col as u16, width as f64)?;
        }
        Ok(self.sheet)
    }
}

fn raw_data_sheet(report: &SalesReport) -> Result<Worksheet> {
    let dataset = &report.dataset;

    let mut headers = vec![DATE_COLUMN.to_string(), AMOUNT_COLUMN.to_string()];
    if dataset.has_agent {
        headers.push(AGENT_COLUMN.to_string());
    }
    headers.extend(dataset.extra_columns.iter().cloned());
    headers.push(MONTH_COLUMN.to_string());

    let mut builder = SheetBuilder::new(RAW_SHEET, headers)?;
    for record in &dataset.records {
        let mut col = 0;
        builder.write_date(col, record.date)?;
        col += 1;

        let amount = record.amount.map(CellValue::Number).unwrap_or_default();
        builder.write_cell(col, &amount)?;
        col += 1;

        if dataset.has_agent {
            let agent = record.agent.clone().map(CellValue::Text).unwrap_or_default();
            builder.write_cell(col, &agent)?;
            col += 1;
        }

        for value in &record.extras {
            builder.write_cell(col, value)?;
            col += 1;
        }

        builder.write_cell(col, &CellValue::Text(record.month.clone()))?;
        builder.next_row();
    }
    builder.finish()
}

fn summary_sheet(name: &str, table: &Aggregate, amount_label: &str) -> Result<Worksheet> {
    let value_header = if table.value_column == AMOUNT_COLUMN {
        amount_label.to_string()
    } else {
        table.value_column.clone()
    };

    let mut builder = SheetBuilder::new(name, vec![table.key_column.clone(), value_header])?;
    for row in &table.rows {
        builder.write_cell(0, &CellValue::Text(row.key.clone()))?;
        builder.write_cell(1, &CellValue::Number(row.total))?;
        builder.next_row();
    }
    builder.finish()
}

/// Builds the three-sheet report workbook.
pub fn build_workbook(report: &SalesReport, config: &ReportConfig) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    workbook.push_worksheet(raw_data_sheet(report)?);
    workbook.push_worksheet(summary_sheet(MONTH_SHEET, &report.by_month, &config.amount_label)?);
    workbook.push_worksheet(summary_sheet(AGENT_SHEET, &report.by_agent, &config.amount_label)?);
    Ok(workbook)
}

pub fn workbook_bytes(report: &SalesReport, config: &ReportConfig) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(report, config)?;
    Ok(workbook.save_to_buffer()?)
}

/// Writes `reporting_<tag>.xlsx` into `dir` and returns its path.
pub fn write_workbook(report: &SalesReport, config: &ReportConfig, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(workbook_file_name(&report.tag()));
    let mut workbook = build_workbook(report, config)?;
    workbook.save(&path)?;
    Ok(path)
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const VALUE_COLUMN_X: f32 = 95.0;

/// Vertical text flow over as many A4 pages as needed.
struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| SalesReportError::PdfExport(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| SalesReportError::PdfExport(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn advance(&mut self, height: f32) {
        self.y -= height;
        if self.y < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text(&mut self, text: &str, size: f32, bold: bool) {
        self.text_at(text, size, bold, MARGIN);
        self.advance(size * 0.5);
    }

    fn text_at(&self, text: &str, size: f32, bold: bool, x: f32) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn table(&mut self, title: &str, table: &Aggregate, amount_label: &str) {
        self.text(title, 14.0, true);
        self.advance(2.0);

        if table.is_empty() {
            self.text("Aucune donnee.", 10.0, false);
            self.advance(4.0);
            return;
        }

        self.text_at(&table.key_column, 10.0, true, MARGIN);
        self.text_at(amount_label, 10.0, true, VALUE_COLUMN_X);
        self.advance(6.0);

        for row in &table.rows {
            self.text_at(&row.key, 10.0, false, MARGIN);
            self.text_at(&format!("{:.2}", round_cents(row.total)), 10.0, false, VALUE_COLUMN_X);
            self.advance(5.5);
        }
        self.advance(4.0);
    }

    fn into_bytes(self) -> Result<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| SalesReportError::PdfExport(e.to_string()))
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Renders the PDF summary: title with the report year, generation date,
/// then the monthly and per-agent tables.
pub fn pdf_bytes(report: &SalesReport, config: &ReportConfig, generated_on: NaiveDate) -> Result<Vec<u8>> {
    let title = format!("Rapport annuel - {}", report.period.year());
    let mut pdf = PdfWriter::new(&title)?;

    pdf.text(&title, 20.0, true);
    pdf.advance(2.0);
    pdf.text(&format!("Genere le {}", generated_on.format("%Y-%m-%d")), 10.0, false);
    pdf.text(
        &format!("Periode: {} -> {}", report.period.start, report.period.end),
        10.0,
        false,
    );
    pdf.advance(6.0);

    pdf.table("Total par mois", &report.by_month, &config.amount_label);
    pdf.table("Total par commercial", &report.by_agent, &config.amount_label);

    pdf.into_bytes()
}

/// Writes `rapport_<tag>.pdf` into `dir` and returns its path.
pub fn write_pdf(
    report: &SalesReport,
    config: &ReportConfig,
    dir: &Path,
    generated_on: NaiveDate,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(pdf_file_name(&report.tag()));
    std::fs::write(&path, pdf_bytes(report, config, generated_on)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{process_sales_report, RecordSet, RunLog};
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Cursor;

    fn sample_report() -> SalesReport {
        let records = RecordSet::from_text(
            &["Date", "Montant", "Commercial", "Ville"],
            &[
                &["15/01/2025", "100,50", "alice martin", "Paris"],
                &["20/02/2025", "20", "bob leroy", "Lyon"],
                &["21/02/2025", "N/A", "bob leroy", "Lyon"],
            ],
        );
        let mut log = RunLog::new();
        process_sales_report(&records, &mut log).unwrap()
    }

    #[test]
    fn test_file_names() {
        assert_eq!(workbook_file_name("2025-01"), "reporting_2025-01.xlsx");
        assert_eq!(pdf_file_name("2025-01_to_2025-02"), "rapport_2025-01_to_2025-02.pdf");
        assert_eq!(log_file_name("2025-01"), "log_2025-01.txt");
    }

    #[test]
    fn test_column_width_rule() {
        assert_eq!(column_width("date", 10), 14);
        assert_eq!(column_width("id", 1), 12);
        assert_eq!(column_width("montant", 3), 18);
        assert_eq!(column_width("commentaire", 200), 40);
    }

    #[test]
    fn test_workbook_layout() {
        let report = sample_report();
        let bytes = workbook_bytes(&report, &ReportConfig::default()).unwrap();

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec![RAW_SHEET, MONTH_SHEET, AGENT_SHEET]);

        let raw = workbook.worksheet_range(RAW_SHEET).unwrap();
        let header: Vec<String> = raw.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(header, vec!["date", "montant", "commercial", "ville", "mois"]);
        assert_eq!(raw.get_size().0, 4);
        match &raw.rows().nth(1).unwrap()[0] {
            Data::DateTime(dt) => assert_eq!(
                dt.as_datetime().unwrap().date(),
                NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
            ),
            other => panic!("expected a date cell, got {other:?}"),
        }

        let monthly = workbook.worksheet_range(MONTH_SHEET).unwrap();
        let rows: Vec<&[Data]> = monthly.rows().collect();
        assert_eq!(rows[0][1], Data::String("montant en euros".to_string()));
        assert_eq!(rows[1][0], Data::String("2025-01".to_string()));
        assert_eq!(rows[1][1], Data::Float(100.5));
        assert_eq!(rows[2][1], Data::Float(20.0));
    }

    #[test]
    fn test_write_workbook_and_pdf_to_disk() {
        let report = sample_report();
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::default();

        let xlsx = write_workbook(&report, &config, dir.path()).unwrap();
        let pdf = write_pdf(
            &report,
            &config,
            dir.path(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        )
        .unwrap();

        assert!(xlsx.ends_with("reporting_2025-01_to_2025-02.xlsx"));
        assert!(pdf.ends_with("rapport_2025-01_to_2025-02.pdf"));
        let pdf_content = std::fs::read(&pdf).unwrap();
        assert!(pdf_content.starts_with(b"%PDF"));
    }
}
