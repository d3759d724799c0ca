use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings shared by the batch run and the interactive session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Folder scanned by the batch run.
    pub data_dir: PathBuf,
    /// Root folder for generated reports and logs.
    pub output_dir: PathBuf,
    /// Accepted input extensions, lower-case, without the dot.
    pub extensions: Vec<String>,
    /// Header used for amount columns on the exported summary tables.
    pub amount_label: String,
    /// Rows shown in a cleaned-data preview.
    pub preview_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            extensions: vec!["xlsx".to_string()],
            amount_label: "montant en euros".to_string(),
            preview_rows: 30,
        }
    }
}

impl ReportConfig {
    /// Loads a JSON config; keys that are left out keep their default.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.extensions.iter().any(|x| *x == e)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReportConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.amount_label, "montant en euros");
        assert!(config.accepts_extension(Path::new("ventes.XLSX")));
        assert!(!config.accepts_extension(Path::new("notes.txt")));
        assert!(!config.accepts_extension(Path::new("README")));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            ReportConfig::from_json_str(r#"{"data_dir": "in", "extensions": ["xlsx", "csv"]}"#)
                .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("in"));
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.accepts_extension(Path::new("a.csv")));
    }

    #[test]
    fn test_invalid_json() {
        assert!(ReportConfig::from_json_str("{not json").is_err());
    }
}
