use thiserror::Error;

#[derive(Error, Debug)]
pub enum SalesReportError {
    #[error("Aucun fichier à traiter dans {0}")]
    NoInputFiles(String),

    #[error("Aucun fichier lisible parmi {} fichier(s)", failures.len())]
    NoReadableInput { failures: Vec<(String, String)> },

    #[error("Colonnes manquantes: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("La colonne '{0}' ne peut pas servir à la fois de date et de montant")]
    AmbiguousMapping(String),

    #[error("Colonne inconnue dans le mapping: {0}")]
    UnknownColumn(String),

    #[error("Aucune ligne avec une date valide après nettoyage")]
    NoReportableRows,

    #[error("Lecture impossible de '{source_name}': {details}")]
    SourceRead { source_name: String, details: String },

    #[error("Erreur d'export Excel: {0}")]
    WorkbookExport(#[from] rust_xlsxwriter::XlsxError),

    #[error("Erreur d'export PDF: {0}")]
    PdfExport(String),

    #[error("Erreur de sérialisation: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Erreur d'entrée/sortie: {0}")]
    IoError(#[from] std::io::Error),
}

impl SalesReportError {
    /// True when the run had simply nothing to do, as opposed to a genuine failure.
    pub fn is_nothing_to_process(&self) -> bool {
        matches!(self, SalesReportError::NoInputFiles(_))
    }
}

pub type Result<T> = std::result::Result<T, SalesReportError>;
