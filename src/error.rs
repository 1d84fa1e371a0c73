//! Error type shared by the loading and export entry points.
//!
//! Rendering never fails: missing optional data is skipped. Only the
//! edges that touch serialized input (JSON documents, font archives,
//! glyph markup) return `Result`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error in '{source_name}': {message}")]
    Xml {
        source_name: String,
        message: String,
    },

    #[error("Failed to open font archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resource '{0}' not found")]
    MissingResource(String),

    #[error("Invalid resource '{name}': {message}")]
    InvalidResource { name: String, message: String },
}

impl Error {
    pub(crate) fn xml(source_name: &str, err: roxmltree::Error) -> Self {
        Error::Xml {
            source_name: source_name.to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
