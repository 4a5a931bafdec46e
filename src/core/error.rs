use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Failed to read {file}: {message}")]
    FormatError { file: String, message: String },

    #[error("{file} row {row}: expected a polygon, found {kind}")]
    NonPolygonal {
        file: String,
        row: usize,
        kind: String,
    },

    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    #[error("WKB error: {0}")]
    WkbError(String),

    #[error("GeoPackage error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),
}

impl CheckError {
    pub fn format(file: impl Into<String>, message: impl ToString) -> Self {
        CheckError::FormatError {
            file: file.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;
