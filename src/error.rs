// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Librarian

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Librarian operations
pub type Result<T> = std::result::Result<T, LibrarianError>;

/// Librarian error types
#[derive(Error, Debug)]
pub enum LibrarianError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Oracle not available: {0}")]
    OracleUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read creation time of {path:?}: {source}")]
    Timestamp {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from:?} to {to:?}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LibrarianError {
    /// True when the underlying cause is a vanished source file.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FileSystem(e) => e.kind() == std::io::ErrorKind::NotFound,
            Self::Timestamp { source, .. } | Self::Move { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}
