// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Librarian: Downloads Sorter
//!
//! Debounces new downloads into batches, keeps recent files in a holding
//! area and files older ones into an AI-categorized library.

pub mod age;
pub mod batch;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod oracle;
pub mod resolver;
pub mod sweep;
pub mod watcher;

pub use config::AppConfig;
pub use error::{LibrarianError, Result};
