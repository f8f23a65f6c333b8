// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Age classification of files against the recent window

use chrono::{DateTime, Duration, Utc};
use std::io::ErrorKind;
use std::path::Path;

use crate::{LibrarianError, Result};

/// Which side of the recent window a file falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeClass {
    Recent,
    Aged,
}

/// Classify a creation time. The boundary is inclusive: a file exactly
/// `window` old is still recent.
pub fn classify(created_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> AgeClass {
    if now - created_at <= window {
        AgeClass::Recent
    } else {
        AgeClass::Aged
    }
}

/// Where creation timestamps come from
pub trait TimestampSource: Send + Sync {
    fn created_at(&self, path: &Path) -> Result<DateTime<Utc>>;
}

/// Reads timestamps from filesystem metadata.
///
/// Uses the birth time where the platform records one and the modification
/// time on filesystems that don't. Any other failure is reported, never
/// replaced with "now".
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTimestamps;

impl TimestampSource for FsTimestamps {
    fn created_at(&self, path: &Path) -> Result<DateTime<Utc>> {
        let to_err = |source| LibrarianError::Timestamp {
            path: path.to_path_buf(),
            source,
        };
        let meta = std::fs::metadata(path).map_err(to_err)?;
        let time = match meta.created() {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::Unsupported => meta.modified().map_err(to_err)?,
            Err(e) => return Err(to_err(e)),
        };
        Ok(DateTime::<Utc>::from(time))
    }
}

/// Classify a file on disk using `source` for its timestamp
pub fn classify_path(
    source: &dyn TimestampSource,
    path: &Path,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<AgeClass> {
    let created = source.created_at(path)?;
    Ok(classify(created, now, window))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn window() -> Duration {
        Duration::hours(72)
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let now = Utc::now();
        assert_eq!(classify(now - window(), now, window()), AgeClass::Recent);
        assert_eq!(
            classify(now - window() - Duration::milliseconds(1), now, window()),
            AgeClass::Aged
        );
    }

    #[test]
    fn test_young_and_old_files() {
        let now = Utc::now();
        assert_eq!(classify(now - Duration::hours(1), now, window()), AgeClass::Recent);
        assert_eq!(classify(now - Duration::days(4), now, window()), AgeClass::Aged);
    }

    #[test]
    fn test_future_timestamp_is_recent() {
        let now = Utc::now();
        assert_eq!(classify(now + Duration::minutes(5), now, window()), AgeClass::Recent);
    }

    #[test]
    fn test_fs_timestamps_fresh_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.txt");
        std::fs::write(&path, b"hi").unwrap();
        let class = classify_path(&FsTimestamps, &path, Utc::now(), window()).unwrap();
        assert_eq!(class, AgeClass::Recent);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = FsTimestamps.created_at(&dir.path().join("gone.txt")).unwrap_err();
        assert!(matches!(err, LibrarianError::Timestamp { .. }));
        assert!(err.is_not_found());
    }
}
