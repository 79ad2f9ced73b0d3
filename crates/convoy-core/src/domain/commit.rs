//! Commit-level records produced by repo inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{ConvoyError, Result};

/// Timestamp format shared by both inspector variants: UTC, sortable as text.
pub const COMMIT_TS_FORMAT: &str = "%y%m%d.%H%M%S";

/// Normalize an ISO-8601 commit timestamp (as emitted by `git log
/// --pretty=%aI` or by the hosted API) to UTC in [`COMMIT_TS_FORMAT`].
pub fn normalize_commit_timestamp(iso: &str) -> Result<String> {
    let parsed = DateTime::parse_from_rfc3339(iso.trim())
        .map_err(|e| ConvoyError::Parse(format!("bad commit timestamp '{iso}': {e}")))?;
    Ok(parsed
        .with_timezone(&Utc)
        .format(COMMIT_TS_FORMAT)
        .to_string())
}

/// The most recent commit on a branch.
///
/// Recreated on every query, never mutated. `timestamp` is normalized to UTC
/// in [`COMMIT_TS_FORMAT`] so values from a working copy and from the hosted
/// API sort and compare identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub timestamp: String,
}

/// One row per (commit, file) pair in a repo's full history.
///
/// `commit_nb` is 0 for the oldest commit and increases toward the most
/// recent; it is only assignable once the whole history snapshot is known,
/// because neither a reverse-chronological log nor a DAG walk emits commits
/// in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedFileInfo {
    /// Chronological commit sequence number (0 = oldest).
    pub commit_nb: usize,
    /// Commit date as reported by the substrate (raw text).
    pub commit_date: String,
    /// Commit message; multi-line messages are semicolon-joined.
    pub summary: String,
    /// Index of the file within its commit.
    pub commit_file_nb: usize,
    /// Path of the changed file; empty for a commit with no file changes.
    pub commit_file: String,
    pub commit_hash: String,
    pub commit_author: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_commit_ts_format_is_lexicographically_sortable() {
        let earlier = Utc.with_ymd_and_hms(2023, 6, 5, 9, 30, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        let a = earlier.format(COMMIT_TS_FORMAT).to_string();
        let b = later.format(COMMIT_TS_FORMAT).to_string();
        assert_eq!(a, "230605.093000");
        assert!(a < b);
    }

    #[test]
    fn test_normalize_commit_timestamp_converts_offsets_to_utc() {
        // 20:32:57 at -07:00 is 03:32:57 UTC the next day.
        let ts = normalize_commit_timestamp("2023-06-14T20:32:57-07:00").unwrap();
        assert_eq!(ts, "230615.033257");
        let ts = normalize_commit_timestamp("2023-06-14T20:32:57Z").unwrap();
        assert_eq!(ts, "230614.203257");
    }

    #[test]
    fn test_normalize_commit_timestamp_rejects_garbage() {
        assert!(normalize_commit_timestamp("Wed May 17 14:03:58 2023").is_err());
    }

    #[test]
    fn test_committed_file_info_serializes_for_reports() {
        let cfi = CommittedFileInfo {
            commit_nb: 3,
            commit_date: "Sat Jun 3 21:22:05 2023 -0700".to_string(),
            summary: "First MVP".to_string(),
            commit_file_nb: 0,
            commit_file: "src/lib.rs".to_string(),
            commit_hash: "e7f556f".to_string(),
            commit_author: "A Stevedore".to_string(),
        };
        let json = serde_json::to_value(&cfi).unwrap();
        assert_eq!(json["commit_nb"], 3);
        assert_eq!(json["commit_file"], "src/lib.rs");
    }
}
