//! Offline reconstruction of logical log order.
//!
//! Concurrent per-repo procedures complete in wall-clock order, so captured
//! log lines interleave arbitrarily. Each line carries the label of the
//! [`crate::sched::SchedulingContext`] that emitted it; [`reorder`] re-sorts
//! a captured batch by the context tree so the log reads as if execution had
//! been single-threaded and sequential, matching how the workflow code is
//! written. This is a pure function over captured records, with no coupling
//! to the concurrency runtime.

use serde::{Deserialize, Serialize};

/// One captured log line: the emitting context's label plus the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Dotted ordinal path, e.g. `"0.2.1"`.
    pub label: String,
    pub message: String,
}

impl LogRecord {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            label: label.into(),
            message: message.into(),
        }
    }
}

/// Re-emit `records` in the order implied by the context tree rather than by
/// wall-clock completion.
///
/// Sorting is stable: within a single context, lines keep their arrival
/// order, which is program order because each per-repo procedure is
/// sequential. A parent's lines sort before its children's; siblings sort by
/// their creation ordinal. Records whose label is not a dotted ordinal path
/// sort after all labelled records, preserving their relative order.
pub fn reorder(records: &[LogRecord]) -> Vec<LogRecord> {
    let mut keyed: Vec<(Option<Vec<u64>>, &LogRecord)> = records
        .iter()
        .map(|record| (parse_label(&record.label), record))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    keyed.into_iter().map(|(_, record)| record.clone()).collect()
}

/// Parse a dotted ordinal path label into its numeric components.
fn parse_label(label: &str) -> Option<Vec<u64>> {
    if label.is_empty() {
        return None;
    }
    label
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(label: &str, message: &str) -> LogRecord {
        LogRecord::new(label, message)
    }

    #[test]
    fn test_reorder_sorts_siblings_by_creation_ordinal() {
        let captured = vec![
            rec("0.2", "repo c header"),
            rec("0.0", "repo a header"),
            rec("0.1", "repo b header"),
        ];
        let replayed = reorder(&captured);
        let messages: Vec<&str> = replayed.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["repo a header", "repo b header", "repo c header"]);
    }

    #[test]
    fn test_parent_lines_come_before_child_lines() {
        let captured = vec![
            rec("0.0.1", "child step 2"),
            rec("0", "workflow start"),
            rec("0.0.0", "child step 1"),
            rec("0.0", "repo a header"),
        ];
        let replayed = reorder(&captured);
        let messages: Vec<&str> = replayed.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["workflow start", "repo a header", "child step 1", "child step 2"]
        );
    }

    #[test]
    fn test_lines_within_one_context_keep_arrival_order() {
        let captured = vec![
            rec("0.1", "first"),
            rec("0.0", "other repo"),
            rec("0.1", "second"),
            rec("0.1", "third"),
        ];
        let replayed = reorder(&captured);
        let messages: Vec<&str> = replayed.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["other repo", "first", "second", "third"]);
    }

    #[test]
    fn test_interleaved_concurrent_repos_untangle() {
        // Two repos' sequential procedures, interleaved as they might arrive
        // from concurrent execution.
        let captured = vec![
            rec("0.1", "b: checkout integration"),
            rec("0.0", "a: checkout integration"),
            rec("0.1", "b: merge feature"),
            rec("0.0", "a: merge feature"),
            rec("0.1", "b: push"),
            rec("0.0", "a: push"),
        ];
        let replayed = reorder(&captured);
        let messages: Vec<&str> = replayed.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "a: checkout integration",
                "a: merge feature",
                "a: push",
                "b: checkout integration",
                "b: merge feature",
                "b: push",
            ]
        );
    }

    #[test]
    fn test_unparseable_labels_sort_last_in_arrival_order() {
        let captured = vec![
            rec("garbled", "stray line 1"),
            rec("0.0", "real line"),
            rec("", "stray line 2"),
        ];
        let replayed = reorder(&captured);
        let messages: Vec<&str> = replayed.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["real line", "stray line 1", "stray line 2"]);
    }
}
