//! Snapshot identity and classification records.

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::Utc;

/// Fixed-width timestamp format used for snapshot directory names.
///
/// Every field is zero-padded, so lexicographic order of formatted ids
/// equals chronological order. The rest of the crate leans on `Ord` for
/// "most recent" selection; that only holds for ids built through
/// [`SnapshotId::for_time`].
const ID_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Suffix of the marker entry that records a successful session.
pub const OK_SUFFIX: &str = "-OK";

/// Marker written by older releases. Absence of `-OK` already encodes
/// failure, so these are recognized only to be skipped.
pub const LEGACY_FAILED_SUFFIX: &str = "-FAILED";

/// Pointer to the newest successful snapshot. A layout element of the
/// store, never a snapshot record, and never a purge candidate.
pub const LAST_POINTER: &str = "LAST";

/// Name of one dated snapshot directory under a host's store.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Wrap a raw listing entry. Foreign names are carried as-is; they
    /// simply have no parsable timestamp.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Format a fresh id for a backup attempt starting at `time`.
    pub fn for_time(time: DateTime<Utc>) -> Self {
        Self(time.format(ID_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the timestamp encoded in the id, if the id is well-formed.
    pub fn parse_time(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.0, ID_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Name of the success marker paired with this id.
    pub fn ok_marker(&self) -> String {
        format!("{}{OK_SUFFIX}", self.0)
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of the backup session a snapshot came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// One dated backup attempt as seen in the store listing. Immutable once
/// classified within a run.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    /// Whole days between the id's timestamp and "now", rounded half-up.
    /// Recomputed every run, never persisted.
    pub age_days: u64,
    pub outcome: Outcome,
}
