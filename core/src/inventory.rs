//! Builds the classified snapshot inventory from a raw store listing.

use chrono::DateTime;
use chrono::Utc;
use tracing::debug;

use crate::snapshot::LAST_POINTER;
use crate::snapshot::LEGACY_FAILED_SUFFIX;
use crate::snapshot::OK_SUFFIX;
use crate::snapshot::Outcome;
use crate::snapshot::Snapshot;
use crate::snapshot::SnapshotId;

const SECS_PER_DAY: i64 = 86_400;

/// Classify a raw listing into snapshot records.
///
/// The listing is sorted ascending first (chronological, because the id
/// format is fixed-width), then each base entry is paired with an
/// immediately following `<entry>-OK` marker: present means the session
/// succeeded, absent means it failed. Marker entries themselves, the
/// `LAST` pointer, and dot entries never produce records. An orphaned
/// marker with no matching base is ignored rather than treated as an
/// error; the store may have been tampered with externally.
pub fn build(names: &[String], now: DateTime<Utc>) -> Vec<Snapshot> {
    let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut inventory = Vec::new();
    for (idx, name) in sorted.iter().enumerate() {
        if *name == LAST_POINTER || name.starts_with('.') {
            continue;
        }
        if let Some(base) = name.strip_suffix(OK_SUFFIX) {
            if idx == 0 || sorted[idx - 1] != base {
                debug!(marker = name, "ignoring orphaned success marker");
            }
            continue;
        }
        if name.ends_with(LEGACY_FAILED_SUFFIX) {
            debug!(marker = name, "ignoring legacy failure marker");
            continue;
        }
        let id = SnapshotId::from_name(*name);
        let outcome = match sorted.get(idx + 1) {
            Some(next) if next.strip_suffix(OK_SUFFIX) == Some(*name) => Outcome::Success,
            _ => Outcome::Failure,
        };
        let age_days = age_days(&id, now);
        inventory.push(Snapshot {
            id,
            age_days,
            outcome,
        });
    }
    inventory
}

/// Whole days between the id's timestamp and `now`, rounded half-up and
/// clamped to zero. An unparsable id ages to zero rather than failing:
/// age 0 is outside every retention period, so malformed entries are
/// never purge candidates.
fn age_days(id: &SnapshotId, now: DateTime<Utc>) -> u64 {
    let Some(time) = id.parse_time() else {
        debug!(id = %id, "snapshot id has no parsable timestamp, treating as age 0");
        return 0;
    };
    let secs = (now - time).num_seconds();
    let days = (secs + SECS_PER_DAY / 2).div_euclid(SECS_PER_DAY);
    u64::try_from(days).unwrap_or(0)
}
