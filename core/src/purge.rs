//! Applies (or merely reports) a retention plan through the transport.
//!
//! This is the only component that mutates remote state. Evaluation is
//! already complete when it runs; an individual transport failure is
//! recorded and the rest of the queue continues.

use tracing::info;
use tracing::warn;

use crate::retention::RetentionPlan;
use crate::snapshot::Outcome;
use crate::snapshot::Snapshot;
use crate::snapshot::SnapshotId;
use crate::status::RunStatus;
use crate::transport::Transport;
use crate::transport::join_path;

/// What happened to each purge candidate.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PurgeReport {
    pub dry_run: bool,
    /// Removed snapshots, or in dry-run mode the would-be removals.
    pub purged: Vec<SnapshotId>,
    pub failed: Vec<PurgeFailure>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PurgeFailure {
    pub id: SnapshotId,
    pub error: String,
}

impl PurgeReport {
    /// Status contribution of this purge pass to the run.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        if self.failed.is_empty() {
            RunStatus::Ok
        } else {
            RunStatus::Degraded
        }
    }
}

/// Apply the plan under `host_root`.
///
/// In dry-run mode no transport call is made at all; the report lists
/// what would have been removed.
pub fn execute(
    transport: &dyn Transport,
    host_root: &str,
    plan: &RetentionPlan,
    dry_run: bool,
) -> PurgeReport {
    let mut report = PurgeReport {
        dry_run,
        purged: Vec::new(),
        failed: Vec::new(),
    };
    for snap in &plan.purge {
        if dry_run {
            info!(id = %snap.id, age_days = snap.age_days, "would purge snapshot");
            report.purged.push(snap.id.clone());
            continue;
        }
        match remove_snapshot(transport, host_root, snap) {
            Ok(()) => {
                info!(id = %snap.id, age_days = snap.age_days, "purged snapshot");
                report.purged.push(snap.id.clone());
            }
            Err(err) => {
                let error = format!("{err:#}");
                warn!(id = %snap.id, error = %error, "failed to purge snapshot");
                report.failed.push(PurgeFailure {
                    id: snap.id.clone(),
                    error,
                });
            }
        }
    }
    report
}

fn remove_snapshot(
    transport: &dyn Transport,
    host_root: &str,
    snap: &Snapshot,
) -> anyhow::Result<()> {
    // Marker first: if the run dies between the two deletions, the data
    // directory is left unmarked and classifies as a failure next run.
    if snap.outcome == Outcome::Success {
        transport.replace_empty(&join_path(host_root, &snap.id.ok_marker()))?;
    }
    transport.replace_empty(&join_path(host_root, snap.id.as_str()))
}
