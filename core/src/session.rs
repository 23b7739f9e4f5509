//! One dated backup attempt against a host's store.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use chrono::DateTime;
use chrono::Utc;
use tracing::info;
use tracing::warn;

use crate::snapshot::LAST_POINTER;
use crate::snapshot::SnapshotId;
use crate::status::RunStatus;
use crate::transport::Transport;
use crate::transport::join_path;

/// Directory inside each snapshot holding the session report.
const REPORT_DIR: &str = ".snapback";

/// Result of one backup session.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SessionOutcome {
    pub id: SnapshotId,
    pub status: RunStatus,
}

/// Run one backup session: an incremental sync of `sources` against the
/// `LAST` snapshot, then marker and pointer maintenance.
///
/// A partial transfer still yields a usable snapshot, so it gets its
/// `-OK` marker and advances `LAST`; the degraded status is reported to
/// the caller. A hard sync failure returns the error before any marker
/// is written — `LAST` never moves backward and only advances on
/// success.
pub fn run_backup(
    transport: &dyn Transport,
    host_root: &str,
    sources: &[PathBuf],
    excludes: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<SessionOutcome> {
    let id = SnapshotId::for_time(now);
    let dest = join_path(host_root, id.as_str());
    info!(id = %id, sources = sources.len(), "starting backup session");

    let mut status = transport.sync_incremental(sources, &dest, Some(LAST_POINTER), excludes)?;

    // Best effort: a report that fails to ship degrades the run but does
    // not invalidate the snapshot.
    if let Err(err) = ship_report(transport, &dest, &id, status, sources) {
        warn!(id = %id, error = %format!("{err:#}"), "failed to ship session report");
        status = status.worst(RunStatus::Degraded);
    }

    transport.symlink(&join_path(host_root, &id.ok_marker()), id.as_str())?;
    transport.symlink(&join_path(host_root, LAST_POINTER), id.as_str())?;
    info!(id = %id, status = ?status, "backup session finished");
    Ok(SessionOutcome { id, status })
}

/// Mirror a short plain-text session report into the snapshot itself,
/// under [`REPORT_DIR`].
fn ship_report(
    transport: &dyn Transport,
    dest: &str,
    id: &SnapshotId,
    status: RunStatus,
    sources: &[PathBuf],
) -> anyhow::Result<()> {
    let staging = tempfile::tempdir().context("creating report staging directory")?;
    let mut body = format!("id {id}\nstatus {status:?}\n");
    for source in sources {
        body.push_str(&format!("source {}\n", source.display()));
    }
    fs::write(staging.path().join("session"), body).context("writing session report")?;
    transport.mirror(staging.path(), &join_path(dest, REPORT_DIR))?;
    Ok(())
}
