//! The remote-store collaborator.
//!
//! Everything above this seam treats the store as a handful of blocking
//! capabilities; retry policy, credentials, and wire details live behind
//! it. Two backends exist: a plain filesystem one (local stores, tests)
//! and an rsync subprocess one for daemon targets.

use std::path::Path;
use std::path::PathBuf;

use crate::config::Target;
use crate::status::RunStatus;

pub mod local;
pub mod rsync;

pub trait Transport: Send + Sync {
    /// Entry names directly under `path`, ascending lexicographic.
    fn list(&self, path: &str) -> anyhow::Result<Vec<String>>;

    /// Incremental copy of `sources` into the `dest` entry, hard-linking
    /// unchanged files against the sibling entry of `dest` named by
    /// `link_ref`. Returns [`RunStatus::Degraded`] for partial
    /// transfers; hard failures are errors.
    fn sync_incremental(
        &self,
        sources: &[PathBuf],
        dest: &str,
        link_ref: Option<&str>,
        excludes: &[String],
    ) -> anyhow::Result<RunStatus>;

    /// Verbatim upload of a local directory into `remote_dir`.
    fn mirror(&self, local_dir: &Path, remote_dir: &str) -> anyhow::Result<RunStatus>;

    /// Remove `entry` by overwriting it with nothing. Removing an entry
    /// that is already gone is not an error.
    fn replace_empty(&self, entry: &str) -> anyhow::Result<()>;

    /// Point the symlink `entry` at `target`, replacing any previous
    /// link in one step.
    fn symlink(&self, entry: &str, target: &str) -> anyhow::Result<()>;
}

/// Open the backend matching the target syntax.
pub fn open(target: &Target, password_file: Option<&Path>) -> Box<dyn Transport> {
    match target {
        Target::Local { root } => Box::new(local::LocalTransport::new(root.clone())),
        Target::Rsync { spec } => Box::new(rsync::RsyncTransport::new(
            spec.clone(),
            password_file.map(Path::to_path_buf),
        )),
    }
}

/// Join store-relative paths without doubling separators.
pub fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{name}", base.trim_end_matches('/'))
    }
}

/// Split a store-relative entry into its parent path and final name.
pub(crate) fn split_entry(entry: &str) -> (&str, &str) {
    match entry.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", entry),
    }
}
