//! rsync subprocess transport for `[user@]host::module/path` daemon
//! targets.
//!
//! The engine never sees rsync's exit-code zoo: partial transfers
//! (vanished or unreadable files, codes 23/24) come back as
//! [`RunStatus::Degraded`], everything else non-zero is an error.

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;
use tracing::debug;
use tracing::warn;

use crate::status::RunStatus;
use crate::transport::Transport;
use crate::transport::split_entry;

/// Override the rsync binary, mainly for tests and odd installs.
const RSYNC_BIN_ENV: &str = "SNAPBACK_RSYNC_BIN";

/// Exit codes rsync uses for incomplete-but-usable transfers.
const PARTIAL_EXIT_CODES: &[i32] = &[23, 24];

pub struct RsyncTransport {
    spec: String,
    password_file: Option<PathBuf>,
}

impl RsyncTransport {
    pub fn new(spec: String, password_file: Option<PathBuf>) -> Self {
        Self {
            spec,
            password_file,
        }
    }

    fn command(&self) -> Command {
        let bin = std::env::var(RSYNC_BIN_ENV).unwrap_or_else(|_| "rsync".to_string());
        let mut cmd = Command::new(bin);
        if let Some(password_file) = &self.password_file {
            cmd.arg("--password-file").arg(password_file);
        }
        cmd
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.spec.clone()
        } else {
            format!("{}/{path}", self.spec.trim_end_matches('/'))
        }
    }

    fn run(&self, cmd: &mut Command) -> anyhow::Result<RunStatus> {
        debug!(cmd = ?cmd, "running rsync");
        let output = cmd.output().context("spawning rsync")?;
        match output.status.code() {
            Some(0) => Ok(RunStatus::Ok),
            Some(code) if PARTIAL_EXIT_CODES.contains(&code) => {
                warn!(code, "rsync reported a partial transfer");
                Ok(RunStatus::Degraded)
            }
            code => anyhow::bail!(
                "rsync failed (exit {code:?}): {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }
}

impl Transport for RsyncTransport {
    fn list(&self, path: &str) -> anyhow::Result<Vec<String>> {
        let mut cmd = self.command();
        cmd.arg("--list-only").arg(format!("{}/", self.url(path)));
        debug!(cmd = ?cmd, "running rsync");
        let output = cmd.output().context("spawning rsync")?;
        if !output.status.success() {
            anyhow::bail!(
                "rsync --list-only failed (exit {:?}): {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let mut names = Vec::new();
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            // perms size date time name [-> target]; snapshot names
            // contain no whitespace.
            let Some(name) = line.split_whitespace().nth(4) else {
                continue;
            };
            if name == "." {
                continue;
            }
            names.push(name.to_string());
        }
        names.sort_unstable();
        Ok(names)
    }

    fn sync_incremental(
        &self,
        sources: &[PathBuf],
        dest: &str,
        link_ref: Option<&str>,
        excludes: &[String],
    ) -> anyhow::Result<RunStatus> {
        let mut cmd = self.command();
        cmd.arg("--archive").arg("--delete").arg("--numeric-ids");
        if let Some(reference) = link_ref {
            // Relative to the destination directory, one level down from
            // the store entry it names.
            cmd.arg(format!("--link-dest=../{reference}"));
        }
        for pattern in excludes {
            cmd.arg(format!("--exclude={pattern}"));
        }
        for source in sources {
            cmd.arg(source);
        }
        cmd.arg(format!("{}/", self.url(dest)));
        self.run(&mut cmd)
    }

    fn mirror(&self, local_dir: &Path, remote_dir: &str) -> anyhow::Result<RunStatus> {
        let mut cmd = self.command();
        cmd.arg("--archive")
            .arg("--delete")
            .arg(format!("{}/", local_dir.display()))
            .arg(format!("{}/", self.url(remote_dir)));
        self.run(&mut cmd)
    }

    fn replace_empty(&self, entry: &str) -> anyhow::Result<()> {
        // Daemon modules expose no delete verb. Syncing an empty staging
        // directory over the parent, with filters scoped to exactly one
        // entry, removes that entry and touches nothing else.
        let staging = tempfile::tempdir().context("creating staging directory")?;
        let (parent, name) = split_entry(entry);
        let mut cmd = self.command();
        cmd.arg("--recursive")
            .arg("--delete")
            .arg(format!("--include=/{name}"))
            .arg(format!("--include=/{name}/**"))
            .arg("--exclude=*")
            .arg(format!("{}/", staging.path().display()))
            .arg(format!("{}/", self.url(parent)));
        self.run(&mut cmd)?;
        Ok(())
    }

    fn symlink(&self, entry: &str, target: &str) -> anyhow::Result<()> {
        let staging = tempfile::tempdir().context("creating staging directory")?;
        let (parent, name) = split_entry(entry);
        let local = staging.path().join(name);
        std::os::unix::fs::symlink(target, &local)
            .with_context(|| format!("staging symlink {name}"))?;
        let mut cmd = self.command();
        cmd.arg("--links")
            .arg(&local)
            .arg(format!("{}/", self.url(parent)));
        self.run(&mut cmd)?;
        Ok(())
    }
}
