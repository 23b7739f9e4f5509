//! CLI for rotating backups with tiered retention.

use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use tracing::warn;

use snapback_core::config::PeriodSpec;
use snapback_core::config::Target;
use snapback_core::inventory;
use snapback_core::purge;
use snapback_core::retention;
use snapback_core::session;
use snapback_core::snapshot::Outcome;
use snapback_core::status::RunStatus;
use snapback_core::transport;
use snapback_core::transport::Transport;

/// Rotating backups with tiered, grandfather-father-son retention over a
/// local directory or an rsync daemon store.
#[derive(Debug, Parser)]
#[command(name = "snapback", version)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

/// Options shared by every subcommand that touches the store.
#[derive(Debug, clap::Args)]
pub struct StoreArgs {
    /// Backup store root: a local directory or an rsync daemon target
    /// (`[user@]host::module/path`).
    #[arg(long)]
    pub store: Target,

    /// Host subdirectory under the store; defaults to `$HOSTNAME`.
    #[arg(long)]
    pub host: Option<String>,

    /// Password file handed to rsync for daemon authentication.
    #[arg(long)]
    pub password_file: Option<PathBuf>,
}

impl StoreArgs {
    fn host(&self) -> anyhow::Result<String> {
        if let Some(host) = &self.host {
            return Ok(host.clone());
        }
        std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow::anyhow!("--host not given and HOSTNAME is unset"))
    }

    fn open(&self) -> Box<dyn Transport> {
        transport::open(&self.store, self.password_file.as_deref())
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Run one backup session, optionally followed by a retention purge.
    Backup {
        #[command(flatten)]
        store: StoreArgs,
        /// Source paths to back up.
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// rsync-style exclude pattern, repeatable.
        #[arg(long = "exclude")]
        excludes: Vec<String>,
        /// Retention period as `days:count`, nearest to today first,
        /// repeatable. When given, retention runs after the session.
        #[arg(long = "keep")]
        keep: Vec<PeriodSpec>,
        /// Report retention decisions without deleting anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// List the classified snapshot inventory and exit.
    List {
        #[command(flatten)]
        store: StoreArgs,
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate retention periods and purge eligible snapshots.
    Purge {
        #[command(flatten)]
        store: StoreArgs,
        /// Retention period as `days:count`, nearest to today first,
        /// repeatable.
        #[arg(long = "keep", required = true)]
        keep: Vec<PeriodSpec>,
        /// Report what would be purged without deleting anything.
        #[arg(long)]
        dry_run: bool,
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Execute the parsed command, returning the run's worst status.
pub fn run(cli: Cli) -> anyhow::Result<RunStatus> {
    match cli.cmd {
        Command::Backup {
            store,
            sources,
            excludes,
            keep,
            dry_run,
        } => {
            let transport = store.open();
            let host_root = store.host()?;
            let outcome = session::run_backup(
                transport.as_ref(),
                &host_root,
                &sources,
                &excludes,
                Utc::now(),
            )?;
            println!("backed up {} ({:?})", outcome.id, outcome.status);
            let mut status = outcome.status;
            if !keep.is_empty() {
                status = status.worst(run_purge(
                    transport.as_ref(),
                    &host_root,
                    &keep,
                    dry_run,
                    false,
                )?);
            }
            Ok(status)
        }
        Command::List { store, json } => {
            let transport = store.open();
            let host_root = store.host()?;
            let names = transport.list(&host_root)?;
            let snapshots = inventory::build(&names, Utc::now());
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshots)?);
            } else {
                for snap in &snapshots {
                    let label = match snap.outcome {
                        Outcome::Success => "ok",
                        Outcome::Failure => "failed",
                    };
                    println!("{}  age {:>4}d  {label}", snap.id, snap.age_days);
                }
            }
            Ok(RunStatus::Ok)
        }
        Command::Purge {
            store,
            keep,
            dry_run,
            json,
        } => {
            let transport = store.open();
            let host_root = store.host()?;
            run_purge(transport.as_ref(), &host_root, &keep, dry_run, json)
        }
    }
}

fn run_purge(
    transport: &dyn Transport,
    host_root: &str,
    keep: &[PeriodSpec],
    dry_run: bool,
    json: bool,
) -> anyhow::Result<RunStatus> {
    // A listing failure aborts the run here: no decisions are ever made
    // on a partial view of the store.
    let names = transport.list(host_root)?;
    let snapshots = inventory::build(&names, Utc::now());
    let periods = retention::schedule(keep);
    let plan = retention::plan(&periods, &snapshots);
    let report = purge::execute(transport, host_root, &plan, dry_run);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "plan": plan,
                "report": report,
            }))?
        );
    } else {
        let verb = if dry_run { "would purge" } else { "purged" };
        for id in &report.purged {
            println!("{verb} {id}");
        }
        for failure in &report.failed {
            warn!(id = %failure.id, error = %failure.error, "failed to purge snapshot");
        }
    }
    Ok(report.status())
}

/// Escape hatch used by `main` and the CLI tests.
pub fn exit_code(status: RunStatus) -> i32 {
    i32::from(status.exit_code())
}
