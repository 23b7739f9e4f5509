//! Run configuration: retention period specs and store targets.
//!
//! Both types implement `FromStr` so clap can reject malformed values
//! before any remote contact happens.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

/// One configured retention tier: keep `keep_count` snapshots within a
/// window spanning `span_days` days. Tiers are configured nearest to
/// today first; absolute age bounds are derived cumulatively by
/// [`crate::retention::schedule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeriodSpec {
    pub span_days: u64,
    pub keep_count: u64,
}

impl FromStr for PeriodSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((days, count)) = s.split_once(':') else {
            anyhow::bail!("retention period must be days:count, got {s:?}");
        };
        let span_days: u64 = days
            .trim()
            .parse()
            .with_context(|| format!("invalid day span in retention period {s:?}"))?;
        let keep_count: u64 = count
            .trim()
            .parse()
            .with_context(|| format!("invalid keep count in retention period {s:?}"))?;
        if span_days == 0 {
            anyhow::bail!("retention period {s:?} must span at least one day");
        }
        Ok(Self {
            span_days,
            keep_count,
        })
    }
}

/// Where a host's backup store lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// rsync daemon target, `[user@]host::module/path`.
    Rsync { spec: String },
    /// Plain directory on the local filesystem.
    Local { root: PathBuf },
}

impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            anyhow::bail!("backup store target must not be empty");
        }
        if let Some((host, rest)) = s.split_once("::") {
            if host.is_empty() || rest.is_empty() {
                anyhow::bail!("rsync target must be [user@]host::module/path, got {s:?}");
            }
            Ok(Target::Rsync {
                spec: s.to_string(),
            })
        } else {
            Ok(Target::Local {
                root: PathBuf::from(s),
            })
        }
    }
}
