//! Run status severity shared by sessions, purges, and the CLI exit code.

/// Outcome of a run or sub-operation, ordered by severity so a run can
/// fold many sub-results into the worst one observed.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Everything completed.
    Ok,
    /// Completed with recoverable losses: a partial transfer, or
    /// individual purge candidates that could not be removed.
    Degraded,
    /// A mandatory step failed outright.
    Failed,
}

impl RunStatus {
    /// The more severe of the two statuses.
    #[must_use]
    pub fn worst(self, other: RunStatus) -> RunStatus {
        self.max(other)
    }

    /// Process exit code reported for this status.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::Degraded => 1,
            RunStatus::Failed => 2,
        }
    }
}
