//! The retention period evaluator.
//!
//! Periods are evaluated nearest-to-today first. Each period returns a
//! carry state that the next (older) period consumes: an unmet quota in
//! one period lets the next period promote — keep — one otherwise-excess
//! snapshot, so an occasional missed backup narrows recent coverage
//! instead of erasing it. One real success is preferred over a failure,
//! and a failure over an empty gap.
//!
//! Evaluation is a pure fold over the inventory: identical inputs always
//! yield the identical plan, and nothing here touches the store.

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::PeriodSpec;
use crate::snapshot::Outcome;
use crate::snapshot::Snapshot;
use crate::snapshot::SnapshotId;

/// One age bucket with derived absolute bounds and its quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Youngest age (in days) belonging to this period.
    pub from_day: u64,
    /// Oldest age belonging to this period; `None` for the terminal
    /// period, which is unbounded.
    pub to_day: Option<u64>,
    pub keep_count: u64,
}

impl Period {
    pub fn contains(&self, age_days: u64) -> bool {
        age_days >= self.from_day && self.to_day.is_none_or(|to| age_days <= to)
    }
}

/// Derive cumulative period bounds from nearest-first specs and append
/// the implicit terminal period (unbounded, quota zero).
///
/// The result partitions `[1, ∞)` into disjoint, contiguous, increasing
/// intervals. Age 0 belongs to no period; it seeds the initial carry
/// state instead.
pub fn schedule(specs: &[PeriodSpec]) -> Vec<Period> {
    let mut periods = Vec::with_capacity(specs.len() + 1);
    let mut last_day = 0u64;
    for spec in specs {
        let from_day = last_day + 1;
        last_day += spec.span_days;
        periods.push(Period {
            from_day,
            to_day: Some(last_day),
            keep_count: spec.keep_count,
        });
    }
    periods.push(Period {
        from_day: last_day + 1,
        to_day: None,
        keep_count: 0,
    });
    periods
}

/// Summary of one period's outcome, consumed by the next (older) period.
/// The order of the variants is load-bearing: promotion thresholds
/// compare against it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionState {
    /// The period held no snapshots at all.
    Empty,
    /// Quota reached by failures only.
    FailureOnly,
    /// At least one success, but below quota.
    HasSuccess,
    /// Quota met by successes.
    Full,
}

/// Per-period evaluation trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodOutcome {
    pub from_day: u64,
    pub to_day: Option<u64>,
    pub keep_count: u64,
    /// Successes and failures found in range, before any decision.
    pub successes: u64,
    pub failures: u64,
    pub state_in: RetentionState,
    pub state_out: RetentionState,
    /// Excess snapshot kept to absorb a shortfall left by the more
    /// recent period. At most one per period.
    pub promoted: Option<SnapshotId>,
    pub purged: Vec<SnapshotId>,
}

/// The evaluator's complete decision for one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPlan {
    /// Snapshots eligible for deletion, in evaluation order.
    pub purge: Vec<Snapshot>,
    pub periods: Vec<PeriodOutcome>,
}

/// Evaluate the period schedule against the inventory.
///
/// Each snapshot with age ≥ 1 is assigned to exactly one period by age;
/// age-0 snapshots seed the initial carry state. Snapshots matching no
/// period (impossible while the terminal period exists) are left
/// untouched by fail-safe default.
pub fn plan(periods: &[Period], inventory: &[Snapshot]) -> RetentionPlan {
    let mut buckets: Vec<Vec<&Snapshot>> = vec![Vec::new(); periods.len()];
    for snap in inventory {
        if snap.age_days == 0 {
            continue;
        }
        if let Some(idx) = periods.iter().position(|p| p.contains(snap.age_days)) {
            buckets[idx].push(snap);
        }
    }

    let mut state = initial_state(inventory);
    let mut purge = Vec::new();
    let mut outcomes = Vec::with_capacity(periods.len());
    for (period, mut bucket) in periods.iter().zip(buckets) {
        // Most recent first; id order is chronological by construction.
        bucket.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        let outcome = evaluate_period(period, &bucket, state, &mut purge);
        debug!(
            from_day = outcome.from_day,
            to_day = ?outcome.to_day,
            keep = outcome.keep_count,
            successes = outcome.successes,
            failures = outcome.failures,
            purged = outcome.purged.len(),
            state_out = ?outcome.state_out,
            "evaluated retention period"
        );
        state = outcome.state_out;
        outcomes.push(outcome);
    }

    RetentionPlan {
        purge,
        periods: outcomes,
    }
}

/// Carry state seeding the first period, from today's (age 0) snapshots.
/// A success today fills today's implicit single slot, so the first
/// period starts from `Full` and gets no promotion.
fn initial_state(inventory: &[Snapshot]) -> RetentionState {
    let mut state = RetentionState::Empty;
    for snap in inventory.iter().filter(|s| s.age_days == 0) {
        state = state.max(match snap.outcome {
            Outcome::Success => RetentionState::Full,
            Outcome::Failure => RetentionState::FailureOnly,
        });
    }
    state
}

fn evaluate_period(
    period: &Period,
    newest_first: &[&Snapshot],
    state_in: RetentionState,
    purge: &mut Vec<Snapshot>,
) -> PeriodOutcome {
    let successes: Vec<&Snapshot> = newest_first
        .iter()
        .copied()
        .filter(|s| s.outcome == Outcome::Success)
        .collect();
    let failures: Vec<&Snapshot> = newest_first
        .iter()
        .copied()
        .filter(|s| s.outcome == Outcome::Failure)
        .collect();
    let total_good = successes.len() as u64;
    let total_bad = failures.len() as u64;
    let keep = period.keep_count;

    let mut state = state_in;
    let mut promoted = None;
    let mut purged = Vec::new();

    // Excess successes, most recent first. The first one is kept instead
    // of purged when the more recent period fell short of its quota.
    let mut good = total_good;
    let mut next = 0;
    while good > keep {
        let snap = successes[next];
        next += 1;
        if state == RetentionState::Full {
            purged.push(snap.id.clone());
            purge.push(snap.clone());
        } else {
            state = RetentionState::Full;
            promoted = Some(snap.id.clone());
        }
        good -= 1;
    }

    // Excess failures count against whatever quota room is left. A
    // failure is only worth promoting when the carry state is a complete
    // blank.
    let mut bad = total_bad;
    let mut next = 0;
    while good + bad > keep {
        let snap = failures[next];
        next += 1;
        if state >= RetentionState::FailureOnly {
            purged.push(snap.id.clone());
            purge.push(snap.clone());
        } else {
            state = RetentionState::FailureOnly;
            promoted = Some(snap.id.clone());
        }
        bad -= 1;
    }

    // The reported state uses the period's original counts: a quota met
    // on top of a promotion is still met, otherwise the shortfall would
    // cascade down every older period.
    let promo = u64::from(promoted.is_some());
    let state_out = if total_good == 0 && total_bad == 0 {
        RetentionState::Empty
    } else if total_good >= keep + promo {
        RetentionState::Full
    } else if total_good > 0 {
        RetentionState::HasSuccess
    } else if total_bad >= keep + promo {
        RetentionState::FailureOnly
    } else {
        RetentionState::Empty
    };

    PeriodOutcome {
        from_day: period.from_day,
        to_day: period.to_day,
        keep_count: keep,
        successes: total_good,
        failures: total_bad,
        state_in,
        state_out,
        promoted,
        purged,
    }
}
