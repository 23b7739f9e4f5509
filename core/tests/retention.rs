//! End-to-end evaluator tests: the canonical rotation scenarios plus
//! property-based invariants.

use std::collections::BTreeSet;

use chrono::DateTime;
use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;
use proptest::prelude::*;

use snapback_core::config::PeriodSpec;
use snapback_core::retention;
use snapback_core::retention::RetentionPlan;
use snapback_core::retention::RetentionState;
use snapback_core::snapshot::Outcome;
use snapback_core::snapshot::Snapshot;
use snapback_core::snapshot::SnapshotId;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 25, 12, 0, 0).unwrap()
}

fn snap(age_days: u64, outcome: Outcome) -> Snapshot {
    Snapshot {
        id: SnapshotId::for_time(now() - Duration::days(age_days as i64)),
        age_days,
        outcome,
    }
}

fn specs(entries: &[&str]) -> Vec<PeriodSpec> {
    entries.iter().map(|e| e.parse().unwrap()).collect()
}

fn evaluate(entries: &[&str], inventory: &[Snapshot]) -> RetentionPlan {
    retention::plan(&retention::schedule(&specs(entries)), inventory)
}

fn kept_ages(inventory: &[Snapshot], plan: &RetentionPlan) -> Vec<u64> {
    let purged: BTreeSet<&SnapshotId> = plan.purge.iter().map(|s| &s.id).collect();
    inventory
        .iter()
        .filter(|s| !purged.contains(&s.id))
        .map(|s| s.age_days)
        .collect()
}

/// Scenario: a success every day for 300 days thins to the configured
/// tier quotas, no promotion anywhere.
#[test]
fn daily_successes_thin_to_tier_quotas() {
    let inventory: Vec<Snapshot> = (0..300).map(|age| snap(age, Outcome::Success)).collect();
    let plan = evaluate(&["7:2", "24:1", "60:1", "275:1"], &inventory);

    // Survivors: today plus the oldest quota per tier. The oldest of a
    // bucket survives so it can cascade into the next tier as it ages.
    assert_eq!(kept_ages(&inventory, &plan), vec![0, 6, 7, 31, 91, 299]);
    assert_eq!(plan.purge.len(), 294);
    for outcome in &plan.periods {
        assert_eq!(outcome.promoted, None);
        if outcome.successes > 0 {
            assert_eq!(outcome.state_out, RetentionState::Full);
        }
    }
    // Today's success seeds a full carry, so the first tier keeps
    // exactly its quota.
    assert_eq!(plan.periods[0].state_in, RetentionState::Full);
}

/// Scenario: only failures on record. Today's failure seeds the carry,
/// so the excess failures purge without promotion.
#[test]
fn failure_history_thins_without_promotion() {
    let inventory = vec![
        snap(0, Outcome::Failure),
        snap(3, Outcome::Failure),
        snap(5, Outcome::Failure),
        snap(7, Outcome::Failure),
    ];
    let plan = evaluate(&["7:1"], &inventory);

    assert_eq!(plan.periods[0].state_in, RetentionState::FailureOnly);
    assert_eq!(plan.periods[0].promoted, None);
    assert_eq!(plan.periods[0].state_out, RetentionState::FailureOnly);
    // The two most recent of the three purge; the oldest survives.
    let purged: Vec<u64> = plan.purge.iter().map(|s| s.age_days).collect();
    assert_eq!(purged, vec![3, 5]);
    assert_eq!(kept_ages(&inventory, &plan), vec![0, 7]);
}

/// Scenario: empty inventory produces an empty plan and all-empty
/// period states.
#[test]
fn empty_inventory_purges_nothing() {
    let plan = evaluate(&["7:2", "24:1"], &[]);
    assert!(plan.purge.is_empty());
    assert_eq!(plan.periods.len(), 3);
    for outcome in &plan.periods {
        assert_eq!(outcome.state_in, RetentionState::Empty);
        assert_eq!(outcome.state_out, RetentionState::Empty);
    }
}

/// A tier left short of successes lets the next tier keep one extra.
#[test]
fn shortfall_promotes_one_excess_success_in_the_next_tier() {
    // No snapshot today, nothing in the first tier: the second tier
    // holds three successes against a quota of one.
    let inventory = vec![
        snap(10, Outcome::Success),
        snap(15, Outcome::Success),
        snap(20, Outcome::Success),
    ];
    let plan = evaluate(&["7:1", "24:1"], &inventory);

    assert_eq!(plan.periods[0].state_out, RetentionState::Empty);
    let second = &plan.periods[1];
    assert_eq!(second.promoted, Some(inventory[0].id.clone()));
    assert_eq!(second.state_out, RetentionState::Full);
    // The newest is promoted, the middle purges, the oldest fills the
    // quota.
    assert_eq!(kept_ages(&inventory, &plan), vec![10, 20]);
    let purged: Vec<u64> = plan.purge.iter().map(|s| s.age_days).collect();
    assert_eq!(purged, vec![15]);
}

/// A failure is promoted only over a complete blank, never over an
/// existing failure-only carry.
#[test]
fn failure_promotes_only_over_an_empty_carry() {
    let inventory = vec![snap(10, Outcome::Failure), snap(20, Outcome::Failure)];
    let plan = evaluate(&["7:1", "24:0"], &inventory);

    let second = &plan.periods[1];
    assert_eq!(second.state_in, RetentionState::Empty);
    assert_eq!(second.promoted, Some(inventory[0].id.clone()));
    assert_eq!(second.state_out, RetentionState::FailureOnly);
    assert_eq!(kept_ages(&inventory, &plan), vec![10]);
}

/// The terminal zero-quota period still absorbs one promotion when the
/// tiers before it fell short. "Purge everything older" deliberately
/// leaves one snapshot behind in that case.
#[test]
fn terminal_period_absorbs_one_promotion() {
    let inventory = vec![
        snap(0, Outcome::Success),
        snap(400, Outcome::Success),
        snap(500, Outcome::Success),
    ];
    let plan = evaluate(&["7:1"], &inventory);

    // The first tier is empty, so the terminal period's carry is Empty
    // and its newest success is promoted instead of purged.
    let terminal = plan.periods.last().unwrap();
    assert_eq!(terminal.keep_count, 0);
    assert_eq!(terminal.state_in, RetentionState::Empty);
    assert_eq!(terminal.promoted, Some(inventory[1].id.clone()));
    assert_eq!(kept_ages(&inventory, &plan), vec![0, 400]);
}

/// With a full carry the terminal period really does purge everything.
#[test]
fn terminal_period_purges_all_when_carry_is_full() {
    let mut inventory = vec![snap(0, Outcome::Success)];
    inventory.extend((1..=7).map(|age| snap(age, Outcome::Success)));
    inventory.push(snap(400, Outcome::Success));
    inventory.push(snap(500, Outcome::Success));
    let plan = evaluate(&["7:1"], &inventory);

    let terminal = plan.periods.last().unwrap();
    assert_eq!(terminal.promoted, None);
    assert_eq!(terminal.purged.len(), 2);
    assert_eq!(kept_ages(&inventory, &plan), vec![0, 7]);
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![Just(Outcome::Success), Just(Outcome::Failure)]
}

fn arb_specs() -> impl Strategy<Value = Vec<PeriodSpec>> {
    prop::collection::vec(
        (1u64..120, 0u64..4).prop_map(|(span_days, keep_count)| PeriodSpec {
            span_days,
            keep_count,
        }),
        0..5,
    )
}

fn arb_inventory() -> impl Strategy<Value = Vec<Snapshot>> {
    prop::collection::btree_set(0u64..400, 0..60).prop_flat_map(|ages| {
        let ages: Vec<u64> = ages.into_iter().collect();
        let len = ages.len();
        prop::collection::vec(arb_outcome(), len..=len)
            .prop_map(move |outcomes| {
                ages.iter()
                    .zip(outcomes)
                    .map(|(age, outcome)| snap(*age, outcome))
                    .collect()
            })
    })
}

proptest! {
    /// Derived ranges partition [1, ∞): contiguous, increasing, no gaps
    /// or overlaps, unbounded tail.
    #[test]
    fn schedule_partitions_all_ages(period_specs in arb_specs()) {
        let periods = retention::schedule(&period_specs);
        let mut next_day = 1u64;
        for period in &periods {
            prop_assert_eq!(period.from_day, next_day);
            if let Some(to_day) = period.to_day {
                prop_assert!(to_day >= period.from_day);
                next_day = to_day + 1;
            }
        }
        prop_assert!(periods.last().unwrap().to_day.is_none());
        for age in 1u64..800 {
            prop_assert_eq!(periods.iter().filter(|p| p.contains(age)).count(), 1);
        }
        for period in &periods {
            prop_assert!(!period.contains(0));
        }
    }

    /// Evaluation is a pure function of its inputs, purges only
    /// snapshots aged >= 1, and each period keeps at most one success
    /// over quota — and then only when the more recent period fell
    /// short.
    #[test]
    fn evaluation_is_deterministic_and_bounded(
        period_specs in arb_specs(),
        inventory in arb_inventory(),
    ) {
        let periods = retention::schedule(&period_specs);
        let plan = retention::plan(&periods, &inventory);
        let again = retention::plan(&periods, &inventory);
        prop_assert_eq!(&plan, &again);

        for purged in &plan.purge {
            prop_assert!(purged.age_days >= 1);
            prop_assert!(inventory.contains(purged));
        }

        for outcome in &plan.periods {
            let purged_successes = plan
                .purge
                .iter()
                .filter(|s| s.outcome == Outcome::Success)
                .filter(|s| outcome.purged.contains(&s.id))
                .count() as u64;
            let surviving = outcome.successes - purged_successes;
            prop_assert!(surviving <= outcome.keep_count + 1);
            if surviving > outcome.keep_count {
                prop_assert!(outcome.state_in < RetentionState::Full);
                prop_assert!(outcome.promoted.is_some());
            }

            // A purged success implies no failure survived the period:
            // successes only purge once the quota is filled by newer
            // successes, at which point every in-range failure is
            // excess.
            let any_success_purged = plan
                .purge
                .iter()
                .any(|s| s.outcome == Outcome::Success && outcome.purged.contains(&s.id));
            if any_success_purged {
                let purged_failures = plan
                    .purge
                    .iter()
                    .filter(|s| s.outcome == Outcome::Failure)
                    .filter(|s| outcome.purged.contains(&s.id))
                    .count() as u64;
                let failure_promoted = 0u64; // a promotion would have blocked success purges
                prop_assert_eq!(outcome.failures, purged_failures + failure_promoted);
            }
        }
    }
}
