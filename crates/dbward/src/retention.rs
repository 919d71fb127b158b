//! Grandfather-father-son retention planning.
//!
//! Pure planning over snapshot timestamps; deleting the pruned artifacts is
//! left to the caller.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// How many distinct periods keep a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GfsPolicy {
    pub daily: u32,
    pub weekly: u32,
    pub monthly: u32,
}

impl GfsPolicy {
    pub fn new(daily: u32, weekly: u32, monthly: u32) -> Self {
        Self {
            daily,
            weekly,
            monthly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
        }
    }
}

/// Snapshots split into kept and prunable, each newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPlan {
    pub keep: Vec<Snapshot>,
    pub prune: Vec<Snapshot>,
}

/// Keep the newest snapshot of each of the most recent `daily` days, `weekly`
/// ISO weeks and `monthly` calendar months that have snapshots. The newest
/// snapshot overall is always kept.
pub fn plan_retention(policy: &GfsPolicy, snapshots: &[Snapshot]) -> RetentionPlan {
    let mut sorted = snapshots.to_vec();
    sorted.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut keep = HashSet::new();
    if !sorted.is_empty() {
        keep.insert(0);
    }
    newest_per_period(&sorted, policy.daily, day, &mut keep);
    newest_per_period(&sorted, policy.weekly, iso_week, &mut keep);
    newest_per_period(&sorted, policy.monthly, month, &mut keep);

    let mut plan = RetentionPlan::default();
    for (index, snapshot) in sorted.into_iter().enumerate() {
        if keep.contains(&index) {
            plan.keep.push(snapshot);
        } else {
            plan.prune.push(snapshot);
        }
    }
    plan
}

/// `sorted` must be newest first, so the first hit per period is its newest
fn newest_per_period<K, F>(sorted: &[Snapshot], limit: u32, period: F, keep: &mut HashSet<usize>)
where
    K: Eq + Hash,
    F: Fn(&DateTime<Utc>) -> K,
{
    let mut seen = HashSet::new();
    for (index, snapshot) in sorted.iter().enumerate() {
        if seen.len() >= limit as usize {
            break;
        }
        if seen.insert(period(&snapshot.created_at)) {
            keep.insert(index);
        }
    }
}

fn day(at: &DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

fn iso_week(at: &DateTime<Utc>) -> (i32, u32) {
    let week = at.iso_week();
    (week.year(), week.week())
}

fn month(at: &DateTime<Utc>) -> (i32, u32) {
    (at.year(), at.month())
}
