use crate::models::{Bucket, HistoryEntry, Outcome, StatCategory};
use crate::profile::Profile;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
pub struct XpPoint {
    pub date: NaiveDate,
    pub cumulative_xp: u64,
    pub outcome: Outcome,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OutcomeTotals {
    pub success: u64,
    pub partial: u64,
    pub failure: u64,
    pub level_up: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DayPoint {
    pub date: NaiveDate,
    pub completed: u32,
    pub failed: u32,
    /// Summary of the daily rollover, once that day has been closed.
    pub day_outcome: Option<Outcome>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub xp_series: Vec<XpPoint>,
    pub outcome_totals: OutcomeTotals,
    pub last_7_days: Vec<DayPoint>,
    pub current_streak: u32,
    pub best_streak: u32,
    pub stats: BTreeMap<StatCategory, u64>,
}

pub fn build_stats(profile: &Profile) -> StatsResponse {
    let history = &profile.history;

    let xp_series = history
        .iter()
        .map(|entry| XpPoint {
            date: entry.date,
            cumulative_xp: entry.cumulative_xp,
            outcome: entry.outcome,
        })
        .collect();

    let mut outcome_totals = OutcomeTotals::default();
    for entry in history.iter().filter(|entry| entry.cycle.is_none()) {
        match entry.outcome {
            Outcome::Success => outcome_totals.success += 1,
            Outcome::Partial => outcome_totals.partial += 1,
            Outcome::Failure => outcome_totals.failure += 1,
            Outcome::LevelUp => outcome_totals.level_up += 1,
        }
    }

    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        if let Some(date) = profile.clock.checked_sub_signed(Duration::days(offset)) {
            last_7_days.push(day_point(history, date));
        }
    }

    let (current_streak, best_streak) = daily_streaks(history);

    StatsResponse {
        xp_series,
        outcome_totals,
        last_7_days,
        current_streak,
        best_streak,
        stats: profile.stats.clone(),
    }
}

fn day_point(history: &[HistoryEntry], date: NaiveDate) -> DayPoint {
    let mut completed = 0u32;
    let mut failed = 0u32;
    let mut day_outcome = None;
    for entry in history.iter().filter(|entry| entry.date == date) {
        match (entry.cycle, entry.outcome) {
            (Some(Bucket::Daily), outcome) => day_outcome = Some(outcome),
            (None, Outcome::Success) => completed += 1,
            (None, Outcome::Failure) => failed += 1,
            _ => {}
        }
    }
    DayPoint {
        date,
        completed,
        failed,
        day_outcome,
    }
}

/// Runs of consecutive fully completed days: (trailing run, longest run).
fn daily_streaks(history: &[HistoryEntry]) -> (u32, u32) {
    let mut current = 0u32;
    let mut best = 0u32;
    for entry in history
        .iter()
        .filter(|entry| entry.cycle == Some(Bucket::Daily))
    {
        if entry.outcome == Outcome::Success {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    (current, best)
}
