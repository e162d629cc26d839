//! XP curve, level math and the title table.

use crate::models::{Bucket, Mode};
use serde::Deserialize;
use std::borrow::Cow;

pub const MAX_LEVEL: u32 = 100;

pub const BASE_XP: u64 = 100;

/// Ceiling for any single level cost or quest reward.
pub const MAX_STEP_XP: u64 = 1_000_000_000_000;

const MAX_WEIGHT: u64 = 11;

pub static TITLE_NAMES: [&str; 8] = [
    "Wanderer",
    "Initiate",
    "Seeker",
    "Pathfinder",
    "Vanguard",
    "Champion",
    "Paragon",
    "Ascendant",
];

pub const TITLE_LEVELS: [u32; 8] = [1, 5, 10, 20, 35, 50, 75, 100];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub coeff_low: f64,
    pub coeff_high: f64,
    pub exponent: f64,
    pub base_xp: u64,
    pub penalty_mode: Mode,
    #[serde(skip)]
    pub title_unlock_levels: Cow<'static, [u32]>,
}

impl Rules {
    pub const CANONICAL: Rules = Rules {
        coeff_low: 200.0,
        coeff_high: 25.0,
        exponent: 1.2,
        base_xp: BASE_XP,
        penalty_mode: Mode::Nomad,
        title_unlock_levels: Cow::Borrowed(&TITLE_LEVELS),
    };

    pub fn is_valid(&self) -> bool {
        let params = [self.coeff_low, self.coeff_high, self.exponent];
        if params.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        if self.base_xp == 0 || self.base_xp > MAX_STEP_XP / MAX_WEIGHT {
            return false;
        }
        let sink = self.raw_cost(MAX_LEVEL - 1) * 10.0;
        if sink > MAX_STEP_XP as f64 || (1..MAX_LEVEL).any(|l| self.raw_cost(l) > MAX_STEP_XP as f64) {
            return false;
        }

        let levels = &self.title_unlock_levels;
        !levels.is_empty()
            && levels.len() <= TITLE_NAMES.len()
            && levels.iter().all(|l| (1..=MAX_LEVEL).contains(l))
            && levels.windows(2).all(|pair| pair[0] < pair[1])
    }

    fn raw_cost(&self, level: u32) -> f64 {
        let next = f64::from(level + 1);
        let coeff = if level < 5 {
            self.coeff_low
        } else {
            self.coeff_high
        };
        (coeff * next.powf(self.exponent)).floor()
    }

    pub fn xp_required_to_advance(&self, level: u32) -> u64 {
        let level = level.clamp(1, MAX_LEVEL);
        // level 100 is a sink: ten times the level 99 cost
        if level == MAX_LEVEL {
            return self
                .xp_required_to_advance(MAX_LEVEL - 1)
                .saturating_mul(10)
                .min(MAX_STEP_XP);
        }
        let cost = self.raw_cost(level);
        if cost.is_nan() {
            return MAX_STEP_XP;
        }
        cost.clamp(1.0, MAX_STEP_XP as f64) as u64
    }

    pub fn cumulative_xp_for_level(&self, level: u32) -> u64 {
        (1..level.clamp(1, MAX_LEVEL))
            .map(|l| self.xp_required_to_advance(l))
            .fold(0u64, u64::saturating_add)
    }

    pub fn base_xp_for_bucket(&self, _bucket: Bucket) -> u64 {
        self.base_xp.min(MAX_STEP_XP / MAX_WEIGHT)
    }

    pub fn current_title(&self, level: u32) -> &'static str {
        self.title_unlock_levels
            .iter()
            .zip(TITLE_NAMES)
            .rev()
            .find(|(min, _)| level >= **min)
            .map(|(_, title)| title)
            .unwrap_or(TITLE_NAMES[0])
    }

    /// Level at which the next title unlocks, `None` once the last one is held.
    pub fn next_title_level(&self, level: u32) -> Option<u32> {
        self.title_unlock_levels
            .iter()
            .copied()
            .find(|min| *min > level)
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::CANONICAL
    }
}

pub fn xp_required_to_advance(level: u32) -> u64 {
    Rules::CANONICAL.xp_required_to_advance(level)
}

pub fn cumulative_xp_for_level(level: u32) -> u64 {
    Rules::CANONICAL.cumulative_xp_for_level(level)
}
