//! Completion, failure and rollover transitions. Every operation leaves
//! `1 <= level <= 100` and `xp < xp_required_to_advance(level)`.

use crate::curve::{MAX_LEVEL, Rules};
use crate::errors::EngineError;
use crate::models::{Bucket, Mode, Outcome, TaskId, TaskState};
use crate::profile::Profile;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    Suppress,
    ClampNoLevelDown,
    Cascade,
}

impl Mode {
    pub fn penalty(self) -> Penalty {
        match self {
            Mode::Nomad => Penalty::Suppress,
            Mode::Acolyte => Penalty::ClampNoLevelDown,
            Mode::Exalted => Penalty::Cascade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    LevelUp { level: u32 },
    LevelDown { level: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub xp_delta: i64,
    pub level_before: u32,
    pub level_after: u32,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub bucket: Bucket,
    pub outcome: Outcome,
    pub completed: usize,
    pub total: usize,
    pub failed: Vec<TaskId>,
    pub transitions: Vec<Transition>,
    pub clock: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    rules: Rules,
}

impl Engine {
    pub fn new(rules: Rules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Gains may climb several levels at once. A deficit only drops levels
    /// when the profile's mode cascades; otherwise XP is clamped at zero.
    pub fn apply_xp_delta(&self, profile: &mut Profile, delta: i64) -> Transition {
        let cascade = profile.mode.penalty() == Penalty::Cascade;
        self.shift(profile, delta, cascade)
    }

    fn shift(&self, profile: &mut Profile, delta: i64, cascade: bool) -> Transition {
        let level_before = profile.level;
        let mut notices = Vec::new();
        let mut xp = i64::try_from(profile.xp)
            .unwrap_or(i64::MAX)
            .saturating_add(delta);

        while profile.level < MAX_LEVEL && xp >= self.required(profile.level) {
            xp -= self.required(profile.level);
            profile.level += 1;
            profile.xp = xp.max(0) as u64;
            profile.push_history(&self.rules, Outcome::LevelUp, None);
            profile.push_log(format!("Level up! Now level {}", profile.level));
            notices.push(Notice::LevelUp {
                level: profile.level,
            });
        }

        if cascade {
            while xp < 0 && profile.level > 1 {
                profile.level -= 1;
                xp = xp.saturating_add(self.required(profile.level));
                profile.push_log(format!("Level down. Back to level {}", profile.level));
                notices.push(Notice::LevelDown {
                    level: profile.level,
                });
            }
        }

        let mut xp = xp.max(0) as u64;
        if profile.level == MAX_LEVEL {
            xp = xp.min(self.rules.xp_required_to_advance(MAX_LEVEL).saturating_sub(1));
        }
        profile.xp = xp;

        Transition {
            xp_delta: delta,
            level_before,
            level_after: profile.level,
            notices,
        }
    }

    fn required(&self, level: u32) -> i64 {
        i64::try_from(self.rules.xp_required_to_advance(level)).unwrap_or(i64::MAX)
    }

    fn reward(&self, profile: &Profile, id: &TaskId) -> Result<(String, u32, i64), EngineError> {
        let task = profile.task(id)?;
        let amount = self
            .rules
            .base_xp_for_bucket(id.bucket)
            .saturating_mul(u64::from(task.weight));
        let amount = i64::try_from(amount).unwrap_or(i64::MAX);
        Ok((task.name.clone(), task.weight, amount))
    }

    fn ensure_pending(profile: &Profile, id: &TaskId) -> Result<(), EngineError> {
        match profile.task_state(id) {
            TaskState::Pending => Ok(()),
            state => Err(EngineError::InvalidTransition(format!(
                "{id} is already {state:?} this cycle"
            ))),
        }
    }

    pub fn complete_task(
        &self,
        profile: &mut Profile,
        id: &TaskId,
    ) -> Result<Transition, EngineError> {
        let (name, weight, gain) = self.reward(profile, id)?;
        Self::ensure_pending(profile, id)?;
        let stat = profile.task(id)?.stat;

        let transition = self.shift(profile, gain, false);
        *profile.stats.entry(stat).or_insert(0) += u64::from(weight);
        profile.completed.insert(id.clone());
        profile.push_history(&self.rules, Outcome::Success, None);
        profile.push_log(format!("{name}: {gain:+} XP"));
        Ok(transition)
    }

    pub fn fail_task(&self, profile: &mut Profile, id: &TaskId) -> Result<Transition, EngineError> {
        let (name, _, loss) = self.reward(profile, id)?;
        Self::ensure_pending(profile, id)?;

        let transition = match profile.mode.penalty() {
            Penalty::Suppress => self.shift(profile, 0, false),
            Penalty::ClampNoLevelDown => self.shift(profile, -loss, false),
            Penalty::Cascade => self.shift(profile, -loss, true),
        };
        profile.failed.insert(id.clone());
        profile.push_history(&self.rules, Outcome::Failure, None);
        profile.push_log(format!("{name}: {:+} XP (failed)", transition.xp_delta));
        Ok(transition)
    }

    pub fn declare_failure(
        &self,
        profile: &mut Profile,
        id: &TaskId,
    ) -> Result<Transition, EngineError> {
        if profile.mode != Mode::Exalted {
            return Err(EngineError::InvalidTransition(format!(
                "declaring failure is only possible in exalted mode (current: {})",
                profile.mode
            )));
        }
        self.fail_task(profile, id)
    }

    /// Pending quests fail and the summary is dated on the closing day. Only
    /// the daily rollover moves the clock.
    pub fn advance_cycle(
        &self,
        profile: &mut Profile,
        bucket: Bucket,
    ) -> Result<CycleReport, EngineError> {
        let ids = profile.task_ids(bucket);
        let total = ids.len();
        let completed = ids
            .iter()
            .filter(|id| profile.task_state(id) == TaskState::Completed)
            .count();

        let mut failed = Vec::new();
        let mut transitions = Vec::new();
        for id in ids {
            if profile.task_state(&id) == TaskState::Pending {
                transitions.push(self.fail_task(profile, &id)?);
                failed.push(id);
            }
        }

        profile.completed.retain(|id| id.bucket != bucket);
        profile.failed.retain(|id| id.bucket != bucket);

        let outcome = if total > 0 && completed == total {
            Outcome::Success
        } else if completed == 0 {
            Outcome::Failure
        } else {
            Outcome::Partial
        };
        profile.push_history(&self.rules, outcome, Some(bucket));
        profile.push_log(format!(
            "{bucket} cycle closed: {completed}/{total} quests done"
        ));

        if bucket == Bucket::Daily {
            profile.clock = profile.clock.succ_opt().unwrap_or(profile.clock);
            debug!(clock = %profile.clock, "advanced simulated clock");
        }
        info!(%bucket, ?outcome, completed, total, "cycle rolled over");

        Ok(CycleReport {
            bucket,
            outcome,
            completed,
            total,
            failed,
            transitions,
            clock: profile.clock,
        })
    }
}
