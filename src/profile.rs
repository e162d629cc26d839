//! The persisted player aggregate and its hydrate step.

use crate::curve::{MAX_LEVEL, Rules};
use crate::errors::PersistenceError;
use crate::models::{Bucket, HistoryEntry, LogLine, Mode, Outcome, StatCategory, TaskDef, TaskId};
use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{info, warn};

/// Version written by [`hydrate`]. Documents without a tag are version 0.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub schema_version: u32,
    pub revision: u64,
    pub level: u32,
    pub xp: u64,
    pub mode: Mode,
    pub stats: BTreeMap<StatCategory, u64>,
    pub task_catalog: BTreeMap<Bucket, Vec<TaskDef>>,
    pub completed: BTreeSet<TaskId>,
    pub failed: BTreeSet<TaskId>,
    pub history: Vec<HistoryEntry>,
    pub log: Vec<LogLine>,
    /// Simulated current date, moved only by the daily rollover.
    pub clock: NaiveDate,
}

impl Profile {
    pub fn new(clock: NaiveDate) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            revision: 0,
            level: 1,
            xp: 0,
            mode: Mode::default(),
            stats: StatCategory::ALL.into_iter().map(|stat| (stat, 0)).collect(),
            task_catalog: Bucket::ALL.into_iter().map(|bucket| (bucket, Vec::new())).collect(),
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            history: Vec::new(),
            log: Vec::new(),
            clock,
        }
    }

    pub fn cumulative_xp(&self, rules: &Rules) -> u64 {
        rules.cumulative_xp_for_level(self.level).saturating_add(self.xp)
    }

    pub(crate) fn push_history(&mut self, rules: &Rules, outcome: Outcome, cycle: Option<Bucket>) {
        let entry = HistoryEntry {
            date: self.clock,
            cumulative_xp: self.cumulative_xp(rules),
            outcome,
            cycle,
        };
        self.history.push(entry);
    }

    pub(crate) fn push_log(&mut self, message: impl Into<String>) {
        let line = LogLine {
            date: self.clock,
            message: message.into(),
        };
        info!(date = %line.date, "{}", line.message);
        self.log.push(line);
    }

    /// Restores every default except the save counter.
    pub fn hard_reset(&mut self, mode: Mode) {
        let revision = self.revision;
        *self = Profile::default();
        self.revision = revision;
        self.mode = mode;
        self.push_log("Profile reset");
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            self.mode = mode;
            self.push_log(format!("Mode changed to {mode}"));
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

/// Hydrating the serialized output of a hydrated profile returns it unchanged.
pub fn hydrate(mut document: Value, rules: &Rules) -> Result<Profile, PersistenceError> {
    let version = document
        .get("schema_version")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if version > u64::from(SCHEMA_VERSION) {
        warn!(version, "profile written by a newer schema, reading known fields only");
    }

    let dropped = drop_unreadable_entries(&mut document);
    if dropped > 0 {
        warn!(dropped, "skipped unreadable entries in profile document");
    }

    let mut profile: Profile = serde_json::from_value(document)?;
    if version < u64::from(SCHEMA_VERSION) {
        info!(from = version, to = SCHEMA_VERSION, "migrating profile document");
    }
    normalize(&mut profile, rules);
    profile.schema_version = SCHEMA_VERSION;
    Ok(profile)
}

fn drop_unreadable_entries(document: &mut Value) -> usize {
    let Some(fields) = document.as_object_mut() else {
        return 0;
    };
    let mut dropped = 0;
    if let Some(list) = fields.get_mut("history") {
        dropped += retain_parseable::<HistoryEntry>(list);
    }
    if let Some(list) = fields.get_mut("log") {
        dropped += retain_parseable::<LogLine>(list);
    }
    for key in ["completed", "failed"] {
        if let Some(list) = fields.get_mut(key) {
            dropped += retain_parseable::<TaskId>(list);
        }
    }
    if let Some(Value::Object(catalog)) = fields.get_mut("task_catalog") {
        for list in catalog.values_mut() {
            dropped += retain_parseable::<TaskDef>(list);
        }
    }
    dropped
}

fn retain_parseable<T: DeserializeOwned>(list: &mut Value) -> usize {
    let Some(items) = list.as_array_mut() else {
        return 0;
    };
    let before = items.len();
    items.retain(|item| T::deserialize(item).is_ok());
    before - items.len()
}

fn normalize(profile: &mut Profile, rules: &Rules) {
    profile.level = profile.level.clamp(1, MAX_LEVEL);

    for stat in StatCategory::ALL {
        profile.stats.entry(stat).or_insert(0);
    }

    let mut seen = HashSet::new();
    for bucket in Bucket::ALL {
        let tasks = profile.task_catalog.entry(bucket).or_default();
        tasks.retain(|task| {
            let name = task.name.trim().to_string();
            !name.is_empty() && seen.insert(name)
        });
        for task in tasks.iter_mut() {
            task.name = task.name.trim().to_string();
            task.weight = task.weight.clamp(1, bucket.max_weight());
        }
    }

    let known: HashSet<TaskId> = profile
        .task_catalog
        .iter()
        .flat_map(|(bucket, tasks)| {
            tasks
                .iter()
                .map(move |task| TaskId::new(*bucket, task.name.clone()))
        })
        .collect();
    profile.completed.retain(|id| known.contains(id));
    let completed = profile.completed.clone();
    profile
        .failed
        .retain(|id| known.contains(id) && !completed.contains(id));

    while profile.level < MAX_LEVEL && profile.xp >= rules.xp_required_to_advance(profile.level) {
        profile.xp -= rules.xp_required_to_advance(profile.level);
        profile.level += 1;
    }
    if profile.level == MAX_LEVEL {
        let cap = rules.xp_required_to_advance(MAX_LEVEL).saturating_sub(1);
        profile.xp = profile.xp.min(cap);
    }
}
