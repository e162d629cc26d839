use crate::errors::EngineError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::Daily,
        Bucket::Weekly,
        Bucket::Monthly,
        Bucket::Quarterly,
        Bucket::Yearly,
    ];

    pub fn max_weight(self) -> u32 {
        match self {
            Bucket::Daily => 3,
            Bucket::Weekly => 5,
            Bucket::Monthly => 7,
            Bucket::Quarterly => 9,
            Bucket::Yearly => 11,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Daily => "daily",
            Bucket::Weekly => "weekly",
            Bucket::Monthly => "monthly",
            Bucket::Quarterly => "quarterly",
            Bucket::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim();
        Bucket::ALL
            .into_iter()
            .find(|bucket| bucket.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| EngineError::InvalidTransition(format!("unknown bucket '{needle}'")))
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StatCategory {
    #[default]
    Physical,
    Knowledge,
    Autonomy,
    Mental,
}

impl StatCategory {
    pub const ALL: [StatCategory; 4] = [
        StatCategory::Physical,
        StatCategory::Knowledge,
        StatCategory::Autonomy,
        StatCategory::Mental,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    #[serde(alias = "nomade", alias = "Nomade")]
    Nomad,
    #[serde(alias = "seide", alias = "séide", alias = "Séide")]
    Acolyte,
    #[serde(alias = "exalte", alias = "exalté", alias = "Exalté")]
    Exalted,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Nomad => "nomad",
            Mode::Acolyte => "acolyte",
            Mode::Exalted => "exalted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId {
    pub bucket: Bucket,
    pub name: String,
}

impl TaskId {
    pub fn new(bucket: Bucket, name: impl Into<String>) -> Self {
        Self {
            bucket,
            name: name.into(),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bucket, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    #[serde(default)]
    pub stat: StatCategory,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
    LevelUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub cumulative_xp: u64,
    pub outcome: Outcome,
    /// Set on the summary written when a bucket rolls over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Bucket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub date: NaiveDate,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterTaskRequest {
    pub bucket: String,
    pub name: String,
    pub stat: StatCategory,
    pub weight: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub bucket: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WeightRequest {
    pub bucket: String,
    pub name: String,
    pub weight: u32,
}

#[derive(Debug, Deserialize)]
pub struct StatRequest {
    pub bucket: String,
    pub name: String,
    pub stat: StatCategory,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: Mode,
}

#[derive(Debug, Deserialize)]
pub struct CycleRequest {
    pub bucket: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskView {
    pub bucket: Bucket,
    pub name: String,
    pub stat: StatCategory,
    pub weight: u32,
    pub state: TaskState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileView {
    pub level: u32,
    pub xp: u64,
    pub xp_to_next: u64,
    pub cumulative_xp: u64,
    pub title: String,
    pub next_title_level: Option<u32>,
    pub mode: Mode,
    pub stats: BTreeMap<StatCategory, u64>,
    pub clock: NaiveDate,
    pub daily_capacity: usize,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse<T: Serialize> {
    pub result: T,
    pub profile: ProfileView,
}
