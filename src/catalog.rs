//! Quest catalog: registration, weights and per-bucket capacity.

use crate::errors::EngineError;
use crate::models::{Bucket, StatCategory, TaskDef, TaskId, TaskState};
use crate::profile::Profile;
use tracing::debug;

/// How many quests `bucket` may hold at `level`.
pub fn capacity(bucket: Bucket, level: u32) -> usize {
    match bucket {
        Bucket::Daily => 4 + (level / 20) as usize,
        _ => 1,
    }
}

pub fn clamp_weight(bucket: Bucket, weight: u32) -> u32 {
    weight.clamp(1, bucket.max_weight())
}

impl Profile {
    pub fn tasks(&self, bucket: Bucket) -> &[TaskDef] {
        self.task_catalog
            .get(&bucket)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn task(&self, id: &TaskId) -> Result<&TaskDef, EngineError> {
        self.tasks(id.bucket)
            .iter()
            .find(|task| task.name == id.name)
            .ok_or_else(|| EngineError::UnknownTask(id.to_string()))
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut TaskDef, EngineError> {
        self.task_catalog
            .get_mut(&id.bucket)
            .and_then(|tasks| tasks.iter_mut().find(|task| task.name == id.name))
            .ok_or_else(|| EngineError::UnknownTask(id.to_string()))
    }

    pub fn task_ids(&self, bucket: Bucket) -> Vec<TaskId> {
        self.tasks(bucket)
            .iter()
            .map(|task| TaskId::new(bucket, task.name.clone()))
            .collect()
    }

    pub fn task_state(&self, id: &TaskId) -> TaskState {
        if self.completed.contains(id) {
            TaskState::Completed
        } else if self.failed.contains(id) {
            TaskState::Failed
        } else {
            TaskState::Pending
        }
    }

    /// Adds a quest with weight 1. Names are unique across every bucket.
    pub fn register_task(
        &mut self,
        bucket: Bucket,
        name: &str,
        stat: StatCategory,
    ) -> Result<TaskId, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidTransition(
                "quest name must not be empty".to_string(),
            ));
        }
        let taken = self
            .task_catalog
            .values()
            .flatten()
            .any(|task| task.name == name);
        if taken {
            return Err(EngineError::DuplicateName(name.to_string()));
        }

        let limit = capacity(bucket, self.level);
        if self.tasks(bucket).len() >= limit {
            return Err(EngineError::CapacityExceeded {
                bucket: bucket.to_string(),
                capacity: limit,
            });
        }

        self.task_catalog.entry(bucket).or_default().push(TaskDef {
            name: name.to_string(),
            stat,
            weight: 1,
        });
        let id = TaskId::new(bucket, name);
        debug!(task = %id, ?stat, "registered quest");
        Ok(id)
    }

    pub fn set_weight(&mut self, id: &TaskId, weight: u32) -> Result<u32, EngineError> {
        let weight = clamp_weight(id.bucket, weight);
        self.task_mut(id)?.weight = weight;
        Ok(weight)
    }

    pub fn set_stat(&mut self, id: &TaskId, stat: StatCategory) -> Result<(), EngineError> {
        self.task_mut(id)?.stat = stat;
        Ok(())
    }

    pub fn remove_task(&mut self, id: &TaskId) -> Result<TaskDef, EngineError> {
        let tasks = self
            .task_catalog
            .get_mut(&id.bucket)
            .ok_or_else(|| EngineError::UnknownTask(id.to_string()))?;
        let index = tasks
            .iter()
            .position(|task| task.name == id.name)
            .ok_or_else(|| EngineError::UnknownTask(id.to_string()))?;
        let removed = tasks.remove(index);
        self.completed.remove(id);
        self.failed.remove(id);
        Ok(removed)
    }
}
