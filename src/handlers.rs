use crate::catalog::capacity;
use crate::engine::{CycleReport, Engine, Transition};
use crate::errors::AppError;
use crate::models::{
    ActionResponse, Bucket, CycleRequest, HistoryEntry, LogLine, ModeRequest, ProfileView,
    RegisterTaskRequest, StatRequest, TaskId, TaskRequest, TaskView, WeightRequest,
};
use crate::profile::Profile;
use crate::state::AppState;
use crate::stats::{StatsResponse, build_stats};
use crate::errors::PersistenceError;
use crate::storage::{load_profile, save_profile};
use axum::{Json, extract::State};
use serde::Serialize;
use tracing::{error, warn};

pub async fn get_profile(State(state): State<AppState>) -> Json<ProfileView> {
    let profile = state.profile.lock().await;
    Json(profile_view(&state.engine, &profile))
}

pub async fn get_history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    let profile = state.profile.lock().await;
    Json(profile.history.clone())
}

pub async fn get_log(State(state): State<AppState>) -> Json<Vec<LogLine>> {
    let profile = state.profile.lock().await;
    Json(profile.log.clone())
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let profile = state.profile.lock().await;
    Json(build_stats(&profile))
}

pub async fn register_task(
    State(state): State<AppState>,
    Json(payload): Json<RegisterTaskRequest>,
) -> Result<Json<ActionResponse<TaskView>>, AppError> {
    let bucket: Bucket = payload.bucket.parse()?;
    apply(&state, |_, profile| {
        let id = profile.register_task(bucket, &payload.name, payload.stat)?;
        if let Some(weight) = payload.weight {
            profile.set_weight(&id, weight)?;
        }
        task_view(profile, &id)
    })
    .await
}

pub async fn set_weight(
    State(state): State<AppState>,
    Json(payload): Json<WeightRequest>,
) -> Result<Json<ActionResponse<TaskView>>, AppError> {
    let id = task_id(&payload.bucket, &payload.name)?;
    apply(&state, |_, profile| {
        profile.set_weight(&id, payload.weight)?;
        task_view(profile, &id)
    })
    .await
}

pub async fn set_stat(
    State(state): State<AppState>,
    Json(payload): Json<StatRequest>,
) -> Result<Json<ActionResponse<TaskView>>, AppError> {
    let id = task_id(&payload.bucket, &payload.name)?;
    apply(&state, |_, profile| {
        profile.set_stat(&id, payload.stat)?;
        task_view(profile, &id)
    })
    .await
}

pub async fn delete_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskRequest>,
) -> Result<Json<ActionResponse<TaskId>>, AppError> {
    let id = task_id(&payload.bucket, &payload.name)?;
    apply(&state, |_, profile| {
        profile.remove_task(&id)?;
        Ok(id.clone())
    })
    .await
}

pub async fn complete_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskRequest>,
) -> Result<Json<ActionResponse<Transition>>, AppError> {
    let id = task_id(&payload.bucket, &payload.name)?;
    apply(&state, |engine, profile| Ok(engine.complete_task(profile, &id)?)).await
}

pub async fn fail_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskRequest>,
) -> Result<Json<ActionResponse<Transition>>, AppError> {
    let id = task_id(&payload.bucket, &payload.name)?;
    apply(&state, |engine, profile| Ok(engine.declare_failure(profile, &id)?)).await
}

pub async fn set_mode(
    State(state): State<AppState>,
    Json(payload): Json<ModeRequest>,
) -> Result<Json<ActionResponse<()>>, AppError> {
    apply(&state, |_, profile| {
        profile.set_mode(payload.mode);
        Ok(())
    })
    .await
}

pub async fn advance_cycle(
    State(state): State<AppState>,
    Json(payload): Json<CycleRequest>,
) -> Result<Json<ActionResponse<CycleReport>>, AppError> {
    let bucket: Bucket = payload.bucket.parse()?;
    apply(&state, |engine, profile| Ok(engine.advance_cycle(profile, bucket)?)).await
}

pub async fn hard_reset(
    State(state): State<AppState>,
) -> Result<Json<ActionResponse<()>>, AppError> {
    apply(&state, |engine, profile| {
        profile.hard_reset(engine.rules().penalty_mode);
        Ok(())
    })
    .await
}

/// A rejected action leaves the profile untouched. A save that lost a
/// revision race reloads the stored profile, so the next action starts from
/// what another session wrote; other save failures keep the in-memory change.
async fn apply<T, F>(state: &AppState, action: F) -> Result<Json<ActionResponse<T>>, AppError>
where
    T: Serialize,
    F: FnOnce(&Engine, &mut Profile) -> Result<T, AppError>,
{
    let mut profile = state.profile.lock().await;
    let mut draft = profile.clone();
    let result = action(state.engine.as_ref(), &mut draft)?;
    *profile = draft;

    if let Err(err) = save_profile(state.store.as_ref(), &state.user_id, &mut profile).await {
        if let PersistenceError::Conflict { stored, expected } = &err {
            warn!(stored, expected, "profile changed elsewhere, reloading");
            match load_profile(state.store.as_ref(), &state.user_id, state.engine.rules()).await {
                Ok(stored) => *profile = stored,
                Err(reload) => error!("failed to reload profile: {reload}"),
            }
        } else {
            error!("failed to persist profile: {err}");
        }
        return Err(err.into());
    }

    Ok(Json(ActionResponse {
        result,
        profile: profile_view(&state.engine, &profile),
    }))
}

fn task_id(bucket: &str, name: &str) -> Result<TaskId, AppError> {
    let bucket: Bucket = bucket.parse()?;
    Ok(TaskId::new(bucket, name.trim()))
}

fn task_view(profile: &Profile, id: &TaskId) -> Result<TaskView, AppError> {
    let task = profile.task(id)?;
    Ok(TaskView {
        bucket: id.bucket,
        name: task.name.clone(),
        stat: task.stat,
        weight: task.weight,
        state: profile.task_state(id),
    })
}

pub fn profile_view(engine: &Engine, profile: &Profile) -> ProfileView {
    let rules = engine.rules();
    let tasks = Bucket::ALL
        .into_iter()
        .flat_map(|bucket| profile.task_ids(bucket))
        .filter_map(|id| task_view(profile, &id).ok())
        .collect();

    ProfileView {
        level: profile.level,
        xp: profile.xp,
        xp_to_next: rules.xp_required_to_advance(profile.level),
        cumulative_xp: profile.cumulative_xp(rules),
        title: rules.current_title(profile.level).to_string(),
        next_title_level: rules.next_title_level(profile.level),
        mode: profile.mode,
        stats: profile.stats.clone(),
        clock: profile.clock,
        daily_capacity: capacity(Bucket::Daily, profile.level),
        tasks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Rules;
    use crate::models::{Mode, StatCategory};
    use crate::storage::JsonFileStore;

    #[test]
    fn profile_view_reports_progress() {
        let engine = Engine::default();
        let mut profile = Profile::default();
        let id = profile
            .register_task(Bucket::Daily, "Run", StatCategory::Physical)
            .unwrap();
        profile.set_weight(&id, 3).unwrap();
        engine.complete_task(&mut profile, &id).unwrap();

        let view = profile_view(&engine, &profile);
        assert_eq!(view.level, 1);
        assert_eq!(view.xp, 300);
        assert_eq!(view.xp_to_next, 459);
        assert_eq!(view.cumulative_xp, 300);
        assert_eq!(view.title, "Wanderer");
        assert_eq!(view.next_title_level, Some(5));
        assert_eq!(view.daily_capacity, 4);
        assert_eq!(view.tasks.len(), 1);
        assert_eq!(view.tasks[0].weight, 3);
    }

    #[test]
    fn malformed_bucket_is_rejected() {
        let err = task_id("fortnightly", "Run").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn conflicting_save_reloads_the_stored_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let engine = Engine::default();
        let profile = load_profile(&store, "player-1", engine.rules())
            .await
            .unwrap();
        let state = AppState::new("player-1", store.clone(), engine, profile);

        set_mode(State(state.clone()), Json(ModeRequest { mode: Mode::Acolyte }))
            .await
            .unwrap();

        let mut other_session = load_profile(&store, "player-1", &Rules::default())
            .await
            .unwrap();
        other_session.set_mode(Mode::Exalted);
        save_profile(&store, "player-1", &mut other_session)
            .await
            .unwrap();

        let err = set_mode(State(state.clone()), Json(ModeRequest { mode: Mode::Nomad }))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::CONFLICT);
        assert_eq!(state.profile.lock().await.mode, Mode::Exalted);

        let retried = set_mode(State(state.clone()), Json(ModeRequest { mode: Mode::Nomad }))
            .await
            .unwrap();
        assert_eq!(retried.profile.mode, Mode::Nomad);
        assert_eq!(state.profile.lock().await.revision, 3);
    }
}
