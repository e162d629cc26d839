use crate::engine::Engine;
use crate::profile::Profile;
use crate::storage::JsonFileStore;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub user_id: Arc<str>,
    pub store: Arc<JsonFileStore>,
    pub engine: Arc<Engine>,
    pub profile: Arc<Mutex<Profile>>,
}

impl AppState {
    pub fn new(user_id: &str, store: JsonFileStore, engine: Engine, profile: Profile) -> Self {
        Self {
            user_id: Arc::from(user_id),
            store: Arc::new(store),
            engine: Arc::new(engine),
            profile: Arc::new(Mutex::new(profile)),
        }
    }
}
