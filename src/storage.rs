use crate::curve::Rules;
use crate::errors::PersistenceError;
use crate::profile::{Profile, hydrate};
use serde_json::Value;
use std::{
    collections::HashMap,
    future::Future,
    path::PathBuf,
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info};

pub trait ProfileStore {
    fn load(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Value>, PersistenceError>> + Send;

    fn save(
        &self,
        user_id: &str,
        document: &Value,
        expected_revision: u64,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

fn stored_revision(document: &Value) -> u64 {
    document.get("revision").and_then(Value::as_u64).unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn document_path(&self, user_id: &str) -> PathBuf {
        let file: String = user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl ProfileStore for JsonFileStore {
    async fn load(&self, user_id: &str) -> Result<Option<Value>, PersistenceError> {
        match fs::read(self.document_path(user_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(
        &self,
        user_id: &str,
        document: &Value,
        expected_revision: u64,
    ) -> Result<(), PersistenceError> {
        let path = self.document_path(user_id);
        if let Some(current) = self.load(user_id).await? {
            let stored = stored_revision(&current);
            if stored != expected_revision {
                return Err(PersistenceError::Conflict {
                    stored,
                    expected: expected_revision,
                });
            }
        }

        fs::create_dir_all(&self.dir).await?;
        let payload = serde_json::to_vec_pretty(document)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload).await?;
        fs::rename(&staging, &path).await?;
        debug!(path = %path.display(), "profile written");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Value>>,
}

impl ProfileStore for MemoryStore {
    async fn load(&self, user_id: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.documents.lock().await.get(user_id).cloned())
    }

    async fn save(
        &self,
        user_id: &str,
        document: &Value,
        expected_revision: u64,
    ) -> Result<(), PersistenceError> {
        let mut documents = self.documents.lock().await;
        if let Some(current) = documents.get(user_id) {
            let stored = stored_revision(current);
            if stored != expected_revision {
                return Err(PersistenceError::Conflict {
                    stored,
                    expected: expected_revision,
                });
            }
        }
        documents.insert(user_id.to_string(), document.clone());
        Ok(())
    }
}

/// Loads and hydrates the profile of `user_id`, or starts a fresh one in the
/// configured penalty mode.
pub async fn load_profile<S: ProfileStore>(
    store: &S,
    user_id: &str,
    rules: &Rules,
) -> Result<Profile, PersistenceError> {
    match store.load(user_id).await? {
        Some(document) => hydrate(document, rules),
        None => {
            info!(user_id, mode = %rules.penalty_mode, "no stored profile, starting fresh");
            Ok(Profile {
                mode: rules.penalty_mode,
                ..Profile::default()
            })
        }
    }
}

pub async fn save_profile<S: ProfileStore>(
    store: &S,
    user_id: &str,
    profile: &mut Profile,
) -> Result<(), PersistenceError> {
    let expected = profile.revision;
    let mut document = serde_json::to_value(&*profile)?;
    document["revision"] = Value::from(expected + 1);
    store.save(user_id, &document, expected).await?;
    profile.revision = expected + 1;
    Ok(())
}
