use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a quest named '{0}' already exists")]
    DuplicateName(String),

    #[error("the {bucket} bucket is full ({capacity} quests at this level)")]
    CapacityExceeded { bucket: String, capacity: usize },

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("unknown quest '{0}'")]
    UnknownTask(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed profile document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("stale write: stored revision is {stored}, profile was loaded at {expected}")]
    Conflict { stored: u64, expected: u64 },
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::DuplicateName(_) | EngineError::InvalidTransition(_) => {
                StatusCode::CONFLICT
            }
            EngineError::CapacityExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::UnknownTask(_) => StatusCode::NOT_FOUND,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Conflict { .. } => Self {
                status: StatusCode::CONFLICT,
                message: err.to_string(),
            },
            other => Self::internal(other),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
