pub mod app;
pub mod catalog;
pub mod config;
pub mod curve;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod profile;
pub mod state;
pub mod stats;
pub mod storage;

pub use app::router;
pub use config::{Settings, load_rules};
pub use engine::Engine;
pub use profile::Profile;
pub use state::AppState;
pub use storage::{JsonFileStore, load_profile};
