use quest_tracker::{
    AppState, Engine, JsonFileStore, Settings, load_profile, load_rules, router,
};
use std::net::SocketAddr;
use tokio::fs;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let settings = Settings::from_env();
    fs::create_dir_all(&settings.data_dir).await?;

    let engine = Engine::new(load_rules(settings.rules_path.as_deref()).await);
    let store = JsonFileStore::new(settings.data_dir.clone());
    let profile = load_profile(&store, &settings.user_id, engine.rules())
        .await
        .map_err(|err| {
            error!(
                path = %store.document_path(&settings.user_id).display(),
                "failed to load profile, refusing to start: {err}"
            );
            err
        })?;
    info!(
        user_id = %settings.user_id,
        level = profile.level,
        xp = profile.xp,
        path = %store.document_path(&settings.user_id).display(),
        "profile ready"
    );

    let state = AppState::new(&settings.user_id, store, engine, profile);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
