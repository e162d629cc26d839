use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct ProfileView {
    level: u32,
    xp: u64,
    mode: String,
    clock: String,
    tasks: Vec<TaskView>,
}

#[derive(Debug, Deserialize)]
struct TaskView {
    name: String,
    weight: u32,
    state: String,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    result: Value,
    profile: ProfileView,
}

struct TestServer {
    base_url: String,
    client: Client,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[cfg(unix)]
mod cleanup {
    use std::sync::Mutex;
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PIDS: Mutex<Vec<i32>> = Mutex::new(Vec::new());

    pub fn register(pid: u32) {
        if let Ok(mut pids) = PIDS.lock() {
            pids.push(pid as i32);
        }
        REGISTER.call_once(|| unsafe {
            libc::atexit(on_exit);
        });
    }

    extern "C" fn on_exit() {
        if let Ok(pids) = PIDS.lock() {
            for pid in pids.iter().copied().filter(|pid| *pid > 0) {
                unsafe {
                    libc::kill(pid, libc::SIGTERM);
                }
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn wait_until_ready(client: &Client, base_url: &str) {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/profile")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server(data_dir: &Path) -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_quest_tracker"))
        .env("PORT", port.to_string())
        .env("APP_DATA_DIR", data_dir)
        .env("APP_USER_ID", "http-test")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    let client = Client::new();
    wait_until_ready(&client, &base_url).await;

    TestServer {
        base_url,
        client,
        child,
    }
}

impl TestServer {
    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn action(&self, path: &str, body: Value) -> ActionResponse {
        let response = self.post(path, body).await;
        assert!(
            response.status().is_success(),
            "{path} failed with {}",
            response.status()
        );
        response.json().await.unwrap()
    }

    async fn profile(&self) -> ProfileView {
        self.client
            .get(format!("{}/api/profile", self.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn http_completions_level_up() {
    let _guard = TEST_LOCK.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_server(dir.path()).await;

    for name in ["Push-ups", "Run"] {
        let created = server
            .action(
                "/api/tasks",
                json!({ "bucket": "daily", "name": name, "stat": "physical", "weight": 3 }),
            )
            .await;
        assert_eq!(created.result["weight"], 3);
    }

    let first = server
        .action("/api/tasks/complete", json!({ "bucket": "daily", "name": "Push-ups" }))
        .await;
    assert_eq!(first.profile.level, 1);
    assert_eq!(first.profile.xp, 300);

    let second = server
        .action("/api/tasks/complete", json!({ "bucket": "daily", "name": "Run" }))
        .await;
    assert_eq!(second.profile.level, 2);
    assert_eq!(second.profile.xp, 141);
    assert_eq!(second.result["notices"][0]["kind"], "level_up");

    let again = server
        .post("/api/tasks/complete", json!({ "bucket": "daily", "name": "Run" }))
        .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn http_rejects_duplicates_and_full_buckets() {
    let _guard = TEST_LOCK.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_server(dir.path()).await;

    server
        .action(
            "/api/tasks",
            json!({ "bucket": "weekly", "name": "Clean flat", "stat": "autonomy" }),
        )
        .await;

    let duplicate = server
        .post(
            "/api/tasks",
            json!({ "bucket": "daily", "name": "Clean flat", "stat": "autonomy" }),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let full = server
        .post(
            "/api/tasks",
            json!({ "bucket": "weekly", "name": "Call family", "stat": "mental" }),
        )
        .await;
    assert_eq!(full.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let unknown = server
        .post("/api/tasks/complete", json!({ "bucket": "daily", "name": "Ghost" }))
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_failure_needs_exalted_mode() {
    let _guard = TEST_LOCK.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_server(dir.path()).await;

    server
        .action(
            "/api/tasks",
            json!({ "bucket": "daily", "name": "Read", "stat": "knowledge", "weight": 2 }),
        )
        .await;

    let refused = server
        .post("/api/tasks/fail", json!({ "bucket": "daily", "name": "Read" }))
        .await;
    assert_eq!(refused.status(), StatusCode::CONFLICT);

    let switched = server.action("/api/mode", json!({ "mode": "exalted" })).await;
    assert_eq!(switched.profile.mode, "exalted");

    let failed = server
        .action("/api/tasks/fail", json!({ "bucket": "daily", "name": "Read" }))
        .await;
    assert_eq!(failed.result["xp_delta"], -200);
    assert_eq!(failed.profile.xp, 0);
    assert_eq!(failed.profile.tasks[0].state, "failed");
}

#[tokio::test]
async fn http_profile_survives_restart_and_rollover() {
    let _guard = TEST_LOCK.lock().await;
    let dir = tempfile::tempdir().unwrap();

    let clock_after_rollover = {
        let server = spawn_server(dir.path()).await;
        server
            .action(
                "/api/tasks",
                json!({ "bucket": "daily", "name": "Meditate", "stat": "mental" }),
            )
            .await;
        server
            .action("/api/tasks/complete", json!({ "bucket": "daily", "name": "Meditate" }))
            .await;
        let before = server.profile().await;

        let rolled = server.action("/api/cycle", json!({ "bucket": "daily" })).await;
        assert_eq!(rolled.result["outcome"], "success");
        assert_ne!(rolled.profile.clock, before.clock);
        assert_eq!(rolled.profile.tasks[0].state, "pending");

        let bad_bucket = server.post("/api/cycle", json!({ "bucket": "hourly" })).await;
        assert_eq!(bad_bucket.status(), StatusCode::CONFLICT);

        rolled.profile.clock
    };

    let server = spawn_server(dir.path()).await;
    let profile = server.profile().await;
    assert_eq!(profile.xp, 100);
    assert_eq!(profile.clock, clock_after_rollover);
    assert_eq!(profile.tasks.len(), 1);
    assert_eq!(profile.tasks[0].name, "Meditate");
    assert_eq!(profile.tasks[0].weight, 1);

    let history: Vec<Value> = server
        .client
        .get(format!("{}/api/history", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 2);

    let reset = server.action("/api/reset", json!({})).await;
    assert_eq!(reset.profile.level, 1);
    assert_eq!(reset.profile.xp, 0);
    assert!(reset.profile.tasks.is_empty());
}
