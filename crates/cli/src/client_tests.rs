use super::*;
use orch_daemon::listener::{self, Handlers};
use orch_adapters::{ProcessAgentLauncher, TmuxCliDriver};
use orch_core::{Clock, EventBus, FakeClock};
use orch_engine::handoff::{HandoffPipeline, SpawnConfig};
use orch_engine::{LifecyclePrimitives, MissionExecutor, SessionRegistry};
use orch_storage::Store;
use std::sync::Arc;
use tokio::sync::Notify;

fn noop_launcher() -> ProcessAgentLauncher {
    ProcessAgentLauncher::new("true", vec![])
}

async fn spawn_test_daemon(dir: &std::path::Path) -> (PathBuf, Arc<Notify>) {
    let socket_path = dir.join("orchd.sock");
    let store = Store::open_in_memory().unwrap();
    let bus = EventBus::new();
    let registry = SessionRegistry::new(store.clone(), bus.clone());
    let tmux = TmuxCliDriver::new();
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(chrono::Utc::now()));
    let pipeline = HandoffPipeline::new(
        store.clone(),
        registry.clone(),
        bus.clone(),
        tmux.clone(),
        noop_launcher(),
        clock.clone(),
        SpawnConfig { settle_delay: Duration::from_millis(0), ..Default::default() },
    );
    let lifecycle = Arc::new(LifecyclePrimitives::new(registry.clone(), pipeline, tmux, clock.clone()));
    let missions = MissionExecutor::new(store.clone(), bus, noop_launcher(), clock.clone(), dir.to_path_buf());
    let shutdown = Arc::new(Notify::new());
    let handlers = Handlers { registry, lifecycle, missions, store, clock, shutdown: shutdown.clone() };

    let serve_path = socket_path.clone();
    let serve_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = listener::serve(&serve_path, handlers, serve_shutdown).await;
    });
    for _ in 0..50 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    (socket_path, shutdown)
}

#[tokio::test]
async fn connect_fails_cleanly_when_no_daemon_is_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.socket_path = dir.path().join("nonexistent.sock");
    let result = DaemonClient::connect(&config);
    assert!(matches!(result, Err(ClientError::NotRunning(_))));
}

#[tokio::test]
async fn connect_and_ping_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let (socket_path, shutdown) = spawn_test_daemon(dir.path()).await;
    let mut config = test_config(dir.path());
    config.socket_path = socket_path;

    let client = DaemonClient::connect(&config).unwrap();
    let resp = client.send(&Request::Ping).await.unwrap();
    assert!(matches!(resp, Response::Ok { .. }));

    shutdown.notify_one();
}

fn test_config(repo_root: &std::path::Path) -> Config {
    orch_daemon::config::Config::load(repo_root).unwrap()
}
