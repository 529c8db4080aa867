//! Session 라이프사이클 통합 테스트 - 재접속과 이전 연결의 이벤트 처리
//!
//! `cargo test -p mcbot-core --test session_test`

use mcbot_core::session::sim::{SimOptions, SimulatedConnector};
use mcbot_core::{ConnectParams, SessionLimits, SessionManager, SessionState};
use mcbot_foundation::AuthMode;
use std::sync::Arc;
use std::time::Duration;

fn params(username: &str) -> ConnectParams {
    ConnectParams {
        host: "localhost".to_string(),
        port: 25565,
        username: username.to_string(),
        password: None,
        auth: AuthMode::Offline,
        viewer_port: 3000,
    }
}

fn spawn() -> (SessionManager, Arc<SimulatedConnector>) {
    let connector = Arc::new(SimulatedConnector::new(SimOptions::default()));
    let manager = SessionManager::spawn(
        connector.clone(),
        SessionLimits {
            connect_timeout: Duration::from_secs(5),
            world_wait: Duration::from_millis(50),
        },
    );
    (manager, connector)
}

async fn wait_for_state(manager: &SessionManager, state: SessionState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while manager.snapshot().state != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("state never reached");
}

#[tokio::test]
async fn test_reconnect_after_kick() {
    let (manager, connector) = spawn();

    manager.connect(params("first")).await.expect("first connect");
    connector.last_bot().unwrap().kick("server restart").await;
    wait_for_state(&manager, SessionState::Idle).await;
    assert!(manager.handle().is_none());

    let session = manager.connect(params("second")).await.expect("reconnect");
    assert_eq!(session.params.username, "second");
    assert_eq!(connector.opened(), 2);
    assert!(manager.is_ready());
}

#[tokio::test]
async fn test_stale_events_are_ignored() {
    let (manager, connector) = spawn();

    manager.connect(params("first")).await.expect("first connect");
    let old_bot = connector.last_bot().unwrap();
    manager.disconnect().await.expect("disconnect");

    manager.connect(params("second")).await.expect("reconnect");

    // 이전 연결의 kick 은 현재 세션에 영향 없음
    old_bot.kick("late").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(snapshot.params.unwrap().username, "second");
}
