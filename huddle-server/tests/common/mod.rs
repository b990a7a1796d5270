//! Shared test utilities for huddle-server integration tests

pub mod client;

use std::net::SocketAddr;
use std::sync::Arc;

use huddle_server::{AppState, HuddleServer, ServerConfig};
use tokio::net::TcpListener;

/// Creates a test server with default config, returns state and address
#[allow(dead_code)]
pub async fn create_test_server() -> (Arc<AppState>, SocketAddr) {
    create_test_server_with_config(ServerConfig::default()).await
}

/// Creates a test server with custom config
#[allow(dead_code)]
pub async fn create_test_server_with_config(config: ServerConfig) -> (Arc<AppState>, SocketAddr) {
    let state = Arc::new(AppState::new(config.clone()));

    let server = HuddleServer::with_state(config, Arc::clone(&state));
    let addr = spawn_server(server).await;

    (state, addr)
}

/// Spawns server in background task, returns bound address
async fn spawn_server(server: HuddleServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    addr
}

/// Polls the room until it has `expected` members
#[allow(dead_code)]
pub async fn wait_for_members(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.room.member_count().await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!(
        "room never reached {} members (has {})",
        expected,
        state.room.member_count().await.unwrap()
    );
}
