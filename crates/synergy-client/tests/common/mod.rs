#![allow(dead_code)]

use std::time::Duration;

use synergy_client::backend::EmbeddedServer;
use synergy_client::validation::SignUpForm;
use synergy_client::{AppState, ClientConfig};

pub const PASSWORD: &str = "password1";

pub fn server() -> EmbeddedServer {
    EmbeddedServer::in_memory(6).unwrap()
}

pub fn email_of(name: &str) -> String {
    format!("{}@example.com", name.to_lowercase())
}

/// A client of `server` with a freshly registered, signed-in user.
pub async fn signed_up(server: &EmbeddedServer, name: &str) -> AppState {
    let state = AppState::connect(server, ClientConfig::default());
    state
        .auth
        .sign_up(&SignUpForm {
            name: name.into(),
            email: email_of(name),
            password: PASSWORD.into(),
            confirm_password: PASSWORD.into(),
        })
        .await
        .unwrap();
    state
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "condition not reached in time");
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
