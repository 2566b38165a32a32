mod common;

use synergy_client::backend::{IdentityProvider, NotificationScheduler};
use synergy_client::commands::tasks::{self, NewTask};
use synergy_client::validation::SignUpForm;
use synergy_client::{AppState, ClientConfig};
use synergy_shared::{SynergyError, ValidationError};

use common::{email_of, eventually, server, signed_up, PASSWORD};

fn form(name: &str, email: &str, password: &str, confirm: &str) -> SignUpForm {
    SignUpForm {
        name: name.into(),
        email: email.into(),
        password: password.into(),
        confirm_password: confirm.into(),
    }
}

async fn daily_reminders(state: &AppState) -> usize {
    state
        .backend
        .get_all_scheduled()
        .await
        .unwrap()
        .iter()
        .filter(|n| n.category() == Some("daily_reminder"))
        .count()
}

#[tokio::test]
async fn invalid_sign_up_never_creates_an_account() {
    let server = server();
    let state = AppState::connect(&server, ClientConfig::default());

    let cases = [
        form("", "ada@example.com", PASSWORD, PASSWORD),
        form("Ada", "not-an-email", PASSWORD, PASSWORD),
        form("Ada", "ada@example.com", "abc", "abc"),
        form("Ada", "ada@example.com", PASSWORD, "password2"),
    ];
    for case in &cases {
        let err = state.auth.sign_up(case).await.unwrap_err();
        assert!(matches!(err, SynergyError::Validation(_)), "{err:?}");
    }
    assert!(!state.cache.session.is_authenticated());

    let err = state.auth.sign_in("ada@example.com", PASSWORD).await.unwrap_err();
    assert_eq!(err, SynergyError::InvalidCredentials);
}

#[tokio::test]
async fn sign_up_creates_the_profile_document() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;

    let identity = ada.require_identity().unwrap();
    let profile = ada.remote.get_user_profile(&identity.uid).await.unwrap().unwrap();
    assert_eq!(profile.email, email_of("Ada"));
    assert_eq!(profile.name, "Ada");
    assert_eq!(ada.cache.session.profile(), Some(profile));
    assert!(!ada.cache.session.is_loading());

    let again = AppState::connect(&server, ClientConfig::default());
    let err = again
        .auth
        .sign_up(&form("Ada", &email_of("Ada"), PASSWORD, PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, SynergyError::EmailAlreadyInUse(_)));
}

#[tokio::test]
async fn sign_in_loads_the_profile_and_keeps_one_daily_reminder() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    assert_eq!(daily_reminders(&ada).await, 1);
    ada.auth.sign_out().await.unwrap();

    for _ in 0..3 {
        ada.auth.sign_in(&email_of("Ada"), PASSWORD).await.unwrap();
        ada.auth.sign_out().await.unwrap();
    }
    ada.auth.sign_in(&email_of("Ada"), PASSWORD).await.unwrap();
    assert_eq!(daily_reminders(&ada).await, 1);
    assert_eq!(ada.cache.session.profile().map(|p| p.name), Some("Ada".to_string()));

    let err = ada.auth.sign_in(&email_of("Ada"), "wrong-password").await.unwrap_err();
    assert_eq!(err, SynergyError::InvalidCredentials);
}

async fn daily_reminder_ids(state: &AppState) -> Vec<String> {
    state
        .backend
        .get_all_scheduled()
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.category() == Some("daily_reminder"))
        .map(|n| n.id)
        .collect()
}

#[tokio::test]
async fn signing_in_again_reschedules_the_daily_reminder() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let _listener = ada.auth.spawn_identity_listener();
    let first = daily_reminder_ids(&ada).await;
    assert_eq!(first.len(), 1);

    ada.auth.sign_in(&email_of("Ada"), PASSWORD).await.unwrap();
    common::settle().await;
    let second = daily_reminder_ids(&ada).await;
    assert_eq!(second.len(), 1);
    assert_ne!(first, second);

    ada.auth.restore_session().await.unwrap();
    let third = daily_reminder_ids(&ada).await;
    assert_eq!(third.len(), 1);
    assert_ne!(second, third);
}

#[tokio::test]
async fn offline_writes_fail_without_touching_the_cache() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;

    ada.backend.set_online(false);
    let err = tasks::create_task(
        &ada,
        NewTask {
            project_id: "p1".into(),
            title: "offline".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SynergyError::Network(_)));
    assert!(ada.cache.tasks.is_empty());

    let err = tasks::create_task(
        &ada,
        NewTask {
            project_id: "p1".into(),
            title: "  ".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err, SynergyError::Validation(ValidationError::Required("title")));
}

#[tokio::test]
async fn password_reset_is_recorded() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;

    ada.auth.send_password_reset(&email_of("Ada")).await.unwrap();
    assert_eq!(server.password_resets(&email_of("Ada")).unwrap(), 1);

    let err = ada.auth.send_password_reset("nope").await.unwrap_err();
    assert!(matches!(err, SynergyError::Validation(ValidationError::InvalidEmail(_))));
}

#[tokio::test]
async fn identity_listener_follows_provider_sign_out() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let listener = ada.auth.spawn_identity_listener();

    IdentityProvider::sign_out(&ada.backend).await.unwrap();
    eventually(|| !ada.cache.session.is_authenticated()).await;
    assert!(ada.cache.session.profile().is_none());
    listener.cancel();
}

#[tokio::test]
async fn restore_session_picks_up_an_existing_identity() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;

    ada.cache.clear_all();
    assert!(ada.cache.session.identity().is_none());

    let restored = ada.auth.restore_session().await.unwrap();
    assert_eq!(ada.cache.session.uid(), Some(restored.uid));
    assert_eq!(ada.cache.session.profile().map(|p| p.name), Some("Ada".to_string()));
}
