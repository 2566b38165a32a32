mod common;

use synergy_client::backend::IdentityProvider;
use synergy_client::commands::projects::{self, NewProject};
use synergy_client::{AppState, ClientConfig, RemoteAccess, SlotState};
use synergy_shared::SynergyError;

use common::{eventually, server, settle, signed_up};

async fn new_project(state: &AppState, name: &str) -> String {
    projects::create_project(
        state,
        NewProject {
            name: name.into(),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn rebinding_a_region_replaces_its_subscription() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let first = new_project(&ada, "Apollo").await;
    let second = new_project(&ada, "Gemini").await;

    let mut screen = ada.screen("project");
    let bound = screen
        .bind("tasks", first.clone(), &RemoteAccess::project_tasks_query(&first), &ada.cache.tasks)
        .unwrap();
    assert_eq!(bound, SlotState::Active { key: first.clone() });

    // Same key: nothing new is opened.
    screen
        .bind("tasks", first.clone(), &RemoteAccess::project_tasks_query(&first), &ada.cache.tasks)
        .unwrap();
    eventually(|| server.active_listeners() == 1).await;

    screen
        .bind("tasks", second.clone(), &RemoteAccess::project_tasks_query(&second), &ada.cache.tasks)
        .unwrap();
    settle().await;
    assert_eq!(server.active_listeners(), 1);
    assert_eq!(screen.active_count(), 1);
    assert_eq!(screen.slot_state("tasks"), SlotState::Active { key: second });
}

#[tokio::test]
async fn nothing_is_subscribed_without_an_identity() {
    let server = server();
    let guest = AppState::connect(&server, ClientConfig::default());

    let mut screen = guest.screen("dashboard");
    let state = screen
        .bind(
            "projects",
            "nobody",
            &RemoteAccess::user_projects_query("nobody"),
            &guest.cache.projects,
        )
        .unwrap();
    assert_eq!(state, SlotState::Unregistered);
    assert_eq!(screen.slot_state("projects"), SlotState::Unregistered);
    settle().await;
    assert_eq!(server.active_listeners(), 0);
}

#[tokio::test]
async fn sign_out_disposes_live_queries_and_clears_the_cache() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let uid = ada.require_identity().unwrap().uid;
    new_project(&ada, "Apollo").await;

    let mut screen = ada.screen("dashboard");
    screen
        .bind("projects", uid.clone(), &RemoteAccess::user_projects_query(&uid), &ada.cache.projects)
        .unwrap();
    eventually(|| ada.cache.projects.len() == 1 && !ada.cache.projects.is_loading()).await;

    ada.auth.sign_out().await.unwrap();
    eventually(|| screen.slot_state("projects") == SlotState::Disposed).await;
    eventually(|| server.active_listeners() == 0).await;
    assert!(ada.cache.projects.is_empty());
    assert!(!ada.cache.session.is_authenticated());
}

#[tokio::test]
async fn unmount_disposes_everything_and_guards_late_results() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let uid = ada.require_identity().unwrap().uid;
    let project = new_project(&ada, "Apollo").await;

    let mut screen = ada.screen("project");
    screen
        .bind("projects", uid.clone(), &RemoteAccess::user_projects_query(&uid), &ada.cache.projects)
        .unwrap();
    screen
        .bind("tasks", project.clone(), &RemoteAccess::project_tasks_query(&project), &ada.cache.tasks)
        .unwrap();
    eventually(|| server.active_listeners() == 2).await;
    assert_eq!(screen.if_mounted(|| 42), Some(42));

    screen.unmount();
    assert!(!screen.is_mounted());
    assert_eq!(screen.active_count(), 0);
    assert_eq!(screen.if_mounted(|| 42), None);
    eventually(|| server.active_listeners() == 0).await;

    let late = screen
        .bind("tasks", "other", &RemoteAccess::project_tasks_query("other"), &ada.cache.tasks)
        .unwrap();
    assert_eq!(late, SlotState::Unregistered);
}

#[tokio::test]
async fn dropping_the_screen_releases_its_listeners() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let uid = ada.require_identity().unwrap().uid;

    {
        let mut screen = ada.screen("dashboard");
        screen
            .bind("projects", uid.clone(), &RemoteAccess::user_projects_query(&uid), &ada.cache.projects)
            .unwrap();
        eventually(|| server.active_listeners() == 1).await;
    }
    eventually(|| server.active_listeners() == 0).await;
}

#[tokio::test]
async fn offline_subscribe_reports_a_network_error() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let uid = ada.require_identity().unwrap().uid;

    ada.backend.set_online(false);
    let mut screen = ada.screen("dashboard");
    let result = screen.bind(
        "projects",
        uid.clone(),
        &RemoteAccess::user_projects_query(&uid),
        &ada.cache.projects,
    );
    assert!(matches!(result, Err(SynergyError::Network(_))));
    assert!(matches!(ada.cache.projects.last_error(), Some(SynergyError::Network(_))));
    assert!(!ada.cache.projects.is_loading());
    assert_eq!(screen.active_count(), 0);

    ada.backend.set_online(true);
    screen
        .bind("projects", uid.clone(), &RemoteAccess::user_projects_query(&uid), &ada.cache.projects)
        .unwrap();
    eventually(|| ada.cache.projects.last_error().is_none() && !ada.cache.projects.is_loading()).await;
}

#[tokio::test]
async fn other_clients_see_writes_through_live_queries() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let bob = signed_up(&server, "Bob").await;
    let project = new_project(&ada, "Apollo").await;
    projects::add_member(
        &ada,
        &project,
        &common::email_of("Bob"),
        synergy_shared::MemberRole::Member,
    )
    .await
    .unwrap();

    let mut screen = bob.screen("project");
    screen
        .bind("tasks", project.clone(), &RemoteAccess::project_tasks_query(&project), &bob.cache.tasks)
        .unwrap();
    eventually(|| !bob.cache.tasks.is_loading()).await;
    assert!(bob.cache.tasks.is_empty());

    synergy_client::commands::tasks::create_task(
        &ada,
        synergy_client::commands::tasks::NewTask {
            project_id: project.clone(),
            title: "from ada".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    eventually(|| bob.cache.tasks.len() == 1).await;
    assert_eq!(bob.cache.tasks.snapshot()[0].title, "from ada");
}

#[tokio::test]
async fn live_queries_catch_up_after_reconnecting() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let bob = signed_up(&server, "Bob").await;
    let project = new_project(&ada, "Apollo").await;

    let mut screen = bob.screen("project");
    screen
        .bind("tasks", project.clone(), &RemoteAccess::project_tasks_query(&project), &bob.cache.tasks)
        .unwrap();
    eventually(|| !bob.cache.tasks.is_loading()).await;

    bob.backend.set_online(false);
    synergy_client::commands::tasks::create_task(
        &ada,
        synergy_client::commands::tasks::NewTask {
            project_id: project.clone(),
            title: "written while bob was away".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    settle().await;
    assert!(bob.cache.tasks.is_empty());

    bob.backend.set_online(true);
    eventually(|| bob.cache.tasks.len() == 1).await;
    assert_eq!(screen.slot_state("tasks"), SlotState::Active { key: project });
}

#[tokio::test]
async fn listener_failure_keeps_last_known_good_items() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let uid = ada.require_identity().unwrap().uid;
    new_project(&ada, "Apollo").await;

    let mut screen = ada.screen("dashboard");
    screen
        .bind("projects", uid.clone(), &RemoteAccess::user_projects_query(&uid), &ada.cache.projects)
        .unwrap();
    eventually(|| ada.cache.projects.len() == 1 && !ada.cache.projects.is_loading()).await;

    // End the backend session without going through the auth service, so
    // the session cache still holds the identity.
    IdentityProvider::sign_out(&ada.backend).await.unwrap();
    eventually(|| ada.cache.projects.last_error().is_some()).await;

    assert!(matches!(
        ada.cache.projects.last_error(),
        Some(SynergyError::PermissionDenied(_))
    ));
    assert_eq!(ada.cache.projects.len(), 1);
    assert!(ada.cache.session.is_authenticated());
    eventually(|| server.active_listeners() == 0).await;
}
