mod common;

use chrono::{Duration, TimeZone, Utc};
use futures::StreamExt;

use synergy_client::commands::{chat, projects, tasks};
use synergy_client::commands::projects::NewProject;
use synergy_client::commands::tasks::NewTask;
use synergy_client::{Patch, RemoteAccess};
use synergy_shared::{SynergyError, Task, TaskStatus};

use common::{email_of, eventually, server, settle, signed_up};

async fn project_with_tasks(state: &synergy_client::AppState, titles: &[&str]) -> String {
    let project = projects::create_project(
        state,
        NewProject {
            name: "Apollo".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    for title in titles {
        tasks::create_task(
            state,
            NewTask {
                project_id: project.id.clone(),
                title: title.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }
    project.id
}

#[tokio::test]
async fn dispose_twice_is_safe_and_stops_updates() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let project_id = project_with_tasks(&ada, &["one"]).await;

    let mut screen = ada.screen("project");
    screen
        .bind(
            "tasks",
            project_id.clone(),
            &RemoteAccess::project_tasks_query(&project_id),
            &ada.cache.tasks,
        )
        .unwrap();
    eventually(|| !ada.cache.tasks.is_loading()).await;

    assert!(screen.release("tasks"));
    assert!(!screen.release("tasks"));
    eventually(|| server.active_listeners() == 0).await;

    let revision = ada.cache.tasks.revision();
    ada.remote
        .create_task(&Task {
            title: "written elsewhere".into(),
            ..ada.cache.tasks.snapshot()[0].clone()
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(ada.cache.tasks.revision(), revision);
}

#[tokio::test]
async fn raw_subscription_dispose_is_idempotent() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let project_id = project_with_tasks(&ada, &["one"]).await;

    let mut sub = RemoteAccess::project_tasks_query(&project_id)
        .subscribe(&ada.remote)
        .unwrap();
    assert_eq!(sub.next().await.unwrap().unwrap().len(), 1);

    let handle = sub.handle();
    assert!(handle.dispose());
    assert!(!handle.dispose());
    assert!(sub.next().await.is_none());
    eventually(|| server.active_listeners() == 0).await;
}

#[tokio::test]
async fn direct_chat_is_deduplicated_for_sequential_calls() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let bob = signed_up(&server, "Bob").await;

    let first = chat::open_direct_chat(&ada, &email_of("Bob")).await.unwrap();
    let second = chat::open_direct_chat(&ada, &email_of("Bob")).await.unwrap();
    let reverse = chat::open_direct_chat(&bob, &email_of("Ada")).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.id, reverse.id);
    assert_eq!(ada.cache.chats.len(), 1);
}

#[tokio::test]
async fn update_of_unknown_id_leaves_cache_unchanged() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    project_with_tasks(&ada, &["one", "two"]).await;

    let before = ada.cache.tasks.snapshot();
    assert!(!ada
        .cache
        .tasks
        .update_by_id("no-such-task", &Patch::new().set("title", "ghost")));
    assert_eq!(ada.cache.tasks.snapshot(), before);
}

#[tokio::test]
async fn status_and_completion_move_together() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    project_with_tasks(&ada, &["one"]).await;
    let id = ada.cache.tasks.snapshot()[0].id.clone();

    let done = tasks::set_task_status(&ada, &id, TaskStatus::Done).await.unwrap();
    assert!(done.completed_at.is_some());

    let reopened = tasks::set_task_status(&ada, &id, TaskStatus::InProgress)
        .await
        .unwrap();
    assert!(reopened.completed_at.is_none());

    let via_patch = tasks::update_task(&ada, &id, Patch::new().set("status", "done"))
        .await
        .unwrap();
    assert!(via_patch.completed_at.is_some());

    let stored: Task = ada.remote.require(&id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Done);
    assert_eq!(stored.completed_at, via_patch.completed_at);
    assert_eq!(ada.cache.tasks.get(&id).unwrap().completed_at, stored.completed_at);
}

#[tokio::test]
async fn caller_supplied_completion_cannot_contradict_status() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    project_with_tasks(&ada, &["one"]).await;
    let id = ada.cache.tasks.snapshot()[0].id.clone();

    let done = tasks::update_task(
        &ada,
        &id,
        Patch::new().set("status", "done").set_time("completedAt", None),
    )
    .await
    .unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    assert!(done.completed_at.is_some());

    let reopened = tasks::update_task(
        &ada,
        &id,
        Patch::new()
            .set("status", "todo")
            .set_time("completedAt", Some(Utc::now())),
    )
    .await
    .unwrap();
    assert_eq!(reopened.status, TaskStatus::Todo);
    assert!(reopened.completed_at.is_none());

    let alone = tasks::update_task(&ada, &id, Patch::new().set_time("completedAt", Some(Utc::now()))).await;
    assert!(matches!(alone, Err(SynergyError::Validation(_))));

    // Writes that break the pairing never reach the store.
    let raw = ada
        .remote
        .update_task(&id, &Patch::new().set("status", "done"))
        .await;
    assert!(matches!(raw, Err(SynergyError::Validation(_))));

    let stored: Task = ada.remote.require(&id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Todo);
    assert!(stored.completed_at.is_none());
}

#[tokio::test]
async fn due_date_round_trips() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let project_id = project_with_tasks(&ada, &[]).await;

    let due = Utc.with_ymd_and_hms(2031, 2, 3, 4, 5, 6).unwrap() + Duration::nanoseconds(789);
    let created = tasks::create_task(
        &ada,
        NewTask {
            project_id,
            title: "with date".into(),
            due_date: Some(due),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let read: Task = ada.remote.require(&created.id).await.unwrap();
    assert_eq!(read.due_date, Some(due));
    assert_eq!(read.completed_at, None);
}

#[tokio::test]
async fn first_snapshot_is_the_full_matching_set() {
    let server = server();
    let ada = signed_up(&server, "Ada").await;
    let project_id = project_with_tasks(&ada, &["a", "b", "c"]).await;
    project_with_tasks(&ada, &["elsewhere"]).await;

    let mut sub = RemoteAccess::project_tasks_query(&project_id)
        .subscribe(&ada.remote)
        .unwrap();
    let first = sub.next().await.unwrap().unwrap();
    let mut titles: Vec<_> = first.iter().map(|t| t.title.as_str()).collect();
    titles.sort_unstable();
    assert_eq!(titles, ["a", "b", "c"]);
}
