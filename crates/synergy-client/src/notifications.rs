//! Deadline alerts and reminders on top of the local notification
//! scheduler.
//!
//! Every scheduled notification carries a JSON payload whose `type` names
//! its [`AlertKind`]. "Immediate" alerts are scheduled a configurable
//! delay from now.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use synergy_shared::{Result, Task};

use crate::backend::NotificationScheduler;
use crate::config::ClientConfig;
use crate::remote::RemoteAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    OverdueAlert,
    DeadlineWarning,
    TaskAssigned,
    ProjectUpdate,
    DiscussionReply,
    DailyReminder,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OverdueAlert => "overdue_alert",
            Self::DeadlineWarning => "deadline_warning",
            Self::TaskAssigned => "task_assigned",
            Self::ProjectUpdate => "project_update",
            Self::DiscussionReply => "discussion_reply",
            Self::DailyReminder => "daily_reminder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectUpdateKind {
    Completed,
    DeadlineChanged,
    StatusChanged,
    Other,
}

/// Where a task stands relative to its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineState {
    NoDeadline,
    Done,
    Overdue,
    /// Due within the look-ahead window.
    DueSoon,
    Later,
}

pub fn classify_deadline(task: &Task, now: DateTime<Utc>, window: Duration) -> DeadlineState {
    if task.status.is_done() {
        return DeadlineState::Done;
    }
    match task.due_date {
        None => DeadlineState::NoDeadline,
        Some(due) if due < now => DeadlineState::Overdue,
        Some(due) if due > now && due <= now + window => DeadlineState::DueSoon,
        Some(_) => DeadlineState::Later,
    }
}

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    classify_deadline(task, now, Duration::zero()) == DeadlineState::Overdue
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub overdue: usize,
    /// Due within the next 24 hours.
    pub due_tomorrow: usize,
    /// Due after the next 24 hours but within 7 days.
    pub due_this_week: usize,
    /// Not done.
    pub total_active: usize,
}

impl NotificationStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>, now: DateTime<Utc>) -> Self {
        let tomorrow = now + Duration::days(1);
        let next_week = now + Duration::days(7);
        let mut stats = Self::default();
        for task in tasks {
            if task.status.is_done() {
                continue;
            }
            stats.total_active += 1;
            let Some(due) = task.due_date else { continue };
            if due < now {
                stats.overdue += 1;
            } else if due > now && due <= tomorrow {
                stats.due_tomorrow += 1;
            } else if due > tomorrow && due <= next_week {
                stats.due_this_week += 1;
            }
        }
        stats
    }
}

/// Tomorrow at `hour`:00 in the time zone of `now`.
pub fn next_daily_reminder<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> DateTime<Utc> {
    let fallback = now.with_timezone(&Utc) + Duration::days(1);
    let Some(naive) = now
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(hour, 0, 0))
    else {
        return fallback;
    };
    now.timezone()
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback)
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[derive(Clone)]
pub struct NotificationService {
    scheduler: Arc<dyn NotificationScheduler>,
    remote: RemoteAccess,
    reminder_hour: u32,
    deadline_window: Duration,
    alert_delay: Duration,
    /// Serializes the cancel-then-schedule of the daily reminder.
    reminder_lock: Arc<Mutex<()>>,
}

impl NotificationService {
    pub fn new(
        scheduler: Arc<dyn NotificationScheduler>,
        remote: RemoteAccess,
        config: &ClientConfig,
    ) -> Self {
        Self {
            scheduler,
            remote,
            reminder_hour: config.daily_reminder_hour,
            deadline_window: config.deadline_window(),
            alert_delay: config.alert_delay(),
            reminder_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn alert(&self, kind: AlertKind, title: &str, body: &str, mut payload: Value) -> Result<String> {
        if let Value::Object(map) = &mut payload {
            map.insert("type".into(), Value::String(kind.as_str().into()));
        }
        let at = Utc::now() + self.alert_delay;
        let id = self.scheduler.schedule_at(title, body, at, payload).await?;
        debug!(kind = kind.as_str(), id = %id, "Alert scheduled");
        Ok(id)
    }

    /// Schedule one alert if any task visible to `uid` is overdue.
    pub async fn check_overdue_tasks(&self, uid: &str) -> Result<Option<String>> {
        let now = Utc::now();
        let tasks = self.remote.user_tasks(uid).await?;
        let count = tasks.iter().filter(|t| is_overdue(t, now)).count();
        if count == 0 {
            return Ok(None);
        }
        let body = format!("You have {count} overdue task{} that need attention", plural(count));
        let id = self
            .alert(AlertKind::OverdueAlert, "Overdue Tasks Alert", &body, json!({ "taskCount": count }))
            .await?;
        Ok(Some(id))
    }

    /// Schedule one alert if any task visible to `uid` is due within the
    /// look-ahead window.
    pub async fn check_upcoming_deadlines(&self, uid: &str) -> Result<Option<String>> {
        let now = Utc::now();
        let tasks = self.remote.user_tasks(uid).await?;
        let count = tasks
            .iter()
            .filter(|t| classify_deadline(t, now, self.deadline_window) == DeadlineState::DueSoon)
            .count();
        if count == 0 {
            return Ok(None);
        }
        let body = format!(
            "You have {count} task{} due within {} hours",
            plural(count),
            self.deadline_window.num_hours()
        );
        let id = self
            .alert(AlertKind::DeadlineWarning, "Deadline Reminder", &body, json!({ "taskCount": count }))
            .await?;
        Ok(Some(id))
    }

    pub async fn notify_task_assignment(&self, task: &Task, project_name: &str) -> Result<String> {
        let body = format!("You've been assigned \"{}\" in {project_name}", task.title);
        self.alert(
            AlertKind::TaskAssigned,
            "New Task Assigned",
            &body,
            json!({
                "taskId": task.id,
                "projectName": project_name,
                "priority": task.priority,
            }),
        )
        .await
    }

    pub async fn notify_project_update(&self, project_name: &str, kind: ProjectUpdateKind) -> Result<String> {
        let (title, body) = match kind {
            ProjectUpdateKind::Completed => (
                "Project Completed",
                format!("Congratulations! {project_name} has been completed"),
            ),
            ProjectUpdateKind::DeadlineChanged => (
                "Deadline Changed",
                format!("The deadline for {project_name} has been updated"),
            ),
            ProjectUpdateKind::StatusChanged => (
                "Status Update",
                format!("The status of {project_name} has changed"),
            ),
            ProjectUpdateKind::Other => ("Project Update", format!("{project_name} has been updated")),
        };
        self.alert(
            AlertKind::ProjectUpdate,
            title,
            &body,
            json!({ "projectName": project_name, "updateType": kind }),
        )
        .await
    }

    pub async fn notify_discussion_reply(
        &self,
        discussion_title: &str,
        project_name: &str,
        author_name: &str,
    ) -> Result<String> {
        let body = format!("{author_name} replied to \"{discussion_title}\" in {project_name}");
        self.alert(
            AlertKind::DiscussionReply,
            "New Discussion Reply",
            &body,
            json!({
                "discussionTitle": discussion_title,
                "projectName": project_name,
                "authorName": author_name,
            }),
        )
        .await
    }

    /// Replace any pending daily reminders with one for tomorrow morning,
    /// local time.
    pub async fn schedule_daily_reminder(&self, uid: &str) -> Result<String> {
        self.schedule_daily_reminder_from(uid, &Local::now()).await
    }

    pub async fn schedule_daily_reminder_from<Tz: TimeZone>(
        &self,
        uid: &str,
        now: &DateTime<Tz>,
    ) -> Result<String> {
        let _guard = self.reminder_lock.lock().await;
        let mut cancelled = 0usize;
        for pending in self.scheduler.get_all_scheduled().await? {
            if pending.category() == Some(AlertKind::DailyReminder.as_str()) {
                self.scheduler.cancel(&pending.id).await?;
                cancelled += 1;
            }
        }

        let at = next_daily_reminder(now, self.reminder_hour);
        let id = self
            .scheduler
            .schedule_at(
                "Daily Project Check",
                "Good morning! Check your project progress and upcoming deadlines",
                at,
                json!({ "type": AlertKind::DailyReminder.as_str(), "userId": uid }),
            )
            .await?;
        info!(uid, cancelled, fire_at = %at, "Daily reminder scheduled");
        Ok(id)
    }

    pub async fn notification_stats(&self, uid: &str) -> Result<NotificationStats> {
        let tasks = self.remote.user_tasks(uid).await?;
        Ok(NotificationStats::from_tasks(&tasks, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};
    use synergy_shared::TaskStatus;

    fn task(status: TaskStatus, due: Option<DateTime<Utc>>) -> Task {
        let now = Utc::now();
        Task {
            id: "t".into(),
            title: "t".into(),
            description: String::new(),
            project_id: "p".into(),
            assignee_id: None,
            assignee_name: None,
            creator_id: "u".into(),
            creator_name: None,
            status,
            priority: Default::default(),
            due_date: due,
            completed_at: None,
            tags: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn classification() {
        let now = Utc::now();
        let window = Duration::hours(24);
        let cases = [
            (task(TaskStatus::Todo, None), DeadlineState::NoDeadline),
            (task(TaskStatus::Todo, Some(now - Duration::days(1))), DeadlineState::Overdue),
            (task(TaskStatus::Done, Some(now - Duration::days(1))), DeadlineState::Done),
            (task(TaskStatus::InProgress, Some(now + Duration::hours(3))), DeadlineState::DueSoon),
            (task(TaskStatus::Todo, Some(now + Duration::days(3))), DeadlineState::Later),
        ];
        for (task, expected) in cases {
            assert_eq!(classify_deadline(&task, now, window), expected);
        }
    }

    #[test]
    fn stats_buckets() {
        let now = Utc::now();
        let tasks = [
            task(TaskStatus::Todo, Some(now - Duration::hours(1))),
            task(TaskStatus::Todo, Some(now + Duration::hours(2))),
            task(TaskStatus::InProgress, Some(now + Duration::days(3))),
            task(TaskStatus::Todo, None),
            task(TaskStatus::Done, Some(now - Duration::days(2))),
        ];
        assert_eq!(
            NotificationStats::from_tasks(&tasks, now),
            NotificationStats {
                overdue: 1,
                due_tomorrow: 1,
                due_this_week: 1,
                total_active: 4,
            }
        );
    }

    #[test]
    fn daily_reminder_is_tomorrow_at_hour_local() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 6, 30, 22, 15, 0).unwrap();
        let at = next_daily_reminder(&now, 9).with_timezone(&tz);
        assert_eq!(at.date_naive(), now.date_naive().succ_opt().unwrap());
        assert_eq!((at.hour(), at.minute()), (9, 0));
    }
}
