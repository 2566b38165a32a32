use chrono::{DateTime, Utc};
use serde::Serialize;

use synergy_shared::{Task, TaskStatus};

/// Task counts of one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub todo: usize,
    /// Not done and past the due date.
    pub overdue: usize,
}

impl ProjectStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>, now: DateTime<Utc>) -> Self {
        let mut stats = Self::default();
        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Done => stats.completed += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Todo => stats.todo += 1,
            }
            if !task.status.is_done() && task.due_date.is_some_and(|due| due < now) {
                stats.overdue += 1;
            }
        }
        stats
    }

    /// Rounded share of completed tasks; 0 for an empty project.
    pub fn completion_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100 + self.total / 2) / self.total) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task(status: TaskStatus, due_in_hours: Option<i64>, now: DateTime<Utc>) -> Task {
        Task {
            id: String::new(),
            title: "t".into(),
            description: String::new(),
            project_id: "p".into(),
            assignee_id: None,
            assignee_name: None,
            creator_id: "u".into(),
            creator_name: None,
            status,
            priority: Default::default(),
            due_date: due_in_hours.map(|h| now + Duration::hours(h)),
            completed_at: None,
            tags: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn counts_and_percentage() {
        let now = Utc::now();
        let tasks = [
            task(TaskStatus::Done, Some(-5), now),
            task(TaskStatus::InProgress, Some(-1), now),
            task(TaskStatus::Todo, Some(3), now),
        ];
        let stats = ProjectStats::from_tasks(&tasks, now);
        assert_eq!(
            stats,
            ProjectStats {
                total: 3,
                completed: 1,
                in_progress: 1,
                todo: 1,
                overdue: 1,
            }
        );
        assert_eq!(stats.completion_percent(), 33);
        assert_eq!(ProjectStats::default().completion_percent(), 0);
    }
}
