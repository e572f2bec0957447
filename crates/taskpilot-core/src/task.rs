use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;

use crate::datetime::{
  format_timestamp,
  parse_stored_deadline
};
use crate::id::new_id;

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub enum TaskStatus {
  #[default]
  #[serde(rename = "To Do")]
  ToDo,
  #[serde(rename = "In Progress")]
  InProgress,
  Done
}

impl TaskStatus {
  pub const ALL: [TaskStatus; 3] = [
    TaskStatus::ToDo,
    TaskStatus::InProgress,
    TaskStatus::Done
  ];

  #[must_use]
  pub const fn as_str(&self) -> &'static str {
    match self {
      | Self::ToDo => "To Do",
      | Self::InProgress => "In Progress",
      | Self::Done => "Done"
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TaskStatus {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let normalized: String = s
      .chars()
      .filter(|c| c.is_alphanumeric())
      .collect::<String>()
      .to_ascii_lowercase();
    match normalized.as_str() {
      | "todo" => Ok(Self::ToDo),
      | "inprogress" | "progress"
      | "doing" => Ok(Self::InProgress),
      | "done" => Ok(Self::Done),
      | _ => {
        Err(anyhow!(
          "invalid task status: {s} \
           (expected To Do, In Progress \
           or Done)"
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Default,
)]
pub enum TaskPriority {
  Low,
  #[default]
  Medium,
  High
}

impl TaskPriority {
  #[must_use]
  pub const fn as_str(&self) -> &'static str {
    match self {
      | Self::Low => "Low",
      | Self::Medium => "Medium",
      | Self::High => "High"
    }
  }
}

impl fmt::Display for TaskPriority {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TaskPriority {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str()
    {
      | "l" | "low" => Ok(Self::Low),
      | "m" | "med" | "medium" => {
        Ok(Self::Medium)
      }
      | "h" | "high" => Ok(Self::High),
      | _ => {
        Err(anyhow!(
          "invalid task priority: {s} \
           (expected Low, Medium or High)"
        ))
      }
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
  pub id:           String,
  pub title:        String,
  #[serde(default)]
  pub is_completed: bool,
  #[serde(default)]
  pub story_points: f64,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

impl Subtask {
  pub fn new(
    title: String,
    story_points: f64
  ) -> Self {
    Self {
      id: new_id(),
      title,
      is_completed: false,
      story_points,
      extra: BTreeMap::new()
    }
  }
}

/// Work-log entry attached to a task. Entries are appended or removed, never
/// edited.
#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Log {
  pub id:         String,
  pub content:    String,
  pub created_at: String,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

impl Log {
  pub fn new(
    content: String,
    now: DateTime<Utc>
  ) -> Self {
    Self {
      id: new_id(),
      content,
      created_at: format_timestamp(now),
      extra: BTreeMap::new()
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id:           String,
  pub title:        String,
  #[serde(default)]
  pub description:  String,
  #[serde(default)]
  pub status:       TaskStatus,
  #[serde(default)]
  pub priority:     TaskPriority,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub deadline:     Option<String>,
  pub project_id:   String,
  #[serde(default)]
  pub story_points: f64,
  #[serde(default)]
  pub subtasks:     Vec<Subtask>,
  #[serde(default)]
  pub logs:         Vec<Log>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub link:         Option<String>,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

impl Task {
  pub fn new(
    title: String,
    project_id: String
  ) -> Self {
    Self {
      id: new_id(),
      title,
      description: String::new(),
      status: TaskStatus::ToDo,
      priority: TaskPriority::Medium,
      deadline: None,
      project_id,
      story_points: 0.0,
      subtasks: vec![],
      logs: vec![],
      link: None,
      extra: BTreeMap::new()
    }
  }

  #[must_use]
  pub fn deadline_date(
    &self
  ) -> Option<NaiveDate> {
    self
      .deadline
      .as_deref()
      .and_then(parse_stored_deadline)
  }

  /// A task is overdue when its deadline lies strictly before `today` and it
  /// is not done.
  #[must_use]
  pub fn is_overdue(
    &self,
    today: NaiveDate
  ) -> bool {
    self.status != TaskStatus::Done
      && self
        .deadline_date()
        .is_some_and(|d| d < today)
  }

  #[must_use]
  pub fn subtask(
    &self,
    id: &str
  ) -> Option<&Subtask> {
    self.subtasks.iter().find(|s| s.id == id)
  }

  pub fn subtask_mut(
    &mut self,
    id: &str
  ) -> Option<&mut Subtask> {
    self
      .subtasks
      .iter_mut()
      .find(|s| s.id == id)
  }

  #[must_use]
  pub fn total_subtask_points(
    &self
  ) -> f64 {
    self
      .subtasks
      .iter()
      .map(|s| s.story_points)
      .sum()
  }

  #[must_use]
  pub fn completed_points(&self) -> f64 {
    self
      .subtasks
      .iter()
      .filter(|s| s.is_completed)
      .map(|s| s.story_points)
      .sum()
  }

  /// Fraction of completed subtasks, `None` when the task has none.
  #[must_use]
  pub fn progress(&self) -> Option<f64> {
    if self.subtasks.is_empty() {
      return None;
    }
    let done = self
      .subtasks
      .iter()
      .filter(|s| s.is_completed)
      .count();
    Some(
      done as f64
        / self.subtasks.len() as f64
    )
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    Subtask,
    Task,
    TaskPriority,
    TaskStatus
  };

  #[test]
  fn status_and_priority_parse_loosely() {
    assert_eq!(
      "to-do"
        .parse::<TaskStatus>()
        .expect("parse"),
      TaskStatus::ToDo
    );
    assert_eq!(
      "In Progress"
        .parse::<TaskStatus>()
        .expect("parse"),
      TaskStatus::InProgress
    );
    assert_eq!(
      "H"
        .parse::<TaskPriority>()
        .expect("parse"),
      TaskPriority::High
    );
    assert!(
      "urgent"
        .parse::<TaskPriority>()
        .is_err()
    );
  }

  #[test]
  fn deserializes_web_app_shape() {
    let raw = r#"{
      "id": "t1",
      "title": "Ship it",
      "description": "",
      "status": "In Progress",
      "priority": "High",
      "deadline": "2026-03-01",
      "projectId": "p1",
      "storyPoints": 5,
      "subtasks": [
        {"id": "s1", "title": "a", "isCompleted": true, "storyPoints": 2},
        {"id": "s2", "title": "b", "isCompleted": false, "storyPoints": 3}
      ],
      "logs": [],
      "color": "ignored-but-kept"
    }"#;
    let task: Task =
      serde_json::from_str(raw)
        .expect("parse task");
    assert_eq!(
      task.status,
      TaskStatus::InProgress
    );
    assert_eq!(task.project_id, "p1");
    assert_eq!(task.completed_points(), 2.0);
    assert_eq!(
      task.total_subtask_points(),
      5.0
    );
    assert_eq!(task.progress(), Some(0.5));
    assert!(task.extra.contains_key("color"));

    let back = serde_json::to_value(&task)
      .expect("serialize");
    assert_eq!(back["projectId"], "p1");
    assert_eq!(
      back["subtasks"][0]["isCompleted"],
      true
    );
    assert_eq!(
      back["color"],
      "ignored-but-kept"
    );
  }

  #[test]
  fn overdue_ignores_done_tasks() {
    let today =
      NaiveDate::from_ymd_opt(2026, 3, 2)
        .expect("date");
    let mut task = Task::new(
      "x".to_string(),
      "p".to_string()
    );
    assert!(!task.is_overdue(today));
    task.deadline =
      Some("2026-03-01".to_string());
    assert!(task.is_overdue(today));
    task.status = TaskStatus::Done;
    assert!(!task.is_overdue(today));
  }

  #[test]
  fn progress_is_none_without_subtasks() {
    let mut task = Task::new(
      "x".to_string(),
      "p".to_string()
    );
    assert_eq!(task.progress(), None);
    task
      .subtasks
      .push(Subtask::new("a".to_string(), 1.0));
    assert_eq!(task.progress(), Some(0.0));
  }
}
