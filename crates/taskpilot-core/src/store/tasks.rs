use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use tracing::{
  debug,
  instrument
};

use super::{
  AppStore,
  check_number,
  non_empty,
  task_mut
};
use crate::datetime::format_deadline;
use crate::error::{
  EntityKind,
  StoreError
};
use crate::task::{
  Log,
  Subtask,
  Task,
  TaskPriority,
  TaskStatus
};

#[derive(Debug, Clone, Default)]
pub struct TaskCreate {
  pub title:        String,
  pub description:  String,
  pub project_id:   String,
  pub status:       Option<TaskStatus>,
  pub priority:     Option<TaskPriority>,
  pub deadline:     Option<NaiveDate>,
  pub story_points: Option<f64>,
  pub link:         Option<String>
}

/// Field updates for a task. The nested options distinguish "leave alone"
/// (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
  pub title:        Option<String>,
  pub description:  Option<String>,
  pub status:       Option<TaskStatus>,
  pub priority:     Option<TaskPriority>,
  pub deadline:     Option<Option<NaiveDate>>,
  pub story_points: Option<f64>,
  pub link:         Option<Option<String>>
}

fn clean_link(
  link: Option<String>
) -> Option<String> {
  link
    .map(|l| l.trim().to_string())
    .filter(|l| !l.is_empty())
}

impl AppStore {
  #[instrument(skip(self, create), fields(title = %create.title, project = %create.project_id))]
  pub fn add_task(
    &mut self,
    create: TaskCreate
  ) -> anyhow::Result<String> {
    self.commit(|data| {
      let title =
        non_empty(&create.title, "task title")?;
      if data.project(&create.project_id).is_none()
      {
        return Err(StoreError::UnknownProject(
          create.project_id.clone()
        ));
      }
      let story_points = create
        .story_points
        .map(|p| check_number(p, "story points"))
        .transpose()?;

      let mut task =
        Task::new(title, create.project_id);
      task.description =
        create.description.trim().to_string();
      task.status =
        create.status.unwrap_or_default();
      task.priority =
        create.priority.unwrap_or_default();
      task.deadline =
        create.deadline.map(format_deadline);
      task.story_points =
        story_points.unwrap_or(0.0);
      task.link = clean_link(create.link);

      let id = task.id.clone();
      data.tasks.push(task);
      debug!(id = %id, "task added");
      Ok(id)
    })
  }

  #[instrument(skip(self, patch))]
  pub fn update_task(
    &mut self,
    id: &str,
    patch: TaskPatch
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let title = patch
        .title
        .as_deref()
        .map(|t| non_empty(t, "task title"))
        .transpose()?;
      let story_points = patch
        .story_points
        .map(|p| check_number(p, "story points"))
        .transpose()?;

      let task = task_mut(data, id)?;
      if let Some(title) = title {
        task.title = title;
      }
      if let Some(description) = patch.description
      {
        task.description =
          description.trim().to_string();
      }
      if let Some(status) = patch.status {
        task.status = status;
      }
      if let Some(priority) = patch.priority {
        task.priority = priority;
      }
      if let Some(deadline) = patch.deadline {
        task.deadline =
          deadline.map(format_deadline);
      }
      if let Some(points) = story_points {
        task.story_points = points;
      }
      if let Some(link) = patch.link {
        task.link = clean_link(link);
      }
      Ok(())
    })
  }

  pub fn set_task_status(
    &mut self,
    id: &str,
    status: TaskStatus
  ) -> anyhow::Result<()> {
    self.update_task(id, TaskPatch {
      status: Some(status),
      ..TaskPatch::default()
    })
  }

  /// Reassigns a task to another existing project.
  #[instrument(skip(self))]
  pub fn move_task(
    &mut self,
    id: &str,
    project_id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      if data.project(project_id).is_none() {
        return Err(StoreError::UnknownProject(
          project_id.to_string()
        ));
      }
      task_mut(data, id)?.project_id =
        project_id.to_string();
      Ok(())
    })
  }

  #[instrument(skip(self))]
  pub fn delete_task(
    &mut self,
    id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let idx = data
        .tasks
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Task,
            id
          )
        })?;
      data.tasks.remove(idx);
      Ok(())
    })
  }

  #[instrument(skip(self))]
  pub fn add_subtask(
    &mut self,
    task_id: &str,
    title: &str,
    story_points: f64
  ) -> anyhow::Result<String> {
    self.commit(|data| {
      let subtask = Subtask::new(
        non_empty(title, "subtask title")?,
        check_number(
          story_points,
          "story points"
        )?
      );
      let id = subtask.id.clone();
      task_mut(data, task_id)?
        .subtasks
        .push(subtask);
      Ok(id)
    })
  }

  /// Flips a subtask's completion and returns the new state.
  #[instrument(skip(self))]
  pub fn toggle_subtask(
    &mut self,
    task_id: &str,
    subtask_id: &str
  ) -> anyhow::Result<bool> {
    self.commit(|data| {
      let subtask = task_mut(data, task_id)?
        .subtask_mut(subtask_id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Subtask,
            subtask_id
          )
        })?;
      subtask.is_completed =
        !subtask.is_completed;
      Ok(subtask.is_completed)
    })
  }

  #[instrument(skip(self))]
  pub fn delete_subtask(
    &mut self,
    task_id: &str,
    subtask_id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let task = task_mut(data, task_id)?;
      let idx = task
        .subtasks
        .iter()
        .position(|s| s.id == subtask_id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Subtask,
            subtask_id
          )
        })?;
      task.subtasks.remove(idx);
      Ok(())
    })
  }

  /// Appends a work-log entry to a task.
  #[instrument(skip(self, content, now))]
  pub fn add_log(
    &mut self,
    task_id: &str,
    content: &str,
    now: DateTime<Utc>
  ) -> anyhow::Result<String> {
    self.commit(|data| {
      let log = Log::new(
        non_empty(content, "log content")?,
        now
      );
      let id = log.id.clone();
      task_mut(data, task_id)?.logs.push(log);
      Ok(id)
    })
  }

  #[instrument(skip(self))]
  pub fn delete_log(
    &mut self,
    task_id: &str,
    log_id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let task = task_mut(data, task_id)?;
      let idx = task
        .logs
        .iter()
        .position(|l| l.id == log_id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Log,
            log_id
          )
        })?;
      task.logs.remove(idx);
      Ok(())
    })
  }
}
