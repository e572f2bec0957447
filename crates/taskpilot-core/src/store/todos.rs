use chrono::{
  DateTime,
  Utc
};
use tracing::instrument;

use super::AppStore;
use crate::todo::TodoStatus;

impl AppStore {
  #[instrument(skip(self))]
  pub fn add_todo_category(
    &mut self,
    name: &str,
    color: &str
  ) -> anyhow::Result<String> {
    self.commit(|data| {
      data.todo.add_category(name, color)
    })
  }

  #[instrument(skip(self))]
  pub fn delete_todo_category(
    &mut self,
    id: &str,
    cascade: bool
  ) -> anyhow::Result<usize> {
    self.commit(|data| {
      data.todo.delete_category(id, cascade)
    })
  }

  #[instrument(skip(self, now))]
  pub fn add_todo(
    &mut self,
    text: &str,
    category_id: &str,
    status: TodoStatus,
    now: DateTime<Utc>
  ) -> anyhow::Result<String> {
    self.commit(|data| {
      data.todo.add_todo(
        text,
        category_id,
        status,
        now
      )
    })
  }

  pub fn update_todo_text(
    &mut self,
    id: &str,
    text: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      data.todo.update_text(id, text)
    })
  }

  pub fn set_todo_notes(
    &mut self,
    id: &str,
    notes: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      data.todo.set_notes(id, notes)
    })
  }

  pub fn set_todo_category(
    &mut self,
    id: &str,
    category_id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      data.todo.set_category(id, category_id)
    })
  }

  #[instrument(skip(self))]
  pub fn set_todo_status(
    &mut self,
    id: &str,
    status: TodoStatus
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      data.todo.set_status(id, status)
    })
  }

  #[instrument(skip(self))]
  pub fn toggle_todo_done(
    &mut self,
    id: &str
  ) -> anyhow::Result<bool> {
    self.commit(|data| {
      data.todo.toggle_done(id)
    })
  }

  #[instrument(skip(self))]
  pub fn move_active_todo(
    &mut self,
    id: &str,
    index: usize
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      data.todo.move_active(id, index)
    })
  }

  #[instrument(skip(self, content, now))]
  pub fn add_todo_log(
    &mut self,
    id: &str,
    content: &str,
    now: DateTime<Utc>
  ) -> anyhow::Result<String> {
    self.commit(|data| {
      data.todo.add_log(id, content, now)
    })
  }

  pub fn delete_todo_log(
    &mut self,
    id: &str,
    log_id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      data.todo.delete_log(id, log_id)
    })
  }

  #[instrument(skip(self))]
  pub fn delete_todo(
    &mut self,
    id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      data.todo.delete_todo(id)
    })
  }

  pub fn clear_done_todos(
    &mut self
  ) -> anyhow::Result<usize> {
    self.commit(|data| data.todo.clear_done())
  }
}
