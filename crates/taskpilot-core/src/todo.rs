use std::collections::{
  BTreeMap,
  HashSet
};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;
use tracing::{
  debug,
  warn
};

use crate::datetime::format_timestamp;
use crate::error::{
  EntityKind,
  StoreError
};
use crate::id::new_id;
use crate::project::is_hex_color;

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
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
  #[default]
  Backlog,
  Active
}

impl fmt::Display for TodoStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | Self::Backlog => "backlog",
      | Self::Active => "active"
    })
  }
}

impl FromStr for TodoStatus {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str()
    {
      | "backlog" => Ok(Self::Backlog),
      | "active" => Ok(Self::Active),
      | _ => {
        Err(anyhow!(
          "invalid todo status: {s} \
           (expected backlog or active)"
        ))
      }
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq, Eq,
)]
pub struct TodoCategory {
  pub id:    String,
  pub name:  String,
  pub color: String,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq, Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct TodoLog {
  pub id:         String,
  pub content:    String,
  pub created_at: String,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq, Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
  pub id:          String,
  pub text:        String,
  pub category_id: String,
  #[serde(default)]
  pub status:      TodoStatus,
  #[serde(default)]
  pub is_done:     bool,
  pub created_at:  String,
  #[serde(default)]
  pub notes:       String,
  #[serde(default)]
  pub logs:        Vec<TodoLog>,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

impl TodoItem {
  #[must_use]
  pub fn is_active(&self) -> bool {
    self.status == TodoStatus::Active
  }
}

/// The personal todo list.
///
/// `active_order` lists the ids of active todos in display order. Every
/// mutation below repairs a stale order first and leaves a consistent one
/// behind: exactly the active todos, each once.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TodoState {
  #[serde(default)]
  pub categories:   Vec<TodoCategory>,
  #[serde(default)]
  pub todos:        Vec<TodoItem>,
  #[serde(default)]
  pub active_order: Vec<String>
}

impl TodoState {
  #[must_use]
  pub fn todo(
    &self,
    id: &str
  ) -> Option<&TodoItem> {
    self.todos.iter().find(|t| t.id == id)
  }

  #[must_use]
  pub fn category(
    &self,
    id: &str
  ) -> Option<&TodoCategory> {
    self
      .categories
      .iter()
      .find(|c| c.id == id)
  }

  /// Active todos in display order. Ids in `active_order` that do not
  /// resolve are skipped; active todos missing from it come last.
  #[must_use]
  pub fn active_todos(&self) -> Vec<&TodoItem> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in &self.active_order {
      if let Some(todo) = self.todo(id)
        && todo.is_active()
        && seen.insert(todo.id.as_str())
      {
        out.push(todo);
      }
    }
    for todo in &self.todos {
      if todo.is_active()
        && seen.insert(todo.id.as_str())
      {
        out.push(todo);
      }
    }
    out
  }

  #[must_use]
  pub fn backlog_todos(
    &self
  ) -> Vec<&TodoItem> {
    self
      .todos
      .iter()
      .filter(|t| !t.is_active())
      .collect()
  }

  #[must_use]
  pub fn is_order_consistent(&self) -> bool {
    let expected: Vec<&str> = self
      .active_todos()
      .into_iter()
      .map(|t| t.id.as_str())
      .collect();
    expected.len() == self.active_order.len()
      && expected
        .iter()
        .zip(&self.active_order)
        .all(|(a, b)| *a == b.as_str())
  }

  /// Rewrites `active_order` to the consistent order, dropping stale and
  /// duplicate ids and appending active todos it was missing. Returns whether
  /// anything changed.
  pub fn repair_active_order(&mut self) -> bool {
    if self.is_order_consistent() {
      return false;
    }
    let repaired: Vec<String> = self
      .active_todos()
      .into_iter()
      .map(|t| t.id.clone())
      .collect();
    warn!(
      before = ?self.active_order,
      after = ?repaired,
      "repaired inconsistent active todo order"
    );
    self.active_order = repaired;
    true
  }

  fn mutate<T>(
    &mut self,
    op: impl FnOnce(&mut Self) -> Result<T, StoreError>
  ) -> Result<T, StoreError> {
    self.repair_active_order();
    let out = op(self)?;
    self.repair_active_order();
    Ok(out)
  }

  fn todo_mut(
    &mut self,
    id: &str
  ) -> Result<&mut TodoItem, StoreError> {
    self
      .todos
      .iter_mut()
      .find(|t| t.id == id)
      .ok_or_else(|| {
        StoreError::not_found(
          EntityKind::Todo,
          id
        )
      })
  }

  pub fn add_category(
    &mut self,
    name: &str,
    color: &str
  ) -> Result<String, StoreError> {
    let name = name.trim();
    if name.is_empty() {
      return Err(StoreError::EmptyField(
        "category name"
      ));
    }
    if !is_hex_color(color) {
      return Err(StoreError::InvalidColor(
        color.to_string()
      ));
    }
    self.mutate(|state| {
      let category = TodoCategory {
        id:    new_id(),
        name:  name.to_string(),
        color: color.to_string(),
        extra: BTreeMap::new()
      };
      let id = category.id.clone();
      state.categories.push(category);
      debug!(id = %id, "todo category added");
      Ok(id)
    })
  }

  /// Deletes a category. Todos filed under it block the deletion unless
  /// `cascade` is set, in which case they are deleted too. Returns the number
  /// of todos removed.
  pub fn delete_category(
    &mut self,
    id: &str,
    cascade: bool
  ) -> Result<usize, StoreError> {
    self.mutate(|state| {
      let idx = state
        .categories
        .iter()
        .position(|c| c.id == id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::TodoCategory,
            id
          )
        })?;
      let used = state
        .todos
        .iter()
        .filter(|t| t.category_id == id)
        .count();
      if used > 0 && !cascade {
        return Err(StoreError::CategoryInUse {
          id: id.to_string(),
          count: used
        });
      }
      state.categories.remove(idx);
      state.todos.retain(|t| t.category_id != id);
      Ok(used)
    })
  }

  pub fn add_todo(
    &mut self,
    text: &str,
    category_id: &str,
    status: TodoStatus,
    now: DateTime<Utc>
  ) -> Result<String, StoreError> {
    self.mutate(|state| {
      let text = text.trim();
      if text.is_empty() {
        return Err(StoreError::EmptyField(
          "todo text"
        ));
      }
      if state.category(category_id).is_none()
      {
        return Err(
          StoreError::UnknownCategory(
            category_id.to_string()
          )
        );
      }
      let todo = TodoItem {
        id: new_id(),
        text: text.to_string(),
        category_id: category_id.to_string(),
        status,
        is_done: false,
        created_at: format_timestamp(now),
        notes: String::new(),
        logs: vec![],
        extra: BTreeMap::new()
      };
      let id = todo.id.clone();
      if status == TodoStatus::Active {
        state.active_order.push(id.clone());
      }
      state.todos.push(todo);
      debug!(id = %id, %status, "todo added");
      Ok(id)
    })
  }

  pub fn update_text(
    &mut self,
    id: &str,
    text: &str
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      let text = text.trim();
      if text.is_empty() {
        return Err(StoreError::EmptyField(
          "todo text"
        ));
      }
      state.todo_mut(id)?.text = text.to_string();
      Ok(())
    })
  }

  pub fn set_notes(
    &mut self,
    id: &str,
    notes: &str
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      state.todo_mut(id)?.notes = notes.to_string();
      Ok(())
    })
  }

  pub fn set_category(
    &mut self,
    id: &str,
    category_id: &str
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      if state.category(category_id).is_none()
      {
        return Err(
          StoreError::UnknownCategory(
            category_id.to_string()
          )
        );
      }
      state.todo_mut(id)?.category_id =
        category_id.to_string();
      Ok(())
    })
  }

  /// Moves a todo between backlog and active. Newly active todos go to the
  /// end of the active order.
  pub fn set_status(
    &mut self,
    id: &str,
    status: TodoStatus
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      let todo = state.todo_mut(id)?;
      if todo.status == status {
        return Ok(());
      }
      todo.status = status;
      match status {
        | TodoStatus::Active => {
          state.active_order.push(id.to_string());
        }
        | TodoStatus::Backlog => {
          state.active_order.retain(|o| o != id);
        }
      }
      Ok(())
    })
  }

  /// Flips `is_done` and returns the new value.
  pub fn toggle_done(
    &mut self,
    id: &str
  ) -> Result<bool, StoreError> {
    self.mutate(|state| {
      let todo = state.todo_mut(id)?;
      todo.is_done = !todo.is_done;
      Ok(todo.is_done)
    })
  }

  /// Moves an active todo to zero-based `index` within the active order.
  pub fn move_active(
    &mut self,
    id: &str,
    index: usize
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      let from = state
        .active_order
        .iter()
        .position(|o| o == id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Todo,
            id
          )
        })?;
      let len = state.active_order.len();
      if index >= len {
        return Err(
          StoreError::IndexOutOfRange {
            index,
            len
          }
        );
      }
      let moved = state.active_order.remove(from);
      state.active_order.insert(index, moved);
      Ok(())
    })
  }

  pub fn add_log(
    &mut self,
    id: &str,
    content: &str,
    now: DateTime<Utc>
  ) -> Result<String, StoreError> {
    self.mutate(|state| {
      let content = content.trim();
      if content.is_empty() {
        return Err(StoreError::EmptyField(
          "log content"
        ));
      }
      let log = TodoLog {
        id:         new_id(),
        content:    content.to_string(),
        created_at: format_timestamp(now),
        extra:      BTreeMap::new()
      };
      let log_id = log.id.clone();
      state.todo_mut(id)?.logs.push(log);
      Ok(log_id)
    })
  }

  pub fn delete_log(
    &mut self,
    id: &str,
    log_id: &str
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      let todo = state.todo_mut(id)?;
      let before = todo.logs.len();
      todo.logs.retain(|l| l.id != log_id);
      if todo.logs.len() == before {
        return Err(StoreError::not_found(
          EntityKind::TodoLog,
          log_id
        ));
      }
      Ok(())
    })
  }

  pub fn delete_todo(
    &mut self,
    id: &str
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      let idx = state
        .todos
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Todo,
            id
          )
        })?;
      state.todos.remove(idx);
      state.active_order.retain(|o| o != id);
      Ok(())
    })
  }

  /// Removes every done todo. Returns how many were removed.
  pub fn clear_done(
    &mut self
  ) -> Result<usize, StoreError> {
    self.mutate(|state| {
      let before = state.todos.len();
      state.todos.retain(|t| !t.is_done);
      Ok(before - state.todos.len())
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::{
    TodoState,
    TodoStatus
  };
  use crate::error::StoreError;

  fn state_with_category() -> (TodoState, String)
  {
    let mut state = TodoState::default();
    let cat = state
      .add_category("Home", "#ff8800")
      .expect("add category");
    (state, cat)
  }

  fn active_texts(state: &TodoState) -> Vec<&str> {
    state
      .active_todos()
      .into_iter()
      .map(|t| t.text.as_str())
      .collect()
  }

  #[test]
  fn active_order_follows_activation() {
    let (mut state, cat) = state_with_category();
    let now = Utc::now();
    let a = state
      .add_todo("a", &cat, TodoStatus::Active, now)
      .expect("add a");
    let b = state
      .add_todo("b", &cat, TodoStatus::Backlog, now)
      .expect("add b");
    let c = state
      .add_todo("c", &cat, TodoStatus::Active, now)
      .expect("add c");
    assert_eq!(state.active_order, vec![a.clone(), c.clone()]);

    state
      .set_status(&b, TodoStatus::Active)
      .expect("activate b");
    assert_eq!(active_texts(&state), vec!["a", "c", "b"]);

    state.move_active(&b, 0).expect("move b");
    assert_eq!(active_texts(&state), vec!["b", "a", "c"]);

    state
      .set_status(&a, TodoStatus::Backlog)
      .expect("park a");
    assert_eq!(state.active_order, vec![b, c]);
    assert!(state.is_order_consistent());
  }

  #[test]
  fn stale_order_is_repaired_by_any_mutation() {
    let (mut state, cat) = state_with_category();
    let now = Utc::now();
    let a = state
      .add_todo("a", &cat, TodoStatus::Active, now)
      .expect("add a");
    let b = state
      .add_todo("b", &cat, TodoStatus::Backlog, now)
      .expect("add b");

    state.active_order = vec![
      "deleted-long-ago".to_string(),
      b.clone(),
      a.clone(),
      a.clone(),
    ];
    assert!(!state.is_order_consistent());

    state.toggle_done(&b).expect("toggle");
    assert_eq!(state.active_order, vec![a]);
    assert!(state.is_order_consistent());
  }

  #[test]
  fn failed_mutation_still_leaves_repaired_order() {
    let (mut state, _cat) = state_with_category();
    state.active_order = vec!["ghost".to_string()];
    let err = state
      .toggle_done("ghost")
      .expect_err("ghost is not a todo");
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert!(state.active_order.is_empty());
  }

  #[test]
  fn adding_category_repairs_stale_order() {
    let mut state = TodoState::default();
    state.active_order = vec!["ghost".to_string()];
    state
      .add_category("Home", "#fff")
      .expect("add category");
    assert!(state.active_order.is_empty());
    assert!(state.is_order_consistent());
  }

  #[test]
  fn deleting_todo_drops_it_from_order() {
    let (mut state, cat) = state_with_category();
    let now = Utc::now();
    let a = state
      .add_todo("a", &cat, TodoStatus::Active, now)
      .expect("add a");
    state.delete_todo(&a).expect("delete");
    assert!(state.active_order.is_empty());
    assert!(state.todos.is_empty());
  }

  #[test]
  fn move_rejects_out_of_range_positions() {
    let (mut state, cat) = state_with_category();
    let a = state
      .add_todo("a", &cat, TodoStatus::Active, Utc::now())
      .expect("add a");
    assert_eq!(
      state.move_active(&a, 3),
      Err(StoreError::IndexOutOfRange { index: 3, len: 1 })
    );
  }

  #[test]
  fn category_deletion_requires_cascade_when_used() {
    let (mut state, cat) = state_with_category();
    state
      .add_todo("a", &cat, TodoStatus::Active, Utc::now())
      .expect("add a");
    assert_eq!(
      state.delete_category(&cat, false),
      Err(StoreError::CategoryInUse {
        id: cat.clone(),
        count: 1
      })
    );
    assert_eq!(state.delete_category(&cat, true), Ok(1));
    assert!(state.todos.is_empty());
    assert!(state.active_order.is_empty());
  }

  #[test]
  fn rejects_unknown_category_and_bad_color() {
    let mut state = TodoState::default();
    assert_eq!(
      state.add_category("x", "red"),
      Err(StoreError::InvalidColor("red".to_string()))
    );
    assert!(matches!(
      state.add_todo("a", "nope", TodoStatus::Active, Utc::now()),
      Err(StoreError::UnknownCategory(_))
    ));
  }

  #[test]
  fn clear_done_keeps_order_consistent() {
    let (mut state, cat) = state_with_category();
    let now = Utc::now();
    let a = state
      .add_todo("a", &cat, TodoStatus::Active, now)
      .expect("add a");
    let b = state
      .add_todo("b", &cat, TodoStatus::Active, now)
      .expect("add b");
    state.toggle_done(&a).expect("toggle");
    assert_eq!(state.clear_done(), Ok(1));
    assert_eq!(state.active_order, vec![b]);
  }

  #[test]
  fn deserializes_persisted_shape() {
    let raw = r##"{
      "categories": [{"id": "c1", "name": "Work", "color": "#123456"}],
      "todos": [{
        "id": "t1", "text": "Call", "categoryId": "c1", "status": "active",
        "isDone": false, "createdAt": "2026-01-01T00:00:00.000Z",
        "notes": "", "logs": []
      }],
      "activeOrder": ["t1"]
    }"##;
    let state: TodoState =
      serde_json::from_str(raw).expect("parse");
    assert!(state.is_order_consistent());
    assert_eq!(
      state.todos[0].status,
      TodoStatus::Active
    );
  }
}
