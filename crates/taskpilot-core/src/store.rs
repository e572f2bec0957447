//! The state owner.
//!
//! `AppStore` holds the whole [`AppData`] document together with a
//! hydration flag. Readers may look at the data at any time; writers are
//! refused until [`AppStore::hydrate`] has loaded the persisted document, so
//! nothing typed before loading can be silently overwritten by it.

mod notes;
mod projects;
mod tasks;
mod todos;

use tracing::{
  info,
  instrument,
  warn
};

pub use self::notes::NotePatch;
pub use self::projects::{
  CategoryPatch,
  ProjectCreate,
  ProjectPatch
};
pub use self::tasks::{
  TaskCreate,
  TaskPatch
};
use crate::app_data::AppData;
use crate::error::{
  EntityKind,
  StoreError
};
use crate::project::Project;
use crate::task::Task;
use crate::upgrade::upgrade;
use crate::validate::{
  Violation,
  has_errors,
  validate
};

#[derive(Debug, Default)]
pub struct AppStore {
  data:     AppData,
  hydrated: bool,
  revision: u64
}

impl AppStore {
  /// An empty, not yet hydrated store.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Loads the persisted document and marks the store ready.
  ///
  /// The document is schema-upgraded and its active todo order repaired.
  /// Remaining invariant violations are logged and returned, not fatal, so
  /// that a damaged file can still be opened and fixed.
  #[instrument(skip(self, data))]
  pub fn hydrate(
    &mut self,
    mut data: AppData
  ) -> anyhow::Result<Vec<Violation>> {
    if self.hydrated {
      return Err(
        StoreError::AlreadyHydrated.into()
      );
    }

    upgrade(&mut data)?;
    data.todo.repair_active_order();
    let violations = validate(&data);
    for violation in &violations {
      warn!(%violation, "loaded data violates an invariant");
    }

    info!(
      projects = data.projects.len(),
      tasks = data.tasks.len(),
      todos = data.todo.todos.len(),
      "store hydrated"
    );
    self.data = data;
    self.hydrated = true;
    Ok(violations)
  }

  #[must_use]
  pub fn is_hydrated(&self) -> bool {
    self.hydrated
  }

  #[must_use]
  pub fn data(&self) -> &AppData {
    &self.data
  }

  #[must_use]
  pub fn into_data(self) -> AppData {
    self.data
  }

  /// Count of successful mutations since construction.
  #[must_use]
  pub fn revision(&self) -> u64 {
    self.revision
  }

  /// Swaps in a whole new document, as an import does.
  ///
  /// Unlike [`AppStore::hydrate`], a document with invariant errors is
  /// rejected and the current data is kept.
  #[instrument(skip(self, data))]
  pub fn replace(
    &mut self,
    mut data: AppData
  ) -> anyhow::Result<Vec<Violation>> {
    if !self.hydrated {
      return Err(
        StoreError::NotHydrated.into()
      );
    }

    upgrade(&mut data)?;
    data.todo.repair_active_order();
    let violations = validate(&data);
    if has_errors(&violations) {
      let listing = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
      anyhow::bail!(
        "refusing to replace data with an \
         inconsistent document: {listing}"
      );
    }

    self.data = data;
    self.revision += 1;
    info!("store data replaced");
    Ok(violations)
  }

  /// Puts back an earlier document, as undo does. The document was already
  /// accepted once, so violations are only logged.
  #[instrument(skip(self, data))]
  pub fn restore(
    &mut self,
    mut data: AppData
  ) -> anyhow::Result<()> {
    if !self.hydrated {
      return Err(
        StoreError::NotHydrated.into()
      );
    }
    upgrade(&mut data)?;
    data.todo.repair_active_order();
    for violation in validate(&data) {
      warn!(%violation, "restored data violates an invariant");
    }
    self.data = data;
    self.revision += 1;
    info!("store data restored");
    Ok(())
  }

  #[must_use]
  pub fn scratchpad_content(&self) -> &str {
    &self.data.scratchpad_content
  }

  /// Replaces the scratchpad text with `next`.
  pub fn update_scratchpad(
    &mut self,
    next: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      data.scratchpad_content =
        next.to_string();
      Ok(())
    })
  }

  /// Runs one mutation. Refused before hydration; the revision only moves
  /// when `op` succeeds. Every `op` validates before it writes, so a
  /// rejected mutation makes no requested change. Todo operations may still
  /// have repaired a stale `activeOrder` first.
  fn commit<T>(
    &mut self,
    op: impl FnOnce(&mut AppData) -> Result<T, StoreError>
  ) -> anyhow::Result<T> {
    if !self.hydrated {
      return Err(
        StoreError::NotHydrated.into()
      );
    }
    let out = op(&mut self.data)?;
    self.revision += 1;
    Ok(out)
  }
}

fn project_mut<'a>(
  data: &'a mut AppData,
  id: &str
) -> Result<&'a mut Project, StoreError> {
  data
    .projects
    .iter_mut()
    .find(|p| p.id == id)
    .ok_or_else(|| {
      StoreError::not_found(
        EntityKind::Project,
        id
      )
    })
}

fn task_mut<'a>(
  data: &'a mut AppData,
  id: &str
) -> Result<&'a mut Task, StoreError> {
  data
    .tasks
    .iter_mut()
    .find(|t| t.id == id)
    .ok_or_else(|| {
      StoreError::not_found(
        EntityKind::Task,
        id
      )
    })
}

fn non_empty(
  value: &str,
  field: &'static str
) -> Result<String, StoreError> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(StoreError::EmptyField(field));
  }
  Ok(trimmed.to_string())
}

fn check_number(
  value: f64,
  field: &'static str
) -> Result<f64, StoreError> {
  if !value.is_finite() || value < 0.0 {
    return Err(StoreError::InvalidNumber {
      field,
      value: value.to_string()
    });
  }
  Ok(value)
}
