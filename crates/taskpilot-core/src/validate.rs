use std::collections::HashSet;
use std::fmt;

use crate::app_data::AppData;
use crate::note::notes_in_cycles;
use crate::project::is_hex_color;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Severity {
  Warning,
  Error
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
  pub severity: Severity,
  pub message:  String
}

impl Violation {
  fn error(message: String) -> Self {
    Self {
      severity: Severity::Error,
      message
    }
  }

  fn warning(message: String) -> Self {
    Self {
      severity: Severity::Warning,
      message
    }
  }
}

impl fmt::Display for Violation {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    let label = match self.severity {
      | Severity::Warning => "warning",
      | Severity::Error => "error"
    };
    write!(f, "{label}: {}", self.message)
  }
}

/// Checks every cross-reference and uniqueness rule of the aggregate.
///
/// Store mutations already refuse to introduce these problems; this pass
/// exists for documents loaded from disk or imported.
#[must_use]
pub fn validate(
  data: &AppData
) -> Vec<Violation> {
  let mut out = Vec::new();

  check_unique(
    "category",
    data.categories.iter().map(|c| c.id.as_str()),
    &mut out
  );
  check_unique(
    "project",
    data.projects.iter().map(|p| p.id.as_str()),
    &mut out
  );
  check_unique(
    "task",
    data.tasks.iter().map(|t| t.id.as_str()),
    &mut out
  );

  for category in &data.categories {
    if !is_hex_color(&category.color) {
      out.push(Violation::warning(format!(
        "category {} has a non-hex color {:?}",
        category.id, category.color
      )));
    }
  }

  let category_ids: HashSet<&str> = data
    .categories
    .iter()
    .map(|c| c.id.as_str())
    .collect();

  for project in &data.projects {
    if project.category_id.is_some()
      && project.category_ids.is_some()
    {
      out.push(Violation::warning(format!(
        "project {} still carries the legacy categoryId",
        project.id
      )));
    }
    for category in project.category_ids() {
      if !category_ids.contains(category) {
        out.push(Violation::error(format!(
          "project {} references unknown category {category}",
          project.id
        )));
      }
    }

    check_unique(
      &format!("note in project {}", project.id),
      project.notes.iter().map(|n| n.id.as_str()),
      &mut out
    );

    let note_ids: HashSet<&str> = project
      .notes
      .iter()
      .map(|n| n.id.as_str())
      .collect();
    for note in &project.notes {
      if let Some(parent) = note.parent_id.as_deref()
        && !note_ids.contains(parent)
      {
        out.push(Violation::error(format!(
          "note {} in project {} has parent {parent} outside the project",
          note.id, project.id
        )));
      }
    }
    for id in notes_in_cycles(&project.notes) {
      out.push(Violation::error(format!(
        "note {id} in project {} is part of a parent cycle",
        project.id
      )));
    }

    let mains = project
      .notes
      .iter()
      .filter(|n| n.is_main())
      .count();
    if mains > 1 {
      out.push(Violation::warning(format!(
        "project {} has {mains} main notes",
        project.id
      )));
    }
  }

  let project_ids: HashSet<&str> = data
    .projects
    .iter()
    .map(|p| p.id.as_str())
    .collect();
  for task in &data.tasks {
    if !project_ids.contains(task.project_id.as_str())
    {
      out.push(Violation::error(format!(
        "task {} references unknown project {}",
        task.id, task.project_id
      )));
    }
    check_unique(
      &format!("subtask in task {}", task.id),
      task.subtasks.iter().map(|s| s.id.as_str()),
      &mut out
    );
    check_unique(
      &format!("log in task {}", task.id),
      task.logs.iter().map(|l| l.id.as_str()),
      &mut out
    );
  }

  validate_todos(data, &mut out);
  out
}

fn validate_todos(
  data: &AppData,
  out: &mut Vec<Violation>
) {
  let todo = &data.todo;
  check_unique(
    "todo category",
    todo.categories.iter().map(|c| c.id.as_str()),
    out
  );
  check_unique(
    "todo",
    todo.todos.iter().map(|t| t.id.as_str()),
    out
  );

  for item in &todo.todos {
    if todo.category(&item.category_id).is_none() {
      out.push(Violation::error(format!(
        "todo {} references unknown todo category {}",
        item.id, item.category_id
      )));
    }
  }

  let active: HashSet<&str> = todo
    .todos
    .iter()
    .filter(|t| t.is_active())
    .map(|t| t.id.as_str())
    .collect();
  let mut ordered = HashSet::new();
  for id in &todo.active_order {
    if !ordered.insert(id.as_str()) {
      out.push(Violation::error(format!(
        "activeOrder lists todo {id} more than once"
      )));
    } else if todo.todo(id).is_none() {
      out.push(Violation::error(format!(
        "activeOrder references missing todo {id}"
      )));
    } else if !active.contains(id.as_str()) {
      out.push(Violation::error(format!(
        "activeOrder lists todo {id} which is not active"
      )));
    }
  }
  for id in active.difference(&ordered) {
    out.push(Violation::error(format!(
      "active todo {id} is missing from activeOrder"
    )));
  }
}

fn check_unique<'a>(
  scope: &str,
  ids: impl Iterator<Item = &'a str>,
  out: &mut Vec<Violation>
) {
  let mut seen = HashSet::new();
  let mut reported = HashSet::new();
  for id in ids {
    if !seen.insert(id) && reported.insert(id) {
      out.push(Violation::error(format!(
        "duplicate {scope} id {id}"
      )));
    }
  }
}

#[must_use]
pub fn has_errors(
  violations: &[Violation]
) -> bool {
  violations
    .iter()
    .any(|v| v.severity == Severity::Error)
}
