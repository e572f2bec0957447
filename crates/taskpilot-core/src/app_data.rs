use std::collections::BTreeMap;

use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;

use crate::project::{
  Project,
  ProjectCategory
};
use crate::task::Task;
use crate::todo::TodoState;

/// Everything TaskPilot persists, as one document.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
  /// Missing in documents written before versioning; those read as 0.
  #[serde(default)]
  pub schema_version:     u32,
  #[serde(default)]
  pub projects:           Vec<Project>,
  #[serde(default)]
  pub tasks:              Vec<Task>,
  #[serde(default)]
  pub categories:         Vec<ProjectCategory>,
  #[serde(default)]
  pub todo:               TodoState,
  #[serde(default)]
  pub scratchpad_content: String,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

impl AppData {
  #[must_use]
  pub fn project(
    &self,
    id: &str
  ) -> Option<&Project> {
    self.projects.iter().find(|p| p.id == id)
  }

  #[must_use]
  pub fn task(
    &self,
    id: &str
  ) -> Option<&Task> {
    self.tasks.iter().find(|t| t.id == id)
  }

  #[must_use]
  pub fn category(
    &self,
    id: &str
  ) -> Option<&ProjectCategory> {
    self
      .categories
      .iter()
      .find(|c| c.id == id)
  }

  /// Tasks of one project in stored order.
  #[must_use]
  pub fn tasks_for_project(
    &self,
    project_id: &str
  ) -> Vec<&Task> {
    self
      .tasks
      .iter()
      .filter(|t| t.project_id == project_id)
      .collect()
  }
}
