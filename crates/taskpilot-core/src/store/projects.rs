use tracing::{
  debug,
  instrument
};

use super::{
  AppStore,
  check_number,
  non_empty,
  project_mut
};
use crate::app_data::AppData;
use crate::error::{
  EntityKind,
  StoreError
};
use crate::project::{
  Project,
  ProjectCategory,
  ProjectStatus,
  is_hex_color
};

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
  pub name:  Option<String>,
  pub color: Option<String>
}

#[derive(Debug, Clone, Default)]
pub struct ProjectCreate {
  pub name:         String,
  pub description:  String,
  pub status:       Option<ProjectStatus>,
  pub priority:     Option<f64>,
  pub category_ids: Vec<String>
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
  pub name:         Option<String>,
  pub description:  Option<String>,
  pub status:       Option<ProjectStatus>,
  pub priority:     Option<f64>,
  pub category_ids: Option<Vec<String>>
}

fn check_color(
  color: &str
) -> Result<String, StoreError> {
  let color = color.trim();
  if !is_hex_color(color) {
    return Err(StoreError::InvalidColor(
      color.to_string()
    ));
  }
  Ok(color.to_string())
}

/// Verifies every id names a category and drops repeats, keeping first
/// occurrences in order.
fn known_categories(
  data: &AppData,
  ids: &[String]
) -> Result<Vec<String>, StoreError> {
  let mut out: Vec<String> = Vec::new();
  for id in ids {
    if data.category(id).is_none() {
      return Err(
        StoreError::UnknownCategory(
          id.clone()
        )
      );
    }
    if !out.contains(id) {
      out.push(id.clone());
    }
  }
  Ok(out)
}

impl AppStore {
  #[instrument(skip(self))]
  pub fn add_category(
    &mut self,
    name: &str,
    color: &str
  ) -> anyhow::Result<String> {
    self.commit(|data| {
      let category = ProjectCategory::new(
        non_empty(name, "category name")?,
        check_color(color)?
      );
      let id = category.id.clone();
      data.categories.push(category);
      debug!(id = %id, "category added");
      Ok(id)
    })
  }

  #[instrument(skip(self))]
  pub fn update_category(
    &mut self,
    id: &str,
    patch: CategoryPatch
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let name = patch
        .name
        .as_deref()
        .map(|n| non_empty(n, "category name"))
        .transpose()?;
      let color = patch
        .color
        .as_deref()
        .map(check_color)
        .transpose()?;

      let category = data
        .categories
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Category,
            id
          )
        })?;
      if let Some(name) = name {
        category.name = name;
      }
      if let Some(color) = color {
        category.color = color;
      }
      Ok(())
    })
  }

  /// Deletes a category and unlinks it from every project.
  #[instrument(skip(self))]
  pub fn delete_category(
    &mut self,
    id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let idx = data
        .categories
        .iter()
        .position(|c| c.id == id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Category,
            id
          )
        })?;
      data.categories.remove(idx);

      let mut unlinked = 0_usize;
      for project in &mut data.projects {
        if let Some(ids) =
          project.category_ids.as_mut()
        {
          let before = ids.len();
          ids.retain(|c| c != id);
          unlinked += before - ids.len();
        }
        if project.category_id.as_deref()
          == Some(id)
        {
          project.category_id = None;
          unlinked += 1;
        }
      }
      debug!(id = %id, unlinked, "category deleted");
      Ok(())
    })
  }

  #[instrument(skip(self, create), fields(name = %create.name))]
  pub fn add_project(
    &mut self,
    create: ProjectCreate
  ) -> anyhow::Result<String> {
    self.commit(|data| {
      let mut project = Project::new(
        non_empty(&create.name, "project name")?
      );
      project.description =
        create.description.trim().to_string();
      if let Some(status) = create.status {
        project.status = status;
      }
      if let Some(priority) = create.priority {
        project.priority =
          check_number(priority, "priority")?;
      }
      project.category_ids = Some(
        known_categories(
          data,
          &create.category_ids
        )?
      );

      let id = project.id.clone();
      data.projects.push(project);
      debug!(id = %id, "project added");
      Ok(id)
    })
  }

  #[instrument(skip(self, patch))]
  pub fn update_project(
    &mut self,
    id: &str,
    patch: ProjectPatch
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let name = patch
        .name
        .as_deref()
        .map(|n| non_empty(n, "project name"))
        .transpose()?;
      let priority = patch
        .priority
        .map(|p| check_number(p, "priority"))
        .transpose()?;
      let category_ids = patch
        .category_ids
        .as_deref()
        .map(|ids| known_categories(data, ids))
        .transpose()?;

      let project = project_mut(data, id)?;
      if let Some(name) = name {
        project.name = name;
      }
      if let Some(description) = patch.description
      {
        project.description =
          description.trim().to_string();
      }
      if let Some(status) = patch.status {
        project.status = status;
      }
      if let Some(priority) = priority {
        project.priority = priority;
      }
      if let Some(ids) = category_ids {
        project.category_ids = Some(ids);
        project.category_id = None;
      }
      Ok(())
    })
  }

  pub fn set_project_status(
    &mut self,
    id: &str,
    status: ProjectStatus
  ) -> anyhow::Result<()> {
    self.update_project(id, ProjectPatch {
      status: Some(status),
      ..ProjectPatch::default()
    })
  }

  pub fn set_project_categories(
    &mut self,
    id: &str,
    category_ids: Vec<String>
  ) -> anyhow::Result<()> {
    self.update_project(id, ProjectPatch {
      category_ids: Some(category_ids),
      ..ProjectPatch::default()
    })
  }

  /// Deletes a project together with its tasks. Returns how many tasks went
  /// with it.
  #[instrument(skip(self))]
  pub fn delete_project(
    &mut self,
    id: &str
  ) -> anyhow::Result<usize> {
    self.commit(|data| {
      let idx = data
        .projects
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Project,
            id
          )
        })?;
      data.projects.remove(idx);
      let before = data.tasks.len();
      data.tasks.retain(|t| t.project_id != id);
      let removed = before - data.tasks.len();
      debug!(id = %id, removed_tasks = removed, "project deleted");
      Ok(removed)
    })
  }
}

#[cfg(test)]
mod tests {
  use crate::app_data::AppData;
  use crate::error::StoreError;
  use crate::project::ProjectStatus;
  use crate::store::{
    AppStore,
    CategoryPatch,
    ProjectCreate,
    ProjectPatch,
    TaskCreate
  };

  fn hydrated() -> AppStore {
    let mut store = AppStore::new();
    store
      .hydrate(AppData::default())
      .expect("hydrate");
    store
  }

  fn store_error(err: &anyhow::Error) -> &StoreError {
    err.downcast_ref::<StoreError>()
      .expect("store error")
  }

  #[test]
  fn project_lifecycle_with_categories() {
    let mut store = hydrated();
    let work = store
      .add_category("Work", "#336699")
      .expect("add category");
    let home = store
      .add_category("Home", "#963")
      .expect("add category");

    let id = store
      .add_project(ProjectCreate {
        name: "  Website  ".to_string(),
        category_ids: vec![
          work.clone(),
          work.clone(),
          home.clone(),
        ],
        ..ProjectCreate::default()
      })
      .expect("add project");

    let project = store
      .data()
      .project(&id)
      .expect("project");
    assert_eq!(project.name, "Website");
    assert_eq!(
      project.status,
      ProjectStatus::InProgress
    );
    assert_eq!(
      project.category_ids(),
      vec![work.as_str(), home.as_str()]
    );

    store
      .set_project_status(&id, ProjectStatus::Done)
      .expect("status");
    store
      .delete_category(&work)
      .expect("delete category");
    let project = store
      .data()
      .project(&id)
      .expect("project");
    assert_eq!(project.status, ProjectStatus::Done);
    assert_eq!(
      project.category_ids(),
      vec![home.as_str()]
    );
  }

  #[test]
  fn rejects_unknown_categories_and_colors() {
    let mut store = hydrated();
    let err = store
      .add_project(ProjectCreate {
        name: "P".to_string(),
        category_ids: vec!["nope".to_string()],
        ..ProjectCreate::default()
      })
      .expect_err("unknown category");
    assert_eq!(
      store_error(&err),
      &StoreError::UnknownCategory(
        "nope".to_string()
      )
    );

    let err = store
      .add_category("Bad", "blue")
      .expect_err("bad color");
    assert_eq!(
      store_error(&err),
      &StoreError::InvalidColor(
        "blue".to_string()
      )
    );

    let cat = store
      .add_category("Ok", "#000")
      .expect("add");
    let err = store
      .update_category(&cat, CategoryPatch {
        name: Some("   ".to_string()),
        color: Some("#fff".to_string())
      })
      .expect_err("blank name");
    assert_eq!(
      store_error(&err),
      &StoreError::EmptyField("category name")
    );
    assert_eq!(
      store
        .data()
        .category(&cat)
        .expect("category")
        .color,
      "#000"
    );
  }

  #[test]
  fn deleting_project_deletes_its_tasks() {
    let mut store = hydrated();
    let keep = store
      .add_project(ProjectCreate {
        name: "Keep".to_string(),
        ..ProjectCreate::default()
      })
      .expect("add");
    let drop = store
      .add_project(ProjectCreate {
        name: "Drop".to_string(),
        ..ProjectCreate::default()
      })
      .expect("add");
    for (title, project) in
      [("a", &keep), ("b", &drop), ("c", &drop)]
    {
      store
        .add_task(TaskCreate {
          title: title.to_string(),
          project_id: project.clone(),
          ..TaskCreate::default()
        })
        .expect("add task");
    }

    assert_eq!(
      store.delete_project(&drop).expect("delete"),
      2
    );
    assert_eq!(store.data().tasks.len(), 1);
    assert_eq!(store.data().tasks[0].title, "a");
  }

  #[test]
  fn update_project_replaces_legacy_category() {
    let data: AppData = serde_json::from_str(
      r##"{
        "schemaVersion": 1,
        "categories": [{"id": "c", "name": "C", "color": "#fff"}],
        "projects": [{"id": "p", "name": "P", "categoryId": "c"}]
      }"##
    )
    .expect("parse");
    let mut store = AppStore::new();
    store.hydrate(data).expect("hydrate");

    store
      .update_project("p", ProjectPatch {
        category_ids: Some(vec![]),
        ..ProjectPatch::default()
      })
      .expect("update");
    let project =
      store.data().project("p").expect("project");
    assert!(project.category_id.is_none());
    assert!(project.category_ids().is_empty());
  }
}
