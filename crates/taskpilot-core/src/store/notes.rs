use tracing::{
  debug,
  instrument
};

use super::{
  AppStore,
  non_empty,
  project_mut
};
use crate::error::{
  EntityKind,
  StoreError
};
use crate::note::{
  Note,
  would_create_cycle
};
use crate::project::Project;

#[derive(Debug, Clone, Default)]
pub struct NotePatch {
  pub title:   Option<String>,
  pub content: Option<String>
}

fn note_in<'a>(
  project: &'a mut Project,
  note_id: &str
) -> Result<&'a mut Note, StoreError> {
  project.note_mut(note_id).ok_or_else(|| {
    StoreError::not_found(
      EntityKind::Note,
      note_id
    )
  })
}

fn check_parent(
  project: &Project,
  parent_id: &str
) -> Result<(), StoreError> {
  if project.note(parent_id).is_none() {
    return Err(StoreError::not_found(
      EntityKind::Note,
      parent_id
    ));
  }
  Ok(())
}

impl AppStore {
  /// Adds a note to a project. A parent, when given, must be a note of the
  /// same project.
  #[instrument(skip(self, content))]
  pub fn add_note(
    &mut self,
    project_id: &str,
    title: &str,
    content: &str,
    parent_id: Option<&str>
  ) -> anyhow::Result<String> {
    self.commit(|data| {
      let title = non_empty(title, "note title")?;
      let project = project_mut(data, project_id)?;
      if let Some(parent) = parent_id {
        check_parent(project, parent)?;
      }

      let note = Note::new(
        title,
        content.to_string(),
        parent_id.map(str::to_string)
      );
      let id = note.id.clone();
      project.notes.push(note);
      debug!(id = %id, "note added");
      Ok(id)
    })
  }

  #[instrument(skip(self, patch))]
  pub fn update_note(
    &mut self,
    project_id: &str,
    note_id: &str,
    patch: NotePatch
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let title = patch
        .title
        .as_deref()
        .map(|t| non_empty(t, "note title"))
        .transpose()?;
      let note = note_in(
        project_mut(data, project_id)?,
        note_id
      )?;
      if let Some(title) = title {
        note.title = title;
      }
      if let Some(content) = patch.content {
        note.content = content;
      }
      Ok(())
    })
  }

  /// Re-parents a note; `None` makes it a root. Moves that would put a note
  /// below itself are refused.
  #[instrument(skip(self))]
  pub fn move_note(
    &mut self,
    project_id: &str,
    note_id: &str,
    new_parent: Option<&str>
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let project = project_mut(data, project_id)?;
      if project.note(note_id).is_none() {
        return Err(StoreError::not_found(
          EntityKind::Note,
          note_id
        ));
      }
      if let Some(parent) = new_parent {
        check_parent(project, parent)?;
        if would_create_cycle(
          &project.notes,
          note_id,
          parent
        ) {
          return Err(StoreError::NoteCycle {
            note:   note_id.to_string(),
            parent: parent.to_string()
          });
        }
      }
      note_in(project, note_id)?.parent_id =
        new_parent.map(str::to_string);
      Ok(())
    })
  }

  /// Flips the collapsed display hint and returns the new value.
  #[instrument(skip(self))]
  pub fn toggle_note_collapsed(
    &mut self,
    project_id: &str,
    note_id: &str
  ) -> anyhow::Result<bool> {
    self.commit(|data| {
      let note = note_in(
        project_mut(data, project_id)?,
        note_id
      )?;
      let collapsed = !note.is_collapsed();
      note.is_collapsed = Some(collapsed);
      Ok(collapsed)
    })
  }

  /// Marks one note as the project's main note and clears the mark on every
  /// other note of the project.
  #[instrument(skip(self))]
  pub fn set_main_note(
    &mut self,
    project_id: &str,
    note_id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let project = project_mut(data, project_id)?;
      if project.note(note_id).is_none() {
        return Err(StoreError::not_found(
          EntityKind::Note,
          note_id
        ));
      }
      for note in &mut project.notes {
        if note.id == note_id {
          note.is_main = Some(true);
        } else if note.is_main.is_some() {
          note.is_main = Some(false);
        }
      }
      Ok(())
    })
  }

  #[instrument(skip(self))]
  pub fn clear_main_note(
    &mut self,
    project_id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let project = project_mut(data, project_id)?;
      for note in &mut project.notes {
        if note.is_main.is_some() {
          note.is_main = Some(false);
        }
      }
      Ok(())
    })
  }

  /// Deletes a note. Its children move up to the deleted note's parent.
  #[instrument(skip(self))]
  pub fn delete_note(
    &mut self,
    project_id: &str,
    note_id: &str
  ) -> anyhow::Result<()> {
    self.commit(|data| {
      let project = project_mut(data, project_id)?;
      let idx = project
        .notes
        .iter()
        .position(|n| n.id == note_id)
        .ok_or_else(|| {
          StoreError::not_found(
            EntityKind::Note,
            note_id
          )
        })?;
      let removed = project.notes.remove(idx);
      let mut reparented = 0_usize;
      for note in &mut project.notes {
        if note.parent_id.as_deref() == Some(note_id)
        {
          note.parent_id = removed.parent_id.clone();
          reparented += 1;
        }
      }
      debug!(id = %note_id, reparented, "note deleted");
      Ok(())
    })
  }
}

#[cfg(test)]
mod tests {
  use crate::app_data::AppData;
  use crate::error::StoreError;
  use crate::store::{
    AppStore,
    NotePatch,
    ProjectCreate
  };

  fn store_with_project() -> (AppStore, String) {
    let mut store = AppStore::new();
    store
      .hydrate(AppData::default())
      .expect("hydrate");
    let project = store
      .add_project(ProjectCreate {
        name: "Notes".to_string(),
        ..ProjectCreate::default()
      })
      .expect("add project");
    (store, project)
  }

  fn parent_of(
    store: &AppStore,
    project: &str,
    note: &str
  ) -> Option<String> {
    store
      .data()
      .project(project)
      .and_then(|p| p.note(note))
      .and_then(|n| n.parent_id.clone())
  }

  #[test]
  fn note_parent_must_be_in_same_project() {
    let (mut store, project) = store_with_project();
    let other = store
      .add_project(ProjectCreate {
        name: "Other".to_string(),
        ..ProjectCreate::default()
      })
      .expect("add project");
    let foreign = store
      .add_note(&other, "Foreign", "", None)
      .expect("add note");

    let err = store
      .add_note(&project, "Child", "", Some(&foreign))
      .expect_err("foreign parent");
    assert!(matches!(
      err.downcast_ref::<StoreError>(),
      Some(StoreError::NotFound { .. })
    ));
  }

  #[test]
  fn moves_that_create_cycles_are_rejected() {
    let (mut store, project) = store_with_project();
    let a = store
      .add_note(&project, "A", "", None)
      .expect("a");
    let b = store
      .add_note(&project, "B", "", Some(&a))
      .expect("b");
    let c = store
      .add_note(&project, "C", "", Some(&b))
      .expect("c");

    let err = store
      .move_note(&project, &a, Some(&c))
      .expect_err("cycle");
    assert_eq!(
      err.downcast_ref::<StoreError>(),
      Some(&StoreError::NoteCycle {
        note: a.clone(),
        parent: c.clone()
      })
    );
    assert!(store.move_note(&project, &a, Some(&a)).is_err());

    store
      .move_note(&project, &c, None)
      .expect("to root");
    assert_eq!(parent_of(&store, &project, &c), None);
    store
      .move_note(&project, &a, Some(&c))
      .expect("now legal");
    assert_eq!(
      parent_of(&store, &project, &a),
      Some(c)
    );
  }

  #[test]
  fn deleting_note_lifts_children() {
    let (mut store, project) = store_with_project();
    let a = store
      .add_note(&project, "A", "", None)
      .expect("a");
    let b = store
      .add_note(&project, "B", "", Some(&a))
      .expect("b");
    let c = store
      .add_note(&project, "C", "", Some(&b))
      .expect("c");

    store.delete_note(&project, &b).expect("delete");
    assert_eq!(
      parent_of(&store, &project, &c),
      Some(a)
    );
  }

  #[test]
  fn only_one_main_note() {
    let (mut store, project) = store_with_project();
    let a = store
      .add_note(&project, "A", "", None)
      .expect("a");
    let b = store
      .add_note(&project, "B", "", None)
      .expect("b");

    store.set_main_note(&project, &a).expect("main a");
    store.set_main_note(&project, &b).expect("main b");
    let p = store.data().project(&project).expect("project");
    assert_eq!(
      p.main_note().map(|n| n.id.as_str()),
      Some(b.as_str())
    );
    assert_eq!(
      p.notes.iter().filter(|n| n.is_main()).count(),
      1
    );

    store.clear_main_note(&project).expect("clear");
    assert!(
      store
        .data()
        .project(&project)
        .expect("project")
        .main_note()
        .is_none()
    );
  }

  #[test]
  fn update_and_collapse() {
    let (mut store, project) = store_with_project();
    let a = store
      .add_note(&project, "A", "old", None)
      .expect("a");
    store
      .update_note(&project, &a, NotePatch {
        title: Some("Renamed".to_string()),
        content: Some("[]".to_string())
      })
      .expect("update");
    assert!(
      store
        .toggle_note_collapsed(&project, &a)
        .expect("collapse")
    );
    let note = store
      .data()
      .project(&project)
      .and_then(|p| p.note(&a))
      .expect("note");
    assert_eq!(note.title, "Renamed");
    assert_eq!(note.content, "[]");
    assert!(note.is_collapsed());
  }
}
