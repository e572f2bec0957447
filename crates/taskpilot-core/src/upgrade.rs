use anyhow::bail;
use tracing::{
  debug,
  info
};

use crate::app_data::AppData;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Brings a loaded document up to [`CURRENT_SCHEMA_VERSION`].
///
/// Version 0 documents may carry the single `categoryId` on projects. The
/// upgrade folds it into `categoryIds` and clears it, so that afterwards
/// `categoryIds` is the only category field in use. Returns whether anything
/// changed.
#[tracing::instrument(skip(data), fields(from = data.schema_version))]
pub fn upgrade(
  data: &mut AppData
) -> anyhow::Result<bool> {
  if data.schema_version
    > CURRENT_SCHEMA_VERSION
  {
    bail!(
      "data schema version {} is newer \
       than supported version {}",
      data.schema_version,
      CURRENT_SCHEMA_VERSION
    );
  }

  if data.schema_version
    == CURRENT_SCHEMA_VERSION
  {
    return Ok(false);
  }

  let mut folded = 0_usize;
  for project in &mut data.projects {
    let legacy = project.category_id.take();
    // An explicit list wins, even when empty.
    if project.category_ids.is_some() {
      continue;
    }
    let ids: Vec<String> = legacy
      .filter(|legacy| !legacy.is_empty())
      .into_iter()
      .collect();
    if let Some(legacy) = ids.first() {
      debug!(
        project = %project.id,
        category = %legacy,
        "folding legacy category into category list"
      );
      folded += 1;
    }
    project.category_ids = Some(ids);
  }

  info!(
    from = data.schema_version,
    to = CURRENT_SCHEMA_VERSION,
    folded,
    "upgraded data schema"
  );
  data.schema_version =
    CURRENT_SCHEMA_VERSION;
  Ok(true)
}

#[cfg(test)]
mod tests {
  use super::{
    CURRENT_SCHEMA_VERSION,
    upgrade
  };
  use crate::app_data::AppData;

  fn load(raw: &str) -> AppData {
    serde_json::from_str(raw)
      .expect("parse app data")
  }

  #[test]
  fn folds_legacy_category_id() {
    let mut data = load(
      r##"{
        "projects": [
          {"id": "p1", "name": "Legacy", "categoryId": "c1"},
          {"id": "p2", "name": "Both", "categoryId": "old", "categoryIds": ["new"]},
          {"id": "p3", "name": "None"}
        ],
        "categories": [
          {"id": "c1", "name": "Work", "color": "#fff"},
          {"id": "new", "name": "New", "color": "#000"}
        ]
      }"##
    );
    assert_eq!(data.schema_version, 0);

    let changed =
      upgrade(&mut data).expect("upgrade");
    assert!(changed);
    assert_eq!(
      data.schema_version,
      CURRENT_SCHEMA_VERSION
    );

    let ids: Vec<Vec<&str>> = data
      .projects
      .iter()
      .map(|p| p.category_ids())
      .collect();
    assert_eq!(
      ids,
      vec![vec!["c1"], vec!["new"], vec![]]
    );
    assert!(
      data
        .projects
        .iter()
        .all(|p| p.category_id.is_none())
    );

    let json = serde_json::to_value(&data)
      .expect("serialize");
    assert!(
      json["projects"][0]
        .get("categoryId")
        .is_none()
    );
  }

  #[test]
  fn explicit_empty_category_list_wins_over_legacy_id() {
    let mut data = load(
      r##"{
        "projects": [
          {"id": "p1", "name": "Cleared", "categoryId": "old", "categoryIds": []}
        ],
        "categories": [
          {"id": "old", "name": "Old", "color": "#fff"}
        ]
      }"##
    );
    assert!(
      data.projects[0].category_ids().is_empty()
    );

    upgrade(&mut data).expect("upgrade");

    let project = &data.projects[0];
    assert!(project.category_ids().is_empty());
    assert_eq!(project.category_ids, Some(vec![]));
    assert!(project.category_id.is_none());
  }

  #[test]
  fn current_version_is_untouched() {
    let mut data = AppData {
      schema_version: CURRENT_SCHEMA_VERSION,
      ..AppData::default()
    };
    assert!(!upgrade(&mut data).expect("upgrade"));
  }

  #[test]
  fn newer_versions_are_rejected() {
    let mut data = AppData {
      schema_version: CURRENT_SCHEMA_VERSION + 1,
      ..AppData::default()
    };
    assert!(upgrade(&mut data).is_err());
  }
}
