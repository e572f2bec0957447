use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;

use crate::id::new_id;
use crate::note::Note;

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
pub enum ProjectStatus {
  #[default]
  #[serde(rename = "In Progress")]
  InProgress,
  Backlog,
  Done,
  Archived
}

impl ProjectStatus {
  #[must_use]
  pub const fn as_str(&self) -> &'static str {
    match self {
      | Self::InProgress => "In Progress",
      | Self::Backlog => "Backlog",
      | Self::Done => "Done",
      | Self::Archived => "Archived"
    }
  }

  /// Sort rank used by project listings.
  #[must_use]
  pub const fn rank(&self) -> u8 {
    match self {
      | Self::InProgress => 0,
      | Self::Backlog => 1,
      | Self::Done => 2,
      | Self::Archived => 3
    }
  }
}

impl fmt::Display for ProjectStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ProjectStatus {
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
      | "inprogress" | "progress"
      | "active" => Ok(Self::InProgress),
      | "backlog" => Ok(Self::Backlog),
      | "done" => Ok(Self::Done),
      | "archived" | "archive" => {
        Ok(Self::Archived)
      }
      | _ => {
        Err(anyhow!(
          "invalid project status: {s} \
           (expected In Progress, \
           Backlog, Done or Archived)"
        ))
      }
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq, Eq,
)]
pub struct ProjectCategory {
  pub id:    String,
  pub name:  String,
  pub color: String,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

impl ProjectCategory {
  pub fn new(
    name: String,
    color: String
  ) -> Self {
    Self {
      id: new_id(),
      name,
      color,
      extra: BTreeMap::new()
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Project {
  pub id:           String,
  pub name:         String,
  #[serde(default)]
  pub description:  String,
  #[serde(default)]
  pub status:       ProjectStatus,
  #[serde(default)]
  pub priority:     f64,
  #[serde(default)]
  pub notes:        Vec<Note>,
  /// Single-category field of older data. Read only as a fallback when
  /// `category_ids` is absent.
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub category_id:  Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub category_ids: Option<Vec<String>>,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

impl Project {
  pub fn new(name: String) -> Self {
    Self {
      id: new_id(),
      name,
      description: String::new(),
      status: ProjectStatus::InProgress,
      priority: 0.0,
      notes: vec![],
      category_id: None,
      category_ids: Some(vec![]),
      extra: BTreeMap::new()
    }
  }

  /// Effective category set: `category_ids` when present, otherwise the
  /// legacy single `category_id`.
  #[must_use]
  pub fn category_ids(&self) -> Vec<&str> {
    match &self.category_ids {
      | Some(ids) => {
        ids.iter().map(String::as_str).collect()
      }
      | None => {
        self
          .category_id
          .as_deref()
          .into_iter()
          .collect()
      }
    }
  }

  #[must_use]
  pub fn has_category(
    &self,
    category_id: &str
  ) -> bool {
    self
      .category_ids()
      .contains(&category_id)
  }

  #[must_use]
  pub fn note(
    &self,
    id: &str
  ) -> Option<&Note> {
    self.notes.iter().find(|n| n.id == id)
  }

  pub fn note_mut(
    &mut self,
    id: &str
  ) -> Option<&mut Note> {
    self
      .notes
      .iter_mut()
      .find(|n| n.id == id)
  }

  /// First note flagged as the project's main note.
  #[must_use]
  pub fn main_note(&self) -> Option<&Note> {
    self.notes.iter().find(|n| n.is_main())
  }
}

/// Accepts `#rgb` and `#rrggbb` hex colors.
#[must_use]
pub fn is_hex_color(raw: &str) -> bool {
  let Some(hex) = raw.strip_prefix('#')
  else {
    return false;
  };
  matches!(hex.len(), 3 | 6)
    && hex
      .chars()
      .all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
  use super::{
    Project,
    ProjectStatus,
    is_hex_color
  };

  #[test]
  fn category_ids_win_over_legacy_field() {
    let raw = r#"{
      "id": "p1",
      "name": "Site",
      "description": "",
      "status": "Backlog",
      "priority": 2,
      "notes": [],
      "categoryId": "old",
      "categoryIds": ["a", "b"]
    }"#;
    let project: Project =
      serde_json::from_str(raw)
        .expect("parse project");
    assert_eq!(
      project.status,
      ProjectStatus::Backlog
    );
    assert_eq!(
      project.category_ids(),
      vec!["a", "b"]
    );
    assert!(!project.has_category("old"));
  }

  #[test]
  fn legacy_category_is_a_fallback() {
    let raw = r#"{
      "id": "p1",
      "name": "Site",
      "categoryId": "old"
    }"#;
    let project: Project =
      serde_json::from_str(raw)
        .expect("parse project");
    assert_eq!(
      project.category_ids(),
      vec!["old"]
    );
    assert_eq!(
      project.status,
      ProjectStatus::InProgress
    );
  }

  #[test]
  fn status_parsing() {
    assert_eq!(
      "archived"
        .parse::<ProjectStatus>()
        .expect("parse"),
      ProjectStatus::Archived
    );
    assert_eq!(
      "in-progress"
        .parse::<ProjectStatus>()
        .expect("parse"),
      ProjectStatus::InProgress
    );
    assert!(
      "later"
        .parse::<ProjectStatus>()
        .is_err()
    );
  }

  #[test]
  fn hex_colors() {
    assert!(is_hex_color("#fff"));
    assert!(is_hex_color("#1A2b3C"));
    assert!(!is_hex_color("fff"));
    assert!(!is_hex_color("#ffff"));
    assert!(!is_hex_color("#ggg"));
  }
}
