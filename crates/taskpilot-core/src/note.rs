use std::collections::{
  BTreeMap,
  HashMap,
  HashSet
};

use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;

use crate::id::new_id;

#[derive(
  Debug, Clone, Serialize, Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Note {
  pub id:           String,
  pub title:        String,
  #[serde(default)]
  pub content:      String,
  #[serde(default)]
  pub parent_id:    Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub is_collapsed: Option<bool>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub is_main:      Option<bool>,

  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>
}

impl Note {
  pub fn new(
    title: String,
    content: String,
    parent_id: Option<String>
  ) -> Self {
    Self {
      id: new_id(),
      title,
      content,
      parent_id,
      is_collapsed: None,
      is_main: None,
      extra: BTreeMap::new()
    }
  }

  #[must_use]
  pub fn is_collapsed(&self) -> bool {
    self.is_collapsed.unwrap_or(false)
  }

  #[must_use]
  pub fn is_main(&self) -> bool {
    self.is_main.unwrap_or(false)
  }
}

/// Row produced by [`walk`]: a note and its depth in the tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeRow<'a> {
  pub note:         &'a Note,
  pub depth:        usize,
  pub has_children: bool
}

/// Notes whose parent is absent or does not resolve within `notes`.
///
/// Dangling parents are shown at the root rather than hidden.
#[must_use]
pub fn roots(notes: &[Note]) -> Vec<&Note> {
  let ids: HashSet<&str> =
    notes.iter().map(|n| n.id.as_str()).collect();
  notes
    .iter()
    .filter(|n| match n.parent_id.as_deref() {
      | None => true,
      | Some(parent) => {
        parent == n.id || !ids.contains(parent)
      }
    })
    .collect()
}

#[must_use]
pub fn children_of<'a>(
  notes: &'a [Note],
  parent_id: &str
) -> Vec<&'a Note> {
  notes
    .iter()
    .filter(|n| {
      n.parent_id.as_deref() == Some(parent_id)
        && n.id != parent_id
    })
    .collect()
}

/// Depth-first walk in stored order. Children of collapsed notes are skipped
/// unless `expand_all` is set. Notes caught in a parent cycle are never
/// reached from a root and are therefore not emitted.
#[must_use]
pub fn walk(
  notes: &[Note],
  expand_all: bool
) -> Vec<TreeRow<'_>> {
  let mut by_parent: HashMap<&str, Vec<&Note>> =
    HashMap::new();
  for note in notes {
    if let Some(parent) = note.parent_id.as_deref()
      && parent != note.id
    {
      by_parent
        .entry(parent)
        .or_default()
        .push(note);
    }
  }

  let mut rows = Vec::with_capacity(notes.len());
  let mut visited = HashSet::new();
  let mut stack: Vec<(&Note, usize)> = roots(notes)
    .into_iter()
    .rev()
    .map(|n| (n, 0))
    .collect();

  while let Some((note, depth)) = stack.pop() {
    if !visited.insert(note.id.as_str()) {
      continue;
    }
    let children = by_parent
      .get(note.id.as_str())
      .map(Vec::as_slice)
      .unwrap_or(&[]);
    rows.push(TreeRow {
      note,
      depth,
      has_children: !children.is_empty()
    });
    if expand_all || !note.is_collapsed() {
      for child in children.iter().rev() {
        stack.push((*child, depth + 1));
      }
    }
  }

  rows
}

/// Ids of every note below `id`, in no particular order.
#[must_use]
pub fn descendants(
  notes: &[Note],
  id: &str
) -> HashSet<String> {
  let mut out = HashSet::new();
  let mut frontier = vec![id.to_string()];
  while let Some(current) = frontier.pop() {
    for child in children_of(notes, &current) {
      if out.insert(child.id.clone()) {
        frontier.push(child.id.clone());
      }
    }
  }
  out
}

/// Whether making `parent_id` the parent of `note_id` closes a cycle.
#[must_use]
pub fn would_create_cycle(
  notes: &[Note],
  note_id: &str,
  parent_id: &str
) -> bool {
  note_id == parent_id
    || descendants(notes, note_id)
      .contains(parent_id)
}

/// Ids of notes that sit on a parent cycle.
#[must_use]
pub fn notes_in_cycles(
  notes: &[Note]
) -> Vec<String> {
  let parent_of: HashMap<&str, &str> = notes
    .iter()
    .filter_map(|n| {
      n.parent_id
        .as_deref()
        .map(|p| (n.id.as_str(), p))
    })
    .collect();

  let mut out = Vec::new();
  for note in notes {
    let mut seen = HashSet::new();
    let mut current = note.id.as_str();
    while let Some(parent) =
      parent_of.get(current).copied()
    {
      if parent == note.id {
        out.push(note.id.clone());
        break;
      }
      if !seen.insert(parent) {
        break;
      }
      current = parent;
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::{
    Note,
    descendants,
    notes_in_cycles,
    roots,
    walk,
    would_create_cycle
  };

  fn note(id: &str, parent: Option<&str>) -> Note {
    let mut n = Note::new(
      id.to_string(),
      String::new(),
      parent.map(str::to_string)
    );
    n.id = id.to_string();
    n
  }

  fn sample() -> Vec<Note> {
    vec![
      note("a", None),
      note("b", Some("a")),
      note("c", Some("b")),
      note("d", None),
      note("e", Some("a")),
    ]
  }

  #[test]
  fn walk_is_depth_first_in_stored_order() {
    let notes = sample();
    let rows: Vec<(&str, usize)> = walk(&notes, false)
      .iter()
      .map(|r| (r.note.id.as_str(), r.depth))
      .collect();
    assert_eq!(
      rows,
      vec![
        ("a", 0),
        ("b", 1),
        ("c", 2),
        ("e", 1),
        ("d", 0)
      ]
    );
  }

  #[test]
  fn collapsed_notes_hide_children() {
    let mut notes = sample();
    notes[0].is_collapsed = Some(true);
    let ids: Vec<&str> = walk(&notes, false)
      .iter()
      .map(|r| r.note.id.as_str())
      .collect();
    assert_eq!(ids, vec!["a", "d"]);
    assert_eq!(walk(&notes, true).len(), 5);
  }

  #[test]
  fn dangling_parent_is_treated_as_root() {
    let notes = vec![
      note("a", None),
      note("orphan", Some("gone")),
    ];
    let ids: Vec<&str> = roots(&notes)
      .iter()
      .map(|n| n.id.as_str())
      .collect();
    assert_eq!(ids, vec!["a", "orphan"]);
  }

  #[test]
  fn cycle_detection() {
    let notes = sample();
    assert!(would_create_cycle(&notes, "a", "c"));
    assert!(would_create_cycle(&notes, "b", "b"));
    assert!(!would_create_cycle(&notes, "c", "d"));
    assert_eq!(
      descendants(&notes, "a").len(),
      3
    );

    let looped = vec![
      note("x", Some("y")),
      note("y", Some("x")),
      note("z", Some("x")),
    ];
    let mut in_cycle = notes_in_cycles(&looped);
    in_cycle.sort();
    assert_eq!(in_cycle, vec!["x", "y"]);
    assert!(walk(&looped, true).is_empty());
  }
}
