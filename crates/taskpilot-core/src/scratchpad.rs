//! Free-form scratchpad bound to the store.

use tracing::debug;

use crate::store::AppStore;

pub const PLACEHOLDER: &str =
  "Jot down anything...";

/// The slice of the store a scratchpad reads and writes.
pub trait ScratchpadStore {
  fn scratchpad_content(&self) -> &str;

  fn is_hydrated(&self) -> bool;

  fn update_scratchpad(
    &mut self,
    next: &str
  ) -> anyhow::Result<()>;
}

impl ScratchpadStore for AppStore {
  fn scratchpad_content(&self) -> &str {
    AppStore::scratchpad_content(self)
  }

  fn is_hydrated(&self) -> bool {
    AppStore::is_hydrated(self)
  }

  fn update_scratchpad(
    &mut self,
    next: &str
  ) -> anyhow::Result<()> {
    AppStore::update_scratchpad(self, next)
  }
}

/// What the text field shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchpadField {
  pub value:       String,
  pub disabled:    bool,
  pub placeholder: &'static str
}

/// A change event from the text field, carrying the field's full new text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
  pub value: String
}

impl ChangeEvent {
  pub fn new(value: impl Into<String>) -> Self {
    Self {
      value: value.into()
    }
  }
}

/// Controlled text field over a store handle.
///
/// Holds no text of its own: the value always comes from the store, and
/// every accepted change is forwarded immediately. The field stays disabled
/// until the store is hydrated.
pub struct Scratchpad<'a, S: ScratchpadStore + ?Sized> {
  store: &'a mut S
}

impl<'a, S: ScratchpadStore + ?Sized> Scratchpad<'a, S> {
  pub fn new(store: &'a mut S) -> Self {
    Self { store }
  }

  #[must_use]
  pub fn is_disabled(&self) -> bool {
    !self.store.is_hydrated()
  }

  #[must_use]
  pub fn render(&self) -> ScratchpadField {
    ScratchpadField {
      value:       self
        .store
        .scratchpad_content()
        .to_string(),
      disabled:    self.is_disabled(),
      placeholder: PLACEHOLDER
    }
  }

  /// Forwards one change to the store. A disabled field produces no
  /// update and returns `Ok(false)`. Store errors propagate as-is.
  pub fn handle_change(
    &mut self,
    event: ChangeEvent
  ) -> anyhow::Result<bool> {
    if self.is_disabled() {
      debug!("scratchpad change ignored before hydration");
      return Ok(false);
    }
    self.store.update_scratchpad(&event.value)?;
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use anyhow::anyhow;

  use super::{
    ChangeEvent,
    Scratchpad,
    ScratchpadStore
  };
  use crate::app_data::AppData;
  use crate::store::AppStore;

  #[derive(Default)]
  struct RecordingStore {
    content:  String,
    hydrated: bool,
    updates:  Vec<String>,
    fail:     bool
  }

  impl ScratchpadStore for RecordingStore {
    fn scratchpad_content(&self) -> &str {
      &self.content
    }

    fn is_hydrated(&self) -> bool {
      self.hydrated
    }

    fn update_scratchpad(
      &mut self,
      next: &str
    ) -> anyhow::Result<()> {
      if self.fail {
        return Err(anyhow!("storage full"));
      }
      self.updates.push(next.to_string());
      self.content = next.to_string();
      Ok(())
    }
  }

  #[test]
  fn disabled_until_hydrated_whatever_the_content()
  {
    for content in ["", "leftover text"] {
      let mut store = RecordingStore {
        content: content.to_string(),
        ..RecordingStore::default()
      };
      let mut pad = Scratchpad::new(&mut store);
      let field = pad.render();
      assert!(field.disabled);
      assert_eq!(field.value, content);

      let applied = pad
        .handle_change(ChangeEvent::new("typed"))
        .expect("ignored change");
      assert!(!applied);
      assert!(store.updates.is_empty());
    }
  }

  #[test]
  fn each_change_forwards_full_text_once() {
    let mut store = RecordingStore {
      hydrated: true,
      ..RecordingStore::default()
    };
    let mut pad = Scratchpad::new(&mut store);
    assert!(!pad.render().disabled);

    for value in ["h", "he", "hello", ""] {
      assert!(
        pad
          .handle_change(ChangeEvent::new(value))
          .expect("change")
      );
    }
    assert_eq!(pad.render().value, "");
    assert_eq!(
      store.updates,
      vec!["h", "he", "hello", ""]
    );
  }

  #[test]
  fn store_errors_propagate() {
    let mut store = RecordingStore {
      hydrated: true,
      fail: true,
      ..RecordingStore::default()
    };
    let mut pad = Scratchpad::new(&mut store);
    let err = pad
      .handle_change(ChangeEvent::new("x"))
      .expect_err("store failure");
    assert_eq!(err.to_string(), "storage full");
  }

  #[test]
  fn works_against_the_app_store() {
    let mut store = AppStore::new();
    {
      let mut pad = Scratchpad::new(&mut store);
      assert!(pad.render().disabled);
      assert!(
        !pad
          .handle_change(ChangeEvent::new("early"))
          .expect("ignored")
      );
    }

    store
      .hydrate(AppData::default())
      .expect("hydrate");
    let mut pad = Scratchpad::new(&mut store);
    pad
      .handle_change(ChangeEvent::new("ideas"))
      .expect("change");
    assert_eq!(store.scratchpad_content(), "ideas");
    assert_eq!(store.revision(), 1);
  }
}
