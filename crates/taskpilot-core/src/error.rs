use std::fmt;

/// Entity kinds named in store errors.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum EntityKind {
  Category,
  Project,
  Task,
  Subtask,
  Log,
  Note,
  TodoCategory,
  Todo,
  TodoLog
}

impl fmt::Display for EntityKind {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    let name = match self {
      | Self::Category => "category",
      | Self::Project => "project",
      | Self::Task => "task",
      | Self::Subtask => "subtask",
      | Self::Log => "log entry",
      | Self::Note => "note",
      | Self::TodoCategory => {
        "todo category"
      }
      | Self::Todo => "todo",
      | Self::TodoLog => "todo log entry"
    };
    f.write_str(name)
  }
}

/// Rejections raised by store mutations.
///
/// Mutations that would break an invariant of the aggregate fail with one of
/// these before touching any state.
#[derive(
  Debug, Clone, PartialEq, Eq,
  thiserror::Error,
)]
pub enum StoreError {
  #[error(
    "store is not hydrated; persisted \
     state has not been loaded yet"
  )]
  NotHydrated,

  #[error("store is already hydrated")]
  AlreadyHydrated,

  #[error("{kind} not found: {id}")]
  NotFound { kind: EntityKind, id: String },

  #[error("duplicate {kind} id: {id}")]
  DuplicateId { kind: EntityKind, id: String },

  #[error("unknown project: {0}")]
  UnknownProject(String),

  #[error("unknown category: {0}")]
  UnknownCategory(String),

  #[error(
    "cannot place note {note} under \
     {parent}: notes would form a cycle"
  )]
  NoteCycle { note: String, parent: String },

  #[error(
    "invalid color {0:?}; expected #rgb \
     or #rrggbb"
  )]
  InvalidColor(String),

  #[error(
    "todo category {id} is still used by \
     {count} todo(s)"
  )]
  CategoryInUse { id: String, count: usize },

  #[error(
    "position {index} is out of range \
     for {len} active todo(s)"
  )]
  IndexOutOfRange { index: usize, len: usize },

  #[error("{0} must not be empty")]
  EmptyField(&'static str),

  #[error(
    "{field} must be a finite, \
     non-negative number, got {value}"
  )]
  InvalidNumber {
    field: &'static str,
    value: String
  }
}

impl StoreError {
  pub(crate) fn not_found(
    kind: EntityKind,
    id: &str
  ) -> Self {
    Self::NotFound {
      kind,
      id: id.to_string()
    }
  }
}
