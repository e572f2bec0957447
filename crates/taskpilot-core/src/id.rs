use uuid::Uuid;

/// Length of the id prefix shown in tables.
pub const SHORT_ID_LEN: usize = 8;

#[must_use]
pub fn new_id() -> String {
  Uuid::new_v4().to_string()
}

#[must_use]
pub fn short_id(id: &str) -> &str {
  match id.char_indices().nth(SHORT_ID_LEN)
  {
    | Some((idx, _)) => &id[..idx],
    | None => id
  }
}

/// Resolves a user supplied id or unique id prefix against the known ids.
///
/// An exact match always wins, even when it is also a prefix of another id.
pub fn resolve_prefix<'a, I>(
  needle: &str,
  ids: I
) -> Result<&'a str, PrefixError>
where
  I: IntoIterator<Item = &'a str>
{
  let needle = needle.trim();
  if needle.is_empty() {
    return Err(PrefixError::Empty);
  }

  let mut matches = Vec::new();
  for id in ids {
    if id == needle {
      return Ok(id);
    }
    if id.starts_with(needle) {
      matches.push(id);
    }
  }

  match matches.len() {
    | 0 => {
      Err(PrefixError::NoMatch(
        needle.to_string()
      ))
    }
    | 1 => Ok(matches[0]),
    | count => {
      Err(PrefixError::Ambiguous {
        needle: needle.to_string(),
        count
      })
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq,
  thiserror::Error,
)]
pub enum PrefixError {
  #[error("id must not be empty")]
  Empty,
  #[error("no id matches {0:?}")]
  NoMatch(String),
  #[error(
    "id prefix {needle:?} is ambiguous \
     ({count} matches)"
  )]
  Ambiguous { needle: String, count: usize }
}

#[cfg(test)]
mod tests {
  use super::{
    PrefixError,
    new_id,
    resolve_prefix,
    short_id
  };

  #[test]
  fn new_ids_are_distinct() {
    assert_ne!(new_id(), new_id());
  }

  #[test]
  fn short_id_truncates_long_ids() {
    assert_eq!(
      short_id("0123456789abcdef"),
      "01234567"
    );
    assert_eq!(short_id("abc"), "abc");
  }

  #[test]
  fn prefix_resolution() {
    let ids = ["abc1", "abc2", "abd", "ab"];
    assert_eq!(
      resolve_prefix("abd", ids),
      Ok("abd")
    );
    assert_eq!(
      resolve_prefix("ab", ids),
      Ok("ab")
    );
    assert_eq!(
      resolve_prefix("abc", ids),
      Err(PrefixError::Ambiguous {
        needle: "abc".to_string(),
        count:  2
      })
    );
    assert_eq!(
      resolve_prefix("zz", ids),
      Err(PrefixError::NoMatch(
        "zz".to_string()
      ))
    );
    assert_eq!(
      resolve_prefix("  ", ids),
      Err(PrefixError::Empty)
    );
  }
}
