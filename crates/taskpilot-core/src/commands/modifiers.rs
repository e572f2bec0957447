use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use tracing::{
  instrument,
  warn
};

use crate::datetime::parse_deadline_expr;

/// One `key:value` attribute token.
///
/// Values that only make sense for one entity (statuses, priorities) stay
/// raw here and are parsed by the command that applies them. An empty value
/// clears the optional fields.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mod {
  Project(String),
  Priority(String),
  Status(String),
  Points(f64),
  Deadline(Option<NaiveDate>),
  Link(Option<String>),
  Description(String),
  Categories(Vec<String>),
  Category(String),
  Parent(Option<String>),
  Color(String),
  Name(String)
}

/// Free words and modifiers of one command line. Everything after `--` is
/// taken as words.
#[derive(Debug, Default)]
pub(crate) struct ParsedArgs {
  pub words: Vec<String>,
  pub mods:  Vec<Mod>
}

impl ParsedArgs {
  pub fn text(&self) -> String {
    self.words.join(" ")
  }

  /// `text()`, failing when no words were given.
  pub fn required_text(
    &self,
    what: &str
  ) -> anyhow::Result<String> {
    let text = self.text();
    if text.trim().is_empty() {
      return Err(anyhow!(
        "{what} is required"
      ));
    }
    Ok(text)
  }

  /// Rejects modifiers the command has no use for.
  pub fn only(
    &self,
    command: &str,
    allowed: &[&str]
  ) -> anyhow::Result<()> {
    for one_mod in &self.mods {
      let key = one_mod.key();
      if !allowed.contains(&key) {
        return Err(anyhow!(
          "{command} does not take \
           {key}:"
        ));
      }
    }
    Ok(())
  }
}

impl Mod {
  pub fn key(&self) -> &'static str {
    match self {
      | Mod::Project(_) => "project",
      | Mod::Priority(_) => "priority",
      | Mod::Status(_) => "status",
      | Mod::Points(_) => "points",
      | Mod::Deadline(_) => "deadline",
      | Mod::Link(_) => "link",
      | Mod::Description(_) => {
        "description"
      }
      | Mod::Categories(_) => {
        "categories"
      }
      | Mod::Category(_) => "category",
      | Mod::Parent(_) => "parent",
      | Mod::Color(_) => "color",
      | Mod::Name(_) => "name"
    }
  }
}

#[instrument(skip(args, now))]
pub(crate) fn parse_args(
  args: &[String],
  now: DateTime<Utc>
) -> anyhow::Result<ParsedArgs> {
  let mut parsed = ParsedArgs::default();

  let mut literal = false;
  for arg in args {
    if arg == "--" && !literal {
      literal = true;
      continue;
    }

    if !literal
      && let Some(one_mod) =
        parse_one_mod(arg, now)?
    {
      parsed.mods.push(one_mod);
      continue;
    }

    parsed.words.push(arg.clone());
  }

  Ok(parsed)
}

fn parse_one_mod(
  tok: &str,
  now: DateTime<Utc>
) -> anyhow::Result<Option<Mod>> {
  let Some((key, value)) = tok
    .split_once(':')
    .or_else(|| tok.split_once('='))
  else {
    return Ok(None);
  };

  let key = key.to_ascii_lowercase();
  let value = value.trim();

  let one_mod = match key.as_str() {
    | "project" | "proj" => {
      Mod::Project(value.to_string())
    }
    | "pri" | "priority" => {
      Mod::Priority(value.to_string())
    }
    | "status" => {
      Mod::Status(value.to_string())
    }
    | "points" | "pts" => {
      let points: f64 =
        value.parse().map_err(|_| {
          anyhow!(
            "points must be a number, \
             got: {value}"
          )
        })?;
      Mod::Points(points)
    }
    | "deadline" | "due" => {
      if value.is_empty() {
        Mod::Deadline(None)
      } else {
        Mod::Deadline(Some(
          parse_deadline_expr(value, now)?
        ))
      }
    }
    | "link" => {
      Mod::Link(
        Some(value.to_string())
          .filter(|v| !v.is_empty())
      )
    }
    | "description" | "desc" => {
      Mod::Description(value.to_string())
    }
    | "categories" | "cats" => {
      Mod::Categories(
        value
          .split(',')
          .map(str::trim)
          .filter(|v| !v.is_empty())
          .map(str::to_string)
          .collect()
      )
    }
    | "category" | "cat" => {
      Mod::Category(value.to_string())
    }
    | "parent" => {
      Mod::Parent(
        Some(value.to_string()).filter(
          |v| !v.is_empty() && v != "none"
        )
      )
    }
    | "color" | "colour" => {
      Mod::Color(value.to_string())
    }
    | "name" => Mod::Name(value.to_string()),
    | _ => return Ok(None)
  };

  Ok(Some(one_mod))
}

/// Last value wins when a key repeats.
pub(crate) fn last<T>(
  mods: &[Mod],
  pick: impl Fn(&Mod) -> Option<T>
) -> Option<T> {
  let found: Vec<T> =
    mods.iter().filter_map(pick).collect();
  if found.len() > 1 {
    warn!(
      count = found.len(),
      "modifier given more than once; \
       using the last"
    );
  }
  found.into_iter().next_back()
}
