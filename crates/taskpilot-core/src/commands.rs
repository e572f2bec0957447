mod io_and_views;
mod modifiers;
mod notes;
mod projects;
mod tasks;
mod todos;

use std::io::{Read, Write};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::app_data::AppData;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::local_date;
use crate::error::EntityKind;
use crate::id::{PrefixError, resolve_prefix};
use crate::render::Renderer;
use crate::store::AppStore;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "project", "task", "subtask", "log", "note", "category", "todo", "scratch", "check",
        "undo", "export", "import", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything one command runs against.
pub struct CommandContext<'a> {
    pub store: &'a mut AppStore,
    pub datastore: &'a DataStore,
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub out: &'a mut dyn Write,
    pub input: &'a mut dyn Read,
    pub now: DateTime<Utc>,
    /// Cleared by commands whose change must not itself be undoable.
    pub record_undo: bool,
}

impl CommandContext<'_> {
    pub fn today(&self) -> NaiveDate {
        local_date(self.now)
    }

    pub fn data(&self) -> &AppData {
        self.store.data()
    }
}

/// Runs one invocation and, when it changed the store, journals the previous
/// document for undo and saves the new one.
#[instrument(skip(ctx, inv), fields(command = %inv.command))]
pub fn execute(ctx: &mut CommandContext<'_>, inv: Invocation) -> anyhow::Result<()> {
    let revision = ctx.store.revision();
    let before = ctx.store.data().clone();

    dispatch(ctx, &inv)?;

    if ctx.store.revision() == revision {
        debug!("store unchanged, nothing to save");
        return Ok(());
    }
    if ctx.record_undo {
        ctx.datastore
            .push_undo_snapshot(&before)
            .context("failed to record undo snapshot")?;
    }
    ctx.datastore.save(ctx.store.data())?;
    info!(revision = ctx.store.revision(), "saved");
    Ok(())
}

#[instrument(skip(ctx, inv))]
pub fn dispatch(ctx: &mut CommandContext<'_>, inv: &Invocation) -> anyhow::Result<()> {
    let args = inv.args.as_slice();
    debug!(command = %inv.command, ?args, "dispatching command");

    match inv.command.as_str() {
        "project" => projects::cmd_project(ctx, args),
        "category" => projects::cmd_category(ctx, args),
        "task" => tasks::cmd_task(ctx, args),
        "subtask" => tasks::cmd_subtask(ctx, args),
        "log" => tasks::cmd_log(ctx, args),
        "note" => notes::cmd_note(ctx, args),
        "todo" => todos::cmd_todo(ctx, args),
        "scratch" => io_and_views::cmd_scratch(ctx, args),
        "check" => io_and_views::cmd_check(ctx),
        "undo" => io_and_views::cmd_undo(ctx),
        "export" => io_and_views::cmd_export(ctx),
        "import" => io_and_views::cmd_import(ctx),
        "help" => io_and_views::cmd_help(ctx),
        "version" => {
            writeln!(ctx.out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Splits off a sub-command verb, expanding unique prefixes. No verb at all
/// yields `default`.
fn split_verb<'a, 'b>(
    command: &str,
    args: &'b [String],
    verbs: &[&'a str],
    default: &'a str,
) -> anyhow::Result<(&'a str, &'b [String])> {
    let Some((first, rest)) = args.split_first() else {
        return Ok((default, args));
    };
    let verb = expand_command_abbrev(first.as_str(), verbs)
        .ok_or_else(|| anyhow!("{command}: unknown action {first}; expected one of {}", verbs.join(", ")))?;
    Ok((verb, rest))
}

/// Positional argument `idx`, or an error naming what was expected.
fn positional<'b>(args: &'b [String], idx: usize, what: &str) -> anyhow::Result<&'b str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing {what}"))
}

/// Resolves an id or unique id prefix.
fn resolve_id<'a, I>(kind: EntityKind, needle: &str, ids: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    resolve_prefix(needle, ids)
        .map(str::to_string)
        .with_context(|| format!("cannot resolve {kind} {needle:?}"))
}

/// Like [`resolve_id`], but a needle matching no id may also name the entity
/// exactly (case-insensitive).
fn resolve_named<'a, I>(kind: EntityKind, needle: &str, entries: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)> + Clone,
{
    match resolve_prefix(needle, entries.clone().into_iter().map(|(id, _)| id)) {
        Ok(id) => Ok(id.to_string()),
        Err(PrefixError::NoMatch(_)) => {
            let mut named = entries
                .into_iter()
                .filter(|(_, name)| name.eq_ignore_ascii_case(needle.trim()));
            match (named.next(), named.next()) {
                (Some((id, _)), None) => Ok(id.to_string()),
                (Some(_), Some(_)) => Err(anyhow!("{kind} name {needle:?} is ambiguous")),
                (None, _) => Err(anyhow!("no {kind} matches {needle:?}")),
            }
        }
        Err(err) => Err(anyhow::Error::new(err).context(format!("cannot resolve {kind} {needle:?}"))),
    }
}

fn resolve_project(data: &AppData, needle: &str) -> anyhow::Result<String> {
    resolve_named(
        EntityKind::Project,
        needle,
        data.projects.iter().map(|p| (p.id.as_str(), p.name.as_str())),
    )
}

fn resolve_task(data: &AppData, needle: &str) -> anyhow::Result<String> {
    resolve_id(EntityKind::Task, needle, data.tasks.iter().map(|t| t.id.as_str()))
}

fn resolve_category(data: &AppData, needle: &str) -> anyhow::Result<String> {
    resolve_named(
        EntityKind::Category,
        needle,
        data.categories.iter().map(|c| (c.id.as_str(), c.name.as_str())),
    )
}

#[cfg(test)]
mod tests {
    use super::{expand_command_abbrev, known_command_names, resolve_project};
    use crate::app_data::AppData;
    use crate::project::Project;

    #[test]
    fn command_abbreviations() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("proj", &known), Some("project"));
        assert_eq!(expand_command_abbrev("t", &known), None);
        assert_eq!(expand_command_abbrev("ta", &known), Some("task"));
        assert_eq!(expand_command_abbrev("todo", &known), Some("todo"));
    }

    #[test]
    fn projects_resolve_by_prefix_or_name() {
        let mut data = AppData::default();
        let mut a = Project::new("Garden".to_string());
        a.id = "abc123".to_string();
        let mut b = Project::new("Garage".to_string());
        b.id = "abd456".to_string();
        data.projects = vec![a, b];

        assert_eq!(resolve_project(&data, "abc").expect("prefix"), "abc123");
        assert_eq!(resolve_project(&data, "garage").expect("name"), "abd456");
        assert!(resolve_project(&data, "ab").is_err());
        assert!(resolve_project(&data, "shed").is_err());
    }
}
