use anyhow::{
  Context,
  anyhow
};
use tracing::{
  info,
  instrument,
  warn
};

use super::{
  CommandContext,
  known_command_names,
  split_verb
};
use crate::app_data::AppData;
use crate::scratchpad::{
  ChangeEvent,
  Scratchpad
};
use crate::validate::{
  has_errors,
  validate
};

const SCRATCH_VERBS: &[&str] = &[
  "show", "set", "append", "clear", "edit"
];

/// Every edit goes through the scratchpad view as one change event carrying
/// the full new text.
#[instrument(skip(ctx, args))]
pub(super) fn cmd_scratch(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let (verb, rest) = split_verb(
    "scratch",
    args,
    SCRATCH_VERBS,
    "show"
  )?;
  info!("command scratch {verb}");

  let next = match verb {
    | "set" => rest.join(" "),
    | "append" => {
      let current =
        ctx.store.scratchpad_content();
      let addition = rest.join(" ");
      if current.is_empty()
        || current.ends_with('\n')
      {
        format!("{current}{addition}")
      } else {
        format!("{current}\n{addition}")
      }
    }
    | "clear" => String::new(),
    | "edit" => {
      let mut text = String::new();
      ctx
        .input
        .read_to_string(&mut text)
        .context("failed to read scratchpad text from stdin")?;
      text
    }
    | _ => {
      let field =
        Scratchpad::new(&mut *ctx.store)
          .render();
      return ctx
        .renderer
        .scratchpad(ctx.out, &field);
    }
  };

  let applied = Scratchpad::new(
    &mut *ctx.store
  )
  .handle_change(ChangeEvent::new(next))?;
  if applied {
    writeln!(ctx.out, "Scratchpad updated.")?;
  } else {
    warn!("scratchpad not ready; change dropped");
  }
  Ok(())
}

#[instrument(skip(ctx))]
pub(super) fn cmd_check(
  ctx: &mut CommandContext<'_>
) -> anyhow::Result<()> {
  info!("command check");

  let violations = validate(ctx.store.data());
  ctx
    .renderer
    .violations(ctx.out, &violations)?;
  if has_errors(&violations) {
    return Err(anyhow!(
      "data has integrity errors"
    ));
  }
  Ok(())
}

#[instrument(skip(ctx))]
pub(super) fn cmd_undo(
  ctx: &mut CommandContext<'_>
) -> anyhow::Result<()> {
  info!("command undo");

  let store = &mut *ctx.store;
  let restored = ctx
    .datastore
    .pop_undo_snapshot_with(|previous| {
      store.restore(previous)
    })?;
  if restored.is_none() {
    writeln!(
      ctx.out,
      "No undo transactions available."
    )?;
    return Ok(());
  }
  ctx.record_undo = false;

  writeln!(ctx.out, "Undo completed.")?;
  Ok(())
}

#[instrument(skip(ctx))]
pub(super) fn cmd_export(
  ctx: &mut CommandContext<'_>
) -> anyhow::Result<()> {
  info!("command export");

  let json = serde_json::to_string_pretty(
    ctx.store.data()
  )?;
  writeln!(ctx.out, "{json}")?;
  Ok(())
}

/// Replaces the whole document with one read from stdin.
#[instrument(skip(ctx))]
pub(super) fn cmd_import(
  ctx: &mut CommandContext<'_>
) -> anyhow::Result<()> {
  info!("command import");

  let mut raw = String::new();
  ctx
    .input
    .read_to_string(&mut raw)
    .context("failed to read stdin")?;
  if raw.trim().is_empty() {
    return Err(anyhow!(
      "import expects a JSON document on \
       stdin"
    ));
  }

  let data: AppData = serde_json::from_str(
    &raw
  )
  .context("failed to parse imported JSON")?;
  let warnings = ctx.store.replace(data)?;
  for warning in &warnings {
    writeln!(ctx.out, "{warning}")?;
  }

  let data = ctx.store.data();
  writeln!(
    ctx.out,
    "Imported {} project(s), {} task(s), \
     {} todo(s).",
    data.projects.len(),
    data.tasks.len(),
    data.todo.todos.len()
  )?;
  Ok(())
}

pub(super) fn cmd_help(
  ctx: &mut CommandContext<'_>
) -> anyhow::Result<()> {
  let help = "\
usage: pilot [--data DIR] [--pilotrc FILE] [--rc KEY=VALUE]... [-v|-q] <command> [args...]

  project  [list|add|info|modify|status|delete]
  category [list|add|modify|delete]
  task     [list|add|info|modify|status|start|done|move|delete]
  subtask  [list|add|toggle|delete] <task> ...
  log      [list|add|delete] <task> ...
  note     [list|add|show|edit|rename|move|toggle|main|unmain|delete] <project> ...
  todo     [list|add|info|done|activate|backlog|move|edit|notes|category|log|unlog|delete|clear]
           [categories|category-add|category-delete]
  scratch  [show|set|append|clear|edit]
  check | undo | export | import | help | version

Attributes are key:value tokens: project: priority: status: points:
deadline: link: description: categories: category: parent: color: name:
Ids may be shortened to any unique prefix. Commands may be abbreviated.";
  writeln!(ctx.out, "{help}")?;
  writeln!(
    ctx.out,
    "\ncommands: {}",
    known_command_names().join(", ")
  )?;

  writeln!(ctx.out, "\nsettings:")?;
  for (key, value) in ctx.cfg.sorted() {
    writeln!(ctx.out, "  {key} = {value}")?;
  }
  Ok(())
}
