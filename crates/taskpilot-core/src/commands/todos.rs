use anyhow::anyhow;
use tracing::{
  info,
  instrument
};

use super::modifiers::{
  Mod,
  ParsedArgs,
  last,
  parse_args
};
use super::projects::color_mod;
use super::{
  CommandContext,
  positional,
  resolve_id,
  resolve_named,
  split_verb
};
use crate::error::EntityKind;
use crate::id::short_id;
use crate::todo::{
  TodoState,
  TodoStatus
};

const TODO_VERBS: &[&str] = &[
  "list",
  "add",
  "info",
  "done",
  "activate",
  "backlog",
  "move",
  "edit",
  "notes",
  "category",
  "log",
  "unlog",
  "delete",
  "clear",
  "categories",
  "category-add",
  "category-delete"
];

#[instrument(skip(ctx, args))]
pub(super) fn cmd_todo(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let (verb, rest) =
    split_verb("todo", args, TODO_VERBS, "list")?;
  info!("command todo {verb}");

  match verb {
    | "add" => todo_add(ctx, rest),
    | "clear" => {
      let removed =
        ctx.store.clear_done_todos()?;
      writeln!(
        ctx.out,
        "Cleared {removed} done todo(s)."
      )?;
      Ok(())
    }
    | "categories" => {
      ctx.renderer.todo_categories(
        ctx.out,
        &ctx.store.data().todo
      )
    }
    | "category-add" => {
      let parsed = parse_args(rest, ctx.now)?;
      parsed.only("todo category-add", &[
        "color"
      ])?;
      let name = parsed
        .required_text("category name")?;
      let color =
        color_mod(&parsed).ok_or_else(|| {
          anyhow!(
            "todo category-add needs \
             color:#rrggbb"
          )
        })?;
      let id = ctx
        .store
        .add_todo_category(&name, &color)?;
      writeln!(
        ctx.out,
        "Created todo category {}.",
        short_id(&id)
      )?;
      Ok(())
    }
    | "category-delete" => {
      let id = resolve_todo_category(
        &ctx.store.data().todo,
        positional(rest, 0, "category id")?
      )?;
      let cascade =
        rest[1..].iter().any(|w| w == "cascade");
      let removed = ctx
        .store
        .delete_todo_category(&id, cascade)?;
      writeln!(
        ctx.out,
        "Deleted todo category {} and \
         {removed} todo(s).",
        short_id(&id)
      )?;
      Ok(())
    }
    | "list" => {
      ctx
        .renderer
        .todo_list(ctx.out, &ctx.store.data().todo)
    }
    | _ => todo_item_verb(ctx, verb, rest)
  }
}

fn todo_add(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let parsed = parse_args(args, ctx.now)?;
  parsed.only("todo add", &[
    "category", "status"
  ])?;
  let text = parsed.required_text("todo text")?;
  let state = &ctx.store.data().todo;

  let category_id = match category_mod(&parsed)
  {
    | Some(needle) => {
      resolve_todo_category(state, &needle)?
    }
    | None => {
      match state.categories.as_slice() {
        | [only] => only.id.clone(),
        | [] => {
          return Err(anyhow!(
            "create a todo category first \
             (todo category-add)"
          ));
        }
        | _ => {
          return Err(anyhow!(
            "todo add needs category:<id>"
          ));
        }
      }
    }
  };

  let status = match last(&parsed.mods, |m| {
    match m {
      | Mod::Status(s) => Some(s.clone()),
      | _ => None
    }
  }) {
    | Some(raw) => raw.parse()?,
    | None => {
      ctx
        .cfg
        .get("todo.default.status")
        .map(|raw| raw.parse::<TodoStatus>())
        .transpose()?
        .unwrap_or(TodoStatus::Active)
    }
  };

  let id = ctx.store.add_todo(
    &text,
    &category_id,
    status,
    ctx.now
  )?;
  writeln!(
    ctx.out,
    "Created todo {} ({status}).",
    short_id(&id)
  )?;
  Ok(())
}

/// Verbs that act on one todo, named by its first argument.
fn todo_item_verb(
  ctx: &mut CommandContext<'_>,
  verb: &str,
  args: &[String]
) -> anyhow::Result<()> {
  let id = resolve_todo(
    &ctx.store.data().todo,
    positional(args, 0, "todo id")?
  )?;
  let rest = &args[1..];
  let short = short_id(&id).to_string();

  match verb {
    | "info" => {
      let state = &ctx.store.data().todo;
      let todo = state.todo(&id).ok_or_else(|| {
        anyhow!("todo vanished: {id}")
      })?;
      ctx.renderer.todo_info(ctx.out, state, todo)?;
    }
    | "done" => {
      let done = ctx.store.toggle_todo_done(&id)?;
      writeln!(
        ctx.out,
        "Todo {short} marked {}.",
        if done { "done" } else { "not done" }
      )?;
    }
    | "activate" | "backlog" => {
      let status = if verb == "activate" {
        TodoStatus::Active
      } else {
        TodoStatus::Backlog
      };
      ctx.store.set_todo_status(&id, status)?;
      writeln!(
        ctx.out,
        "Todo {short} moved to {status}."
      )?;
    }
    | "move" => {
      let raw = positional(rest, 0, "position")?;
      let position: usize =
        raw.parse().map_err(|_| {
          anyhow!(
            "position must be a positive \
             number, got: {raw}"
          )
        })?;
      let index =
        position.checked_sub(1).ok_or_else(|| {
          anyhow!("positions start at 1")
        })?;
      ctx.store.move_active_todo(&id, index)?;
      writeln!(
        ctx.out,
        "Todo {short} is now #{position}."
      )?;
    }
    | "edit" => {
      let text = rest.join(" ");
      ctx.store.update_todo_text(&id, &text)?;
      writeln!(ctx.out, "Updated todo {short}.")?;
    }
    | "notes" => {
      ctx
        .store
        .set_todo_notes(&id, &rest.join(" "))?;
      writeln!(
        ctx.out,
        "Updated notes of todo {short}."
      )?;
    }
    | "category" => {
      let category_id = resolve_todo_category(
        &ctx.store.data().todo,
        positional(rest, 0, "category id")?
      )?;
      ctx
        .store
        .set_todo_category(&id, &category_id)?;
      writeln!(
        ctx.out,
        "Todo {short} moved to category {}.",
        short_id(&category_id)
      )?;
    }
    | "log" => {
      let content = rest.join(" ");
      if content.trim().is_empty() {
        return Err(anyhow!(
          "log text is required"
        ));
      }
      let log_id = ctx.store.add_todo_log(
        &id,
        content.trim(),
        ctx.now
      )?;
      writeln!(
        ctx.out,
        "Logged {} on todo {short}.",
        short_id(&log_id)
      )?;
    }
    | "unlog" => {
      let todo = ctx
        .store
        .data()
        .todo
        .todo(&id)
        .ok_or_else(|| {
          anyhow!("todo vanished: {id}")
        })?;
      let log_id = resolve_id(
        EntityKind::TodoLog,
        positional(rest, 0, "log id")?,
        todo.logs.iter().map(|l| l.id.as_str())
      )?;
      ctx.store.delete_todo_log(&id, &log_id)?;
      writeln!(
        ctx.out,
        "Deleted log {}.",
        short_id(&log_id)
      )?;
    }
    | "delete" => {
      ctx.store.delete_todo(&id)?;
      writeln!(ctx.out, "Deleted todo {short}.")?;
    }
    | other => {
      return Err(anyhow!(
        "todo: unhandled action {other}"
      ));
    }
  }
  Ok(())
}

fn category_mod(
  parsed: &ParsedArgs
) -> Option<String> {
  last(&parsed.mods, |m| match m {
    | Mod::Category(c) => Some(c.clone()),
    | _ => None
  })
}

fn resolve_todo(
  state: &TodoState,
  needle: &str
) -> anyhow::Result<String> {
  resolve_id(
    EntityKind::Todo,
    needle,
    state.todos.iter().map(|t| t.id.as_str())
  )
}

fn resolve_todo_category(
  state: &TodoState,
  needle: &str
) -> anyhow::Result<String> {
  resolve_named(
    EntityKind::TodoCategory,
    needle,
    state
      .categories
      .iter()
      .map(|c| (c.id.as_str(), c.name.as_str()))
  )
}
