use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  instrument
};

use super::modifiers::{
  Mod,
  last,
  parse_args
};
use super::{
  CommandContext,
  positional,
  resolve_id,
  resolve_project,
  split_verb
};
use crate::app_data::AppData;
use crate::blocks::{
  blocks_from_text,
  encode_blocks
};
use crate::error::EntityKind;
use crate::id::short_id;
use crate::project::Project;
use crate::store::NotePatch;

const NOTE_VERBS: &[&str] = &[
  "list", "add", "show", "edit",
  "rename", "move", "toggle", "main",
  "unmain", "delete"
];

#[instrument(skip(ctx, args))]
pub(super) fn cmd_note(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let (verb, rest) =
    split_verb("note", args, NOTE_VERBS, "list")?;
  info!("command note {verb}");

  let project_id = resolve_project(
    ctx.data(),
    positional(rest, 0, "project id")?
  )?;
  let rest = &rest[1..];

  match verb {
    | "add" => {
      let parsed = parse_args(rest, ctx.now)?;
      parsed.only("note add", &["parent"])?;
      let title =
        parsed.required_text("note title")?;
      let parent = last(&parsed.mods, |m| {
        match m {
          | Mod::Parent(p) => Some(p.clone()),
          | _ => None
        }
      })
      .flatten()
      .map(|needle| {
        resolve_note(ctx.data(), &project_id, &needle)
      })
      .transpose()?;

      let id = ctx.store.add_note(
        &project_id,
        &title,
        "",
        parent.as_deref()
      )?;
      writeln!(
        ctx.out,
        "Created note {}.",
        short_id(&id)
      )?;
    }
    | "show" => {
      let data = ctx.store.data();
      let note_id = resolve_note(
        data,
        &project_id,
        positional(rest, 0, "note id")?
      )?;
      let note = find_project(data, &project_id)?
        .note(&note_id)
        .ok_or_else(|| {
          anyhow!("note vanished: {note_id}")
        })?;
      ctx.renderer.note_view(ctx.out, note)?;
    }
    | "edit" => {
      let note_id = resolve_note(
        ctx.data(),
        &project_id,
        positional(rest, 0, "note id")?
      )?;
      let mut text = String::new();
      ctx
        .input
        .read_to_string(&mut text)
        .context("failed to read note text from stdin")?;
      let blocks = blocks_from_text(&text);
      let content = if blocks.is_empty() {
        String::new()
      } else {
        encode_blocks(&blocks)?
      };
      debug!(blocks = blocks.len(), "note text parsed");

      ctx.store.update_note(
        &project_id,
        &note_id,
        NotePatch {
          title:   None,
          content: Some(content)
        }
      )?;
      writeln!(
        ctx.out,
        "Updated note {} ({} block(s)).",
        short_id(&note_id),
        blocks.len()
      )?;
    }
    | "rename" => {
      let note_id = resolve_note(
        ctx.data(),
        &project_id,
        positional(rest, 0, "note id")?
      )?;
      let title = rest[1..].join(" ");
      ctx.store.update_note(
        &project_id,
        &note_id,
        NotePatch {
          title:   Some(title),
          content: None
        }
      )?;
      writeln!(
        ctx.out,
        "Renamed note {}.",
        short_id(&note_id)
      )?;
    }
    | "move" => {
      let note_id = resolve_note(
        ctx.data(),
        &project_id,
        positional(rest, 0, "note id")?
      )?;
      let target =
        positional(rest, 1, "new parent (or none)")?;
      let parent = if target == "none" {
        None
      } else {
        Some(resolve_note(
          ctx.data(),
          &project_id,
          target
        )?)
      };
      ctx.store.move_note(
        &project_id,
        &note_id,
        parent.as_deref()
      )?;
      writeln!(
        ctx.out,
        "Moved note {}.",
        short_id(&note_id)
      )?;
    }
    | "toggle" => {
      let note_id = resolve_note(
        ctx.data(),
        &project_id,
        positional(rest, 0, "note id")?
      )?;
      let collapsed = ctx
        .store
        .toggle_note_collapsed(
          &project_id,
          &note_id
        )?;
      writeln!(
        ctx.out,
        "Note {} {}.",
        short_id(&note_id),
        if collapsed {
          "collapsed"
        } else {
          "expanded"
        }
      )?;
    }
    | "main" => {
      let note_id = resolve_note(
        ctx.data(),
        &project_id,
        positional(rest, 0, "note id")?
      )?;
      ctx
        .store
        .set_main_note(&project_id, &note_id)?;
      writeln!(
        ctx.out,
        "Note {} is now the main note.",
        short_id(&note_id)
      )?;
    }
    | "unmain" => {
      ctx.store.clear_main_note(&project_id)?;
      writeln!(ctx.out, "Main note cleared.")?;
    }
    | "delete" => {
      let note_id = resolve_note(
        ctx.data(),
        &project_id,
        positional(rest, 0, "note id")?
      )?;
      ctx
        .store
        .delete_note(&project_id, &note_id)?;
      writeln!(
        ctx.out,
        "Deleted note {}.",
        short_id(&note_id)
      )?;
    }
    | _ => {
      let expand_all =
        rest.iter().any(|w| w == "all");
      let project = find_project(
        ctx.store.data(),
        &project_id
      )?;
      ctx.renderer.note_tree(
        ctx.out,
        project,
        expand_all
      )?;
    }
  }
  Ok(())
}

fn find_project<'a>(
  data: &'a AppData,
  project_id: &str
) -> anyhow::Result<&'a Project> {
  data.project(project_id).ok_or_else(|| {
    anyhow!("project vanished: {project_id}")
  })
}

fn resolve_note(
  data: &AppData,
  project_id: &str,
  needle: &str
) -> anyhow::Result<String> {
  let project = find_project(data, project_id)?;
  resolve_id(
    EntityKind::Note,
    needle,
    project.notes.iter().map(|n| n.id.as_str())
  )
}
