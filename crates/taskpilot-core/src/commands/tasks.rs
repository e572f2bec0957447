use std::cmp::{
  Ordering,
  Reverse
};

use anyhow::anyhow;
use tracing::{
  debug,
  info,
  instrument
};

use super::modifiers::{
  Mod,
  ParsedArgs,
  last,
  parse_args
};
use super::{
  CommandContext,
  positional,
  resolve_id,
  resolve_project,
  resolve_task,
  split_verb
};
use crate::app_data::AppData;
use crate::error::EntityKind;
use crate::id::short_id;
use crate::store::{
  TaskCreate,
  TaskPatch
};
use crate::task::{
  Task,
  TaskPriority,
  TaskStatus
};

const TASK_VERBS: &[&str] = &[
  "list", "add", "info", "modify",
  "status", "start", "done", "move",
  "delete"
];

const SUBTASK_VERBS: &[&str] =
  &["list", "add", "toggle", "delete"];

const LOG_VERBS: &[&str] =
  &["list", "add", "delete"];

const TASK_MODS: &[&str] = &[
  "project",
  "priority",
  "status",
  "points",
  "deadline",
  "link",
  "description"
];

#[instrument(skip(ctx, args))]
pub(super) fn cmd_task(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let (verb, rest) =
    split_verb("task", args, TASK_VERBS, "list")?;
  info!("command task {verb}");

  match verb {
    | "add" => task_add(ctx, rest),
    | "info" => task_info(ctx, rest),
    | "modify" => task_modify(ctx, rest),
    | "status" => {
      let raw = rest
        .get(1..)
        .map(|words| words.join(" "))
        .unwrap_or_default();
      if raw.trim().is_empty() {
        return Err(anyhow!(
          "missing task status"
        ));
      }
      task_set_status(ctx, rest, raw.parse()?)
    }
    | "start" => {
      task_set_status(
        ctx,
        rest,
        TaskStatus::InProgress
      )
    }
    | "done" => {
      task_set_status(
        ctx,
        rest,
        TaskStatus::Done
      )
    }
    | "move" => task_move(ctx, rest),
    | "delete" => task_delete(ctx, rest),
    | _ => task_list(ctx, rest)
  }
}

/// Open tasks first, earliest deadline first (none last), then higher
/// priority.
fn compare_tasks(
  a: &Task,
  b: &Task
) -> Ordering {
  let done = |t: &Task| t.status == TaskStatus::Done;
  done(a)
    .cmp(&done(b))
    .then_with(|| {
      match (&a.deadline, &b.deadline) {
        | (Some(x), Some(y)) => x.cmp(y),
        | (Some(_), None) => Ordering::Less,
        | (None, Some(_)) => Ordering::Greater,
        | (None, None) => Ordering::Equal
      }
    })
    .then_with(|| {
      Reverse(a.priority)
        .cmp(&Reverse(b.priority))
    })
}

/// Done tasks are hidden unless asked for by `status:` or the word `all`.
fn task_list(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let parsed = parse_args(args, ctx.now)?;
  parsed.only("task list", &[
    "project", "status", "priority"
  ])?;
  let show_all =
    parsed.words.iter().any(|w| w == "all");
  let today = ctx.today();
  let data = ctx.store.data();

  let project = project_mod(&parsed)
    .map(|p| resolve_project(data, &p))
    .transpose()?;
  let status = status_mod(&parsed)?;
  let priority = priority_mod(&parsed)?;

  let mut tasks: Vec<&Task> = data
    .tasks
    .iter()
    .filter(|t| {
      project
        .as_deref()
        .is_none_or(|p| t.project_id == p)
    })
    .filter(|t| match status {
      | Some(s) => t.status == s,
      | None => {
        show_all
          || t.status != TaskStatus::Done
      }
    })
    .filter(|t| {
      priority.is_none_or(|p| t.priority == p)
    })
    .collect();
  tasks.sort_by(|a, b| compare_tasks(a, b));
  debug!(shown = tasks.len(), "listing tasks");

  ctx
    .renderer
    .task_table(ctx.out, data, &tasks, today)
}

fn task_add(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let parsed = parse_args(args, ctx.now)?;
  parsed.only("task add", TASK_MODS)?;
  let title =
    parsed.required_text("task title")?;
  let project = project_mod(&parsed)
    .ok_or_else(|| {
      anyhow!("task add needs project:<id>")
    })?;
  let project_id =
    resolve_project(ctx.data(), &project)?;

  let create = TaskCreate {
    title,
    description: description_mod(&parsed)
      .unwrap_or_default(),
    project_id,
    status: status_mod(&parsed)?,
    priority: priority_mod(&parsed)?,
    deadline: last(&parsed.mods, |m| {
      match m {
        | Mod::Deadline(d) => Some(*d),
        | _ => None
      }
    })
    .flatten(),
    story_points: points_mod(&parsed),
    link: last(&parsed.mods, |m| match m {
      | Mod::Link(l) => Some(l.clone()),
      | _ => None
    })
    .flatten()
  };

  let id = ctx.store.add_task(create)?;
  writeln!(
    ctx.out,
    "Created task {}.",
    short_id(&id)
  )?;
  Ok(())
}

fn task_info(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let today = ctx.today();
  let data = ctx.store.data();
  let task = find_task(
    data,
    positional(args, 0, "task id")?
  )?;
  ctx
    .renderer
    .task_info(ctx.out, data, task, today)
}

/// Words after the id replace the title; a `project:` moves the task.
fn task_modify(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let id = resolve_task(
    ctx.data(),
    positional(args, 0, "task id")?
  )?;
  let parsed =
    parse_args(&args[1..], ctx.now)?;
  parsed.only("task modify", TASK_MODS)?;

  let patch = TaskPatch {
    title: Some(parsed.text())
      .filter(|t| !t.trim().is_empty()),
    description: description_mod(&parsed),
    status: status_mod(&parsed)?,
    priority: priority_mod(&parsed)?,
    deadline: last(&parsed.mods, |m| {
      match m {
        | Mod::Deadline(d) => Some(*d),
        | _ => None
      }
    }),
    story_points: points_mod(&parsed),
    link: last(&parsed.mods, |m| match m {
      | Mod::Link(l) => Some(l.clone()),
      | _ => None
    })
  };
  let target = project_mod(&parsed)
    .map(|p| resolve_project(ctx.data(), &p))
    .transpose()?;

  ctx.store.update_task(&id, patch)?;
  if let Some(project_id) = target {
    ctx.store.move_task(&id, &project_id)?;
  }
  writeln!(
    ctx.out,
    "Modified task {}.",
    short_id(&id)
  )?;
  Ok(())
}

fn task_set_status(
  ctx: &mut CommandContext<'_>,
  args: &[String],
  status: TaskStatus
) -> anyhow::Result<()> {
  let id = resolve_task(
    ctx.data(),
    positional(args, 0, "task id")?
  )?;
  ctx.store.set_task_status(&id, status)?;
  writeln!(
    ctx.out,
    "Task {} is now {status}.",
    short_id(&id)
  )?;
  Ok(())
}

fn task_move(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let id = resolve_task(
    ctx.data(),
    positional(args, 0, "task id")?
  )?;
  let project_id = resolve_project(
    ctx.data(),
    positional(args, 1, "target project")?
  )?;
  ctx.store.move_task(&id, &project_id)?;
  writeln!(
    ctx.out,
    "Moved task {} to project {}.",
    short_id(&id),
    short_id(&project_id)
  )?;
  Ok(())
}

fn task_delete(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let id = resolve_task(
    ctx.data(),
    positional(args, 0, "task id")?
  )?;
  ctx.store.delete_task(&id)?;
  writeln!(
    ctx.out,
    "Deleted task {}.",
    short_id(&id)
  )?;
  Ok(())
}

#[instrument(skip(ctx, args))]
pub(super) fn cmd_subtask(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let (verb, rest) = split_verb(
    "subtask",
    args,
    SUBTASK_VERBS,
    "list"
  )?;
  info!("command subtask {verb}");

  let task_id = resolve_task(
    ctx.data(),
    positional(rest, 0, "task id")?
  )?;

  match verb {
    | "add" => {
      let parsed =
        parse_args(&rest[1..], ctx.now)?;
      parsed.only("subtask add", &["points"])?;
      let title =
        parsed.required_text("subtask title")?;
      let points =
        points_mod(&parsed).unwrap_or(0.0);
      let id = ctx
        .store
        .add_subtask(&task_id, &title, points)?;
      writeln!(
        ctx.out,
        "Created subtask {}.",
        short_id(&id)
      )?;
    }
    | "toggle" => {
      let id = resolve_subtask(
        ctx.data(),
        &task_id,
        positional(rest, 1, "subtask id")?
      )?;
      let completed = ctx
        .store
        .toggle_subtask(&task_id, &id)?;
      writeln!(
        ctx.out,
        "Subtask {} {}.",
        short_id(&id),
        if completed {
          "completed"
        } else {
          "reopened"
        }
      )?;
    }
    | "delete" => {
      let id = resolve_subtask(
        ctx.data(),
        &task_id,
        positional(rest, 1, "subtask id")?
      )?;
      ctx
        .store
        .delete_subtask(&task_id, &id)?;
      writeln!(
        ctx.out,
        "Deleted subtask {}.",
        short_id(&id)
      )?;
    }
    | _ => {
      let today = ctx.today();
      let data = ctx.store.data();
      let task = find_task(data, &task_id)?;
      ctx
        .renderer
        .task_info(ctx.out, data, task, today)?;
    }
  }
  Ok(())
}

#[instrument(skip(ctx, args))]
pub(super) fn cmd_log(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let (verb, rest) =
    split_verb("log", args, LOG_VERBS, "list")?;
  info!("command log {verb}");

  let task_id = resolve_task(
    ctx.data(),
    positional(rest, 0, "task id")?
  )?;

  match verb {
    | "add" => {
      let content = rest[1..].join(" ");
      if content.trim().is_empty() {
        return Err(anyhow!(
          "log text is required"
        ));
      }
      let id = ctx.store.add_log(
        &task_id,
        content.trim(),
        ctx.now
      )?;
      writeln!(
        ctx.out,
        "Logged {} on task {}.",
        short_id(&id),
        short_id(&task_id)
      )?;
    }
    | "delete" => {
      let task = find_task(ctx.data(), &task_id)?;
      let id = resolve_id(
        EntityKind::Log,
        positional(rest, 1, "log id")?,
        task.logs.iter().map(|l| l.id.as_str())
      )?;
      ctx.store.delete_log(&task_id, &id)?;
      writeln!(
        ctx.out,
        "Deleted log {}.",
        short_id(&id)
      )?;
    }
    | _ => {
      let task = find_task(ctx.store.data(), &task_id)?;
      if task.logs.is_empty() {
        writeln!(ctx.out, "No logs.")?;
      }
      for log in &task.logs {
        writeln!(
          ctx.out,
          "{} {}  {}",
          short_id(&log.id),
          crate::datetime::display_timestamp(
            &log.created_at
          ),
          log.content
        )?;
      }
    }
  }
  Ok(())
}

fn find_task<'a>(
  data: &'a AppData,
  needle: &str
) -> anyhow::Result<&'a Task> {
  let id = resolve_task(data, needle)?;
  data
    .task(&id)
    .ok_or_else(|| anyhow!("task vanished: {id}"))
}

fn resolve_subtask(
  data: &AppData,
  task_id: &str,
  needle: &str
) -> anyhow::Result<String> {
  let task = find_task(data, task_id)?;
  resolve_id(
    EntityKind::Subtask,
    needle,
    task.subtasks.iter().map(|s| s.id.as_str())
  )
}

fn project_mod(
  parsed: &ParsedArgs
) -> Option<String> {
  last(&parsed.mods, |m| match m {
    | Mod::Project(p) => Some(p.clone()),
    | _ => None
  })
}

fn status_mod(
  parsed: &ParsedArgs
) -> anyhow::Result<Option<TaskStatus>> {
  last(&parsed.mods, |m| match m {
    | Mod::Status(s) => Some(s.clone()),
    | _ => None
  })
  .map(|s| s.parse())
  .transpose()
}

fn priority_mod(
  parsed: &ParsedArgs
) -> anyhow::Result<Option<TaskPriority>> {
  last(&parsed.mods, |m| match m {
    | Mod::Priority(p) => Some(p.clone()),
    | _ => None
  })
  .map(|p| p.parse())
  .transpose()
}

fn points_mod(
  parsed: &ParsedArgs
) -> Option<f64> {
  last(&parsed.mods, |m| match m {
    | Mod::Points(p) => Some(*p),
    | _ => None
  })
}

fn description_mod(
  parsed: &ParsedArgs
) -> Option<String> {
  last(&parsed.mods, |m| match m {
    | Mod::Description(d) => Some(d.clone()),
    | _ => None
  })
}
