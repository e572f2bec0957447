use std::cmp::Ordering;

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
use super::{
  CommandContext,
  positional,
  resolve_category,
  resolve_project,
  split_verb
};
use crate::id::short_id;
use crate::project::{
  Project,
  ProjectStatus
};
use crate::store::{
  CategoryPatch,
  ProjectCreate,
  ProjectPatch
};

const PROJECT_VERBS: &[&str] = &[
  "list", "add", "info", "modify",
  "status", "delete"
];

const CATEGORY_VERBS: &[&str] =
  &["list", "add", "modify", "delete"];

#[instrument(skip(ctx, args))]
pub(super) fn cmd_project(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let (verb, rest) = split_verb(
    "project",
    args,
    PROJECT_VERBS,
    "list"
  )?;
  info!("command project {verb}");

  match verb {
    | "add" => project_add(ctx, rest),
    | "info" => project_info(ctx, rest),
    | "modify" => {
      project_modify(ctx, rest)
    }
    | "status" => {
      project_status(ctx, rest)
    }
    | "delete" => {
      project_delete(ctx, rest)
    }
    | _ => project_list(ctx, rest)
  }
}

/// Ordered by status, then priority (lower first), then name.
fn compare_projects(
  a: &Project,
  b: &Project
) -> Ordering {
  a.status
    .rank()
    .cmp(&b.status.rank())
    .then(
      a.priority
        .partial_cmp(&b.priority)
        .unwrap_or(Ordering::Equal)
    )
    .then_with(|| a.name.cmp(&b.name))
}

fn project_list(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let parsed = parse_args(args, ctx.now)?;
  parsed.only(
    "project list",
    &["status", "category"]
  )?;
  let data = ctx.store.data();

  let status = status_mod(&parsed)?;
  let category = last(&parsed.mods, |m| {
    match m {
      | Mod::Category(c) => Some(c.clone()),
      | _ => None
    }
  })
  .map(|c| resolve_category(data, &c))
  .transpose()?;

  let mut projects: Vec<&Project> = data
    .projects
    .iter()
    .filter(|p| {
      status.is_none_or(|s| p.status == s)
    })
    .filter(|p| {
      category
        .as_deref()
        .is_none_or(|c| p.has_category(c))
    })
    .collect();
  projects.sort_by(|a, b| {
    compare_projects(a, b)
  });

  ctx
    .renderer
    .project_table(ctx.out, data, &projects)
}

fn project_add(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let parsed = parse_args(args, ctx.now)?;
  parsed.only("project add", &[
    "description",
    "status",
    "priority",
    "categories",
    "category"
  ])?;
  let name =
    parsed.required_text("project name")?;

  let create = ProjectCreate {
    name,
    description: description_mod(&parsed)
      .unwrap_or_default(),
    status: status_mod(&parsed)?,
    priority: priority_mod(&parsed)?,
    category_ids: categories_mod(
      ctx, &parsed
    )?
    .unwrap_or_default()
  };

  let id = ctx.store.add_project(create)?;
  writeln!(
    ctx.out,
    "Created project {}.",
    short_id(&id)
  )?;
  Ok(())
}

fn project_info(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let today = ctx.today();
  let data = ctx.store.data();
  let id = resolve_project(
    data,
    positional(args, 0, "project id")?
  )?;
  let project =
    data.project(&id).ok_or_else(|| {
      anyhow!("project vanished: {id}")
    })?;
  ctx.renderer.project_info(
    ctx.out,
    data,
    project,
    today
  )
}

fn project_modify(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let id = resolve_project(
    ctx.data(),
    positional(args, 0, "project id")?
  )?;
  let parsed =
    parse_args(&args[1..], ctx.now)?;
  parsed.only("project modify", &[
    "name",
    "description",
    "status",
    "priority",
    "categories",
    "category"
  ])?;

  let words = parsed.text();
  let name = last(&parsed.mods, |m| {
    match m {
      | Mod::Name(n) => Some(n.clone()),
      | _ => None
    }
  })
  .or_else(|| {
    Some(words).filter(|w| !w.is_empty())
  });

  let patch = ProjectPatch {
    name,
    description: description_mod(&parsed),
    status: status_mod(&parsed)?,
    priority: priority_mod(&parsed)?,
    category_ids: categories_mod(
      ctx, &parsed
    )?
  };
  ctx.store.update_project(&id, patch)?;
  writeln!(
    ctx.out,
    "Modified project {}.",
    short_id(&id)
  )?;
  Ok(())
}

fn project_status(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let id = resolve_project(
    ctx.data(),
    positional(args, 0, "project id")?
  )?;
  let raw = args[1..].join(" ");
  if raw.trim().is_empty() {
    return Err(anyhow!(
      "missing project status"
    ));
  }
  let status: ProjectStatus = raw.parse()?;
  ctx.store.set_project_status(&id, status)?;
  writeln!(
    ctx.out,
    "Project {} is now {status}.",
    short_id(&id)
  )?;
  Ok(())
}

fn project_delete(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let id = resolve_project(
    ctx.data(),
    positional(args, 0, "project id")?
  )?;
  let removed = ctx.store.delete_project(&id)?;
  writeln!(
    ctx.out,
    "Deleted project {} and {removed} \
     task(s).",
    short_id(&id)
  )?;
  Ok(())
}

fn status_mod(
  parsed: &ParsedArgs
) -> anyhow::Result<Option<ProjectStatus>> {
  last(&parsed.mods, |m| match m {
    | Mod::Status(s) => Some(s.clone()),
    | _ => None
  })
  .map(|s| s.parse())
  .transpose()
}

fn priority_mod(
  parsed: &ParsedArgs
) -> anyhow::Result<Option<f64>> {
  last(&parsed.mods, |m| match m {
    | Mod::Priority(p) => Some(p.clone()),
    | _ => None
  })
  .map(|p| {
    p.parse::<f64>().map_err(|_| {
      anyhow!(
        "project priority must be a \
         number, got: {p}"
      )
    })
  })
  .transpose()
}

fn description_mod(
  parsed: &ParsedArgs
) -> Option<String> {
  last(&parsed.mods, |m| match m {
    | Mod::Description(d) => Some(d.clone()),
    | _ => None
  })
}

/// `categories:a,b` or a single `category:a`, resolved to ids.
fn categories_mod(
  ctx: &CommandContext<'_>,
  parsed: &ParsedArgs
) -> anyhow::Result<Option<Vec<String>>> {
  let raw = last(&parsed.mods, |m| match m {
    | Mod::Categories(list) => {
      Some(list.clone())
    }
    | Mod::Category(one) => {
      Some(vec![one.clone()])
    }
    | _ => None
  });
  raw
    .map(|list| {
      list
        .iter()
        .map(|needle| {
          resolve_category(ctx.data(), needle)
        })
        .collect()
    })
    .transpose()
}

#[instrument(skip(ctx, args))]
pub(super) fn cmd_category(
  ctx: &mut CommandContext<'_>,
  args: &[String]
) -> anyhow::Result<()> {
  let (verb, rest) = split_verb(
    "category",
    args,
    CATEGORY_VERBS,
    "list"
  )?;
  info!("command category {verb}");

  match verb {
    | "add" => {
      let parsed =
        parse_args(rest, ctx.now)?;
      parsed.only("category add", &[
        "color"
      ])?;
      let name = parsed
        .required_text("category name")?;
      let color = color_mod(&parsed)
        .ok_or_else(|| {
          anyhow!(
            "category add needs \
             color:#rrggbb"
          )
        })?;
      let id = ctx
        .store
        .add_category(&name, &color)?;
      writeln!(
        ctx.out,
        "Created category {}.",
        short_id(&id)
      )?;
    }
    | "modify" => {
      let id = resolve_category(
        ctx.data(),
        positional(rest, 0, "category id")?
      )?;
      let parsed =
        parse_args(&rest[1..], ctx.now)?;
      parsed.only("category modify", &[
        "name", "color"
      ])?;
      let words = parsed.text();
      let name = last(&parsed.mods, |m| {
        match m {
          | Mod::Name(n) => Some(n.clone()),
          | _ => None
        }
      })
      .or_else(|| {
        Some(words).filter(|w| !w.is_empty())
      });
      ctx.store.update_category(
        &id,
        CategoryPatch {
          name,
          color: color_mod(&parsed)
        }
      )?;
      writeln!(
        ctx.out,
        "Modified category {}.",
        short_id(&id)
      )?;
    }
    | "delete" => {
      let id = resolve_category(
        ctx.data(),
        positional(rest, 0, "category id")?
      )?;
      ctx.store.delete_category(&id)?;
      writeln!(
        ctx.out,
        "Deleted category {}.",
        short_id(&id)
      )?;
    }
    | _ => {
      ctx.renderer.category_table(
        ctx.out,
        &ctx.store.data().categories
      )?;
    }
  }
  Ok(())
}

pub(super) fn color_mod(
  parsed: &ParsedArgs
) -> Option<String> {
  last(&parsed.mods, |m| match m {
    | Mod::Color(c) => Some(c.clone()),
    | _ => None
  })
}

#[cfg(test)]
mod tests {
  use super::compare_projects;
  use crate::project::{
    Project,
    ProjectStatus
  };

  #[test]
  fn projects_order_by_status_then_priority()
  {
    let mut backlog =
      Project::new("Backlog".to_string());
    backlog.status = ProjectStatus::Backlog;
    let mut later =
      Project::new("Later".to_string());
    later.priority = 5.0;
    let mut sooner =
      Project::new("Sooner".to_string());
    sooner.priority = 1.0;

    let mut all =
      vec![&backlog, &later, &sooner];
    all.sort_by(|a, b| compare_projects(a, b));
    let names: Vec<&str> = all
      .iter()
      .map(|p| p.name.as_str())
      .collect();
    assert_eq!(
      names,
      vec!["Sooner", "Later", "Backlog"]
    );
  }
}
