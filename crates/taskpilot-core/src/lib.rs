pub mod app_data;
pub mod blocks;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod id;
pub mod note;
pub mod note_renderer;
pub mod project;
pub mod render;
pub mod scratchpad;
pub mod store;
pub mod task;
pub mod todo;
pub mod upgrade;
pub mod validate;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskpilot"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.pilotrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let datastore =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let mut store = store::AppStore::new();
  store
    .hydrate(datastore.load()?)
    .context("failed to load data")?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let stdout = io::stdout();
  let mut out = stdout.lock();
  let stdin = io::stdin();
  let mut input = stdin.lock();
  let mut ctx = commands::CommandContext {
    store:       &mut store,
    datastore:   &datastore,
    cfg:         &cfg,
    renderer:    &renderer,
    out:         &mut out,
    input:       &mut input,
    now:         Utc::now(),
    record_undo: true
  };
  commands::execute(&mut ctx, inv)?;

  info!("done");
  Ok(())
}
