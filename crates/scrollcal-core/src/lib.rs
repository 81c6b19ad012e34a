pub mod cli;
pub mod config;
pub mod date;
pub mod grid;
pub mod hooks;
pub mod pagination;
pub mod picker;
pub mod render;
pub mod rules;
pub mod selection;
pub mod session;

use std::ffi::OsString;
use std::io::{
  IsTerminal,
  Read
};

use anyhow::{
  Context,
  anyhow
};
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
    "starting scrollcal"
  );
  debug!(?pre.set_overrides, "preprocessed set overrides");

  let today = match cli.today.as_deref() {
    | Some(raw) => date::parse_date(raw)
      .ok_or_else(|| {
        anyhow!(
          "invalid --today value: {raw}"
        )
      })?,
    | None => date::CalendarDate::today()
  };

  let cfg =
    config::PickerConfig::load_with_overrides_at(
      cli.config.as_deref(),
      pre.set_overrides.into_iter().chain(
        cli
          .set_overrides
          .into_iter()
          .map(|kv| (kv.key, kv.value))
      ),
      today
    )?;

  let renderer = render::Renderer::new(
    cli.color.resolve(),
    cfg.theme
  );
  let picker =
    picker::DatePicker::with_today(
      cfg, today
    )
    .context(
      "failed to create date picker"
    )?;

  let commands = read_commands(cli.rest)?;
  debug!(count = commands.len(), "parsed script");

  let mut session =
    session::Session::new(
      picker, renderer
    );
  session.run(commands)?;

  info!("done");
  Ok(())
}

/// Command-line words win; otherwise a
/// piped stdin script; otherwise show
/// every loaded month.
fn read_commands(
  rest: Vec<OsString>
) -> anyhow::Result<Vec<session::Command>> {
  if !rest.is_empty() {
    let words: Vec<String> = rest
      .iter()
      .map(|w| {
        w.to_string_lossy().into_owned()
      })
      .collect();
    return session::parse_script(&words);
  }

  let stdin = std::io::stdin();
  if !stdin.is_terminal() {
    let mut text = String::new();
    stdin
      .lock()
      .read_to_string(&mut text)
      .context(
        "failed to read script from \
         stdin"
      )?;
    if !text.trim().is_empty() {
      return session::parse_lines(&text);
    }
  }

  Ok(vec![session::Command::Show(None)])
}
