use std::env;

use color_eyre::eyre::{Context, Result};
use log::debug;
use quire::{
  cli::{Cli, Commands},
  render,
};
use quire_config::Config;

fn main() -> Result<()> {
  let cli = Cli::parse_args();

  color_eyre::config::HookBuilder::default()
    .display_location_section(cli.debug)
    .display_env_section(cli.debug)
    .install()?;

  // Relative paths in config files and arguments are taken from here on
  if let Some(workdir) = &cli.workdir {
    env::set_current_dir(workdir).wrap_err_with(|| {
      format!("Failed to enter working directory {}", workdir.display())
    })?;
  }

  env_logger::Builder::new()
    .filter_level(cli.level_filter())
    .write_style(env_logger::WriteStyle::Always)
    .init();

  let config = Config::load(&cli.config_files, &cli.config_overrides)
    .wrap_err("Failed to load configuration")?;
  debug!("Configuration: {config:?}");

  match &cli.command {
    Commands::Render { target } => render::run(target, &config),
  }
}
