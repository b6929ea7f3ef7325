#![allow(clippy::print_stdout, reason = "Reports generated files")]
use std::{
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Command, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate_to};
use clap_mangen::Man;
use quire::cli::Cli;

/// Name of the installed binary.
const BIN: &str = "quire";

#[derive(Parser)]
#[command(author, version, about)]
struct Xtask {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate shell completions and manpages for the quire CLI
  Dist {
    /// Output directory for generated files.
    #[arg(short, long, default_value = "dist")]
    output_dir: PathBuf,

    /// Only generate shell completions.
    #[arg(long, conflicts_with = "manpage_only")]
    completions_only: bool,

    /// Only generate manpages.
    #[arg(long, conflicts_with = "completions_only")]
    manpage_only: bool,
  },
}

fn main() -> Result<()> {
  let Commands::Dist {
    output_dir,
    completions_only,
    manpage_only,
  } = Xtask::parse().command;

  if !manpage_only {
    generate_completions(&output_dir.join("completions"))?;
  }
  if !completions_only {
    generate_manpages(&output_dir.join("man"))?;
  }
  Ok(())
}

/// Completions for every shell clap_complete supports.
fn generate_completions(dir: &Path) -> Result<()> {
  fs::create_dir_all(dir)
    .with_context(|| format!("Failed to create {}", dir.display()))?;
  let mut cmd = Cli::command();
  for shell in Shell::value_variants() {
    let path = generate_to(*shell, &mut cmd, BIN, dir)
      .with_context(|| format!("Failed to generate {shell} completions"))?;
    println!("Wrote {}", path.display());
  }
  Ok(())
}

/// `quire.1` plus one page per subcommand, e.g. `quire-render-html.1`.
fn generate_manpages(dir: &Path) -> Result<()> {
  fs::create_dir_all(dir)
    .with_context(|| format!("Failed to create {}", dir.display()))?;
  let mut cmd = Cli::command();
  cmd.build();
  write_manpage(dir, &cmd, BIN)
}

fn write_manpage(dir: &Path, cmd: &Command, name: &str) -> Result<()> {
  let path = dir.join(format!("{name}.1"));
  let mut file = fs::File::create(&path)
    .with_context(|| format!("Failed to create {}", path.display()))?;
  Man::new(cmd.clone())
    .title(name)
    .render(&mut file)
    .with_context(|| format!("Failed to render {}", path.display()))?;
  println!("Wrote {}", path.display());

  for sub in cmd
    .get_subcommands()
    .filter(|sub| !sub.is_hide_set() && sub.get_name() != "help")
  {
    write_manpage(dir, sub, &format!("{name}-{}", sub.get_name()))?;
  }
  Ok(())
}
