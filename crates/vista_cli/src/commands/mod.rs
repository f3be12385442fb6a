//! CLI command definitions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vista_core::{ViewConfig, ViewSettings};

pub mod check;
pub mod render;

/// vista - render server-side views from the command line
#[derive(Parser)]
#[command(name = "vista")]
#[command(version, about = "vista - render server-side views from the command line")]
#[command(long_about = r#"
vista renders views with their layout, partials and helpers, the same way a
web handler would, and prints the result.

COMMANDS:
  render  → Render one view to stdout
  check   → Compile every template under a root and report syntax errors

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Render failure
  4 - Syntax errors found
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a view and print the body
    Render(render::RenderArgs),

    /// Compile-check every template under the views root
    Check(check::CheckArgs),
}

/// Where the views live: a settings file, or a root directory.
#[derive(clap::Args, Debug, Clone)]
pub struct RootArgs {
    /// Views root directory
    #[arg(short, long, env = "VISTA_ROOT")]
    pub root: Option<PathBuf>,

    /// YAML settings file (root, layout, cache, extension, helpers)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl RootArgs {
    /// Build the engine configuration. `--root` overrides the file's root.
    pub fn load(&self) -> Result<ViewConfig> {
        let mut settings = match &self.config {
            Some(path) => ViewSettings::load(path)
                .with_context(|| format!("Failed to load settings from {:?}", path))?,
            None => ViewSettings::default(),
        };
        if let Some(root) = &self.root {
            settings.root = root.clone();
        }
        if !settings.root.is_dir() {
            anyhow::bail!("Views root not found: {:?}", settings.root);
        }
        Ok(settings.into_config())
    }
}
