//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Default site the scenarios were written against
pub const DEFAULT_BASE_URL: &str = "http://uitestingplayground.com";

/// Sonda playground: widget scenarios for the UI testing playground
#[derive(Parser, Debug)]
#[command(name = "sonda-playground")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only failures and the summary)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the available scenarios
    List,

    /// Run scenarios
    Run(RunArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Scenario to run (repeatable; all scenarios when omitted)
    #[arg(short, long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Site root; overrides the config file
    #[arg(long, env = "SONDA_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// YAML probe configuration
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Run every scenario at once, each on its own page
    #[arg(long)]
    pub concurrent: bool,

    /// Stop at the first unexpected outcome (sequential runs)
    #[arg(long, conflicts_with = "concurrent")]
    pub fail_fast: bool,

    /// Run against the built-in emulation of the playground instead of a browser
    #[arg(long)]
    pub offline: bool,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Detect terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

impl ColorArg {
    /// Whether output should be colored
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::colors_enabled_stderr(),
        }
    }
}
