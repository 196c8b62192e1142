//! Sonda Playground
//!
//! Widget scenarios for the UI testing playground, runnable against a real
//! Chromium (`browser` feature) or the built-in offline emulation.
//!
//! ```bash
//! sonda-playground list
//! sonda-playground run --offline
//! sonda-playground run -s ajax_data -s shadow_dom --base-url http://localhost:8080
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod error;
mod output;
pub mod scenarios;
pub mod site;

pub use commands::{Cli, ColorArg, Commands, RunArgs, DEFAULT_BASE_URL};
pub use error::{CliError, CliResult};
pub use output::{render_listing, Reporter};
