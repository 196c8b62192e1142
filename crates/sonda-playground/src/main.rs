//! Sonda playground CLI
//!
//! ## Usage
//!
//! ```bash
//! sonda-playground list                      # List scenarios
//! sonda-playground run --offline             # Run everything against the emulation
//! sonda-playground run -s click --json       # One scenario, JSON summary on stdout
//! ```

use clap::Parser;
use sonda::{
    init_tracing, launch_page_factory, BrowserConfig, FailureMode, LogFormat, PageFactory,
    ProbeConfig, RunMode, ScenarioRunner, TracingConfig,
};
use sonda_playground::{
    render_listing, scenarios, site, Cli, CliError, CliResult, Commands, Reporter, RunArgs,
    DEFAULT_BASE_URL,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let use_color = cli.color.should_color();
    let reporter = Reporter::new(use_color, cli.quiet);

    match cli.command {
        Commands::List => {
            print!("{}", render_listing(&scenarios::all()));
            Ok(())
        }
        Commands::Run(ref args) => {
            let config = build_config(args)?;
            init_tracing(&tracing_config(&cli, &config, use_color))?;
            run_scenarios(args, config, &reporter)
        }
    }
}

fn build_config(args: &RunArgs) -> CliResult<ProbeConfig> {
    let mut config = match &args.config {
        Some(path) => ProbeConfig::from_file(path)?,
        None => ProbeConfig::new(),
    };
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url.clone());
    } else if config.base_url.is_none() {
        config = config.with_base_url(DEFAULT_BASE_URL);
    }
    config.validate()?;
    Ok(config)
}

fn tracing_config(cli: &Cli, config: &ProbeConfig, use_color: bool) -> TracingConfig {
    let base = config.tracing.clone().with_ansi(use_color);
    if cli.quiet {
        return base.with_filter("warn");
    }
    match cli.verbose {
        0 => base,
        1 => base.with_filter("info,sonda=debug"),
        _ => base.with_filter("trace").with_format(LogFormat::Text),
    }
}

fn run_scenarios(args: &RunArgs, config: ProbeConfig, reporter: &Reporter) -> CliResult<()> {
    let selected = scenarios::select(&args.scenarios)?;
    let mode = if args.concurrent {
        RunMode::Concurrent
    } else {
        RunMode::Sequential
    };
    let failure_mode = if args.fail_fast {
        FailureMode::AndonCord
    } else {
        FailureMode::CollectAll
    };
    debug!(
        base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        count = selected.len(),
        offline = args.offline,
        ?mode,
        "selected scenarios"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(async {
        let factory: Arc<dyn PageFactory> = if args.offline {
            reporter.info("running against the offline emulation");
            Arc::new(site::page_factory())
        } else {
            let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
            reporter.info(&format!("launching Chromium for {base_url}"));
            launch_page_factory(BrowserConfig::default())
                .await
                .map_err(|e| {
                    CliError::config(format!(
                        "{e}; pass --offline to use the emulation, or rebuild with --features browser"
                    ))
                })?
        };
        reporter.header(&format!("Running {} scenarios", selected.len()));
        let runner = ScenarioRunner::new(factory, config)
            .with_mode(mode)
            .with_failure_mode(failure_mode);
        Ok::<_, CliError>(runner.run_all(&selected).await)
    })?;

    for report in &summary.reports {
        reporter.report(report);
    }
    reporter.summary(&summary);
    if args.json {
        println!("{}", summary.to_json()?);
    }

    if summary.all_ok() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: summary.not_ok_count(),
            total: summary.reports.len(),
        })
    }
}
