//! Change Poller CLI
//!
//! Polls the configured pages once and reports what changed.

use std::collections::HashSet;
use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser, error::ErrorKind};
use change_poller::{
    config::ConfigStore,
    context::RunContext,
    error::{AppError, Result},
    models::{Driver, Event, PageSpec, PartialConfig},
    pipeline::{apply_migrations, run_poller},
    services::{build_fetcher, build_notifiers},
    storage::LocalStateStore,
    utils::log::Verbosity,
};

/// change-poller - Web Page Change Poller
#[derive(Parser, Debug)]
#[command(
    name = "change-poller",
    version,
    about = "Polls web pages and reports changes in selected content"
)]
struct Cli {
    /// Add a page to watch: URL, CSS selector and an optional regex
    #[arg(
        short,
        long = "page",
        num_args = 2..=3,
        value_names = ["URL", "SELECTOR", "PATTERN"],
        action = ArgAction::Append
    )]
    pages: Vec<Vec<String>>,

    /// Page fetcher to use
    #[arg(short = 'b', long, value_enum)]
    driver: Option<Driver>,

    /// Notification to run when changes are found (repeatable)
    #[arg(short, long = "event", value_enum)]
    events: Vec<Event>,

    /// File the `log` event appends changes to
    #[arg(short, long)]
    log_path: Option<PathBuf>,

    /// Directory holding per-page state files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Config file to use instead of the default one
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Save the merged configuration
    #[arg(short = 'S', long)]
    save_config: bool,

    /// Print the merged configuration to stderr
    #[arg(short = 'P', long)]
    print_config: bool,

    /// Do not poll pages
    #[arg(short, long)]
    no_run: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Page definitions given with `--page`.
    fn page_specs(&self) -> Result<Vec<PageSpec>> {
        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(self.pages.len());

        for values in &self.pages {
            let spec = match values.as_slice() {
                [url, selector] => PageSpec::new(url, selector),
                [url, selector, pattern] => PageSpec::new(url, selector).with_pattern(pattern),
                _ => {
                    return Err(AppError::validation(
                        "--page takes a URL, a selector and an optional pattern",
                    ));
                }
            };
            spec.validate()?;
            if !seen.insert(spec.url.clone()) {
                return Err(AppError::validation(format!(
                    "Page \"{}\" given more than once",
                    spec.url
                )));
            }
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Configuration values given on the command line.
    fn partial_config(&self) -> Result<PartialConfig> {
        let pages = self.page_specs()?;
        Ok(PartialConfig {
            driver: self.driver,
            events: (!self.events.is_empty()).then(|| self.events.clone()),
            log_path: self.log_path.clone(),
            data_dir: self.data_dir.clone(),
            pages: (!pages.is_empty()).then_some(pages),
            ..Default::default()
        })
    }

    fn should_run(&self) -> bool {
        !(self.no_run || self.save_config || self.print_config)
    }
}

/// Initialize logging for the chosen verbosity.
fn init_logging(verbosity: Verbosity) {
    env_logger::Builder::new()
        .filter_level(verbosity.level_filter())
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

/// Resolves when the user asks the run to stop.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose)?;
    init_logging(verbosity);
    log::debug!("Log verbosity: {}", verbosity);

    let overrides = match cli.partial_config() {
        Ok(overrides) => overrides,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    let config_store = ConfigStore::resolve(cli.config_file.as_deref())?;
    let loaded = config_store.load(overrides)?;
    log::info!("Loaded configuration from {}", config_store.path().display());

    if loaded.needs_save || cli.save_config {
        config_store.save(&loaded.config)?;
    }

    if cli.print_config {
        eprint!("{}", loaded.config.to_toml()?);
    }

    if !cli.should_run() {
        return Ok(());
    }

    let ctx = RunContext::new(loaded)?;
    let state_store = LocalStateStore::new(&ctx.data_dir);
    state_store.ensure_root().await?;

    let fetcher = build_fetcher(&ctx.config)?;
    let notifiers = build_notifiers(&ctx.config);

    let summary = run_poller(
        &ctx,
        fetcher.as_ref(),
        &state_store,
        &notifiers,
        shutdown_signal(),
    )
    .await;

    let mut config = ctx.config;
    if apply_migrations(&mut config, &summary.migrations) {
        config_store.save(&config)?;
    }

    summary.notified
}
