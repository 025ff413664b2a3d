use std::env;
use std::io;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use fleetsync_core::config::{DEFAULT_CONFIG_FILE, MISSING_OPTIONS_MESSAGE};
use fleetsync_core::oauth::{authorize_interactively, Authorizer};
use fleetsync_core::{
    run_sync, sink_for, Config, ConfigError, EquipmentSource, OutputMode, PublishTimestamps,
    SamsaraClient,
};
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Publish fleet equipment stats as an XML snapshot or spreadsheet", long_about = None)]
struct Cli {
    /// Config file (defaults to $FLEETSYNC_CONFIG, then ./fleetimporter.config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured output mode (file or spreadsheet)
    #[arg(long, global = true)]
    output_mode: Option<OutputMode>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
    /// Fetch equipment stats and publish them (default)
    #[default]
    Run,
    /// Fetch equipment stats and print them without publishing
    Preview,
    /// Authorize spreadsheet access and cache the credential
    Authorize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or_default() {
        Command::Run => handle_run(&config),
        Command::Preview => handle_preview(&config),
        Command::Authorize => handle_authorize(&config),
    }
}

/// Missing options end the process with status 1 before anything touches the network.
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .or_else(|| env::var_os("FLEETSYNC_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(ConfigError::Missing { fields }) => {
            println!("{MISSING_OPTIONS_MESSAGE}");
            tracing::error!(missing = ?fields, "Configuration incomplete");
            process::exit(1);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to load {}", path.display()))
        }
    };

    Ok(match cli.output_mode {
        Some(mode) => config.with_output_mode(mode),
        None => config,
    })
}

fn handle_run(config: &Config) -> Result<()> {
    let run_id = Uuid::new_v4();
    let span = info_span!("sync", %run_id, output_mode = %config.output_mode);
    let _guard = span.enter();

    if config.output_mode == OutputMode::Spreadsheet {
        ensure_authorized(config)?;
    }

    let source = SamsaraClient::new(config).context("failed to set up Samsara client")?;
    let mut sink = sink_for(config).context("failed to set up output destination")?;
    let timestamps = PublishTimestamps::capture();

    info!("Starting fleet sync");
    let summary = run_sync(&source, sink.as_mut(), &timestamps)?;
    info!(
        count = summary.record_count,
        destination = %summary.destination,
        updated = %summary.updated,
        "Fleet sync finished"
    );
    Ok(())
}

fn handle_preview(config: &Config) -> Result<()> {
    let source = SamsaraClient::new(config).context("failed to set up Samsara client")?;
    let records = source.fetch_equipment()?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Hours", "Km"]);
    for record in &records {
        table.add_row(vec![
            record.name.clone(),
            record.hours_display(),
            record.km_display(),
        ]);
    }

    println!("{table}");
    println!("{} vehicles", records.len());
    Ok(())
}

fn handle_authorize(config: &Config) -> Result<()> {
    let authorizer = Authorizer::from_config(config)?;
    authorize_interactively(&authorizer, io::stdin().lock(), io::stdout())?;
    println!(
        "Credentials stored in {}",
        authorizer.store().path().display()
    );
    Ok(())
}

/// First spreadsheet run with no cached credential blocks on the operator.
fn ensure_authorized(config: &Config) -> Result<()> {
    let authorizer = Authorizer::from_config(config)?;
    if !authorizer.has_cached_token()? {
        authorize_interactively(&authorizer, io::stdin().lock(), io::stdout())?;
    }
    Ok(())
}
