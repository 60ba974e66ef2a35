//! chargestat - Bill EV charging session logs against a time-of-use tariff

use chargestat::{
    aggregation::Aggregator,
    cli::{Cli, Command, InputArgs, build_billing_config, build_session_filter},
    cost_allocator::CostAllocator,
    data_loader::DataLoader,
    error::Result,
    output::get_formatter,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Helper function to create an aggregator from the parsed flags
fn create_aggregator(cli: &Cli, show_progress: bool) -> Result<Aggregator> {
    let schedule = Arc::new(cli.contract.schedule());
    let allocator =
        Arc::new(CostAllocator::new(schedule).with_weekend_rule(!cli.no_weekend_rule));
    let config = build_billing_config(cli)?;

    info!(
        "Billing under the {} contract at {} kW",
        cli.contract, cli.contract_power
    );

    Ok(Aggregator::new(allocator, config).with_progress(show_progress))
}

/// Fall back to the current directory when no paths were given
fn resolve_paths(input: &InputArgs) -> Vec<PathBuf> {
    if input.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        input.paths.clone()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first to check for the verbose flag
    let cli = Cli::parse();

    // Initialize logging. Default is quiet; --verbose turns on the crate's
    // informational output, RUST_LOG still wins when set.
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("chargestat=info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Handle commands
    match &cli.command {
        Some(Command::Summary(input)) => {
            info!("Running billing summary report");

            let show_progress = !cli.json && is_terminal::is_terminal(std::io::stdout());
            let loader = DataLoader::new(resolve_paths(input));
            let aggregator = create_aggregator(&cli, show_progress)?;
            let filter = build_session_filter(&cli)?;

            let sessions = loader.load_sessions();
            let batch = if cli.parallel {
                aggregator.aggregate_parallel(sessions, &filter).await?
            } else {
                aggregator.aggregate(sessions, &filter).await?
            };
            let summary = aggregator.summarize(&batch);

            let formatter = get_formatter(cli.json);
            println!("{}", formatter.format_summary(&summary));
        }

        Some(Command::Sessions(input)) => {
            info!("Running per-session billing report");

            let show_progress = !cli.json && is_terminal::is_terminal(std::io::stdout());
            let loader = DataLoader::new(resolve_paths(input));
            let aggregator = create_aggregator(&cli, show_progress)?;
            let filter = build_session_filter(&cli)?;

            let sessions = loader.load_sessions();
            let batch = if cli.parallel {
                aggregator.aggregate_parallel(sessions, &filter).await?
            } else {
                aggregator.aggregate(sessions, &filter).await?
            };
            let summary = aggregator.summarize(&batch);

            let formatter = get_formatter(cli.json);
            println!("{}", formatter.format_sessions(&batch.sessions, &summary));
        }

        Some(Command::Hourly(input)) => {
            info!("Running hourly profile report");

            let show_progress = !cli.json && is_terminal::is_terminal(std::io::stdout());
            let loader = DataLoader::new(resolve_paths(input));
            let aggregator = create_aggregator(&cli, show_progress)?;
            let filter = build_session_filter(&cli)?;

            let sessions = loader.load_sessions();
            let batch = if cli.parallel {
                aggregator.aggregate_parallel(sessions, &filter).await?
            } else {
                aggregator.aggregate(sessions, &filter).await?
            };
            let summary = aggregator.summarize(&batch);
            let profile = aggregator.hourly_profile(&batch);

            let formatter = get_formatter(cli.json);
            println!("{}", formatter.format_hourly(&profile, &summary));
        }

        Some(Command::Tariff) => {
            info!("Printing tariff tables for the {} contract", cli.contract);

            let schedule = cli.contract.schedule();
            let formatter = get_formatter(cli.json);
            println!("{}", formatter.format_tariff(&schedule, !cli.no_weekend_rule));
        }

        None => {
            // Default to the summary report over the current directory
            info!("No command specified, running billing summary");

            let show_progress = !cli.json && is_terminal::is_terminal(std::io::stdout());
            let loader = DataLoader::new(vec![PathBuf::from(".")]);
            let aggregator = create_aggregator(&cli, show_progress)?;
            let filter = build_session_filter(&cli)?;

            let sessions = loader.load_sessions();
            let batch = if cli.parallel {
                aggregator.aggregate_parallel(sessions, &filter).await?
            } else {
                aggregator.aggregate(sessions, &filter).await?
            };
            let summary = aggregator.summarize(&batch);

            let formatter = get_formatter(cli.json);
            println!("{}", formatter.format_summary(&summary));
        }
    }

    Ok(())
}
