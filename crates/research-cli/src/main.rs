//! Command-line interface for stock-research-rs

mod app;
mod output;

use anyhow::Context;
use app::App;
use chrono::{NaiveDate, TimeDelta};
use clap::{Args, Parser, Subcommand};
use research_core::{ConfigUpdate, ProviderKey};
use research_analysis::{DailyScheduler, SymbolOutcome};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "research-cli")]
#[command(about = "Scheduled and on-demand equity research", long_about = None)]
struct Cli {
    /// Database URL, overriding DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daily batch now and wait for it to finish
    RunDaily {
        /// Run date, defaulting to today in the configured time zone
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print the ranked reports once the run has finished
        #[arg(long)]
        show_reports: bool,
    },
    /// Analyze a single symbol
    Analyze { symbol: String },
    /// Inspect runs
    #[command(subcommand)]
    Runs(RunsCommand),
    /// Show the latest analysis of a symbol
    Report {
        symbol: String,

        /// Print the stored report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change the run configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage provider credentials
    #[command(subcommand)]
    Secrets(SecretsCommand),
    /// Check that the rating model answers
    TestModel,
    /// Trigger the daily batch every day at the configured time
    Schedule,
    /// List runs that have been PENDING or RUNNING for too long
    StaleRuns {
        #[arg(long, default_value_t = 6)]
        hours: i64,
    },
    /// Browse stocks
    #[command(subcommand)]
    Stocks(StocksCommand),
}

#[derive(Subcommand, Debug)]
enum RunsCommand {
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Most recent completed daily run
    Latest,
    /// One run with its reports
    Show { id: i64 },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    Set(ConfigSetArgs),
}

#[derive(Args, Debug)]
struct ConfigSetArgs {
    /// Market-cap leaders analyzed per daily run
    #[arg(long)]
    top_n: Option<u32>,

    #[arg(long)]
    universe: Option<String>,

    /// Comma-separated extra symbols; pass an empty string to clear
    #[arg(long, value_delimiter = ',')]
    custom_tickers: Option<Vec<String>>,

    /// Local daily run time, HH:MM
    #[arg(long)]
    run_time: Option<String>,

    /// IANA time zone, e.g. America/New_York
    #[arg(long)]
    time_zone: Option<String>,
}

impl From<ConfigSetArgs> for ConfigUpdate {
    fn from(args: ConfigSetArgs) -> Self {
        Self {
            top_n: args.top_n,
            universe: args.universe,
            custom_tickers: args
                .custom_tickers
                .map(|tickers| tickers.into_iter().filter(|t| !t.trim().is_empty()).collect()),
            daily_run_time_local: args.run_time,
            time_zone: args.time_zone,
        }
    }
}

#[derive(Subcommand, Debug)]
enum SecretsCommand {
    /// Which credentials are available, masked
    Status,
    /// Store an encrypted credential
    Set { provider: String, key: String },
    /// Remove a stored credential
    Clear { provider: String },
}

#[derive(Subcommand, Debug)]
enum StocksCommand {
    List {
        #[arg(long)]
        sector: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    Sectors,
    /// Stock detail with its latest analysis, news, filings and options
    Show { symbol: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let app = App::open(cli.database_url.as_deref()).await?;

    let result = run(&app, cli.command).await;
    app.close().await;
    result
}

async fn run(app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::RunDaily { date, show_reports } => {
            let service = app.service().await?;
            let (run, handle) = match date {
                Some(date) => service.trigger_daily_run(date).await?,
                None => service.trigger_daily_run_today().await?,
            };
            println!("Started run {} for {} ({})", run.id, run.run_date, run.universe);

            let summary = handle.await.context("daily run task panicked")??;
            output::print_summary(&summary);
            if show_reports {
                output::print_reports(&service.queries().run_reports(run.id).await?);
            }
        },
        Commands::Analyze { symbol } => {
            let service = app.service().await?;
            let (stock, handle) = service.trigger_on_demand(&symbol).await?;
            match handle.await.context("analysis task panicked")?? {
                SymbolOutcome::Analyzed { .. } => {
                    if let Some(report) = service.queries().latest_analysis(&stock.symbol).await? {
                        output::print_report(&stock.symbol, &report);
                    }
                },
                SymbolOutcome::Skipped { .. } => {
                    println!("No market data available for {}", stock.symbol);
                },
            }
        },
        Commands::Runs(command) => runs(app, command).await?,
        Commands::Report { symbol, json } => {
            let queries = app.queries();
            match queries.latest_analysis(&symbol).await? {
                Some(report) if json => println!("{}", serde_json::to_string_pretty(&report)?),
                Some(report) => output::print_report(&symbol.trim().to_ascii_uppercase(), &report),
                None => println!("No analysis found for {symbol}"),
            }
        },
        Commands::Config(ConfigCommand::Show) => {
            output::print_config(&app.db().load_or_create_config().await?);
        },
        Commands::Config(ConfigCommand::Set(args)) => {
            let updated = app.db().update_config(args.into()).await?;
            info!(top_n = updated.top_n, universe = %updated.universe, "Configuration updated");
            output::print_config(&updated);
        },
        Commands::Secrets(command) => secrets(app, command).await?,
        Commands::TestModel => {
            let status = app.test_model().await?;
            println!("{}", status.message);
            if !status.success {
                anyhow::bail!("model connection test failed");
            }
        },
        Commands::Schedule => {
            let scheduler = DailyScheduler::new(app.service().await?);
            tokio::select! {
                result = scheduler.run() => result?,
                _ = tokio::signal::ctrl_c() => info!("Scheduler stopped"),
            }
        },
        Commands::StaleRuns { hours } => {
            let runs = app.queries().stale_runs(TimeDelta::hours(hours)).await?;
            if runs.is_empty() {
                println!("No stale runs");
            } else {
                output::print_runs(&runs);
            }
        },
        Commands::Stocks(command) => stocks(app, command).await?,
    }

    Ok(())
}

async fn runs(app: &App, command: RunsCommand) -> anyhow::Result<()> {
    let queries = app.queries();
    match command {
        RunsCommand::List { limit, offset } => output::print_runs(&queries.list_runs(limit, offset).await?),
        RunsCommand::Latest => match queries.latest_completed_run().await? {
            Some(run) => output::print_runs(&[run]),
            None => println!("No completed daily run yet"),
        },
        RunsCommand::Show { id } => {
            let run = queries
                .run_by_id(id)
                .await?
                .with_context(|| format!("run {id} not found"))?;
            output::print_runs(std::slice::from_ref(&run));
            output::print_reports(&queries.run_reports(run.id).await?);
        },
    }
    Ok(())
}

async fn secrets(app: &App, command: SecretsCommand) -> anyhow::Result<()> {
    let credentials = app.credentials();
    match command {
        SecretsCommand::Status => output::print_credentials(&credentials.status().await?),
        SecretsCommand::Set { provider, key } => {
            let provider: ProviderKey = provider.parse()?;
            credentials.store(provider, Some(key.as_str())).await?;
            println!("Stored credential for {provider}");
        },
        SecretsCommand::Clear { provider } => {
            let provider: ProviderKey = provider.parse()?;
            credentials.store(provider, None).await?;
            println!("Cleared stored credential for {provider}");
        },
    }
    Ok(())
}

async fn stocks(app: &App, command: StocksCommand) -> anyhow::Result<()> {
    let queries = app.queries();
    match command {
        StocksCommand::List {
            sector,
            limit,
            offset,
        } => output::print_stocks(&queries.list_stocks(sector.as_deref(), limit, offset).await?),
        StocksCommand::Sectors => {
            for sector in queries.list_sectors().await? {
                println!("{sector}");
            }
        },
        StocksCommand::Show { symbol } => output::print_stock_detail(&queries.stock_detail(&symbol).await?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::parse_from([
            "research-cli",
            "config",
            "set",
            "--top-n",
            "5",
            "--custom-tickers",
            "xom,cvx",
        ]);
        let Commands::Config(ConfigCommand::Set(args)) = cli.command else {
            panic!("expected config set");
        };

        let update = ConfigUpdate::from(args);
        assert_eq!(update.top_n, Some(5));
        assert_eq!(update.custom_tickers, Some(vec!["xom".to_string(), "cvx".to_string()]));
        assert!(update.time_zone.is_none());
    }

    #[test]
    fn test_parse_run_daily_date() {
        let cli = Cli::parse_from(["research-cli", "run-daily", "--date", "2024-06-01"]);
        assert!(matches!(
            cli.command,
            Commands::RunDaily {
                date: Some(_),
                show_reports: false
            }
        ));
    }
}
