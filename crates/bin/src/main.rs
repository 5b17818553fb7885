//! Recife CLI binary.
//!
//! Runs the excess return (ROE vs. Ke) study of Brazilian banks.

mod integration;
mod logging;

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use integration::cache_manager::{cache_path, open_cache, print_cache_info};
use integration::pipeline::{FetchConfig, beta_for, market_parameters, run_pipeline, write_outputs};
use logging::{LogFormat, init_logging};
use recife::AppConfig;
use recife_output::{format_pct, summary_ascii_table};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "recife")]
#[command(about = "Recife: excess return (ROE vs. Ke) of Brazilian banks", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for application events (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full study and write the report bundle
    Run {
        #[command(flatten)]
        period: PeriodArgs,

        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        cache: CacheArgs,

        /// Console output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the tracked banks
    Banks,

    /// Estimate the beta of a bank or any ticker against the index
    Beta {
        /// Ticker, B3 code or bank name
        ticker: String,

        #[command(flatten)]
        period: PeriodArgs,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Show annual SELIC and index returns
    Selic {
        #[command(flatten)]
        period: PeriodArgs,

        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Show cache location and statistics
    Cache {
        /// Delete every cached value
        #[arg(long)]
        clear: bool,
    },
}

/// Study period overrides.
#[derive(Args)]
struct PeriodArgs {
    /// First fiscal year
    #[arg(long)]
    start_year: Option<i32>,

    /// Last fiscal year
    #[arg(long)]
    end_year: Option<i32>,
}

impl PeriodArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(start) = self.start_year {
            config.period.start_year = start;
        }
        if let Some(end) = self.end_year {
            config.period.end_year = end;
        }
    }
}

/// Cache behavior.
#[derive(Args)]
struct CacheArgs {
    /// Disable caching (always fetch fresh data)
    #[arg(long)]
    no_cache: bool,

    /// Force refresh cached data
    #[arg(long, conflicts_with = "no_cache")]
    refresh: bool,
}

impl CacheArgs {
    const fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            use_cache: !self.no_cache,
            force_refresh: self.refresh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            period,
            output,
            cache,
            format,
        } => {
            period.apply(&mut config);
            if let Some(dir) = output {
                config.output.dir = dir;
            }
            config.validate()?;
            run_study(&config, cache.fetch_config(), format).await?;
        }
        Commands::Banks => list_banks(&config),
        Commands::Beta {
            ticker,
            period,
            cache,
        } => {
            period.apply(&mut config);
            config.validate()?;
            show_beta(&config, &ticker, cache.fetch_config()).await?;
        }
        Commands::Selic { period, cache } => {
            period.apply(&mut config);
            config.validate()?;
            show_market(&config, cache.fetch_config()).await?;
        }
        Commands::Cache { clear } => manage_cache(clear)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, recife::ConfigError> {
    path.map_or_else(|| Ok(AppConfig::default()), AppConfig::load)
}

fn print_banner(title: &str) {
    println!("\n╔{}╗", "═".repeat(62));
    println!("║{:^62}║", title);
    println!("╚{}╝\n", "═".repeat(62));
}

async fn run_study(
    config: &AppConfig,
    fetch: FetchConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = format == OutputFormat::Text;

    if text {
        print_banner("EXCESS RETURN: ROE vs. Ke");
        println!(
            "Period: {}-{}",
            config.period.start_year, config.period.end_year
        );
        println!(
            "Banks: {}",
            config
                .banks
                .iter()
                .map(|b| b.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("Model: Ke = Rf + β (Rm - Rf), Rf = annual SELIC, Rm = {}", config.market.index_ticker);
        if fetch.use_cache {
            print_cache_info();
            if fetch.force_refresh {
                println!("  Mode: Force refresh (re-fetching all data)");
            }
        } else {
            println!("  Cache: Disabled");
        }
        println!();
    }

    // DFP archives are the slow step
    let pb = if text {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("█▓░"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };
    pb.set_message("Checking statement cache...");

    let report = match run_pipeline(config, &fetch, Some(&pb)).await {
        Ok(report) => report,
        Err(e) => {
            if !pb.is_finished() {
                pb.abandon_with_message("Failed!");
            }
            return Err(e.into());
        }
    };

    let written = write_outputs(config, &report)?;

    match format {
        OutputFormat::Text => {
            for valuation in &report.valuations {
                print!("{}", valuation.to_ascii_table());
            }
            print!("{}", summary_ascii_table(&report.summaries));
            println!(
                "\nWrote {} files to {}",
                written.len(),
                config.output.dir.display()
            );
            for path in &written {
                println!("  {}", path.display());
            }
        }
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    Ok(())
}

fn list_banks(config: &AppConfig) {
    let universe = config.universe();

    println!("\nTracked banks ({})", universe.len());
    println!("{}", "=".repeat(60));
    println!("{:<18} {:<8} {:<11} {:<20}", "Bank", "B3", "Ticker", "CNPJ");
    println!("{}", "-".repeat(60));
    for bank in universe.banks() {
        println!(
            "{:<18} {:<8} {:<11} {:<20}",
            bank.name,
            bank.b3_code(),
            bank.ticker,
            bank.cnpj
        );
    }
}

async fn show_beta(
    config: &AppConfig,
    query: &str,
    fetch: FetchConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let universe = config.universe();
    let (name, symbol) = universe.find(query).map_or_else(
        || (query.to_uppercase(), query.to_uppercase()),
        |bank| (bank.name.clone(), bank.ticker.clone()),
    );

    let estimate = beta_for(config, &fetch, &symbol).await?;

    print_banner(&format!("BETA: {}", name));
    println!(
        "Period: {}-{} (monthly returns vs. {})",
        config.period.start_year, config.period.end_year, config.market.index_ticker
    );
    println!("{}", "-".repeat(40));
    println!("{:<20} {:>12.4}", "Beta", estimate.beta);
    println!("{:<20} {:>12.4}", "Alpha (monthly)", estimate.alpha);
    println!("{:<20} {:>12.4}", "R²", estimate.r_squared);
    println!("{:<20} {:>12.4}", "Std. error", estimate.std_error);
    println!("{:<20} {:>12}", "Observations", estimate.observations);

    Ok(())
}

async fn show_market(config: &AppConfig, fetch: FetchConfig) -> Result<(), Box<dyn std::error::Error>> {
    let market = market_parameters(config, &fetch).await?;

    print_banner("SELIC AND INDEX RETURNS");
    println!("{:<8} {:>10} {:>10} {:>10}", "Ano", "Rf", "Rm", "Rm - Rf");
    println!("{}", "-".repeat(41));
    for params in &market {
        println!(
            "{:<8} {:>10} {:>10} {:>10}",
            params.year,
            format_pct(params.risk_free),
            format_pct(params.market_return),
            format_pct(params.equity_risk_premium())
        );
    }

    Ok(())
}

fn manage_cache(clear: bool) -> Result<(), Box<dyn std::error::Error>> {
    if clear {
        open_cache()?.clear_all()?;
        println!("Cache cleared: {}", cache_path().display());
        return Ok(());
    }

    println!("\nCache");
    print_cache_info();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["recife", "run"], None, None)]
    #[case(&["recife", "run", "--start-year", "2015"], Some(2015), None)]
    #[case(&["recife", "selic", "--start-year", "2018", "--end-year", "2020"], Some(2018), Some(2020))]
    fn test_period_overrides(
        #[case] args: &[&str],
        #[case] start: Option<i32>,
        #[case] end: Option<i32>,
    ) {
        let cli = Cli::try_parse_from(args).unwrap();
        let period = match cli.command {
            Commands::Run { period, .. } | Commands::Selic { period, .. } => period,
            _ => unreachable!(),
        };

        let mut config = AppConfig::default();
        period.apply(&mut config);
        assert_eq!(config.period.start_year, start.unwrap_or(2010));
        assert_eq!(config.period.end_year, end.unwrap_or(2024));
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "recife",
            "--log-format",
            "json",
            "run",
            "--output",
            "reports",
            "--refresh",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Run {
                output,
                cache,
                format,
                ..
            } => {
                assert_eq!(output, Some(PathBuf::from("reports")));
                let fetch = cache.fetch_config();
                assert!(fetch.use_cache && fetch.force_refresh);
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_no_cache_conflicts_with_refresh() {
        assert!(Cli::try_parse_from(["recife", "run", "--no-cache", "--refresh"]).is_err());
    }

    #[test]
    fn test_beta_requires_ticker() {
        assert!(Cli::try_parse_from(["recife", "beta"]).is_err());
        let cli = Cli::try_parse_from(["recife", "beta", "itub4", "--no-cache"]).unwrap();
        match cli.command {
            Commands::Beta { ticker, cache, .. } => {
                assert_eq!(ticker, "itub4");
                assert!(!cache.fetch_config().use_cache);
            }
            _ => panic!("expected beta"),
        }
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        assert_eq!(load_config(None).unwrap(), AppConfig::default());
    }
}
