use chrono::Utc;
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stakescope::{
    cache::DEFAULT_TTL_MS,
    clock::{Clock, SystemClock},
    config::Config,
    event_source,
    policy::NegativeDurationPolicy,
    source::DEFAULT_MOCK_LATENCY_MS,
    staking::ProcessedStakingData,
    StakingAnalyzer,
};

#[derive(Parser)]
#[command(
    name = "stakescope",
    about = "NFT staking analytics: unique stakers, NFTs staked and staking durations per contract."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single staking contract
    Analyze {
        /// Staking contract address
        #[arg(long)]
        contract: String,

        /// JSON file of exported staking events (default: demonstration data)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output format: json or summary
        #[arg(long, default_value = "summary")]
        format: String,

        /// Save the JSON result to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Handling of events that end before they start: pass-through, clamp or reject
        #[arg(long)]
        negative_durations: Option<NegativeDurationPolicy>,

        /// Simulated latency of the demonstration source in milliseconds
        #[arg(long)]
        latency_ms: Option<u64>,
    },

    /// Analyze several contracts from a file of addresses (one per line)
    Scan {
        /// Path to file with contract addresses
        #[arg(long)]
        input: PathBuf,

        /// JSON file of exported staking events (default: demonstration data)
        #[arg(long)]
        events: Option<PathBuf>,

        /// Contracts analyzed at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Start the HTTP server
    Serve {
        /// Address to bind to
        #[arg(long)]
        bind: Option<String>,

        /// Rate limit in requests per minute per IP (0 = no limit)
        #[arg(long)]
        rate_limit: Option<u32>,

        /// JSON file of exported staking events (default: demonstration data)
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

/// Analyze result for JSON output
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult<'a> {
    contract_address: &'a str,
    #[serde(flatten)]
    data: &'a ProcessedStakingData,
    timestamp: String,
}

/// Build the analyzer from config, letting command-line values win.
fn build_analyzer(
    cfg: &Config,
    events_file: Option<PathBuf>,
    latency_ms: Option<u64>,
    policy: Option<NegativeDurationPolicy>,
) -> StakingAnalyzer {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let latency = latency_ms
        .or(cfg.mock_latency_ms)
        .unwrap_or(DEFAULT_MOCK_LATENCY_MS);
    let ttl_ms = cfg
        .cache_ttl_seconds
        .map(|s| s.saturating_mul(1000))
        .unwrap_or(DEFAULT_TTL_MS as u64);
    let source = event_source(
        events_file.or_else(|| cfg.events_file.clone()),
        Duration::from_millis(latency),
        Arc::clone(&clock),
    );

    StakingAnalyzer::new(source, clock)
        .with_ttl(Duration::from_millis(ttl_ms))
        .with_policy(
            policy
                .or(cfg.negative_duration_policy)
                .unwrap_or_default(),
        )
}

fn cmd_analyze(
    contract: String,
    input: Option<PathBuf>,
    format: String,
    output: Option<PathBuf>,
    negative_durations: Option<NegativeDurationPolicy>,
    latency_ms: Option<u64>,
) -> Result<()> {
    let cfg = Config::load();
    let analyzer = build_analyzer(&cfg, input, latency_ms, negative_durations);

    let rt = tokio::runtime::Runtime::new()?;
    eprintln!(
        "Fetching staking events for {} ({} source)...",
        contract,
        analyzer.source_name()
    );
    let data = rt.block_on(analyzer.get_staking_data(&contract))?;

    let result = AnalyzeResult {
        contract_address: &contract,
        data: &data,
        timestamp: Utc::now().to_rfc3339(),
    };

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_summary(&contract, &data),
    }

    if let Some(output_path) = output {
        fs::write(&output_path, serde_json::to_string_pretty(&result)?)
            .wrap_err_with(|| format!("Failed to write result: {}", output_path.display()))?;
        eprintln!("Result saved to: {}", output_path.display());
    }

    Ok(())
}

fn print_summary(contract: &str, data: &ProcessedStakingData) {
    println!("Staking Analysis");
    println!("================");
    println!("Contract:             {}", contract);
    println!("Unique stakers:       {}", data.total_unique_stakers);
    println!("NFTs staked:          {}", data.total_nfts_staked);
    println!("Avg staking duration: {} days", data.average_staking_duration);
    if data.unique_stakers.is_empty() {
        return;
    }
    println!();
    println!("{:<16} {:>6}", "Duration", "NFTs");
    for (label, nfts) in data.duration_distribution() {
        println!("{:<16} {:>6}", label, nfts);
    }
    println!();
    println!("{:<48} {:>6} {:>10}", "Staker", "NFTs", "Days");
    for staker in &data.unique_stakers {
        println!(
            "{:<48} {:>6} {:>10}",
            staker.address, staker.nfts_staked, staker.total_duration_in_days
        );
    }
}

fn cmd_scan(input: PathBuf, events: Option<PathBuf>, concurrency: usize) -> Result<()> {
    use futures::stream::{self, StreamExt};

    let content = fs::read_to_string(&input)
        .wrap_err_with(|| format!("Failed to read address list: {}", input.display()))?;
    let contracts: Vec<String> = content
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    eprintln!("Scanning {} contracts...", contracts.len());

    let cfg = Config::load();
    let analyzer = Arc::new(build_analyzer(&cfg, events, None, None));
    let total = contracts.len();

    let rt = tokio::runtime::Runtime::new()?;
    let failures = rt.block_on(async {
        stream::iter(contracts.into_iter().enumerate())
            .map(|(i, contract)| {
                let analyzer = Arc::clone(&analyzer);
                async move {
                    eprintln!("[{}/{}] Analyzing {}...", i + 1, total, contract);
                    match analyzer.get_staking_data(&contract).await {
                        Ok(data) => {
                            let top = data
                                .top_staker()
                                .map(|s| format!("{} ({} NFTs)", s.address, s.nfts_staked))
                                .unwrap_or_else(|| "-".to_string());
                            println!(
                                "{}: {} stakers, {} NFTs, avg {} days, top {}",
                                contract,
                                data.total_unique_stakers,
                                data.total_nfts_staked,
                                data.average_staking_duration,
                                top
                            );
                            0usize
                        }
                        Err(e) => {
                            eprintln!("  ERROR: {}: {:#}", contract, eyre::Report::new(e));
                            1
                        }
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .fold(0usize, |acc, failed| async move { acc + failed })
            .await
    });

    if failures > 0 {
        eyre::bail!("{} of {} contracts failed", failures, total);
    }
    Ok(())
}

fn cmd_serve(bind: Option<String>, rate_limit: Option<u32>, events: Option<PathBuf>) -> Result<()> {
    use stakescope::server::{run_server, ServerConfig};

    let cfg = Config::load();

    let bind_str = bind
        .or_else(|| cfg.bind.clone())
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());
    let bind_addr = bind_str
        .parse()
        .wrap_err_with(|| format!("Invalid bind address: {}", bind_str))?;
    let rate_limit_rpm = rate_limit.or(cfg.rate_limit_rpm).unwrap_or(60);

    let analyzer = build_analyzer(&cfg, events, None, None);
    tracing::info!(
        source = analyzer.source_name(),
        policy = %analyzer.policy(),
        cache_ttl_ms = analyzer.cache().ttl_ms(),
        "starting stakescope server"
    );

    let config = ServerConfig {
        bind_addr,
        rate_limit_rpm,
        allowed_origins: cfg.allowed_origins,
        api_keys: cfg.api_keys,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_server(config, analyzer))?;

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stakescope=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            contract,
            input,
            format,
            output,
            negative_durations,
            latency_ms,
        } => cmd_analyze(contract, input, format, output, negative_durations, latency_ms),
        Commands::Scan {
            input,
            events,
            concurrency,
        } => cmd_scan(input, events, concurrency),
        Commands::Serve {
            bind,
            rate_limit,
            events,
        } => cmd_serve(bind, rate_limit, events),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
