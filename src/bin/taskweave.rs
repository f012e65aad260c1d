//! taskweave CLI: drive each orchestration primitive from the shell.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use futures::StreamExt as _;
use taskweave::cache::FetchCache;
use taskweave::cancel::CancellationSignal;
use taskweave::chain::uppercase_chain;
use taskweave::config::Config;
use taskweave::deferred::Deferred;
use taskweave::fanout::{self, FailurePolicy};
use taskweave::http::WebClient;
use taskweave::sequence::Generator;
use taskweave::telemetry::{TelemetryConfig, init_telemetry};
use taskweave::{time, workload};

#[derive(Parser)]
#[command(name = "taskweave", about = "Async task orchestration toolkit")]
struct Cli {
    /// TOML config file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for a fixed duration
    Delay {
        #[arg(long, default_value_t = 100)]
        ms: u64,
    },
    /// Run the long-running operation and cancel it
    Cancel {
        /// Cancel after this many milliseconds
        #[arg(long, conflicts_with = "before")]
        after_ms: Option<u64>,
        /// Cancel before the operation starts
        #[arg(long)]
        before: bool,
    },
    /// Look keys up through the single-flight cache, twice each
    Cache {
        keys: Vec<String>,
        /// Issue the first round of lookups concurrently
        #[arg(long)]
        concurrent: bool,
    },
    /// Fetch items concurrently and report input-ordered results
    FanOut {
        #[arg(value_delimiter = ',', default_values_t = [3, 6, 1, 7, 4, 5, 1])]
        ids: Vec<i64>,
        /// Fail with this id instead of fetching it
        #[arg(long)]
        fail_id: Option<i64>,
        /// Abort the remaining fetches on first failure
        #[arg(long)]
        fail_fast: bool,
        /// Print operation snapshots as JSON
        #[arg(long)]
        json: bool,
    },
    /// Uppercase letters one step at a time
    Chain {
        #[arg(default_value = "foo bar")]
        input: String,
    },
    /// Consume a lazily generated sequence
    Generate {
        #[arg(long, default_value_t = 6)]
        count: usize,
    },
    /// GET a URL and print the body
    Fetch { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "taskweave".to_string(),
        log_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Delay { ms } => cmd_delay(ms).await,
        Command::Cancel { after_ms, before } => cmd_cancel(&config, after_ms, before).await,
        Command::Cache { keys, concurrent } => cmd_cache(&config, keys, concurrent).await,
        Command::FanOut {
            ids,
            fail_id,
            fail_fast,
            json,
        } => cmd_fan_out(&config, ids, fail_id, fail_fast, json).await,
        Command::Chain { input } => cmd_chain(&config, input).await,
        Command::Generate { count } => cmd_generate(&config, count).await,
        Command::Fetch { url } => cmd_fetch(&config, url).await,
    }
}

async fn cmd_delay(ms: u64) -> anyhow::Result<()> {
    let start = Instant::now();
    time::delay(Duration::from_millis(ms)).await;
    println!("waited {}ms (requested {ms}ms)", start.elapsed().as_millis());
    Ok(())
}

async fn cmd_cancel(config: &Config, after_ms: Option<u64>, before: bool) -> anyhow::Result<()> {
    let signal = CancellationSignal::new();
    if before {
        signal.request();
    } else if let Some(ms) = after_ms {
        let canceller = signal.clone();
        tokio::spawn(async move {
            time::delay(Duration::from_millis(ms)).await;
            canceller.request();
        });
    }

    let start = Instant::now();
    let result = workload::long_running_operation(&signal, config.operation_delay).await;
    let elapsed = start.elapsed().as_millis();
    match result {
        Ok(value) => println!("completed in {elapsed}ms: {value}"),
        Err(e) => println!("stopped after {elapsed}ms: {e}"),
    }
    Ok(())
}

async fn cmd_cache(config: &Config, keys: Vec<String>, concurrent: bool) -> anyhow::Result<()> {
    if keys.is_empty() {
        anyhow::bail!("give at least one key");
    }
    let cache: FetchCache<String, String> = FetchCache::new();
    let delay = config.fetch_delay;

    let start = Instant::now();
    if concurrent {
        // Duplicate keys in one round join the same fetch.
        let lookups = keys.iter().map(|key| {
            let key = key.clone();
            cache.get_or_fetch(key.clone(), move || workload::decorate_key(key, delay))
        });
        let values = futures::future::try_join_all(lookups).await?;
        for (key, value) in keys.iter().zip(values) {
            println!("{key:<16} {value}");
        }
    } else {
        for key in &keys {
            let owned = key.clone();
            let lookup = cache.get_or_fetch(key.clone(), move || workload::decorate_key(owned, delay));
            let kind = if lookup.is_ready() { "ready" } else { "pending" };
            println!("{key:<16} {:<24} {kind}", lookup.await?);
        }
    }
    println!("first round: {}ms", start.elapsed().as_millis());

    let start = Instant::now();
    for key in &keys {
        let owned = key.clone();
        let lookup = cache.get_or_fetch(key.clone(), move || workload::decorate_key(owned, delay));
        let kind = if lookup.is_ready() { "ready" } else { "pending" };
        println!("{key:<16} {:<24} {kind}", lookup.await?);
    }
    println!("second round: {}ms", start.elapsed().as_millis());
    Ok(())
}

async fn cmd_fan_out(
    config: &Config,
    ids: Vec<i64>,
    fail_id: Option<i64>,
    fail_fast: bool,
    json: bool,
) -> anyhow::Result<()> {
    let delay = config.item_delay;
    let start = Instant::now();

    let policy = if fail_fast {
        FailurePolicy::FailFast
    } else {
        FailurePolicy::WaitForAll
    };

    if json {
        // Observers outlive the handles so snapshots can be printed afterwards.
        let batch: Vec<Deferred<String>> = ids
            .iter()
            .map(|&id| Deferred::spawn_named("fetch_item", fetch_or_fail(id, fail_id, delay)))
            .collect();
        let observers: Vec<_> = batch.iter().map(Deferred::observer).collect();
        let result = fanout::join_all_with(policy, batch).await;
        let snapshots: Vec<_> = observers.iter().map(|o| o.snapshot()).collect();
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        print_fan_out(result, start);
        return Ok(());
    }

    let operations = ids.iter().map(|&id| fetch_or_fail(id, fail_id, delay));
    let result = fanout::when_all_with(policy, operations).await;
    print_fan_out(result, start);
    Ok(())
}

async fn fetch_or_fail(id: i64, fail_id: Option<i64>, delay: Duration) -> taskweave::Result<String> {
    if fail_id == Some(id) {
        time::delay(delay / 2).await;
        return Err(taskweave::Error::failed(format!("item {id} unavailable")));
    }
    workload::fetch_item(id, delay).await
}

fn print_fan_out(result: taskweave::Result<Vec<String>>, start: Instant) {
    let elapsed = start.elapsed().as_millis();
    match result {
        Ok(items) => println!("{} in {elapsed}ms", items.join(", ")),
        Err(e) => println!("failed after {elapsed}ms: {e}"),
    }
}

async fn cmd_chain(config: &Config, input: String) -> anyhow::Result<()> {
    let signal = CancellationSignal::new();
    let ctrl = signal.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl.request();
    });

    let chain = uppercase_chain(input.chars().count(), config.step_delay).with_cancellation(signal);
    let start = Instant::now();
    let output = chain.run(input).await?;
    println!("{output} ({} steps, {}ms)", chain.len(), start.elapsed().as_millis());
    Ok(())
}

async fn cmd_generate(config: &Config, count: usize) -> anyhow::Result<()> {
    let signal = CancellationSignal::new();
    let ctrl = signal.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl.request();
    });

    let generator = Generator::new(count, config.stream_interval);
    let start = Instant::now();
    let mut items = std::pin::pin!(generator.stream_cancellable(signal));
    while let Some(item) = items.next().await {
        println!("{:>6}ms  {}", start.elapsed().as_millis(), item?);
    }
    Ok(())
}

async fn cmd_fetch(config: &Config, url: String) -> anyhow::Result<()> {
    let client = WebClient::new(config.http_timeout)?;
    let body = client.fetch_text(&url).await?;
    println!("{body}");
    Ok(())
}
