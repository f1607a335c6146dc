use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::{Commands, parse_header};
use feedpull::config::Config;
use feedpull::domain::{FeedRequest, FeedRequestConfig, Priority, callbacks};
use feedpull::scheduler::{Enqueued, PullQueue, PullingScheduler};
use feedpull::transport::{HttpTransport, HttpTransportConfig};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedpull")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("feedpull.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Pull {
            url,
            name,
            times,
            interval_ms,
            priority,
            retries,
            headers,
        } => {
            let options = PullOptions {
                url,
                name,
                times: *times,
                interval: Duration::from_millis(*interval_ms),
                priority: *priority,
                retries: *retries,
                headers,
            };
            handle_pull_command(options, config).await
        }
        Commands::Config => handle_config_command(config),
    }
}

struct PullOptions<'a> {
    url: &'a str,
    name: &'a str,
    times: u32,
    interval: Duration,
    priority: Priority,
    retries: u32,
    headers: &'a [String],
}

/// Build the request for a `pull` invocation. The interval only matters when repeating.
fn build_request(options: &PullOptions<'_>) -> Result<FeedRequest> {
    let mut request_config = FeedRequestConfig::new(options.name, options.url)
        .with_priority(options.priority)
        .with_max_retries(options.retries);
    if options.times > 0 {
        request_config = request_config.with_pull_interval(options.interval);
    }
    for raw in options.headers {
        let (key, value) = parse_header(raw).ok_or_else(|| eyre!("Invalid header '{}', expected 'Name: value'", raw))?;
        request_config = request_config.with_header(key, value);
    }
    FeedRequest::new(request_config).context("Invalid request")
}

async fn handle_pull_command(options: PullOptions<'_>, config: &Config) -> Result<()> {
    info!("Pulling {} ({} repeats)", options.url, options.times);

    let request = build_request(&options)?;

    let transport = Arc::new(HttpTransport::new(HttpTransportConfig::from(&config.http))?);
    let queue = PullQueue::start(config, transport)?;
    let scheduler = PullingScheduler::new(queue.clone());

    let on_success = callbacks::on_success(|result| {
        println!(
            "{} {} bytes from {}",
            "OK".green(),
            result.data.len(),
            result.request.url_for_logging()
        );
    });
    let on_error = callbacks::on_error(|failure| {
        println!(
            "{} {}: {}",
            "FAILED".red(),
            failure.request.url_for_logging(),
            failure.error
        );
    });

    if options.times == 0 {
        if scheduler.pull_once(request, on_success, on_error) != Enqueued::Queued {
            println!("{}", "Request was not queued".yellow());
        }
    } else {
        let handle = scheduler.pull_n_times(options.url.to_string(), request, on_success, on_error, options.times, Duration::ZERO)?;
        handle.cancelled().await;
    }

    // Wait for the last dispatched pull, including its retries
    let tick = config.queue.tick_interval();
    while queue.pending() > 0 || queue.tracker().awaiting_response_count() > 0 || queue.tracker().awaiting_retry_count() > 0
    {
        tokio::time::sleep(tick).await;
    }

    queue.shutdown().await;
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options<'a>(times: u32, interval_ms: u64, headers: &'a [String]) -> PullOptions<'a> {
        PullOptions {
            url: "http://feeds.test/fixtures",
            name: "fixtures",
            times,
            interval: Duration::from_millis(interval_ms),
            priority: Priority::High,
            retries: 2,
            headers,
        }
    }

    #[test]
    fn test_single_pull_ignores_zero_interval() {
        let request = build_request(&options(0, 0, &[])).unwrap();
        assert_eq!(request.pull_interval(), None);
        assert_eq!(request.max_retries(), 2);
    }

    #[test]
    fn test_repeated_pull_rejects_zero_interval() {
        assert!(build_request(&options(3, 0, &[])).is_err());
    }

    #[test]
    fn test_repeated_pull_keeps_interval() {
        let request = build_request(&options(3, 250, &[])).unwrap();
        assert_eq!(request.pull_interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let headers = vec!["no-colon".to_string()];
        assert!(build_request(&options(0, 0, &headers)).is_err());
    }
}
