use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deepscroll::{load_page, DetectionMethod, ScrollConfig};

#[derive(Parser)]
#[command(name = "deepscroll")]
#[command(about = "Scroll a page until all lazily-loaded content is revealed", long_about = None)]
struct Cli {
    /// URL to load
    url: String,

    /// Config file (JSON or YAML)
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Write the final HTML to this path
    #[arg(long, value_name = "PATH")]
    output: Option<String>,

    /// Override item_selector
    #[arg(long, value_name = "SELECTOR")]
    selector: Option<String>,

    /// Override headless mode
    #[arg(long, value_name = "BOOL")]
    headless: Option<bool>,

    /// Override max_scroll_attempts
    #[arg(long = "max-scrolls", value_name = "N")]
    max_scrolls: Option<u32>,

    /// Override max_duration_seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Override progress_timeout
    #[arg(long = "progress-timeout", value_name = "N")]
    progress_timeout: Option<u32>,

    /// Detection method: itemCount, scrollHeight, or sentinel
    #[arg(long, value_name = "METHOD")]
    detection: Option<String>,

    /// Comma-separated load-more selectors, in preference order
    #[arg(long = "load-more", value_name = "CSV")]
    load_more: Option<String>,

    /// Verbose logging
    #[arg(long, short, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(long, short, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    dotenv::dotenv().ok();

    match run(cli).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_filter = if verbose {
        "deepscroll=debug"
    } else if quiet {
        "deepscroll=error"
    } else {
        "deepscroll=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(cli: Cli) -> Result<bool> {
    let config = build_config(&cli)?;

    // A first ctrl-c winds the run down cooperatively; a second one kills the
    // process the usual way.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current iteration");
            deepscroll::stop();
        }
    });

    let outcome = load_page(&cli.url, &config).await;

    if let Some(stats) = &outcome.stats {
        println!("{}", serde_json::to_string_pretty(stats)?);
    }

    for message in &outcome.errors {
        error!("{}", message);
    }

    if let (Some(path), Some(html)) = (&cli.output, &outcome.html) {
        std::fs::write(path, html).with_context(|| format!("cannot write {}", path))?;
        info!("wrote {} bytes of HTML to {}", html.len(), path);
    }

    Ok(outcome.success)
}

fn build_config(cli: &Cli) -> Result<ScrollConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            ScrollConfig::from_file(path).with_context(|| format!("loading config {}", path))?
        }
        None => ScrollConfig::default(),
    };

    if let Some(selector) = &cli.selector {
        config.item_selector = Some(selector.clone());
    }
    if let Some(headless) = cli.headless {
        config.headless = headless;
    }
    if let Some(n) = cli.max_scrolls {
        config.max_scroll_attempts = n;
    }
    if let Some(secs) = cli.timeout {
        config.max_duration_seconds = secs;
    }
    if let Some(n) = cli.progress_timeout {
        config.progress_timeout = n;
    }
    if let Some(method) = &cli.detection {
        config.detection_method = DetectionMethod::try_from(method.clone())
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(csv) = &cli.load_more {
        config.load_more_selectors = csv
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    Ok(config)
}
