use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hnrss::hn::{HnClient, StoryList};
use hnrss::{build_feed, Config};

#[derive(Parser, Debug)]
#[command(
    name = "hnrss",
    version,
    about = "Build an RSS 2.0 feed of Hacker News stories"
)]
struct Args {
    /// Destination file for the feed (replaced atomically)
    #[arg(long, short, value_name = "PATH")]
    output: PathBuf,

    /// Number of stories to include; 0 or less builds an empty feed [default: 30]
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    limit: Option<i64>,

    /// Per-request timeout in seconds [default: 10]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Ranked list to build the feed from [default: top]
    #[arg(long, value_enum)]
    list: Option<StoryList>,

    /// Skip stories with fewer points than this
    #[arg(long, value_name = "N")]
    min_score: Option<u64>,

    /// Do not quote each story's top comment in its description
    #[arg(long)]
    no_top_comments: bool,

    /// Maximum number of item fetches in flight [default: 8]
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Override the API base URL
    #[arg(long, value_name = "URL")]
    api_base: Option<String>,

    /// TOML config file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    /// Layers command-line flags over file/default values.
    fn apply(&self, config: &mut Config) {
        if let Some(limit) = self.limit {
            config.limit = usize::try_from(limit).unwrap_or(0);
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
        if let Some(list) = self.list {
            config.list = list;
        }
        if let Some(min_score) = self.min_score {
            config.min_score = min_score;
        }
        if self.no_top_comments {
            config.top_comments = false;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(ref api_base) = self.api_base {
            config.api_base = api_base.clone();
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => Config::default(),
    };

    args.apply(&mut config);
    config.validate().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout only carries the run summary
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::debug!(config = ?config, "Effective configuration");

    let client = HnClient::new(&config).context("Failed to create HTTP client")?;

    let report = build_feed(&config, &client, &args.output, Utc::now()).await?;

    println!("Wrote {} ({})", args.output.display(), report);
    Ok(())
}
