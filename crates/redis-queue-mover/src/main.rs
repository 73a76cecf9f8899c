//! Redis Queue Mover CLI
//!
//! Moves items from one set of Redis list queues into another (or a file)
//! until interrupted.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use redis_queue_mover::{DestinationKind, Engine, MoverConfig};

#[derive(Parser)]
#[command(name = "redis-queue-mover")]
#[command(version)]
#[command(about = "Move items between Redis list queues, continuously and concurrently", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    args: MoverArgs,

    /// Verbose output (per-item debug traces)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Move items until SIGINT or SIGTERM (default)
    Run(MoverArgs),

    /// Validate settings and print a summary
    Validate(MoverArgs),

    /// Generate example configuration
    Init {
        /// Output file path
        #[arg(short, long, default_value = "mover.yaml")]
        output: PathBuf,
    },
}

/// Settings; each flag overrides the configuration file.
#[derive(Args, Clone, Default)]
struct MoverArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "RQM_CONFIG")]
    config: Option<PathBuf>,

    /// Number of queues, e.g. --queues=1
    #[arg(long, env = "RQM_QUEUES")]
    queues: Option<usize>,

    /// (threads * queues) gives the number of move workers, e.g. --threads=1
    #[arg(long, env = "RQM_THREADS")]
    threads: Option<usize>,

    /// Nodes of source redis, e.g. --src-redis=127.0.0.1:6379,127.0.0.1:6380
    #[arg(long, env = "RQM_SRC_REDIS")]
    src_redis: Option<String>,

    /// Nodes of destination redis, e.g. --dst-redis=127.0.0.1:6381,127.0.0.1:6382
    #[arg(long, env = "RQM_DST_REDIS")]
    dst_redis: Option<String>,

    /// File to store items in when no destination redis is set
    #[arg(long, value_name = "FILE", env = "RQM_DST_FILE")]
    dst_file: Option<PathBuf>,

    /// Key prefix of source queues, e.g. --src-prefix='mooon:'
    #[arg(long, env = "RQM_SRC_PREFIX")]
    src_prefix: Option<String>,

    /// Key prefix of destination queues, e.g. --dst-prefix='mooon:'
    #[arg(long, env = "RQM_DST_PREFIX")]
    dst_prefix: Option<String>,

    /// The source prefix is the whole key
    #[arg(long, env = "RQM_SRC_ONLY_PREFIX", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    src_only_prefix: Option<bool>,

    /// The destination prefix is the whole key
    #[arg(long, env = "RQM_DST_ONLY_PREFIX", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    dst_only_prefix: Option<bool>,

    /// Source redis timeout in milliseconds
    #[arg(long, value_name = "MS", env = "RQM_SRC_TIMEOUT")]
    src_timeout: Option<u64>,

    /// Destination redis timeout in milliseconds
    #[arg(long, value_name = "MS", env = "RQM_DST_TIMEOUT")]
    dst_timeout: Option<u64>,

    /// Password for source redis
    #[arg(long, env = "RQM_SRC_PASSWORD", hide_env_values = true)]
    src_password: Option<String>,

    /// Password for destination redis
    #[arg(long, env = "RQM_DST_PASSWORD", hide_env_values = true)]
    dst_password: Option<String>,

    /// Log progress every N items moved by a worker
    #[arg(long, env = "RQM_TICK")]
    tick: Option<u64>,

    /// Interval to log throughput, in seconds
    #[arg(long, value_name = "SECS", env = "RQM_STAT_INTERVAL")]
    stat_interval: Option<u64>,

    /// Interval to poll an empty queue or retry a push, in milliseconds
    #[arg(long, value_name = "MS", env = "RQM_RETRY_INTERVAL")]
    retry_interval: Option<u64>,

    /// Maximum items moved per push
    #[arg(long, env = "RQM_BATCH")]
    batch: Option<usize>,

    /// Distinguishes concurrently running movers in the logs, e.g. --label='test'
    #[arg(long, env = "RQM_LABEL")]
    label: Option<String>,
}

impl MoverArgs {
    /// Loads the configuration file, if any, and applies the flags on top.
    fn load(&self) -> anyhow::Result<MoverConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                MoverConfig::from_file(path)?
            }
            None => MoverConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut MoverConfig) {
        let src = &mut config.source;
        if let Some(v) = &self.src_redis {
            src.redis = v.clone();
        }
        if let Some(v) = &self.src_prefix {
            src.prefix = v.clone();
        }
        if let Some(v) = self.src_only_prefix {
            src.only_prefix = v;
        }
        if let Some(v) = self.src_timeout {
            src.timeout_ms = v;
        }
        if let Some(v) = &self.src_password {
            src.password = Some(v.clone());
        }

        let dst = &mut config.destination;
        if let Some(v) = &self.dst_redis {
            dst.redis = v.clone();
        }
        if let Some(v) = &self.dst_file {
            dst.file = Some(v.clone());
        }
        if let Some(v) = &self.dst_prefix {
            dst.prefix = v.clone();
        }
        if let Some(v) = self.dst_only_prefix {
            dst.only_prefix = v;
        }
        if let Some(v) = self.dst_timeout {
            dst.timeout_ms = v;
        }
        if let Some(v) = &self.dst_password {
            dst.password = Some(v.clone());
        }

        let opts = &mut config.options;
        if let Some(v) = self.queues {
            opts.queues = v;
        }
        if let Some(v) = self.threads {
            opts.threads = v;
        }
        if let Some(v) = self.tick {
            opts.tick = v;
        }
        if let Some(v) = self.stat_interval {
            opts.stat_interval_secs = v;
        }
        if let Some(v) = self.retry_interval {
            opts.retry_interval_ms = v;
        }
        if let Some(v) = self.batch {
            opts.batch = v;
        }
        if let Some(v) = &self.label {
            opts.label = v.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Some(Commands::Run(args)) => run_mover(&args).await?,
        Some(Commands::Validate(args)) => validate_config(&args)?,
        Some(Commands::Init { output }) => generate_config(&output)?,
        None => run_mover(&cli.args).await?,
    }

    Ok(())
}

async fn run_mover(args: &MoverArgs) -> anyhow::Result<()> {
    let config = args.load()?;
    let engine = Engine::from_config(config)?;
    let summary = engine.run().await?;

    info!(
        "Moved {} items, {} of {} workers stopped on errors, {} lost",
        summary.moved,
        summary.failed_workers(),
        summary.workers.len() + summary.lost_workers,
        summary.lost_workers
    );
    Ok(())
}

fn validate_config(args: &MoverArgs) -> anyhow::Result<()> {
    let config = args.load()?;
    config.validate()?;

    println!("✅ Configuration is valid!");
    println!("   Source:      {}", config.source.redis);
    match config.destination_kind() {
        Some(DestinationKind::File(path)) => println!("   Destination: file://{}", path.display()),
        _ => println!("   Destination: {}", config.destination.redis),
    }
    println!("   Queues:      {}", config.options.queues);
    println!("   Workers:     {}", config.options.num_workers());
    println!("   Batch:       {}", config.options.batch);

    Ok(())
}

fn generate_config(output: &Path) -> anyhow::Result<()> {
    std::fs::write(output, CONFIG_TEMPLATE)?;
    println!("✅ Generated configuration: {:?}", output);
    println!("   Edit the file and run: redis-queue-mover run --config {:?}", output);
    Ok(())
}

const CONFIG_TEMPLATE: &str = r#"# Redis Queue Mover Configuration
source:
  redis: 127.0.0.1:6379          # one node, or a comma-separated cluster node list
  prefix: "mooon:"               # queue i is "mooon:<i>"
  only_prefix: false             # true: the prefix is the whole key
  timeout_ms: 10000
  # password: secret

destination:
  redis: 127.0.0.1:6380          # leave empty to write to `file` instead
  # file: /data/mooon.data
  prefix: "mooon:"
  only_prefix: false
  timeout_ms: 10000
  # password: secret

options:
  queues: 1
  threads: 1                     # workers per queue
  batch: 100
  tick: 10000
  stat_interval_secs: 2
  retry_interval_ms: 100
  # label: mover-a
"#;
