use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use linkstream::batch::DEFAULT_BATCH_SIZE;
use linkstream::canon::DEFAULT_MAX_IDENTIFIER_LENGTH;
use linkstream::config::{Config, DEFAULT_HOST, DEFAULT_PORT};
use linkstream::convert::{JarConverter, DEFAULT_WAT_JAR};
use linkstream::dispatch::DEFAULT_RETRIES;
use linkstream::emit::{GraphSink, HttpSink, PrintSink};
use linkstream::pipeline::Pipeline;

/// Extract link graphs from web-archive files and stream them to a Gephi
/// graph-streaming master as batched updateGraph events.
#[derive(Parser)]
#[command(name = "linkstream", version, about)]
struct Cli {
    /// Input files, processed in order: .csv, .wat.gz, .warc.gz or .arc.gz
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Graph-streaming master host
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Graph-streaming master port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Records per dispatched batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Send attempts per batch, including the first
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    retries: u32,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 90)]
    timeout: u64,

    /// Seconds one archive-to-WAT conversion may run
    #[arg(long, default_value_t = 600)]
    process_timeout: u64,

    /// Drop outlinks whose canonical identifier exceeds this length
    #[arg(long, default_value_t = DEFAULT_MAX_IDENTIFIER_LENGTH)]
    max_identifier_length: usize,

    /// Emit timestamps as 14-digit YYYYMMDDHHMMSS
    #[arg(long)]
    dt14: bool,

    /// Log dropped batches and keep going instead of aborting
    #[arg(long)]
    ignore_errors: bool,

    /// Write batches to stdout instead of the network
    #[arg(long)]
    print_only: bool,

    /// Keep WAT files produced from WARC/ARC inputs
    #[arg(long)]
    keep_artifacts: bool,

    /// X-API-Key value for the graph endpoint
    #[arg(long, env = "LINKSTREAM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// webarchive-commons jar used for WARC/ARC conversion
    #[arg(long, default_value = DEFAULT_WAT_JAR)]
    wat_jar: PathBuf,

    /// Carry duplicate suppression across input files instead of per file
    #[arg(long)]
    legacy_run_dedup: bool,

    /// Debug-level logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            inputs: self.inputs,
            host: self.host,
            port: self.port,
            batch_size: self.batch_size,
            retries: self.retries,
            timeout: Duration::from_secs(self.timeout),
            process_timeout: Duration::from_secs(self.process_timeout),
            max_identifier_length: self.max_identifier_length,
            dt14: self.dt14,
            ignore_errors: self.ignore_errors,
            print_only: self.print_only,
            keep_artifacts: self.keep_artifacts,
            api_key: self.api_key,
            wat_jar: self.wat_jar,
            run_scoped_dedup: self.legacy_run_dedup,
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    let config = cli.into_config();

    let sink: Box<dyn GraphSink> = if config.print_only {
        Box::new(PrintSink)
    } else {
        Box::new(HttpSink::new(
            &config.endpoint(),
            config.timeout,
            config.api_key.as_deref(),
        )?)
    };
    let converter = Box::new(JarConverter::new(config.wat_jar.clone()));

    match Pipeline::new(config, sink, converter).run().await {
        Ok(summary) => {
            for e in &summary.errors {
                warn!("{e}");
            }
            Ok(())
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
