use std::path::PathBuf;
use std::time::Duration;

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::canon::DEFAULT_MAX_IDENTIFIER_LENGTH;
use crate::convert::{DEFAULT_PROCESS_TIMEOUT, DEFAULT_WAT_JAR};
use crate::dispatch::DEFAULT_RETRIES;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Everything a pipeline run needs to know. Assembled by the CLI, but plain
/// data so library callers and tests can build one directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Input files, processed in order. CSV, WAT, WARC and ARC by extension.
    pub inputs: Vec<PathBuf>,

    /// Graph-streaming master endpoint.
    pub host: String,
    pub port: u16,

    /// Records accumulated before a batch is dispatched.
    pub batch_size: usize,

    /// Total send attempts per batch, including the first.
    pub retries: u32,

    /// Per-request timeout on the graph endpoint.
    pub timeout: Duration,

    /// Wall-clock limit for one archive-to-WAT conversion.
    pub process_timeout: Duration,

    /// Canonical identifiers longer than this are rejected.
    pub max_identifier_length: usize,

    /// Emit timestamps as 14-digit `YYYYMMDDHHMMSS` instead of the archive's
    /// native form.
    pub dt14: bool,

    /// Log batch dispatch exhaustion and keep going instead of aborting.
    pub ignore_errors: bool,

    /// Write batches to stdout instead of the network.
    pub print_only: bool,

    /// Keep WAT files produced from WARC/ARC inputs instead of deleting them
    /// after extraction.
    pub keep_artifacts: bool,

    /// Optional X-API-Key value for the graph endpoint.
    pub api_key: Option<String>,

    /// webarchive-commons jar used for WARC/ARC conversion.
    pub wat_jar: PathBuf,

    /// Carry duplicate-suppression state across input files instead of
    /// resetting it per file.
    pub run_scoped_dedup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            batch_size: DEFAULT_BATCH_SIZE,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
            dt14: false,
            ignore_errors: false,
            print_only: false,
            keep_artifacts: false,
            api_key: None,
            wat_jar: PathBuf::from(DEFAULT_WAT_JAR),
            run_scoped_dedup: false,
        }
    }
}

impl Config {
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
