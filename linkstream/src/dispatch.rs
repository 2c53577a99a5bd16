use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::emit::{GraphSink, SinkError};

/// Delay between send attempts of one batch: 1s doubling up to 30s, so the
/// default three attempts resolve within a few seconds.
pub const DEFAULT_RETRY_BACKOFF: BackoffPolicy =
    BackoffPolicy::new(Duration::from_secs(1), 2.0, Duration::from_secs(30));

pub const DEFAULT_RETRIES: u32 = 3;

/// Exponential backoff policy.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub const fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    pub fn next_delay(&self, attempt: u32) -> Duration {
        let pow = self.multiplier.powi(attempt as i32);
        let scaled = if pow.is_finite() {
            self.initial_delay.mul_f64(pow)
        } else {
            self.max_delay
        };
        scaled.min(self.max_delay)
    }
}

/// Cumulative counters across the whole run, reported on every flush.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub files: u64,
    pub batches: u64,
    pub records: u64,
    pub nodes: u64,
}

/// Result of dispatching one batch. The protocol has no idempotency key, so
/// an exhausted failure after a partial send is a duplicate/loss risk the
/// caller must surface rather than paper over with a different retry.
#[derive(Debug)]
pub enum DispatchOutcome {
    Success { status: u16, attempts: u32 },
    Exhausted { attempts: u32, last_error: SinkError },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }
}

/// Owns batch-flush policy: joins buffered lines into one payload, sends it,
/// retries transport failures up to the attempt budget.
pub struct Dispatcher {
    sink: Box<dyn GraphSink>,
    retries: u32,
    backoff: BackoffPolicy,
    stats: RunStats,
    current_file: String,
}

impl Dispatcher {
    pub fn new(sink: Box<dyn GraphSink>, retries: u32) -> Self {
        Self::with_backoff(sink, retries, DEFAULT_RETRY_BACKOFF)
    }

    pub fn with_backoff(sink: Box<dyn GraphSink>, retries: u32, backoff: BackoffPolicy) -> Self {
        Self {
            sink,
            retries: retries.max(1),
            backoff,
            stats: RunStats::default(),
            current_file: String::new(),
        }
    }

    pub fn note_file(&mut self, name: &str) {
        self.stats.files += 1;
        self.current_file = name.to_string();
    }

    pub fn note_record(&mut self, outlink_count: usize) {
        self.stats.records += 1;
        self.stats.nodes += outlink_count as u64;
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Send one batch. The lines are consumed by this call, so the batch
    /// buffer is cleared whether or not the dispatch succeeds.
    pub async fn flush(&mut self, lines: Vec<String>) -> DispatchOutcome {
        let payload = lines.concat();
        self.stats.batches += 1;
        histogram!("linkstream_batch_payload_bytes").record(payload.len() as f64);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sink.send(&payload).await {
                Ok(status) => {
                    counter!("linkstream_batches_sent_total").increment(1);
                    info!(
                        "{}: files={} batches={} records={} nodes={} status={}",
                        self.current_file,
                        self.stats.files,
                        self.stats.batches,
                        self.stats.records,
                        self.stats.nodes,
                        status
                    );
                    return DispatchOutcome::Success {
                        status,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    counter!("linkstream_batch_send_errors_total").increment(1);
                    warn!(
                        "{}: files={} batches={} records={} nodes={} status=error attempt={}/{}",
                        self.current_file,
                        self.stats.files,
                        self.stats.batches,
                        self.stats.records,
                        self.stats.nodes,
                        attempt,
                        self.retries
                    );
                    // Response bodies and error detail only at debug level.
                    debug!("dispatch attempt {attempt} failed: {e}");

                    if attempt >= self.retries {
                        return DispatchOutcome::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        };
                    }
                    tokio::time::sleep(self.backoff.next_delay(attempt - 1)).await;
                }
            }
        }
    }
}
