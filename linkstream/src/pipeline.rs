use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::batch::{BatchBuilder, BatchContinuation};
use crate::canon::Canonicalizer;
use crate::config::Config;
use crate::convert::Converter;
use crate::dispatch::{DispatchOutcome, Dispatcher, RunStats};
use crate::emit::{GraphSink, SinkError};
use crate::event::LinkRecord;
use crate::parse::{warc, CsvLinkRecords, DedupState, ParseError, WatLinkRecords};

/// The only fatal pipeline error. Everything file-local is logged, recorded
/// in the run summary and skipped.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("batch dispatch failed after {attempts} attempts: {last_error}")]
    DispatchExhausted { attempts: u32, last_error: SinkError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Csv,
    Wat,
    Archive,
    Unknown,
}

fn classify(path: &Path) -> InputKind {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.ends_with(".csv") {
        InputKind::Csv
    } else if name.ends_with(".wat.gz") {
        InputKind::Wat
    } else if name.ends_with(".warc.gz") || name.ends_with(".arc.gz") {
        InputKind::Archive
    } else {
        InputKind::Unknown
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub stats: RunStats,
    /// File-local failures and dropped batches, in the order they happened.
    pub errors: Vec<String>,
}

/// Drives the whole run: classify each input, parse it into LinkRecords,
/// fold them into batches, dispatch closed batches, flush the remainder at
/// the end. The batch buffer deliberately spans file boundaries; only
/// `batch_size` and end of run close a batch.
pub struct Pipeline {
    config: Config,
    canon: Canonicalizer,
    builder: BatchBuilder,
    dispatcher: Dispatcher,
    converter: Box<dyn Converter>,
    errors: Vec<String>,
}

impl Pipeline {
    pub fn new(config: Config, sink: Box<dyn GraphSink>, converter: Box<dyn Converter>) -> Self {
        let canon = Canonicalizer::new(config.max_identifier_length);
        let builder = BatchBuilder::new(config.batch_size);
        let dispatcher = Dispatcher::new(sink, config.retries);
        Self {
            config,
            canon,
            builder,
            dispatcher,
            converter,
            errors: Vec::new(),
        }
    }

    pub async fn run(mut self) -> Result<RunSummary, PipelineError> {
        let inputs = self.config.inputs.clone();
        let mut dedup = DedupState::default();

        for input in &inputs {
            self.dispatcher.note_file(&input.display().to_string());
            if let Some(failure) = self.process_file(input, &mut dedup).await? {
                warn!("skipping rest of {}: {failure}", input.display());
                self.errors.push(format!("{}: {failure}", input.display()));
            }
        }

        let remainder = self.builder.finish();
        if !remainder.is_empty() {
            self.flush(remainder).await?;
        }

        let summary = RunSummary {
            stats: self.dispatcher.stats().clone(),
            errors: self.errors,
        };
        info!(
            "run complete: files={} batches={} records={} nodes={} errors={}",
            summary.stats.files,
            summary.stats.batches,
            summary.stats.records,
            summary.stats.nodes,
            summary.errors.len()
        );
        Ok(summary)
    }

    /// Process one input file. `Ok(Some(reason))` is a file-local failure;
    /// only dispatch exhaustion escapes as `Err`.
    async fn process_file(
        &mut self,
        path: &Path,
        dedup: &mut DedupState,
    ) -> Result<Option<String>, PipelineError> {
        match classify(path) {
            InputKind::Csv => {
                let file = match File::open(path) {
                    Ok(file) => file,
                    Err(e) => return Ok(Some(format!("cannot open: {e}"))),
                };
                let mut records =
                    CsvLinkRecords::new(BufReader::new(file), self.canon, self.config.dt14);
                self.drain(&mut records).await
            }
            InputKind::Wat => self.process_wat(path, dedup).await,
            InputKind::Archive => {
                let wat = match self
                    .converter
                    .convert(path, self.config.process_timeout)
                    .await
                {
                    Ok(wat) => wat,
                    Err(e) => return Ok(Some(format!("conversion failed: {e}"))),
                };

                let outcome = self.process_wat(&wat, dedup).await;
                if !self.config.keep_artifacts {
                    if let Err(e) = std::fs::remove_file(&wat) {
                        warn!("could not remove {}: {e}", wat.display());
                    }
                }
                outcome
            }
            InputKind::Unknown => Ok(Some("unsupported input type".to_string())),
        }
    }

    async fn process_wat(
        &mut self,
        path: &Path,
        dedup: &mut DedupState,
    ) -> Result<Option<String>, PipelineError> {
        let reader = match warc::open_gz(path) {
            Ok(reader) => reader,
            Err(e) => return Ok(Some(format!("cannot open: {e}"))),
        };

        let carried = if self.config.run_scoped_dedup {
            std::mem::take(dedup)
        } else {
            DedupState::default()
        };
        let mut records = WatLinkRecords::new(reader, self.canon, self.config.dt14, carried);
        let outcome = self.drain(&mut records).await;
        if self.config.run_scoped_dedup {
            *dedup = records.into_dedup();
        }
        outcome
    }

    async fn drain<I>(&mut self, records: &mut I) -> Result<Option<String>, PipelineError>
    where
        I: Iterator<Item = Result<LinkRecord, ParseError>>,
    {
        for record in records {
            let record = match record {
                Ok(record) => record,
                Err(e) => return Ok(Some(format!("parse error: {e}"))),
            };

            self.dispatcher.note_record(record.outlinks.len());
            if let BatchContinuation::Closed(lines) = self.builder.accept(&record) {
                self.flush(lines).await?;
            }
        }
        Ok(None)
    }

    async fn flush(&mut self, lines: Vec<String>) -> Result<(), PipelineError> {
        match self.dispatcher.flush(lines).await {
            DispatchOutcome::Success { .. } => Ok(()),
            DispatchOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                if self.config.ignore_errors {
                    warn!("dropping batch after {attempts} failed attempts: {last_error}");
                    self.errors
                        .push(format!("batch dropped after {attempts} attempts: {last_error}"));
                    Ok(())
                } else {
                    Err(PipelineError::DispatchExhausted {
                        attempts,
                        last_error,
                    })
                }
            }
        }
    }
}
