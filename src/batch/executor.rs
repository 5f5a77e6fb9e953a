//! Batch executor: chunked, rate-limited fan-out with persistence between chunks.

use super::chunking::chunk_ranges;
use super::sink::BatchSink;
use super::store::BatchStore;
use crate::dispatch::{Dispatcher, ItemToParams, NoParams, RequestSpec};
use crate::resilience::{RateLimiter, RateLimiterConfig, RetryPolicy};
use crate::transport::{HttpMethod, HttpTransport, TransportConfig};
use crate::types::{Batch, Item, ResultRecord};
use crate::utils::template::Template;
use crate::{Error, ErrorContext, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Characters of the last record shown in the per-batch log line.
pub const PREVIEW_CHARS: usize = 1000;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_RATE_LIMIT: u32 = 25;

/// Totals across all batches of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub records: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub files: Vec<PathBuf>,
}

impl RunSummary {
    fn record(&mut self, batch: &Batch, file: PathBuf) {
        self.batches += 1;
        self.records += batch.len();
        self.succeeded += batch.success_count();
        self.failed += batch.failure_count();
        self.files.push(file);
    }
}

/// Builder for [`BatchRunner`].
pub struct BatchRunnerBuilder {
    method: HttpMethod,
    url_template: Option<String>,
    headers: HeaderMap,
    params: Arc<dyn ItemToParams>,
    limiter: RateLimiterConfig,
    chunk_size: usize,
    output_dir: PathBuf,
    transport: TransportConfig,
    retry: RetryPolicy,
}

impl BatchRunnerBuilder {
    pub fn new() -> Self {
        Self {
            method: HttpMethod::Get,
            url_template: None,
            headers: HeaderMap::new(),
            params: Arc::new(NoParams),
            limiter: RateLimiterConfig::per_second(DEFAULT_RATE_LIMIT),
            chunk_size: DEFAULT_CHUNK_SIZE,
            output_dir: PathBuf::from("results"),
            transport: TransportConfig::from_env(),
            retry: RetryPolicy::none(),
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = Some(template.into());
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn params<P: ItemToParams + 'static>(mut self, params: P) -> Self {
        self.params = Arc::new(params);
        self
    }

    pub fn shared_params(mut self, params: Arc<dyn ItemToParams>) -> Self {
        self.params = params;
        self
    }

    /// Requests started per second. Zero disables limiting.
    pub fn rate_limit(mut self, per_second: u32) -> Self {
        self.limiter.rate = per_second;
        self
    }

    pub fn limiter_window(mut self, window: Duration) -> Self {
        self.limiter.window = window;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn transport(mut self, cfg: TransportConfig) -> Self {
        self.transport = cfg;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn build(self) -> Result<BatchRunner> {
        if self.chunk_size == 0 {
            return Err(Error::configuration_with_context(
                "chunk size must be at least 1",
                ErrorContext::new()
                    .with_field_path("chunk_size")
                    .with_source("batch_runner"),
            ));
        }
        let raw = self.url_template.ok_or_else(|| {
            Error::configuration_with_context(
                "URL template is required",
                ErrorContext::new()
                    .with_field_path("url_template")
                    .with_source("batch_runner"),
            )
        })?;
        let url = Template::parse(raw)?;

        let mut headers = self.headers;
        ensure_accept_json(&mut headers);

        let transport = HttpTransport::new(&self.transport)?;
        let limiter = Arc::new(RateLimiter::new(self.limiter));
        let spec = RequestSpec::new(self.method, url).with_headers(headers);
        let dispatcher = Dispatcher::new(transport, limiter, spec, self.params).with_retry(self.retry);

        Ok(BatchRunner {
            dispatcher,
            chunk_size: self.chunk_size,
            store: BatchStore::new(self.output_dir),
        })
    }
}

impl Default for BatchRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Add `Accept: application/json` unless the caller chose an `Accept` value.
pub fn ensure_accept_json(headers: &mut HeaderMap) {
    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    }
}

/// Runs items through the dispatcher chunk by chunk.
///
/// One HTTP client and one rate limiter live for the whole runner, so the
/// requests-per-second ceiling holds across chunk boundaries.
pub struct BatchRunner {
    dispatcher: Dispatcher,
    chunk_size: usize,
    store: BatchStore,
}

impl BatchRunner {
    pub fn builder() -> BatchRunnerBuilder {
        BatchRunnerBuilder::new()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn store(&self) -> &BatchStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatch every item of one chunk concurrently and wait for all of them.
    ///
    /// All items are scheduled at once; only their start instants are throttled.
    /// Records come back in item order, one per item.
    pub async fn run_chunk(&self, chunk: &[Item]) -> Vec<ResultRecord> {
        let mut slots: Vec<Option<ResultRecord>> = (0..chunk.len()).map(|_| None).collect();

        let mut pending: FuturesUnordered<_> = chunk
            .iter()
            .enumerate()
            .map(|(idx, item)| async move { (idx, self.dispatcher.dispatch(item).await) })
            .collect();

        while let Some((idx, record)) = pending.next().await {
            slots[idx] = Some(record);
        }

        slots.into_iter().flatten().collect()
    }

    /// Start a pull-style run; call [`BatchRun::next_batch`] until it yields `None`.
    pub fn start(&self, items: Vec<Item>) -> BatchRun<'_> {
        let ranges = chunk_ranges(items.len(), self.chunk_size).collect();
        BatchRun {
            runner: self,
            run_id: Uuid::new_v4(),
            items,
            ranges,
            next: 0,
            summary: RunSummary::default(),
        }
    }

    /// Process all chunks in order, handing each batch to `sink` before the next starts.
    pub async fn run<S: BatchSink>(&self, items: Vec<Item>, sink: &mut S) -> Result<RunSummary> {
        let mut run = self.start(items);
        info!(
            run_id = %run.run_id,
            items = run.items.len(),
            batches = run.total_batches(),
            "Starting batch run"
        );
        while let Some(batch) = run.next_batch().await? {
            sink.accept(&batch).await?;
        }
        let summary = run.into_summary();
        info!(
            batches = summary.batches,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Batch run finished"
        );
        Ok(summary)
    }

    /// Blocking entry point driving [`BatchRunner::run`] on the given runtime.
    pub fn run_blocking<S: BatchSink>(
        &self,
        runtime: &tokio::runtime::Runtime,
        items: Vec<Item>,
        sink: &mut S,
    ) -> Result<RunSummary> {
        runtime.block_on(self.run(items, sink))
    }
}

/// An in-progress run. Chunks are processed strictly in order, one per call.
pub struct BatchRun<'a> {
    runner: &'a BatchRunner,
    run_id: Uuid,
    items: Vec<Item>,
    ranges: Vec<Range<usize>>,
    next: usize,
    summary: RunSummary,
}

impl<'a> BatchRun<'a> {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn total_batches(&self) -> usize {
        self.ranges.len()
    }

    pub fn remaining_batches(&self) -> usize {
        self.ranges.len() - self.next
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }

    /// Run the next chunk to completion, persist it, and return it.
    pub async fn next_batch(&mut self) -> Result<Option<Batch>> {
        let Some(range) = self.ranges.get(self.next).cloned() else {
            return Ok(None);
        };
        let index = self.next;
        let chunk = &self.items[range];
        debug!(run_id = %self.run_id, batch = index, items = chunk.len(), "Dispatching batch");

        let started = Instant::now();
        let records = self.runner.run_chunk(chunk).await;
        debug_assert_eq!(records.len(), chunk.len());
        let batch = Batch::new(index, records);

        if let Some(last) = batch.last() {
            info!(run_id = %self.run_id, batch = index, "Head of last result: {}", preview(last, PREVIEW_CHARS));
        }
        info!(
            run_id = %self.run_id,
            batch = index,
            succeeded = batch.success_count(),
            failed = batch.failure_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Saving batch {} to disk",
            index
        );
        let file = self.runner.store.persist(&batch).await?;

        self.summary.record(&batch, file);
        self.next += 1;
        Ok(Some(batch))
    }
}

/// First `max_chars` characters of the record's JSON encoding.
pub fn preview(record: &ResultRecord, max_chars: usize) -> String {
    let encoded = serde_json::to_string(record)
        .unwrap_or_else(|e| format!("<unserializable record: {}>", e));
    encoded.chars().take(max_chars).collect()
}
