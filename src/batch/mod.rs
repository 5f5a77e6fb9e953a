//! 批处理模块：分块、限流并发执行、落盘与回调。
//!
//! # Batch Runner Module
//!
//! Splits an item list into fixed-size chunks and, for each chunk in order:
//!
//! 1. dispatches every item concurrently (gated by one shared rate limiter,
//!    over one shared connection pool) and waits for all of them
//! 2. logs a preview of the chunk's last record
//! 3. writes the chunk to `results_batch-<index>.json`
//! 4. hands the batch back to the caller before the next chunk starts
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`BatchRunner`] | Owns the dispatcher, chunk size and store |
//! | [`BatchRunnerBuilder`] | Configures method, URL template, headers, params, limits |
//! | [`BatchRun`] | Pull-style iteration: one chunk per `next_batch()` |
//! | [`BatchStore`] | JSON batch files on disk |
//! | [`BatchSink`] | Consumer of completed batches (e.g. the audit log) |
//!
//! ## Example
//!
//! ```rust,no_run
//! use batch_fetch::batch::BatchRunner;
//! use batch_fetch::types::Item;
//!
//! # async fn demo() -> batch_fetch::Result<()> {
//! let runner = BatchRunner::builder()
//!     .url_template("https://api.example.com/item/{id}")
//!     .rate_limit(25)
//!     .chunk_size(1000)
//!     .output_dir("./results")
//!     .build()?;
//!
//! let items = vec![Item::new().with("id", "7"), Item::new().with("id", "8")];
//! let mut run = runner.start(items);
//! while let Some(batch) = run.next_batch().await? {
//!     println!("batch {}: {} ok, {} failed", batch.index, batch.success_count(), batch.failure_count());
//! }
//! # Ok(())
//! # }
//! ```

mod chunking;
mod executor;
mod sink;
mod store;

pub use chunking::{chunk_count, chunk_ranges};
pub use executor::{
    ensure_accept_json, preview, BatchRun, BatchRunner, BatchRunnerBuilder, RunSummary,
    DEFAULT_CHUNK_SIZE, DEFAULT_RATE_LIMIT, PREVIEW_CHARS,
};
pub use sink::{BatchSink, NoopSink};
pub use store::BatchStore;
