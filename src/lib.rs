//! # batch-fetch
//!
//! 限流并发批量 HTTP 请求引擎：按块执行、逐块落盘、逐块回调。
//!
//! Rate-limited concurrent batch-request engine for rate-limited HTTP APIs.
//!
//! ## Overview
//!
//! Takes an arbitrary list of items, issues exactly one request per item (GET or
//! POST) under a global requests-per-second ceiling, collects one normalized
//! outcome per item without letting one failure abort the batch, and persists
//! results in fixed-size chunks so the caller can checkpoint between chunks.
//!
//! ## Key Features
//!
//! - **Rate limiting**: sliding-window limiter shared by every request of a run
//! - **Failure isolation**: non-200 statuses, transport errors, template misses and
//!   bad JSON bodies are recorded per item, never propagated
//! - **Chunked persistence**: `results_batch-<n>.json` written after each chunk
//! - **Pluggable parameters**: [`ItemToParams`] strategy injected at construction
//! - **Audit trail**: [`audit::CsvAuditLog`] records success/failure counts per chunk
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_fetch::{BatchRunner, Item, ParamMapping};
//!
//! #[tokio::main]
//! async fn main() -> batch_fetch::Result<()> {
//!     let runner = BatchRunner::builder()
//!         .url_template("https://api.example.com/users/{user_id}/fees/{fee_id}")
//!         .method(batch_fetch::HttpMethod::Post)
//!         .params(ParamMapping::new().fixed("op", "waive").field("amount", "amount"))
//!         .rate_limit(25)
//!         .build()?;
//!
//!     let items = vec![Item::new().with("user_id", "u1").with("fee_id", "f1").with("amount", 5)];
//!     let mut batches: Vec<batch_fetch::Batch> = Vec::new();
//!     let summary = runner.run(items, &mut batches).await?;
//!     println!("{} succeeded, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`batch`] | Chunking, per-chunk fan-out, persistence, sinks |
//! | [`dispatch`] | One item → one request → one [`ResultRecord`] |
//! | [`resilience`] | Rate limiter and opt-in retry policy |
//! | [`transport`] | Shared pooled HTTP client |
//! | [`types`] | Items, records, batches |
//! | [`config`] | YAML run configuration |
//! | [`source`] | CSV / JSON item loading |
//! | [`audit`] | CSV audit log sink |

pub mod audit;
pub mod batch;
pub mod config;
pub mod dispatch;
pub mod resilience;
pub mod source;
pub mod transport;
pub mod types;
pub mod utils;

pub use batch::{BatchRun, BatchRunner, BatchRunnerBuilder, BatchSink, RunSummary};
pub use config::RunConfig;
pub use dispatch::{Dispatcher, ItemToParams, NoParams, ParamMapping, Params};
pub use transport::HttpMethod;
pub use types::{Batch, Item, Payload, ResultRecord};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
