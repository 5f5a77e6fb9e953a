//! HTTP transport: one pooled client shared by every request of a run.

mod http;

pub use http::{HttpMethod, HttpTransport, TransportConfig, TransportError};
