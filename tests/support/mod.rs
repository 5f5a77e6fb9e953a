//! Mock HTTP server setup for integration tests

#![allow(dead_code)]

use batch_fetch::types::Item;
use mockito::{Matcher, Mock, Server, ServerGuard};

/// Test fixture that owns a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// `<base_url><path>` — for URL templates and expected record URLs
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a mock for a successful JSON response
    pub async fn mock_json(&mut self, method: &str, path: impl Into<Matcher>, body: &str) -> Mock {
        self.server
            .mock(method, path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock returning `status` with an error body
    pub async fn mock_status(&mut self, method: &str, path: impl Into<Matcher>, status: usize) -> Mock {
        self.server
            .mock(method, path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(r#"{"errorsExist": true}"#)
            .create_async()
            .await
    }
}

/// `n` items with ids "0".."n-1"
pub fn id_items(n: usize) -> Vec<Item> {
    (0..n).map(|i| Item::new().with("id", i.to_string())).collect()
}

/// A URL nothing is listening on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
