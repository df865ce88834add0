//! Drover HTTP Client
//!
//! A type-safe HTTP client for the scheduler API consumed by drover workers.
//!
//! The worker only ever talks to the scheduler through this crate: polling
//! scheduled flow runs for a work pool, reading the entities a run refers
//! to, reporting run outcomes, and sending heartbeats.
//!
//! # Example
//!
//! ```no_run
//! use drover_client::SchedulerClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), drover_client::ClientError> {
//!     let client = SchedulerClient::new("http://localhost:4200");
//!
//!     let pool = client.get_work_pool("etl-pool").await?;
//!     println!("pool type: {}", pool.pool_type);
//!     Ok(())
//! }
//! ```

pub mod error;
mod deployments;
mod flow_runs;
mod work_pools;
mod workers;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the scheduler API.
///
/// Methods are grouped by resource:
/// - Flow runs (poll scheduled runs, report outcomes)
/// - Work pools (read pool and its base job template)
/// - Deployments and flows (read entities a run refers to)
/// - Workers (heartbeats)
#[derive(Debug, Clone)]
pub struct SchedulerClient {
    /// Base URL of the scheduler (e.g., "http://localhost:4200")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl SchedulerClient {
    /// Create a new scheduler client.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the scheduler API
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a scheduler client with a custom HTTP client.
    ///
    /// Allows configuring timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use drover_client::SchedulerClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = SchedulerClient::with_client("http://localhost:4200", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the scheduler.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the status code and deserialize the JSON body, or surface an
    /// appropriate error.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code for a request with no response body.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SchedulerClient::new("http://localhost:4200");
        assert_eq!(client.base_url(), "http://localhost:4200");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = SchedulerClient::new("http://localhost:4200/");
        assert_eq!(client.base_url(), "http://localhost:4200");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = SchedulerClient::with_client("http://localhost:4200", http_client);
        assert_eq!(client.base_url(), "http://localhost:4200");
    }
}
