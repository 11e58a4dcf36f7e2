//! Pipewelder Client
//!
//! The remote collaborators Pipewelder reconciles against, behind explicit
//! interfaces:
//!
//! - [`SchedulingService`]: the scheduling control plane (create, put,
//!   validate, describe, activate, delete pipelines)
//! - [`ObjectStorage`]: the object store pipeline task files are mirrored to
//!
//! Each has a real implementation ([`DataPipelineClient`],
//! [`FsObjectStorage`]) and an in-memory one ([`memory`]) for tests.
//!
//! # Example
//!
//! ```no_run
//! use pipewelder_client::{DataPipelineClient, SchedulingService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DataPipelineClient::for_region("us-west-2");
//!     let state = client.describe_state("df-0123456789ABCDEFGHIJ").await?;
//!
//!     println!("Pipeline is {}", state);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
mod pipelines;
mod service;
pub mod storage;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use service::SchedulingService;
pub use storage::{FsObjectStorage, ObjectStorage, StorageLocation, relative_files};

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Content type of the control plane's JSON protocol
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Prefix of the `X-Amz-Target` header naming the called action
const TARGET_PREFIX: &str = "DataPipeline";

/// HTTP client for the scheduling control plane
///
/// Every action is a `POST` of a JSON body to the endpoint root, with the
/// action named in the `X-Amz-Target` header. Request signing is left to
/// the transport in front of the endpoint.
#[derive(Debug, Clone)]
pub struct DataPipelineClient {
    /// Endpoint URL (e.g., "https://datapipeline.us-west-2.amazonaws.com")
    endpoint: String,
    /// HTTP client instance
    client: Client,
}

impl DataPipelineClient {
    /// Create a new client for an explicit endpoint
    ///
    /// # Example
    /// ```
    /// use pipewelder_client::DataPipelineClient;
    ///
    /// let client = DataPipelineClient::new("http://localhost:4566/");
    /// assert_eq!(client.endpoint(), "http://localhost:4566");
    /// ```
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, Client::new())
    }

    /// Create a new client for the public endpoint of `region`
    pub fn for_region(region: &str) -> Self {
        Self::new(format!("https://datapipeline.{}.amazonaws.com", region))
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // =============================================================================
    // Request Handling
    // =============================================================================

    /// Call `action` with a JSON body and deserialize the JSON response
    async fn call<B, T>(&self, action: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(action, body).await?;
        self.handle_response(response).await
    }

    /// Call `action` with a JSON body, ignoring any response content
    async fn call_empty<B>(&self, action: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let response = self.send(action, body).await?;
        self.handle_empty_response(response).await
    }

    async fn send<B>(&self, action: &str, body: &B) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        tracing::debug!("Calling {}.{}", TARGET_PREFIX, action);

        let response = self
            .client
            .post(format!("{}/", self.endpoint))
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, action))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(serde_json::to_vec(body).map_err(|e| {
                ClientError::ParseError(format!("Failed to encode {} request: {}", action, e))
            })?)
            .send()
            .await?;

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
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

    /// Handle an API response whose content is not needed
    ///
    /// This method checks the status code and returns an error if the request failed.
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
        let client = DataPipelineClient::new("http://localhost:4566");
        assert_eq!(client.endpoint(), "http://localhost:4566");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = DataPipelineClient::new("http://localhost:4566/");
        assert_eq!(client.endpoint(), "http://localhost:4566");
    }

    #[test]
    fn test_client_for_region() {
        let client = DataPipelineClient::for_region("us-west-2");
        assert_eq!(
            client.endpoint(),
            "https://datapipeline.us-west-2.amazonaws.com"
        );
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = DataPipelineClient::with_client("http://localhost:4566", http_client);
        assert_eq!(client.endpoint(), "http://localhost:4566");
    }
}
