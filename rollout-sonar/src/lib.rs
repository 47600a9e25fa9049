//! Rollout code-quality client
//!
//! A small, typed HTTP client for the code-quality server's web API.
//!
//! The pipeline uses it to follow the server-side processing of a scanner
//! report and to read the quality-gate verdict of the resulting analysis.
//!
//! # Example
//!
//! ```no_run
//! use rollout_sonar::SonarClient;
//!
//! # async fn example() -> rollout_sonar::Result<()> {
//! let client = SonarClient::new("http://localhost:9000", Some("squ_token".to_string()));
//! let task = client.ce_task("AYx1").await?;
//! if let Some(analysis_id) = task.analysis_id {
//!     let gate = client.project_status(&analysis_id).await?;
//!     println!("quality gate: {}", gate.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
mod gates;
pub mod report;
mod tasks;

pub use error::{Result, SonarError};
pub use gates::{GateCondition, ProjectStatus, QualityGateStatus};
pub use report::{REPORT_TASK_PATH, ReportTask};
pub use tasks::{CeTask, CeTaskStatus};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the code-quality server
#[derive(Debug, Clone)]
pub struct SonarClient {
    /// Base URL of the server (e.g., "http://localhost:9000")
    base_url: String,
    /// User token, sent as the basic-auth user name
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl SonarClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server
    /// * `token` - Optional user token
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(base_url, token, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, token: Option<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue an authenticated GET request
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {} {:?}", url, query);

        let mut request = self.client.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.basic_auth(token, None::<&str>);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SonarError::NotFound(error_text));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SonarError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| SonarError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
