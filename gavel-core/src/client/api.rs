//! HTTP client for the review pipeline API.
//!
//! Request/response half of the adapter. The historical timeline fetch is
//! lenient per event: one malformed payload is skipped with a warning instead
//! of poisoning the whole batch, so a partially broken backend still yields a
//! usable timeline.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Serialize;

use crate::config::ConsoleConfig;
use crate::error::{Error, Result};
use crate::types::{ConsoleOptions, RevealRequest, RunMeta, SubmitOutcome, TimelineEvent};

/// A new interaction entered in the console form.
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleSubmission {
    pub prompt: String,
    pub scenario_id: String,
    pub judge_id: String,
}

impl ConsoleSubmission {
    /// Local checks applied before any network call.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::Validation("prompt must not be empty".to_string()));
        }
        if self.scenario_id.is_empty() {
            return Err(Error::Validation("select a scenario".to_string()));
        }
        if self.judge_id.is_empty() {
            return Err(Error::Validation("select a judge".to_string()));
        }
        Ok(())
    }
}

/// HTTP client for the pipeline API.
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    poll_interval_secs: f64,
}

impl ApiClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ConsoleConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.endpoint.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            poll_interval_secs: config.poll_interval_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the push channel for a run.
    pub fn stream_url(&self, run_id: &str, replay: bool) -> String {
        format!(
            "{}/stream?run_id={}&replay={}&poll_interval={}",
            self.base_url,
            urlencoding::encode(run_id),
            replay,
            self.poll_interval_secs
        )
    }

    /// List known runs, most recently started first.
    pub async fn list_runs(&self) -> Result<Vec<RunMeta>> {
        let url = format!("{}/runs", self.base_url);
        let mut runs: Vec<RunMeta> = self.get_json(&url).await?;
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    /// Scenario and judge choices for the submission form.
    pub async fn console_options(&self) -> Result<ConsoleOptions> {
        let url = format!("{}/console/options", self.base_url);
        self.get_json(&url).await
    }

    /// Fetch the historical event batch for a run.
    ///
    /// Events that fail to deserialize are skipped and logged rather than
    /// failing the batch.
    pub async fn fetch_timeline(&self, run_id: &str) -> Result<Vec<TimelineEvent>> {
        let url = format!(
            "{}/runs/{}/timeline",
            self.base_url,
            urlencoding::encode(run_id)
        );
        let raw: Vec<serde_json::Value> = self.get_json(&url).await?;

        let mut events = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<TimelineEvent>(value) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(run_id, error = %e, "Skipping malformed timeline event");
                }
            }
        }

        tracing::debug!(run_id, count = events.len(), "Fetched historical timeline");
        Ok(events)
    }

    /// Submit a new interaction. The returned events are merged into the
    /// live feed for immediate display.
    pub async fn submit(&self, submission: &ConsoleSubmission) -> Result<SubmitOutcome> {
        submission.validate()?;

        let url = format!("{}/console", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(submission)
            .send()
            .await
            .map_err(|e| Error::Network(format!("console submission failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("failed to parse submission response: {}", e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Network(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }

    /// Record a reveal in the audit trail. Nothing beyond success/failure is
    /// consumed from the response.
    pub async fn log_reveal(&self, request: &RevealRequest) -> Result<()> {
        let url = format!("{}/reveal", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Reveal(format!("audit call failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(
                run_id = %request.run_id,
                exchange_id = %request.exchange_id,
                field = %request.field,
                "Reveal recorded in audit trail"
            );
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Reveal(format!(
                "audit rejected ({}): {}",
                status, error_text
            )))
        }
    }

    /// Check whether the backend is reachable.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/runs", self.base_url);
        match self.http_client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("failed to parse response: {}", e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Network(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_valid_config() {
        let config = ConsoleConfig {
            endpoint: " ".to_string(),
            ..Default::default()
        };
        assert!(ApiClient::new(&config).is_err());
        assert!(ApiClient::new(&ConsoleConfig::default()).is_ok());
    }

    #[test]
    fn test_stream_url_encodes_run_id() {
        let client = ApiClient::new(&ConsoleConfig::default()).unwrap();
        let url = client.stream_url("run 1/a", true);
        assert_eq!(
            url,
            "http://127.0.0.1:8000/stream?run_id=run%201%2Fa&replay=true&poll_interval=0.5"
        );
    }

    #[test]
    fn test_submission_validation_precedes_network() {
        let submission = ConsoleSubmission {
            prompt: "  ".to_string(),
            scenario_id: "s1".to_string(),
            judge_id: "j1".to_string(),
        };
        assert!(matches!(
            submission.validate(),
            Err(Error::Validation(_))
        ));

        let submission = ConsoleSubmission {
            prompt: "question".to_string(),
            scenario_id: String::new(),
            judge_id: "j1".to_string(),
        };
        assert!(submission.validate().is_err());

        let submission = ConsoleSubmission {
            prompt: "question".to_string(),
            scenario_id: "s1".to_string(),
            judge_id: "j1".to_string(),
        };
        assert!(submission.validate().is_ok());
    }
}
