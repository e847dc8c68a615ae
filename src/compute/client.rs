//! HTTP client for the analysis service.

use super::{parse_analysis, ComputeError, ComputeRequest, ComputeService};
use crate::config::ComputeConfig;
use crate::models::AnalysisResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Calls the analysis service with a plain GET and query parameters.
pub struct HttpComputeClient {
    config: ComputeConfig,
    http_client: reqwest::Client,
}

impl HttpComputeClient {
    pub fn new(config: ComputeConfig) -> Result<Self> {
        info!(
            "Analysis service at {} (timeout {}s, {} results)",
            config.service_url, config.timeout_seconds, config.num_results
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Build the GET request without sending it.
    pub fn build_request(&self, request: &ComputeRequest) -> reqwest::Result<reqwest::Request> {
        self.http_client
            .get(&self.config.service_url)
            .query(&[
                ("appId", request.app_id.as_str()),
                ("region", request.region.as_str()),
                ("num_results", self.config.num_results.to_string().as_str()),
                ("userId", request.user_id.as_str()),
            ])
            .build()
    }

    fn map_send_error(&self, e: reqwest::Error) -> ComputeError {
        if e.is_timeout() {
            ComputeError::Timeout {
                seconds: self.config.timeout_seconds,
            }
        } else if e.is_connect() {
            ComputeError::Connect {
                url: self.config.service_url.clone(),
            }
        } else {
            ComputeError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ComputeService for HttpComputeClient {
    async fn run(&self, request: &ComputeRequest) -> Result<AnalysisResult, ComputeError> {
        let http_request = self
            .build_request(request)
            .map_err(|e| ComputeError::Transport(e.to_string()))?;

        debug!("GET {}", http_request.url());
        let started = Instant::now();

        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Analysis service error {} for {}", status, request.app_id);
            return Err(ComputeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        let analysis = parse_analysis(&body)?;

        info!(
            "Analysis for {} ({}) computed in {:.1}s with {} competitors",
            request.app_id,
            request.region,
            started.elapsed().as_secs_f64(),
            analysis.competitors.len()
        );

        Ok(analysis)
    }
}
