//! Client for the email-transport endpoint (`POST /api/send-email`).

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::client::{build_client, classify, read_json};
use crate::error::{AppError, AppResult};

/// Outbound email with a base64-encoded PDF attachment.
#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub to: String,
    pub subject: String,
    pub message: String,
    pub pdf_base64: String,
}

#[derive(Debug, Deserialize)]
struct EmailResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Sends export artifacts by email.
#[derive(Debug, Clone)]
pub struct EmailClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl EmailClient {
    /// `endpoint` is the full URL of the send-email route.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    /// Send `request`. Success requires the endpoint to answer
    /// `{"status": "sent"}`.
    pub async fn send(&self, request: &EmailRequest) -> AppResult<()> {
        if !is_plausible_address(&request.to) {
            return Err(AppError::Validation(format!(
                "'{}' is not a valid email address",
                request.to
            )));
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| classify(&e, self.timeout))?;

        if resp.status() == StatusCode::PAYLOAD_TOO_LARGE {
            warn!(
                attachment_bytes = request.pdf_base64.len(),
                "email endpoint rejected attachment size"
            );
            return Err(AppError::Capacity(
                "The PDF attachment is too large to email. Try fewer images or download the full report instead."
                    .into(),
            ));
        }

        let body: EmailResponse = read_json(resp, self.timeout).await?;
        if body.status.as_deref() == Some("sent") {
            info!(to = %request.to, "email sent");
            return Ok(());
        }

        Err(AppError::Delivery(
            body.error
                .or(body.message)
                .unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

fn is_plausible_address(addr: &str) -> bool {
    let Some((local, domain)) = addr.trim().split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
