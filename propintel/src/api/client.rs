//! Client for the property analysis API.
//!
//! Endpoints (relative to the configured base URL):
//! - GET /health
//! - GET /questions
//! - POST /analyze

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cache::{ResponseCache, SharedStorage};
use crate::error::{AppError, AppResult};
use crate::models::{META_CONTEXT_USED, META_TOKEN_COUNT};

/// Questions offered when the API cannot provide its own.
pub const DEFAULT_QUESTIONS: &[&str] = &[
    "What are the current property market trends in Brisbane?",
    "How does interest rate change affect property values in Sydney?",
    "Analyze recent infrastructure developments impacting Melbourne property.",
    "What are the investment opportunities in Perth's residential market?",
];

/// Body of `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }

    pub fn is_degraded(&self) -> bool {
        self.status == "degraded"
    }
}

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    success: bool,
    #[serde(default)]
    preset_questions: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    question: &'a str,
    include_details: bool,
}

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub question_type: Option<String>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub context_used: Option<bool>,
    #[serde(default)]
    pub token_count: Option<u64>,
}

impl AnalyzeResponse {
    /// Metadata to record alongside the conversation entry.
    pub fn metadata(&self) -> BTreeMap<String, serde_json::Value> {
        let mut metadata = BTreeMap::new();
        if let Some(used) = self.context_used {
            metadata.insert(META_CONTEXT_USED.to_string(), used.into());
        }
        if let Some(tokens) = self.token_count {
            metadata.insert(META_TOKEN_COUNT.to_string(), tokens.into());
        }
        if let Some(kind) = &self.question_type {
            metadata.insert("question_type".to_string(), kind.clone().into());
        }
        if let Some(secs) = self.processing_time {
            metadata.insert("processing_time".to_string(), secs.into());
        }
        metadata
    }
}

const QUESTIONS_CACHE_KEY: &str = "response_cache_questions";
const ANALYZE_CACHE_KEY: &str = "response_cache_analyze";

/// HTTP client for the analysis API, with a response cache.
#[derive(Debug)]
pub struct AnalysisClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    questions_cache: ResponseCache<Vec<String>>,
    analyze_cache: ResponseCache<AnalyzeResponse>,
}

impl AnalysisClient {
    /// Create a client. Every request is aborted after `timeout`.
    ///
    /// With `storage`, cached responses are shared with earlier and later
    /// clients over the same storage.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        cache_ttl: Duration,
        storage: Option<SharedStorage>,
    ) -> AppResult<Self> {
        let client = build_client(timeout)?;
        let mut questions_cache = ResponseCache::new(cache_ttl);
        let mut analyze_cache = ResponseCache::new(cache_ttl);
        if let Some(storage) = storage {
            questions_cache = questions_cache.mirrored(Arc::clone(&storage), QUESTIONS_CACHE_KEY);
            analyze_cache = analyze_cache.mirrored(storage, ANALYZE_CACHE_KEY);
        }
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            questions_cache,
            analyze_cache,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check API health.
    pub async fn health(&self) -> AppResult<HealthResponse> {
        let resp = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| classify(&e, self.timeout))?;
        read_json(resp, self.timeout).await
    }

    /// Preset questions offered by the API.
    pub async fn questions(&self) -> AppResult<Vec<String>> {
        if let Some(cached) = self.questions_cache.get("questions") {
            return Ok(cached);
        }

        let resp = self
            .client
            .get(self.url("/questions"))
            .send()
            .await
            .map_err(|e| classify(&e, self.timeout))?;
        let body: QuestionsResponse = read_json(resp, self.timeout).await?;
        if !body.success {
            return Err(AppError::Validation(
                body.error
                    .unwrap_or_else(|| "Failed to load preset questions".to_string()),
            ));
        }

        self.questions_cache
            .insert("questions", body.preset_questions.clone());
        Ok(body.preset_questions)
    }

    /// Submit a question for analysis.
    pub async fn analyze(&self, question: &str, include_details: bool) -> AppResult<AnalyzeResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Please enter a question".into()));
        }

        let cache_key = format!("{include_details}:{question}");
        if let Some(cached) = self.analyze_cache.get(&cache_key) {
            return Ok(cached);
        }

        debug!(question, include_details, "submitting analysis");
        let resp = self
            .client
            .post(self.url("/analyze"))
            .json(&AnalyzeRequest {
                question,
                include_details,
            })
            .send()
            .await
            .map_err(|e| classify(&e, self.timeout))?;
        let body: AnalyzeResponse = read_json(resp, self.timeout).await?;

        if !body.success {
            let reason = body
                .error
                .clone()
                .unwrap_or_else(|| "Analysis failed".to_string());
            warn!(%reason, "analysis reported failure");
            return Err(AppError::Validation(reason));
        }

        self.analyze_cache.insert(cache_key, body.clone());
        Ok(body)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Build a reqwest client with a JSON content type and a hard timeout.
pub(crate) fn build_client(timeout: Duration) -> AppResult<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Network(format!("failed to build HTTP client: {e}")))
}

/// Map a transport failure onto the error taxonomy.
pub(crate) fn classify(err: &reqwest::Error, timeout: Duration) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(timeout)
    } else {
        AppError::Network(err.to_string())
    }
}

/// Reject non-2xx responses, then parse the body as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response, timeout: Duration) -> AppResult<T> {
    let status = resp.status();
    debug!(status = status.as_u16(), url = %resp.url(), "response received");
    if !status.is_success() {
        return Err(AppError::Server {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    let text = resp.text().await.map_err(|e| classify(&e, timeout))?;
    serde_json::from_str(&text).map_err(|e| AppError::Parse(e.to_string()))
}
