use super::scrub::sanitize_api_error;
use super::types::{
    AiModeRequest, AiModeResponse, CandidateListBody, CandidateProfile, EvaluationHistoryBody,
    EvaluationReceipt, EvaluationRequest, EvaluationSession,
};
use crate::config::ApiConfig;
use crate::error::ApiError;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

pub const AI_MODE_PATH: &str = "api/assistant/ai-mode";
pub const EVALUATIONS_PATH: &str = "api/candidates/evaluations";
pub const CANDIDATES_PATH: &str = "api/candidates";

type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// The marketplace endpoints the AI search depends on.
pub trait MarketplaceApi: Send + Sync {
    fn ai_mode<'a>(&'a self, request: &'a AiModeRequest) -> ApiFuture<'a, AiModeResponse>;

    fn save_evaluations<'a>(
        &'a self,
        request: &'a EvaluationRequest,
    ) -> ApiFuture<'a, EvaluationReceipt>;

    fn evaluation_history(&self) -> ApiFuture<'_, Vec<EvaluationSession>>;

    fn list_candidates<'a>(
        &'a self,
        search: Option<&'a str>,
    ) -> ApiFuture<'a, Vec<CandidateProfile>>;
}

pub fn build_http_client(config: &ApiConfig) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// reqwest-backed client for the marketplace REST API.
pub struct HttpMarketplaceClient {
    base_url: Url,
    /// Pre-computed `"Bearer <token>"` header value.
    cached_auth_header: Option<String>,
    client: Client,
}

impl HttpMarketplaceClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|e| ApiError::Url(format!("{raw}: {e}")))?;

        Ok(Self {
            base_url,
            cached_auth_header: config
                .auth_token
                .as_deref()
                .filter(|token| !token.is_empty())
                .map(|token| format!("Bearer {token}")),
            client: build_http_client(config),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Url(format!("{path}: {e}")))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.cached_auth_header {
            Some(header) => builder.header("Authorization", header),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let endpoint = format!("/{path}");
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                endpoint: endpoint.clone(),
                message: sanitize_api_error(&e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
                body: sanitize_api_error(&body),
            });
        }

        let bytes = response.bytes().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.clone(),
            message: sanitize_api_error(&e.to_string()),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }
}

impl MarketplaceApi for HttpMarketplaceClient {
    fn ai_mode<'a>(&'a self, request: &'a AiModeRequest) -> ApiFuture<'a, AiModeResponse> {
        Box::pin(async move {
            let url = self.endpoint(AI_MODE_PATH)?;
            tracing::debug!(
                phase = %request.phase,
                history = request.conversation_history.len(),
                "POST ai-mode"
            );
            self.send_json(AI_MODE_PATH, self.client.post(url).json(request))
                .await
        })
    }

    fn save_evaluations<'a>(
        &'a self,
        request: &'a EvaluationRequest,
    ) -> ApiFuture<'a, EvaluationReceipt> {
        Box::pin(async move {
            let url = self.endpoint(EVALUATIONS_PATH)?;
            let receipt: EvaluationReceipt = self
                .send_json(EVALUATIONS_PATH, self.client.post(url).json(request))
                .await?;
            if !receipt.success {
                return Err(ApiError::Server {
                    endpoint: format!("/{EVALUATIONS_PATH}"),
                    message: "evaluation save was not acknowledged".into(),
                });
            }
            Ok(receipt)
        })
    }

    fn evaluation_history(&self) -> ApiFuture<'_, Vec<EvaluationSession>> {
        Box::pin(async move {
            let url = self.endpoint(EVALUATIONS_PATH)?;
            let body: EvaluationHistoryBody = self
                .send_json(EVALUATIONS_PATH, self.client.get(url))
                .await?;
            Ok(body.into())
        })
    }

    fn list_candidates<'a>(
        &'a self,
        search: Option<&'a str>,
    ) -> ApiFuture<'a, Vec<CandidateProfile>> {
        Box::pin(async move {
            let url = self.endpoint(CANDIDATES_PATH)?;
            let mut builder = self.client.get(url);
            if let Some(query) = search.map(str::trim).filter(|q| !q.is_empty()) {
                builder = builder.query(&[("search", query)]);
            }
            let body: CandidateListBody = self.send_json(CANDIDATES_PATH, builder).await?;
            Ok(body.into())
        })
    }
}
