use serde::de::DeserializeOwned;
use serde_json::Value;
use serenity::async_trait;
use thiserror::Error;
use tracing::debug;

use super::types::{CreatePrediction, Model, Prediction};

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Replicate request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Replicate returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// The parts of the Replicate API the bot talks to.
#[async_trait]
pub trait ReplicateApi: Send + Sync {
    async fn model(&self, owner: &str, name: &str) -> Result<Model, ApiError>;
    async fn create_prediction(&self, version: &str, input: &Value)
        -> Result<Prediction, ApiError>;
    async fn prediction(&self, id: &str) -> Result<Prediction, ApiError>;
}

pub struct HttpReplicate {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}
impl HttpReplicate {
    pub fn new(api_base: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ReplicateApi for HttpReplicate {
    async fn model(&self, owner: &str, name: &str) -> Result<Model, ApiError> {
        debug!(owner, name, "looking up Replicate model");
        self.send(self.http.get(self.url(&format!("models/{owner}/{name}"))))
            .await
    }

    async fn create_prediction(
        &self,
        version: &str,
        input: &Value,
    ) -> Result<Prediction, ApiError> {
        self.send(
            self.http
                .post(self.url("predictions"))
                .json(&CreatePrediction { version, input }),
        )
        .await
    }

    async fn prediction(&self, id: &str) -> Result<Prediction, ApiError> {
        self.send(self.http.get(self.url(&format!("predictions/{id}"))))
            .await
    }
}
