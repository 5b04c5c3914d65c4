//! Collaborator calls consumed by the engine.
//!
//! [`MetadataApi`] is the seam the engine fetches through; [`HttpMetadataApi`]
//! is the REST implementation. Every call takes the bearer token explicitly and
//! resolves to a payload or an [`ApiError`] with a user-facing message.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, header};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    config::LoaderConfig,
    data::Row,
    error::{ApiError, ApiResult, GENERIC_ERROR_MESSAGE},
    fields::{Field, ProjectDetails, ProjectView},
};

#[async_trait]
pub trait MetadataApi: Debug + Send + Sync {
    async fn get_project_fields(&self, project: &str, token: &str) -> ApiResult<Vec<Field>>;

    async fn get_project_views(&self, project: &str, token: &str) -> ApiResult<Vec<ProjectView>>;

    async fn get_project_details(&self, project: &str, token: &str) -> ApiResult<ProjectDetails>;

    /// Rows of one view. The body is a bare JSON array, not an envelope.
    async fn get_project_view_data(
        &self,
        project: &str,
        view_id: i64,
        token: &str,
    ) -> ApiResult<Vec<Row>>;
}

/// Standard response envelope wrapping most endpoints.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    #[serde(default)]
    messages: Vec<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(rename = "ResponseMessage", default)]
    response_message: Option<String>,
}

const INVALID_TOKEN: &str = "invalid_token";

#[derive(Debug, Clone)]
pub struct HttpMetadataApi {
    base_url: String,
    http: Client,
}

impl HttpMetadataApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn from_config(config: &LoaderConfig) -> ApiResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn get(&self, path: &str, token: &str) -> ApiResult<RequestBuilder> {
        if token.is_empty() {
            return Err(ApiError::MissingToken);
        }
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url}");
        Ok(self
            .http
            .get(url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json"))
    }

    async fn call_envelope<T: DeserializeOwned>(&self, path: &str, token: &str) -> ApiResult<T> {
        let response = self.get(path, token)?.send().await?;
        check_token(&response)?;
        let status = response.status();
        let body = response.text().await?;
        let envelope = serde_json::from_str::<ApiResponse<T>>(&body).ok();
        match envelope {
            Some(ApiResponse {
                data: Some(data), ..
            }) if status.is_success() => Ok(data),
            other => {
                let message = other
                    .and_then(|env| env.messages.into_iter().find_map(|m| m.response_message))
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
                Err(ApiError::Server {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

fn check_token(response: &Response) -> ApiResult<()> {
    let expired = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains(INVALID_TOKEN));
    if expired {
        return Err(ApiError::TokenExpired);
    }
    Ok(())
}

#[async_trait]
impl MetadataApi for HttpMetadataApi {
    async fn get_project_fields(&self, project: &str, token: &str) -> ApiResult<Vec<Field>> {
        self.call_envelope(&format!("/api/Projects/{project}/project-field-list"), token)
            .await
    }

    async fn get_project_views(&self, project: &str, token: &str) -> ApiResult<Vec<ProjectView>> {
        self.call_envelope(&format!("/api/Projects/{project}/project-views"), token)
            .await
    }

    async fn get_project_details(&self, project: &str, token: &str) -> ApiResult<ProjectDetails> {
        self.call_envelope(&format!("/api/Projects/abbrev/{project}"), token)
            .await
    }

    async fn get_project_view_data(
        &self,
        project: &str,
        view_id: i64,
        token: &str,
    ) -> ApiResult<Vec<Row>> {
        let path = format!("/api/Projects/{project}/download-project-view?datasetViewId={view_id}");
        let response = self.get(&path, token)?.send().await?;
        check_token(&response)?;
        if !response.status().is_success() {
            return Err(ApiError::Server {
                status: response.status().as_u16(),
                message: "An error occurred fetching project metadata".to_string(),
            });
        }
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}
