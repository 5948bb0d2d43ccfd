// src/api/client.rs

//! HTTP implementation of the catalog capability against the Discogs
//! REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, CollectionValue, Credentials, PageQuery};
use crate::utils::http;

use super::CatalogApi;

/// Longest error-body excerpt carried into an error message.
const BODY_SNIPPET_LEN: usize = 200;

/// Authenticated client for the Discogs REST API.
pub struct DiscogsClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl DiscogsClient {
    /// Build a client from config and resolved credentials.
    pub fn new(config: &ApiConfig, credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            base_url: Url::parse(&config.base_url)?,
            token: credentials.token.clone(),
        })
    }

    fn collection_url(&self, query: &PageQuery) -> Result<Url> {
        let mut url = self.base_url.join(&format!(
            "users/{}/collection/folders/{}/releases",
            query.username, query.folder
        ))?;
        url.query_pairs_mut()
            .append_pair("page", &query.page.to_string())
            .append_pair("per_page", &query.per_page.to_string());
        Ok(url)
    }

    fn value_url(&self, username: &str) -> Result<Url> {
        Ok(self
            .base_url
            .join(&format!("users/{}/collection/value", username))?)
    }

    /// Issue an authenticated GET and map non-success statuses onto the
    /// error taxonomy. Success returns the raw body text.
    async fn get_text(&self, url: Url) -> Result<String> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Discogs token={}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::auth(format!(
                "the API rejected the token (HTTP {})",
                status.as_u16()
            )),
            StatusCode::NOT_FOUND => AppError::not_found(snippet_or(&body, "no such resource")),
            StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited { retry_after },
            s if s.is_server_error() => AppError::Server {
                status: s.as_u16(),
            },
            s => AppError::Api {
                status: s.as_u16(),
                message: snippet_or(&body, "unexpected response"),
            },
        })
    }
}

#[async_trait]
impl CatalogApi for DiscogsClient {
    async fn get_page(&self, query: &PageQuery) -> Result<serde_json::Value> {
        let body = self.get_text(self.collection_url(query)?).await?;
        serde_json::from_str(&body)
            .map_err(|e| AppError::decode(format!("collection page {}", query.page), e))
    }

    async fn get_value(&self, username: &str) -> Result<CollectionValue> {
        let body = self.get_text(self.value_url(username)?).await?;
        serde_json::from_str(&body).map_err(|e| AppError::decode("collection value", e))
    }
}

fn snippet_or(body: &str, fallback: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.chars().take(BODY_SNIPPET_LEN).collect()
}
