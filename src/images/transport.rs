use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};

use crate::config::FetcherConfig;
use crate::images::ImageFetchError;

/// What the fetcher needs from an HTTP response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    /// `None` when the server sent no body.
    pub body: Option<Vec<u8>>,
}

/// Issues the outbound GET for an image URL.
#[async_trait]
pub trait ImageTransport: Send + Sync + 'static {
    async fn get(&self, url: &str) -> Result<TransportResponse, ImageFetchError>;
}

#[async_trait]
impl<T: ImageTransport + ?Sized> ImageTransport for Arc<T> {
    async fn get(&self, url: &str) -> Result<TransportResponse, ImageFetchError> {
        (**self).get(url).await
    }
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &FetcherConfig) -> Result<Self, ImageFetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/webp,image/png,image/jpeg,image/*;q=0.8,*/*;q=0.5"),
        );

        let client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers);

        // Add proxy if configured
        let client_builder = if let Some(proxy) = &config.proxy {
            match reqwest::Proxy::all(proxy) {
                Ok(proxy) => client_builder.proxy(proxy),
                Err(e) => {
                    return Err(ImageFetchError::ClientError(format!(
                        "Failed to create proxy: {}",
                        e
                    )))
                }
            }
        } else {
            client_builder
        };

        let client = client_builder
            .build()
            .map_err(|e| ImageFetchError::ClientError(format!("Failed to build client: {}", e)))?;

        Ok(Self::new(client))
    }
}

#[async_trait]
impl ImageTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, ImageFetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        // Don't read the body of a response that fails validation
        if !status.is_success() {
            return Ok(TransportResponse {
                status,
                content_type,
                body: None,
            });
        }

        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            None
        } else {
            Some(bytes.to_vec())
        };

        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}
