//! Shared plumbing for the reqwest-backed clients.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::{ClientError, ClientResult};

/// Connection settings for one remote service.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Bearer token sent with every request, if set.
    pub token: Option<String>,
}

/// A base URL plus a configured reqwest client.
#[derive(Debug, Clone)]
pub(crate) struct RestClient {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl RestClient {
    pub(crate) fn new(config: &HttpClientConfig) -> ClientResult<Self> {
        let base = Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base,
            token: config.token.clone(),
        })
    }

    /// Append path segments (each percent-encoded) to the base URL.
    pub(crate) fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request, turning non-2xx responses into [`ClientError::Remote`].
    pub(crate) async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        debug!("{} -> {}", response.url(), status);

        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Remote {
            status: status.as_u16(),
            body,
            url,
        })
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ClientResult<T> {
        let response = self.send(self.request(Method::GET, url)).await?;
        decode(response).await
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}
