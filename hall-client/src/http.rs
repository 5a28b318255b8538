//! HTTP client for the session backend

use crate::{ClientConfig, ClientError, ClientResult};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use shared::ApiErrorBody;
use std::time::Duration;

/// Network client talking HTTP/JSON to the session backend
#[derive(Debug, Clone)]
pub struct HallClient {
    client: Client,
    base_url: String,
}

impl HallClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Append `segments` to the base URL, percent-encoding each one
    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|err| {
            ClientError::Validation(format!("invalid base url {}: {err}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::Validation(format!("base url {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ClientResult<T> {
        let url = self.url(segments)?;
        tracing::debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> ClientResult<T> {
        let url = self.url(segments)?;
        tracing::debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Map non-2xx statuses to [`ClientError::Server`] carrying the backend's
    /// `{message}` when there is one
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = ApiErrorBody::parse(&text).and_then(|body| body.text());
            tracing::debug!(status = status.as_u16(), ?message, "Backend rejected request");
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> HallClient {
        HallClient::new(&ClientConfig::new(base_url)).unwrap()
    }

    #[test]
    fn test_url_joins_segments_under_base_path() {
        let url = client("http://localhost:3001/api/").url(&["sessions", "active"]);
        assert_eq!(url.unwrap().as_str(), "http://localhost:3001/api/sessions/active");

        let url = client("http://localhost:3001").url(&["sessions"]);
        assert_eq!(url.unwrap().as_str(), "http://localhost:3001/sessions");
    }

    #[test]
    fn test_url_encodes_reserved_characters_in_ids() {
        let url = client("http://localhost:3001")
            .url(&["sessions", "a/b?c#d", "items"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3001/sessions/a%2Fb%3Fc%23d/items"
        );
    }

    #[test]
    fn test_url_rejects_unparseable_base() {
        let err = client("not a url").url(&["sessions"]).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }
}
