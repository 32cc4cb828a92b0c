use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{FetchRequest, FetchResponse, Transport};
use crate::errors::FeedwallResult;

const USER_AGENT: &str = concat!("feedwall/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed transport shared by every poller.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &FetchRequest) -> FeedwallResult<FetchResponse> {
        let mut builder = self.client.get(&request.url);
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        debug!(url = %request.url, status, bytes = body.len(), "fetched");
        Ok(FetchResponse::new(status, body.to_vec()))
    }
}
