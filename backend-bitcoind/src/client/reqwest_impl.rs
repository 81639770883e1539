use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::http_trait::HttpClient;
use crate::error::{Error, Result};

/// Async HTTP client implementation using reqwest.
///
/// Connection pooling lets the block pipeline keep many `getblock` calls in
/// flight over a handful of sockets.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a new reqwest HTTP client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::HttpPost(format!("failed to build client: {e}")))?;
        Ok(Self { client })
    }

    /// Create a new reqwest HTTP client with a custom client configuration.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post_json(
        &self,
        url: &str,
        json_body: &str,
        credentials: Option<&(String, String)>,
    ) -> Result<String> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(json_body.to_string());
        if let Some((user, password)) = credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::HttpPost(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::HttpPost(format!("node rejected credentials ({status})")));
        }

        // RPC errors come back as 404/500 with a JSON body
        response
            .text()
            .await
            .map_err(|e| Error::ResponseBody(e.to_string()))
    }
}
