use async_trait::async_trait;

use crate::error::Result;

/// Minimal async HTTP client trait that can be implemented with any HTTP library.
///
/// The RPC client only needs to POST a JSON body and read the response back.
/// Consumers that already carry an HTTP stack can implement this instead of
/// enabling the bundled `reqwest-client` feature.
///
/// ```ignore
/// use async_trait::async_trait;
/// use backend_bitcoind::{HttpClient, error::Result};
///
/// #[derive(Clone)]
/// struct MyHttpClient;
///
/// #[async_trait]
/// impl HttpClient for MyHttpClient {
///     async fn post_json(
///         &self,
///         url: &str,
///         json_body: &str,
///         credentials: Option<&(String, String)>,
///     ) -> Result<String> {
///         Ok("{\"result\":null,\"error\":null,\"id\":0}".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync + Clone {
    /// Perform a POST request with a JSON body.
    ///
    /// # Arguments
    /// * `url` - The full URL to request
    /// * `json_body` - The JSON body as a string
    /// * `credentials` - HTTP Basic user and password
    ///
    /// # Returns
    /// The response body as a string. bitcoind answers RPC errors with a
    /// non-2xx status and a JSON body, so implementations should return the
    /// body for any status that carries one.
    async fn post_json(
        &self,
        url: &str,
        json_body: &str,
        credentials: Option<&(String, String)>,
    ) -> Result<String>;
}
