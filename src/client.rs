use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A raw HTTP response: status, final URL and body text.
///
/// The body is kept as text so that callers can report it verbatim when it is
/// not the JSON they expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// The URL that produced the response.
    pub url: String,
    /// The response body.
    pub body: String,
}

impl ApiResponse {
    /// Create a new response.
    pub fn new(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    /// Extract the `payload` field of an `expected`-status response.
    ///
    /// Any other status is [`Error::LookupFailed`] carrying the raw body and
    /// the body's `message` when it has one.  The expected status with
    /// a body that is not JSON, or whose `payload` does not deserialize as
    /// `T`, is [`Error::MalformedResponse`].
    pub fn payload<T: DeserializeOwned>(self, expected: u16) -> Result<T> {
        #[derive(Deserialize)]
        struct Envelope<T> {
            payload: T,
        }

        if self.status != expected {
            let message = self.diagnostic_message();
            return Err(Error::lookup_failed(self.status, message, self.body));
        }
        match serde_json::from_str::<Envelope<T>>(&self.body) {
            Ok(envelope) => Ok(envelope.payload),
            Err(err) => {
                tracing::debug!(url = %self.url, error = %err, "response body is not usable");
                Err(Error::malformed_response(self.url, self.body))
            }
        }
    }

    /// The `message` field of a JSON body, if there is one.
    pub fn diagnostic_message(&self) -> Option<String> {
        serde_json::from_str::<Value>(&self.body)
            .ok()?
            .get("message")?
            .as_str()
            .map(String::from)
    }
}

/// One-shot authenticated requests against the REST API.
///
/// Paths are given as segments relative to the API root, so
/// `["channel", id]` requests `{api}/channel/{id}`.
#[async_trait]
pub trait RequestClient: Send + Sync {
    /// Issue a `GET`.
    async fn get(&self, segments: &[&str]) -> Result<ApiResponse>;

    /// Issue a `POST` with a JSON body.
    async fn post(&self, segments: &[&str], body: &Value) -> Result<ApiResponse>;
}

/// Client for the Ahuri REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    token: Option<String>,
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl ApiClient {
    /// Create a new client for `base_url`, authenticating with `token`.
    pub fn new(base_url: Url, token: Option<String>) -> Result<Self> {
        Self::with_options(base_url, token, None)
    }

    /// Create a new client with a custom request timeout.
    pub fn with_options(
        base_url: Url,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::url(
                format!("{base_url} cannot be used as an API root"),
                None,
            ));
        }
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            token,
            client,
            base_url,
            timeout,
        })
    }

    /// The API root.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the URL of `segments` below the API root.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::url(
                    format!("{} cannot be used as an API root", self.base_url),
                    None,
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(token).map_err(|_| {
                Error::validation(
                    "auth token contains characters not allowed in a header",
                    Some("user.token".to_string()),
                )
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn execute(&self, method: &str, url: Url, request: RequestBuilder) -> Result<ApiResponse> {
        tracing::debug!(%method, %url, "sending request to API");
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = self.send(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        match &result {
            Ok(response) => {
                tracing::debug!(status = response.status, body = %response.body, "API response");
            }
            Err(err) => {
                CLIENT_REQUEST_ERRORS.click();
                tracing::debug!(error = %err, "API request failed");
            }
        }
        result
    }

    async fn send(&self, request: RequestBuilder) -> Result<ApiResponse> {
        let response = request
            .headers(self.default_headers()?)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await.map_err(|e| {
            Error::http_client(
                format!("Failed to read response body: {}", e),
                Some(Box::new(e)),
            )
        })?;
        Ok(ApiResponse { status, url, body })
    }
}

#[async_trait]
impl RequestClient for ApiClient {
    async fn get(&self, segments: &[&str]) -> Result<ApiResponse> {
        let url = self.endpoint(segments)?;
        let request = self.client.get(url.clone());
        self.execute("GET", url, request).await
    }

    async fn post(&self, segments: &[&str], body: &Value) -> Result<ApiResponse> {
        let url = self.endpoint(segments)?;
        let request = self.client.post(url.clone()).json(body);
        self.execute("POST", url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(Url::parse(base).unwrap(), Some("tok".to_string())).unwrap()
    }

    #[test]
    fn client_creation() {
        let client = ApiClient::with_options(
            Url::parse("http://localhost:81").unwrap(),
            None,
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert!(client.token.is_none());
        assert_eq!(client.base_url().as_str(), "http://localhost:81/");
    }

    #[test]
    fn endpoint_joins_segments() {
        let url = client("http://localhost:81").endpoint(&["channel", "c1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:81/channel/c1");

        let url = client("http://localhost:81/api/")
            .endpoint(&["channel", "c1", "send-message"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:81/api/channel/c1/send-message");
    }

    #[test]
    fn endpoint_escapes_segments() {
        let url = client("http://localhost").endpoint(&["channel", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost/channel/a%2Fb%20c");
    }

    #[test]
    fn non_base_url_is_rejected() {
        let err = ApiClient::new(Url::parse("mailto:someone@example.com").unwrap(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn authorization_header_is_the_bare_token() {
        let headers = client("http://localhost").default_headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "tok");
    }

    #[test]
    fn payload_success() {
        let response = ApiResponse::new(
            200,
            "http://localhost/channel/c1",
            r#"{"payload":{"id":"c1","name":"general","owner":{"id":"u1","username":"alice","tag":"0001"},"createdAt":"2024-01-01"}}"#,
        );
        let channel: Channel = response.payload(200).unwrap();
        assert_eq!(channel.name, "general");
    }

    #[test]
    fn payload_error_prefers_message() {
        let response = ApiResponse::new(404, "http://localhost", r#"{"message":"not found"}"#);
        let err = response.payload::<Channel>(200).unwrap_err();
        assert!(err.is_lookup_failed());
        assert_eq!(err.status_code(), Some(404));
        assert!(matches!(err, Error::LookupFailed { message: Some(ref message), .. } if message == "not found"));
        assert_eq!(err.to_string(), "404: not found");
    }

    #[test]
    fn payload_error_falls_back_to_body() {
        let response = ApiResponse::new(502, "http://localhost", "Bad Gateway");
        let err = response.payload::<Channel>(200).unwrap_err();
        assert!(matches!(
            err,
            Error::LookupFailed { status_code: 502, message: None, ref body } if body == "Bad Gateway"
        ));
        assert_eq!(err.to_string(), "Status code 502 returned.\nBad Gateway");
    }

    #[test]
    fn unexpected_success_status_is_a_lookup_failure() {
        let response = ApiResponse::new(200, "http://localhost", r#"{"payload":{}}"#);
        let err = response.payload::<Channel>(201).unwrap_err();
        assert_eq!(err.status_code(), Some(200));
    }

    #[test]
    fn payload_malformed() {
        let response = ApiResponse::new(200, "http://localhost/channel/c1", "<html>oops</html>");
        let err = response.payload::<Channel>(200).unwrap_err();
        assert!(err.is_malformed_response());

        let response = ApiResponse::new(200, "http://localhost/channel/c1", r#"{"message":"ok"}"#);
        let err = response.payload::<Channel>(200).unwrap_err();
        assert!(err.is_malformed_response());
    }
}
