//! Error types for the Ahuri client.
//!
//! Every failure the client can hit maps to one variant here.  Failures before
//! the socket is open (configuration, channel lookup, connecting) and failures
//! that end the receive loop (decode errors, invalid responses) are all
//! terminal for the invocation; nothing in the crate retries.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// The main error type for the Ahuri client.
#[derive(Clone, Debug)]
pub enum Error {
    /// A required configuration value is absent or has the wrong type.
    ConfigMissing {
        /// The configuration key that was looked up.
        key: String,
        /// Human-readable error message.
        message: String,
    },

    /// The API answered with an unexpected status code.
    LookupFailed {
        /// HTTP status code.
        status_code: u16,
        /// The diagnostic `message` from the body, when it had one.
        message: Option<String>,
        /// The raw response body.
        body: String,
    },

    /// The API answered with the expected status but a body we cannot use.
    MalformedResponse {
        /// The URL that produced the response.
        url: String,
        /// The raw response body.
        body: String,
    },

    /// The socket or HTTP connection could not be established or broke.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// An inbound frame was not a JSON object.
    Decode {
        /// Human-readable error message.
        message: String,
        /// The raw frame text.
        frame: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// An inbound frame parsed but carried no usable payload.
    InvalidResponse {
        /// The best diagnostic available: the frame's `message`, or the frame itself.
        message: String,
    },

    /// A value failed validation before any I/O happened.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// An HTTP request timed out.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },
}

impl Error {
    /// Creates a new missing-configuration error.
    pub fn config_missing(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigMissing {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a new lookup error.
    pub fn lookup_failed(
        status_code: u16,
        message: Option<String>,
        body: impl Into<String>,
    ) -> Self {
        Error::LookupFailed {
            status_code,
            message,
            body: body.into(),
        }
    }

    /// Creates a new malformed-response error.
    pub fn malformed_response(url: impl Into<String>, body: impl Into<String>) -> Self {
        Error::MalformedResponse {
            url: url.into(),
            body: body.into(),
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new decode error for the given raw frame.
    pub fn decode(
        message: impl Into<String>,
        frame: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Decode {
            message: message.into(),
            frame: frame.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new invalid-response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Error::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Returns true if a configuration value was missing.
    pub fn is_config_missing(&self) -> bool {
        matches!(self, Error::ConfigMissing { .. })
    }

    /// Returns true if the API rejected a lookup.
    pub fn is_lookup_failed(&self) -> bool {
        matches!(self, Error::LookupFailed { .. })
    }

    /// Returns true if a success response had an unusable body.
    pub fn is_malformed_response(&self) -> bool {
        matches!(self, Error::MalformedResponse { .. })
    }

    /// Returns true if this error is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns true if an inbound frame could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }

    /// Returns true if an inbound frame had no usable payload.
    pub fn is_invalid_response(&self) -> bool {
        matches!(self, Error::InvalidResponse { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::LookupFailed { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigMissing { message, .. } => {
                write!(f, "{message}")
            }
            Error::LookupFailed {
                status_code,
                message: Some(message),
                ..
            } => {
                write!(f, "{status_code}: {message}")
            }
            Error::LookupFailed {
                status_code,
                message: None,
                body,
            } => {
                write!(f, "Status code {status_code} returned.\n{body}")
            }
            Error::MalformedResponse { url, .. } => {
                write!(f, "Invalid response text received from {url}.")
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::Decode { message, .. } => {
                write!(f, "Decode error: {message}")
            }
            Error::InvalidResponse { message } => {
                write!(f, "Invalid websocket response: {message}")
            }
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Decode { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for Ahuri operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_failed_display_and_status() {
        let err = Error::lookup_failed(
            404,
            Some("not found".to_string()),
            r#"{"message":"not found"}"#,
        );
        assert!(err.is_lookup_failed());
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.to_string(), "404: not found");
    }

    #[test]
    fn lookup_failed_without_message_shows_body() {
        let err = Error::lookup_failed(502, None, "Bad Gateway");
        assert_eq!(err.to_string(), "Status code 502 returned.\nBad Gateway");
    }

    #[test]
    fn malformed_response_mentions_url() {
        let err = Error::malformed_response("http://localhost/channel/c1", "<html>");
        assert!(err.is_malformed_response());
        assert_eq!(err.status_code(), None);
        assert!(err.to_string().contains("http://localhost/channel/c1"));
    }

    #[test]
    fn source_is_preserved() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::decode("bad frame", "{", Some(Box::new(json_err)));
        assert!(err.is_decode());
        assert!(error::Error::source(&err).is_some());

        let err = Error::invalid_response("channel closed");
        assert!(error::Error::source(&err).is_none());
    }

    #[test]
    fn io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io { .. }));
    }
}
