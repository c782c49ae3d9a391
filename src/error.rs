use thiserror::Error;

/// Failures talking to an external data source (API-Football, Wikidata)
#[derive(Debug, Error)]
pub enum SourceError {
    /// Request timed out before a response arrived
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    /// HTTP 429, retries exhausted
    #[error("rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    /// Non-success HTTP status
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The provider answered 200 but reported errors in the payload
    #[error("{endpoint} reported errors: {message}")]
    Api { endpoint: String, message: String },

    /// Response did not match the expected shape
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl SourceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SourceError::Timeout { .. })
    }

    pub fn decode(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SourceError::Decode {
            what: what.into(),
            message: err.to_string(),
        }
    }

    /// Non-success response. Gateway timeouts and query-service timeouts
    /// (5xx with a `TimeoutException` body) count as timeouts.
    pub fn from_status(endpoint: &str, status: u16, body: String) -> Self {
        let timed_out = status == 408
            || status == 504
            || (status >= 500 && body.contains("TimeoutException"));
        if timed_out {
            SourceError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            SourceError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            }
        }
    }

    /// Classify a reqwest error, keeping timeouts distinguishable
    pub fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else if err.is_decode() {
            SourceError::decode(endpoint, err)
        } else {
            SourceError::Transport(err)
        }
    }
}
