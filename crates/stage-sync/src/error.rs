//! Errors raised while talking to the remote document endpoint.
//!
//! None of these are fatal to an editing session: the gateway recovers from
//! every one of them locally and reports an outcome instead.

/// Remote document I/O error.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced a response.
    #[error("http request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("server responded with status {status}")]
    Status { status: u16 },

    /// The response body was not a valid document.
    #[error("invalid document payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The project has no stored document.
    #[error("no document for project {0}")]
    NoDocument(String),

    /// No transport is available (offline, closed client).
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => GatewayError::Status {
                status: status.as_u16(),
            },
            None => GatewayError::Http(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_cause() {
        let err = GatewayError::Status { status: 503 };
        assert_eq!(err.to_string(), "server responded with status 503");

        let err: GatewayError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, GatewayError::Decode(_)));
        assert!(err.to_string().starts_with("invalid document payload"));
    }
}
