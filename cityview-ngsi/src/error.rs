//! Broker error taxonomy.

use thiserror::Error;

/// Result type for broker operations.
pub type NgsiResult<T> = Result<T, NgsiError>;

/// The uniform error value for every broker interaction.
///
/// `Clone` so a fetcher can publish it alongside the last good data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NgsiError {
    /// Rejected before any request was issued.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No HTTP response: connection refused, DNS, timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// The broker answered with a status >= 400.
    #[error("{title}")]
    Protocol {
        status: u16,
        /// Problem type URI from the problem-details body.
        code: Option<String>,
        title: String,
        detail: Option<String>,
    },

    /// A 2xx response whose body could not be decoded.
    #[error("failed to decode broker response: {0}")]
    Decode(String),
}

impl NgsiError {
    /// HTTP status, or 0 when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            Self::Protocol { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Protocol { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Human-readable detail: the broker's `detail`, else its `title`, else
    /// the transport message.
    pub fn detail(&self) -> &str {
        match self {
            Self::Protocol { detail, title, .. } => detail.as_deref().unwrap_or(title),
            Self::Config(msg) | Self::Transport(msg) | Self::Decode(msg) => msg,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == 409
    }

    pub(crate) fn from_problem(status: reqwest::StatusCode, body: &[u8]) -> Self {
        let problem = serde_json::from_slice::<ProblemDetails>(body).unwrap_or_default();
        let title = problem.title.unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )
        });
        Self::Protocol {
            status: status.as_u16(),
            code: problem.problem_type,
            title,
            detail: problem.detail,
        }
    }
}

impl From<reqwest::Error> for NgsiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// RFC 7807 body returned by NGSI-LD brokers on failure.
#[derive(Debug, Default, serde::Deserialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: Option<String>,
    title: Option<String>,
    detail: Option<String>,
}
