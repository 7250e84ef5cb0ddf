use reqwest::StatusCode;
use serde::Deserialize;

/// Error type for Cosmos DB operations
///
/// Service responses keep their HTTP status so callers can tell an absent
/// resource apart from every other failure.
#[derive(Debug, thiserror::Error)]
pub enum CosmosError {
    #[error("Cosmos DB request failed with status {status} ({code}): {message}")]
    Service {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid account key: {0}")]
    InvalidKey(String),

    #[error("Invalid endpoint '{endpoint}': {details}")]
    InvalidEndpoint { endpoint: String, details: String },

    #[error("Failed to acquire access token: {0}")]
    Credential(String),
}

/// Result type alias for Cosmos DB operations
pub type CosmosResult<T> = Result<T, CosmosError>;

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl CosmosError {
    /// HTTP status reported by the service, if the request got that far
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CosmosError::Service { status, .. } => Some(*status),
            CosmosError::Http(e) => e.status(),
            _ => None,
        }
    }

    /// The addressed resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// The write collided with an existing resource
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }

    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
            code: String::new(),
            message: text,
        });

        let code = if body.code.is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            body.code
        };

        CosmosError::Service {
            status,
            code,
            message: body.message,
        }
    }
}
