use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuralApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Mural error {name} ({error_instance_id}), status {status}: {message}. params={params}")]
    Service { status: u16, error_instance_id: String, name: String, message: String, params: Value },
    #[error("Query failed. Error {status}. {body}")]
    Http { status: u16, body: String },
    #[error("A transfer API key is required to execute payouts")]
    MissingTransferKey,
}

/// The structured exception body Mural returns with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceErrorBody {
    #[serde(default)]
    error_instance_id: String,
    name: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    params: Value,
}

impl MuralApiError {
    /// Builds the error for a failed response, preferring the provider's structured exception when the body holds one.
    pub fn from_response(status: u16, body: String) -> Self {
        match serde_json::from_str::<ServiceErrorBody>(&body) {
            Ok(e) => Self::Service {
                status,
                error_instance_id: e.error_instance_id,
                name: e.name,
                message: e.message,
                params: e.params,
            },
            Err(_) => Self::Http { status, body },
        }
    }

    /// The HTTP status of the failed call, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
