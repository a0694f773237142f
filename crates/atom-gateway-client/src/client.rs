//! The [`RuntimeClient`] implementation.

use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;
use crate::types::{CreateTaskRequest, CreateTaskResponse, GetTaskResponse};

/// Response envelope used by every runtime endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    code: String,
    message: String,
}

/// HTTP client for the task runtime.
///
/// Wraps a [`reqwest::Client`] and the normalized base URL. The base URL
/// is stored with trailing slashes stripped so path construction is
/// uniform.
pub struct RuntimeClient {
    http: reqwest::Client,
    base_url: String,
}

impl RuntimeClient {
    /// Create a client for the runtime at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Return the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a task to the runtime.
    pub async fn create_task(
        &self,
        request: &CreateTaskRequest,
    ) -> Result<CreateTaskResponse, ClientError> {
        let url = format!("{}/v1/tasks", self.base_url);
        debug!(url = %url, task_type = ?request.task_type, "creating task");

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        self.decode(response).await
    }

    /// Fetch the current snapshot of a task. The id is percent-encoded
    /// into the URL path.
    pub async fn get_task(&self, id: &str) -> Result<GetTaskResponse, ClientError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| ClientError::Network {
            base: self.base_url.clone(),
            cause: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Network {
                base: self.base_url.clone(),
                cause: "base URL cannot carry path segments".into(),
            })?
            .extend(["v1", "tasks", id]);

        debug!(url = %url, "fetching task");

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        self.decode(response).await
    }

    fn network_error(&self, err: reqwest::Error) -> ClientError {
        ClientError::Network {
            base: self.base_url.clone(),
            cause: innermost_cause(&err),
        }
    }

    /// Decode a runtime response: parse the envelope, apply the failure
    /// mapping, and deserialize `data` into the expected payload.
    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.network_error(e))?;

        let envelope: Option<Envelope> = if body.trim().is_empty() {
            None
        } else {
            match serde_json::from_str(&body) {
                Ok(envelope) => Some(envelope),
                Err(_) => {
                    return Err(ClientError::InvalidResponse(
                        "response body is not valid JSON".into(),
                    ));
                }
            }
        };

        if !status.is_success() {
            if let Some(Envelope {
                ok: false,
                error: Some(err),
                ..
            }) = envelope
            {
                return Err(ClientError::Remote {
                    code: err.code,
                    message: err.message,
                });
            }
            return Err(ClientError::InvalidResponse(format!(
                "HTTP {status} without an error envelope"
            )));
        }

        match envelope {
            Some(Envelope {
                ok: true,
                data: Some(data),
                ..
            }) => serde_json::from_value(data).map_err(|e| {
                ClientError::InvalidResponse(format!("unexpected data shape: {e}"))
            }),
            _ => Err(ClientError::InvalidResponse(
                "expected an {ok: true, data} envelope".into(),
            )),
        }
    }
}

/// Walk a `reqwest` error's source chain down to the innermost cause.
/// The outer layers only say "error sending request".
fn innermost_cause(err: &reqwest::Error) -> String {
    use std::error::Error as _;
    let mut cause: &dyn std::error::Error = err;
    while let Some(next) = cause.source() {
        cause = next;
    }
    cause.to_string()
}
