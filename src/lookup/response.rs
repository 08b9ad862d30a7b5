//! Wire shapes of identifier lookups.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::LookupOutcome;
use crate::error::LookupError;

/// Body of a lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub queue: String,
    pub identifier: String,
}

/// Body of a lookup response: `{status, error, details}`.
///
/// `details` is `{message, started_at}` for a running job and `{message}` for
/// a job waiting in the retry set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub status: bool,
    pub error: Option<String>,
    pub details: Option<Value>,
}

impl LookupResponse {
    /// A response carrying only an error.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: false,
            error: Some(message.into()),
            details: None,
        }
    }

    pub fn from_result(result: Result<LookupOutcome, LookupError>) -> Self {
        match result {
            Ok(outcome) => outcome.into(),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

impl From<LookupOutcome> for LookupResponse {
    fn from(outcome: LookupOutcome) -> Self {
        let details = match outcome {
            LookupOutcome::Live(job) => Some(json!({
                "message": job.message,
                "started_at": job.started_at,
            })),
            LookupOutcome::Retry(record) => Some(json!({ "message": record })),
            LookupOutcome::NotFound => None,
        };
        Self {
            status: details.is_some(),
            error: None,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{ActiveJob, JobMessage};
    use crate::error::StoreError;

    #[test]
    fn test_live_response() {
        let response = LookupResponse::from(LookupOutcome::Live(ActiveJob {
            message: JobMessage::new(json!({"args": ["order-17"]})),
            started_at: 1_690_000_000,
        }));
        assert_eq!(
            serde_json::to_value(&response).expect("response should serialize"),
            json!({
                "status": true,
                "error": null,
                "details": {"message": {"args": ["order-17"]}, "started_at": 1_690_000_000}
            })
        );
    }

    #[test]
    fn test_retry_response() {
        let response = LookupResponse::from(LookupOutcome::Retry(json!({"args": ["job-99"]})));
        assert!(response.status);
        assert_eq!(response.details, Some(json!({"message": {"args": ["job-99"]}})));
    }

    #[test]
    fn test_not_found_and_error_responses() {
        let response = LookupResponse::from(LookupOutcome::NotFound);
        assert_eq!(
            response,
            LookupResponse {
                status: false,
                error: None,
                details: None
            }
        );

        let response = LookupResponse::from_result(Err(LookupError::Store(
            StoreError::Unavailable("down".to_string()),
        )));
        assert!(!response.status);
        assert!(response.error.as_deref().is_some_and(|e| e.contains("down")));
        assert!(response.details.is_none());
    }

    #[test]
    fn test_request_decoding() {
        let request: LookupRequest =
            serde_json::from_str(r#"{"queue": "default", "identifier": "order-17"}"#)
                .expect("request should decode");
        assert_eq!(request.queue, "default");
        assert_eq!(request.identifier, "order-17");
    }
}
