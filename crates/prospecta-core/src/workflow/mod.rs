//! Workflow service client
//!
//! Every call to the external workflow service is a POST of a signed
//! envelope `{action, data, timestamp, signature}`. Each call carries its own
//! timeout and may be aborted through a [`CancellationToken`]. There are no
//! retries.

mod client;
mod signer;

pub use client::WorkflowClient;
pub use signer::{EnvelopeSigner, HmacSigner, RemoteSigner};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Workflow service actions
pub mod actions {
    pub const TRIGGER_WORKFLOW: &str = "trigger_workflow";
    pub const BATCH_TRIGGER: &str = "batch_trigger";
    pub const START_AUTOMATION: &str = "start_automation";
    pub const STOP_AUTOMATION: &str = "stop_automation";
    pub const SYNC_STATUS: &str = "sync_automation_status";
    pub const HEALTH_CHECK: &str = "health_check";
}

/// Envelope before signing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedEnvelope {
    pub action: String,
    pub data: serde_json::Value,
    /// Unix time in milliseconds
    pub timestamp: i64,
}

/// Envelope as posted to the workflow service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    #[serde(flatten)]
    pub envelope: UnsignedEnvelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// One workflow to trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAction {
    pub workflow_id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Body of a workflow service response: JSON when the content type says so,
/// raw text otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl std::fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Json(value) => write!(f, "{}", value),
            ResponseBody::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Workflow client errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Batch trigger requires at least one action")]
    EmptyBatch,

    #[error("Workflow action {action} timed out after {timeout:?}")]
    Timeout { action: String, timeout: Duration },

    #[error("Workflow action {action} was cancelled")]
    Cancelled { action: String },

    #[error("Workflow service returned status {status}: {body}")]
    Status { status: u16, body: ResponseBody },

    #[error("Envelope signing failed: {0}")]
    Signing(String),

    #[error("Workflow transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Workflow serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<WorkflowError> for prospecta_common::Error {
    fn from(err: WorkflowError) -> Self {
        use prospecta_common::Error;
        match err {
            WorkflowError::EmptyBatch => Error::Precondition(err.to_string()),
            WorkflowError::Timeout { .. } => Error::Timeout(err.to_string()),
            WorkflowError::Status { status, ref body } => Error::Upstream {
                status,
                message: body.to_string(),
            },
            WorkflowError::Transport(_) | WorkflowError::Signing(_) => {
                Error::Unavailable(err.to_string())
            }
            WorkflowError::Cancelled { .. } | WorkflowError::Serialization(_) => {
                Error::Internal(err.to_string())
            }
        }
    }
}

/// Per-call limits
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the action's default timeout
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            timeout: None,
            cancel: Some(cancel),
        }
    }
}

/// Run `fut` under a timeout and an optional cancellation token
pub(crate) async fn bounded<T, F>(
    action: &str,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Result<T, WorkflowError>
where
    F: Future<Output = Result<T, WorkflowError>>,
{
    let timed = tokio::time::timeout(timeout, fut);

    let outcome = match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => {
                return Err(WorkflowError::Cancelled { action: action.to_string() });
            }
            res = timed => res,
        },
        None => timed.await,
    };

    outcome.unwrap_or_else(|_| {
        Err(WorkflowError::Timeout {
            action: action.to_string(),
            timeout,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_signed_envelope_is_flat() {
        let envelope = SignedEnvelope {
            envelope: UnsignedEnvelope {
                action: actions::TRIGGER_WORKFLOW.to_string(),
                data: json!({"workflow_id": "wf-1"}),
                timestamp: 1_700_000_000_000,
            },
            signature: Some("sha256=abc".to_string()),
        };

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "action": "trigger_workflow",
                "data": {"workflow_id": "wf-1"},
                "timestamp": 1_700_000_000_000i64,
                "signature": "sha256=abc"
            })
        );
    }

    #[test]
    fn test_error_mapping() {
        let err: prospecta_common::Error = WorkflowError::EmptyBatch.into();
        assert_eq!(err.status_code(), 400);

        let err: prospecta_common::Error = WorkflowError::Status {
            status: 500,
            body: ResponseBody::Text("boom".to_string()),
        }
        .into();
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.to_string(), "Upstream service returned status 500: boom");

        let err: prospecta_common::Error = WorkflowError::Timeout {
            action: "health_check".to_string(),
            timeout: Duration::from_secs(5),
        }
        .into();
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: Result<(), _> = bounded("slow", Duration::from_secs(1), None, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(WorkflowError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_bounded_cancelled() {
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<(), _> = bounded(
            "cancelled",
            Duration::from_secs(60),
            Some(&token),
            std::future::pending(),
        )
        .await;

        assert!(matches!(result, Err(WorkflowError::Cancelled { .. })));
    }
}
