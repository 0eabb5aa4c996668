//! Gateway traits describing the external collaborators this core calls.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use wavecache_api_types::ComputeEnvelope;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("compute engine timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("compute engine returned status {status}")]
    Status { status: u16 },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("malformed collaborator response: {message}")]
    Malformed { message: String },
    #[error("delivery failed: {message}")]
    Delivery { message: String },
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }
}

/// The physical computation engine. Expensive; the whole point of this
/// service is to call it as rarely as possible.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    /// Replay a stored request, with the caching layer told to bypass the
    /// cache for this call. Bounded by the configured timeout.
    async fn recompute(&self, request: &Value) -> Result<ComputeEnvelope, GatewayError>;
}

/// Point-to-point delivery channel handing a freshly computed synchronous
/// response back to the request-serving instance awaiting it.
#[async_trait]
pub trait ResponseBroker: Send + Sync {
    async fn deliver(&self, correlation_id: &str, response: &Value) -> Result<(), GatewayError>;
}

/// Optional ruleset/configuration lookup collaborator. When absent or
/// failing, spatial invalidation degrades to its configured default radius.
#[async_trait]
pub trait RulesetDirectory: Send + Sync {
    async fn invalidation_radius_km(&self) -> Result<Option<f64>, GatewayError>;
}
