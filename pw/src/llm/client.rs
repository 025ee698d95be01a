//! ModelClient trait definition

use async_trait::async_trait;

use super::{LlmError, ModelReply, ModelRequest};
use crate::registry::RegistryEntry;

/// Transport for a single model call
///
/// Implementations perform exactly one network round trip per `call`.
/// Retries, timeouts and circuit breaking live in the router.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call(&self, entry: &RegistryEntry, request: &ModelRequest) -> Result<ModelReply, LlmError>;
}
