//! Model client module
//!
//! Provides the transport seam used by the router and the HTTP implementation.

pub mod client;
mod error;
mod http;
mod types;

pub use client::ModelClient;
pub use error::{FailureKind, LlmError};
pub use http::HttpModelClient;
pub use types::{ChatMessage, ModelReply, ModelRequest, Role, TokenUsage, estimate_tokens};
