//! Prompt Template System
//!
//! Template loading chain:
//! 1. `.planwright/prompts/{name}.pmt` (override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax, rendered in strict mode without HTML
//! escaping.

pub mod embedded;
mod loader;

pub use loader::{GENERATE_TEMPLATE, GenerationContext, PromptLoader, SYSTEM_TEMPLATE};
