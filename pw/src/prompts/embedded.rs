//! Embedded prompts
//!
//! Compiled into the binary from .pmt files at build time.

use tracing::debug;

/// System prompt describing the planning document shape
pub const PLANNER_SYSTEM: &str = include_str!("../../prompts/planner-system.pmt");

/// User prompt for one generation round
pub const GENERATE: &str = include_str!("../../prompts/generate.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "planner-system" => Some(PLANNER_SYSTEM),
        "generate" => Some(GENERATE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_known() {
        let system = get_embedded("planner-system").unwrap();
        assert!(system.contains("feature_groups"));
        assert!(system.contains("\"question\""));
        assert!(get_embedded("generate").unwrap().contains("{{request}}"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("nonexistent").is_none());
    }
}
