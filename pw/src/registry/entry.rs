//! Registry entry types

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Matches `$KEY_NAME` placeholders in an auth header template
static KEY_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// HTTP methods accepted in an endpoint template
pub const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH"];

/// One model definition from the registry source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Roles this model serves
    pub roles: Vec<String>,

    /// Model identifier sent to the endpoint
    pub model: String,

    /// Context window size in tokens
    pub context_window: u32,

    /// How to reach the model
    pub api: ApiTemplate,

    /// Default call parameters merged into every request
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl RegistryEntry {
    pub fn serves(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Connection template for a model endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiTemplate {
    /// Upper-case HTTP method
    pub method: String,

    /// Endpoint URL
    pub url: String,

    /// Header template such as `Authorization: Bearer $OPENAI_API_KEY`
    pub auth_header: Option<String>,
}

impl ApiTemplate {
    /// Parse a `"METHOD URL"` endpoint string
    pub fn parse_endpoint(endpoint: &str) -> Result<(String, String), String> {
        debug!(%endpoint, "ApiTemplate::parse_endpoint: called");
        let mut parts = endpoint.split_whitespace();
        let (Some(method), Some(url), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("expected \"METHOD URL\", got \"{}\"", endpoint));
        };

        let method = method.to_uppercase();
        if !ALLOWED_METHODS.contains(&method.as_str()) {
            return Err(format!("unsupported method '{}'", method));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("url '{}' must start with http:// or https://", url));
        }

        Ok((method, url.to_string()))
    }

    /// Names of the `$KEY_NAME` placeholders in the auth header template
    pub fn auth_keys(&self) -> Vec<String> {
        self.auth_header
            .as_deref()
            .map(|t| KEY_PLACEHOLDER.captures_iter(t).map(|c| c[1].to_string()).collect())
            .unwrap_or_default()
    }

    /// Expand the auth header template into a `(name, value)` pair
    ///
    /// `lookup` resolves a placeholder name to its secret. The first
    /// unresolved placeholder is returned as the error.
    pub fn expand_auth_header<F>(&self, lookup: F) -> Result<Option<(String, String)>, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        debug!(has_template = self.auth_header.is_some(), "ApiTemplate::expand_auth_header: called");
        let Some(template) = self.auth_header.as_deref() else {
            return Ok(None);
        };

        let mut expanded = String::with_capacity(template.len());
        let mut last = 0;
        for caps in KEY_PLACEHOLDER.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let key = &caps[1];
            let Some(value) = lookup(key) else {
                debug!(%key, "ApiTemplate::expand_auth_header: unresolved key");
                return Err(key.to_string());
            };
            expanded.push_str(&template[last..whole.start()]);
            expanded.push_str(&value);
            last = whole.end();
        }
        expanded.push_str(&template[last..]);

        match expanded.split_once(':') {
            Some((name, value)) => Ok(Some((name.trim().to_string(), value.trim().to_string()))),
            None => Ok(Some(("Authorization".to_string(), expanded.trim().to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(auth: Option<&str>) -> ApiTemplate {
        ApiTemplate {
            method: "POST".to_string(),
            url: "https://api.example.com/v1/chat/completions".to_string(),
            auth_header: auth.map(String::from),
        }
    }

    #[test]
    fn test_parse_endpoint() {
        let (method, url) = ApiTemplate::parse_endpoint("post https://api.example.com/v1/chat").unwrap();
        assert_eq!(method, "POST");
        assert_eq!(url, "https://api.example.com/v1/chat");
    }

    #[test]
    fn test_parse_endpoint_rejects_bad_shapes() {
        assert!(ApiTemplate::parse_endpoint("https://api.example.com").is_err());
        assert!(ApiTemplate::parse_endpoint("DELETE https://api.example.com").is_err());
        assert!(ApiTemplate::parse_endpoint("POST ftp://api.example.com").is_err());
        assert!(ApiTemplate::parse_endpoint("POST https://a https://b").is_err());
    }

    #[test]
    fn test_expand_auth_header() {
        let api = template(Some("Authorization: Bearer $OPENAI_API_KEY"));
        let header = api
            .expand_auth_header(|k| (k == "OPENAI_API_KEY").then(|| "sk-test".to_string()))
            .unwrap();
        assert_eq!(header, Some(("Authorization".to_string(), "Bearer sk-test".to_string())));
        assert_eq!(api.auth_keys(), vec!["OPENAI_API_KEY".to_string()]);
    }

    #[test]
    fn test_expand_auth_header_without_header_name() {
        let api = template(Some("Bearer $KEY"));
        let header = api.expand_auth_header(|_| Some("abc".to_string())).unwrap();
        assert_eq!(header, Some(("Authorization".to_string(), "Bearer abc".to_string())));
    }

    #[test]
    fn test_expand_auth_header_missing_key() {
        let api = template(Some("x-api-key: $MISSING_KEY"));
        assert_eq!(api.expand_auth_header(|_| None), Err("MISSING_KEY".to_string()));
    }

    #[test]
    fn test_no_auth_header() {
        let api = template(None);
        assert_eq!(api.expand_auth_header(|_| None), Ok(None));
        assert!(api.auth_keys().is_empty());
    }
}
