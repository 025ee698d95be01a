//! Registry source parsing and per-entry schema validation

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::entry::{ApiTemplate, RegistryEntry};
use super::error::RegistryError;

/// Parse a registry source (YAML or JSON) into validated entries
///
/// Every entry is checked before any is accepted; the first violation aborts
/// loading with the entry index and the offending field path.
pub fn parse_entries(source: &str) -> Result<Vec<RegistryEntry>, RegistryError> {
    debug!(source_len = source.len(), "parse_entries: called");
    let root: Value = serde_yaml::from_str(source)?;
    let Value::Sequence(items) = root else {
        debug!("parse_entries: root is not a sequence");
        return Err(RegistryError::NotAList);
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_entry(index, item))
        .collect()
}

fn parse_entry(index: usize, item: &Value) -> Result<RegistryEntry, RegistryError> {
    debug!(%index, "parse_entry: called");
    let Value::Mapping(map) = item else {
        return Err(RegistryError::invalid(index, "<entry>", "must be a mapping"));
    };

    let model = required_str(index, map, "model", "model")?;
    if model.trim().is_empty() {
        return Err(RegistryError::invalid(index, "model", "must not be empty"));
    }

    let roles = match map.get("role") {
        Some(Value::String(role)) => vec![role.clone()],
        Some(Value::Sequence(list)) => {
            let mut roles = Vec::with_capacity(list.len());
            for (i, role) in list.iter().enumerate() {
                match role {
                    Value::String(r) => roles.push(r.clone()),
                    _ => return Err(RegistryError::invalid(index, format!("role[{}]", i), "must be a string")),
                }
            }
            roles
        }
        Some(_) => return Err(RegistryError::invalid(index, "role", "must be a string or list of strings")),
        None => return Err(RegistryError::invalid(index, "role", "is missing")),
    };
    if roles.is_empty() || roles.iter().any(|r| r.trim().is_empty()) {
        return Err(RegistryError::invalid(index, "role", "must name at least one non-empty role"));
    }

    let context_window = match map.get("context_window") {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(v) if v > 0 && v <= u32::MAX as u64 => v as u32,
            _ => return Err(RegistryError::invalid(index, "context_window", "must be a positive integer")),
        },
        Some(_) => return Err(RegistryError::invalid(index, "context_window", "must be an integer")),
        None => return Err(RegistryError::invalid(index, "context_window", "is missing")),
    };

    let api_map = match map.get("api") {
        Some(Value::Mapping(api)) => api,
        Some(_) => return Err(RegistryError::invalid(index, "api", "must be a mapping")),
        None => return Err(RegistryError::invalid(index, "api", "is missing")),
    };
    let endpoint = required_str(index, api_map, "endpoint", "api.endpoint")?;
    let (method, url) =
        ApiTemplate::parse_endpoint(&endpoint).map_err(|reason| RegistryError::invalid(index, "api.endpoint", reason))?;

    let auth_header = match api_map.get("auth_header") {
        Some(Value::String(t)) => {
            if !t.contains('$') {
                return Err(RegistryError::invalid(
                    index,
                    "api.auth_header",
                    "must contain a $KEY_NAME placeholder",
                ));
            }
            Some(t.clone())
        }
        Some(Value::Null) | None => None,
        Some(_) => return Err(RegistryError::invalid(index, "api.auth_header", "must be a string")),
    };

    let parameters = match map.get("parameters") {
        Some(Value::Mapping(_)) => {
            let json = serde_json::to_value(map.get("parameters"))
                .map_err(|e| RegistryError::invalid(index, "parameters", e.to_string()))?;
            match json {
                serde_json::Value::Object(obj) => obj,
                _ => serde_json::Map::new(),
            }
        }
        Some(Value::Null) | None => serde_json::Map::new(),
        Some(_) => return Err(RegistryError::invalid(index, "parameters", "must be a mapping")),
    };

    Ok(RegistryEntry {
        roles,
        model,
        context_window,
        api: ApiTemplate {
            method,
            url,
            auth_header,
        },
        parameters,
    })
}

fn required_str(index: usize, map: &Mapping, key: &str, path: &str) -> Result<String, RegistryError> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(RegistryError::invalid(index, path, "must be a string")),
        None => Err(RegistryError::invalid(index, path, "is missing")),
    }
}
