//! Content checks: unsafe operations, security coverage, test coverage and
//! complexity-vs-steps proportionality

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use super::schema::MAX_COMPLEXITY;
use super::violation::{Violation, ViolationKind};
use crate::plan::{FeatureKey, TestRequirements, feature_pointer, features};

/// Substrings that describe destructive or unsafe operations
pub const UNSAFE_PATTERNS: &[&str] = &[
    "rm -rf",
    "drop table",
    "drop database",
    "truncate table",
    "delete from",
    "mkfs",
    "dd if=",
    "format c:",
    "chmod 777",
    ":(){",
    "| sh",
    "| bash",
    "--no-verify",
    "disable authentication",
    "eval(",
];

/// Whole words that mark a feature as security-sensitive
///
/// Matched on word boundaries, so "author" and "tokenizer" do not count.
pub static SECURITY_TERMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(security|secure|auth|authn|authz|authenticat\w*|authoriz\w*|oauth2?|login|logins|passwords?|credentials?|secrets?|tokens?|encrypt\w*|decrypt\w*|crypto\w*|permissions?|sessions?|tls|certificates?|sanitiz\w*|injections?)\b",
    )
    .expect("valid regex")
});

/// Allowed implementation step counts per complexity level
pub fn step_range(level: i64) -> RangeInclusive<usize> {
    match level {
        i64::MIN..=0 => 1..=3,
        1 => 1..=5,
        2 => 2..=8,
        _ => 3..=12,
    }
}

/// First unsafe pattern found in `text`, case-insensitively
pub fn find_unsafe(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    UNSAFE_PATTERNS.iter().copied().find(|p| lower.contains(p))
}

fn mentions_security(text: &str) -> bool {
    SECURITY_TERMS.is_match(text)
}

fn text_of<'a>(obj: &'a Map<String, Value>, field: &str) -> &'a str {
    obj.get(field).and_then(Value::as_str).unwrap_or_default()
}

/// Every description-like string in a feature, with its JSON pointer
fn feature_texts<'a>(feature: &'a Map<String, Value>, path: &str) -> Vec<(String, &'a str)> {
    let mut texts = Vec::new();
    if let Some(s) = feature.get("description").and_then(Value::as_str) {
        texts.push((format!("{}/description", path), s));
    }
    let arrays: [(&[&str], Option<&str>); 9] = [
        (&["implementation_steps"], Some("description")),
        (&["test_requirements", "unit_tests"], Some("description")),
        (&["test_requirements", "integration_tests"], Some("description")),
        (&["test_requirements", "property_tests"], Some("description")),
        (&["test_requirements", "acceptance_tests"], Some("description")),
        (&["risk_assessment", "mitigations"], None),
        (&["system_design", "data_flow"], None),
        (&["system_design", "key_algorithms"], None),
        (&["system_design", "code_elements"], Some("purpose")),
    ];
    for (keys, field) in arrays {
        let mut value = feature.get(keys[0]);
        for key in &keys[1..] {
            value = value.and_then(|v| v.get(key));
        }
        let Some(items) = value.and_then(Value::as_array) else {
            continue;
        };
        for (idx, item) in items.iter().enumerate() {
            let base = format!("{}/{}/{}", path, keys.join("/"), idx);
            match field {
                Some(field) => {
                    if let Some(s) = item.get(field).and_then(Value::as_str) {
                        texts.push((format!("{}/{}", base, field), s));
                    }
                }
                None => {
                    if let Some(s) = item.as_str() {
                        texts.push((base, s));
                    }
                }
            }
        }
    }
    if let Some(s) = feature
        .get("system_design")
        .and_then(|d| d.get("overview"))
        .and_then(Value::as_str)
    {
        texts.push((format!("{}/system_design/overview", path), s));
    }
    texts
}

fn unsafe_violation(path: String, pattern: &str) -> Violation {
    let message = format!("Unsafe operation '{}' in {}", pattern, path);
    Violation::new(
        ViolationKind::UnsafeContent {
            path,
            pattern: pattern.to_string(),
        },
        message,
    )
}

fn check_feature(key: FeatureKey, feature: &Map<String, Value>, out: &mut Vec<Violation>) {
    let path = feature_pointer(key);
    let name = text_of(feature, "name");

    for (text_path, text) in feature_texts(feature, &path) {
        if let Some(pattern) = find_unsafe(text) {
            out.push(unsafe_violation(text_path, pattern));
        }
    }

    let tests: Vec<&Map<String, Value>> = TestRequirements::KINDS
        .iter()
        .filter_map(|kind| feature.get("test_requirements").and_then(|t| t.get(*kind)))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_object)
        .collect();

    if tests.is_empty() {
        out.push(Violation::new(
            ViolationKind::MissingTests { path: path.clone() },
            format!("Feature '{}' has no tests", name),
        ));
    }

    if mentions_security(&format!("{} {}", name, text_of(feature, "description"))) {
        let has_concerns = feature
            .get("risk_assessment")
            .and_then(|r| r.get("security_concerns"))
            .and_then(Value::as_array)
            .is_some_and(|c| c.iter().any(|s| s.as_str().is_some_and(|s| !s.trim().is_empty())));
        if !has_concerns {
            out.push(Violation::new(
                ViolationKind::MissingSecurityConcerns { path: path.clone() },
                format!("Security-sensitive feature '{}' lists no security concerns", name),
            ));
        }

        let has_security_test = tests
            .iter()
            .any(|t| mentions_security(&format!("{} {}", text_of(t, "name"), text_of(t, "description"))));
        if !has_security_test {
            out.push(Violation::new(
                ViolationKind::MissingSecurityTest { path: path.clone() },
                format!("Security-sensitive feature '{}' has no security test", name),
            ));
        }
    }

    let level = feature.get("complexity_level").and_then(Value::as_i64);
    let steps = feature
        .get("implementation_steps")
        .and_then(Value::as_array)
        .map(Vec::len);
    if let (Some(level), Some(steps)) = (level, steps)
        && (0..=MAX_COMPLEXITY).contains(&level)
        && steps > 0
    {
        let range = step_range(level);
        if steps < *range.start() {
            out.push(Violation::new(
                ViolationKind::UnderSpecified {
                    path: path.clone(),
                    complexity: level,
                    steps,
                    min: *range.start(),
                },
                format!(
                    "Feature '{}' has complexity {} but only {} step(s); expected at least {}",
                    name,
                    level,
                    steps,
                    range.start()
                ),
            ));
        } else if steps > *range.end() {
            out.push(Violation::new(
                ViolationKind::OverSpecified {
                    path,
                    complexity: level,
                    steps,
                    max: *range.end(),
                },
                format!(
                    "Feature '{}' has complexity {} but {} steps; expected at most {}",
                    name,
                    level,
                    steps,
                    range.end()
                ),
            ));
        }
    }
}

/// Scan for unsafe text, coverage gaps and disproportionate step counts
pub fn check_content(doc: &Value) -> Vec<Violation> {
    debug!("check_content: called");
    let mut out = Vec::new();

    if let Some(groups) = doc.get("feature_groups").and_then(Value::as_array) {
        for (g, group) in groups.iter().enumerate() {
            if let Some(text) = group.get("description").and_then(Value::as_str)
                && let Some(pattern) = find_unsafe(text)
            {
                out.push(unsafe_violation(format!("/feature_groups/{}/description", g), pattern));
            }
        }
    }

    for (key, feature) in features(doc) {
        check_feature(key, feature, &mut out);
    }

    debug!(violations = out.len(), "check_content: done");
    out
}
