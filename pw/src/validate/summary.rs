//! Human-readable violation summaries

use std::collections::{BTreeMap, BTreeSet};

use super::violation::{Category, Violation};

/// Group by category, de-duplicate messages, render a stable text block
///
/// Used as corrective guidance for regeneration and for CLI output.
pub fn summarize(violations: &[Violation]) -> String {
    if violations.is_empty() {
        return "No issues found.".to_string();
    }

    let mut grouped: BTreeMap<Category, BTreeSet<String>> = BTreeMap::new();
    for v in violations {
        let line = match &v.locator {
            Some(loc) => format!("{} ({})", v.message, loc),
            None => v.message.clone(),
        };
        grouped.entry(v.category()).or_default().insert(line);
    }

    let mut out = String::new();
    for (category, lines) in &grouped {
        out.push_str(&format!("{} ({}):\n", category, lines.len()));
        for line in lines {
            out.push_str("  - ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

/// Count of distinct violations per category
pub fn counts(violations: &[Violation]) -> BTreeMap<Category, usize> {
    let mut seen: BTreeMap<Category, BTreeSet<&str>> = BTreeMap::new();
    for v in violations {
        seen.entry(v.category()).or_default().insert(v.message.as_str());
    }
    seen.into_iter().map(|(c, s)| (c, s.len())).collect()
}
