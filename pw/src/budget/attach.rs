//! Fitting supplementary content into an allocation

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::policy::{AllocationPolicy, BudgetAllocation, ContentCategory};
use crate::llm::estimate_tokens;

/// Lines kept on each side of an error marker
pub const ERROR_WINDOW_LINES: usize = 8;

static ERROR_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(error|panic(ked)?|exception|traceback|fatal|failed|failure)\b").expect("valid regex")
});

const DECLARATION_PREFIXES: &[&str] = &[
    "fn ", "pub ", "struct ", "enum ", "trait ", "impl ", "impl<", "mod ", "type ", "const ", "static ", "class ",
    "def ", "async def ", "interface ", "function ", "export ",
];

const COMMENT_PREFIXES: &[&str] = &["//", "/*", "*", "#", "--", "\"\"\""];

/// One piece of supplementary content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub category: ContentCategory,
    /// Short label kept even when the body is dropped (usually a path)
    pub header: String,
    pub body: String,
}

impl ContextItem {
    pub fn new(category: ContentCategory, header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            category,
            header: header.into(),
            body: body.into(),
        }
    }
}

/// How an item ended up in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Inclusion {
    Full,
    ErrorWindow,
    Outline,
    Placeholder,
    Excluded,
}

/// Result of [`attach`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachedContext {
    pub text: String,
    /// Content tokens; never more than the allocation total
    pub used_tokens: u64,
    /// Truncation markers, counted apart from the allocation
    pub marker_tokens: u64,
    /// Header and inclusion for each input item, in input order per category
    pub items: Vec<(String, Inclusion)>,
}

impl AttachedContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn truncated(&self) -> usize {
        self.items
            .iter()
            .filter(|(_, i)| !matches!(i, Inclusion::Full | Inclusion::Excluded))
            .count()
    }
}

fn render(header: &str, body: &str) -> String {
    format!("### {}\n{}\n\n", header, body.trim_end())
}

fn placeholder(header: &str, omitted: u64) -> String {
    format!("### {}\n[... truncated: ~{} tokens omitted ...]\n\n", header, omitted)
}

/// Attach items category by category until each ceiling is reached
pub fn attach(allocation: &BudgetAllocation, items: &[ContextItem]) -> AttachedContext {
    debug!(policy = ?allocation.policy, total = allocation.total, item_count = items.len(), "attach: called");
    let mut out = AttachedContext::default();

    for category in ContentCategory::ALL {
        let ceiling = allocation.ceiling(category);
        let mut used = 0u64;
        let mut overflowed = false;

        for item in items.iter().filter(|i| i.category == category) {
            if ceiling == 0 {
                out.items.push((item.header.clone(), Inclusion::Excluded));
                continue;
            }

            let full = render(&item.header, &item.body);
            let cost = estimate_tokens(&full);
            let remaining = ceiling
                .saturating_sub(used)
                .min(allocation.total.saturating_sub(out.used_tokens));

            if !overflowed && cost <= remaining {
                used += cost;
                out.used_tokens += cost;
                out.text.push_str(&full);
                out.items.push((item.header.clone(), Inclusion::Full));
                continue;
            }

            if !overflowed && let Some((reduced, how)) = reduce(allocation, item) {
                let reduced = render(&format!("{} (excerpt)", item.header), &reduced);
                let reduced_cost = estimate_tokens(&reduced);
                if reduced_cost <= remaining {
                    used += reduced_cost;
                    out.used_tokens += reduced_cost;
                    out.text.push_str(&reduced);
                    out.items.push((item.header.clone(), how));
                    continue;
                }
            }

            overflowed = true;
            info!(category = category.label(), header = %item.header, %cost, "Context item truncated");
            let marker = placeholder(&item.header, cost);
            out.marker_tokens += estimate_tokens(&marker);
            out.text.push_str(&marker);
            out.items.push((item.header.clone(), Inclusion::Placeholder));
        }
    }

    out
}

fn reduce(allocation: &BudgetAllocation, item: &ContextItem) -> Option<(String, Inclusion)> {
    if item.category != ContentCategory::Code {
        return None;
    }
    if allocation.policy == AllocationPolicy::ErrorDiagnosis {
        return extract_error_window(&item.body, ERROR_WINDOW_LINES).map(|w| (w, Inclusion::ErrorWindow));
    }
    if allocation.preserve_structure {
        return outline(&item.body, allocation.prioritize_comments).map(|o| (o, Inclusion::Outline));
    }
    None
}

/// Lines around each error marker, numbered, with gaps shown as `...`
///
/// Overlapping windows are merged. `None` when no marker matches.
pub fn extract_error_window(text: &str, radius: usize) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !ERROR_MARKER.is_match(line) {
            continue;
        }
        let start = idx.saturating_sub(radius);
        let end = (idx + radius).min(lines.len().saturating_sub(1));
        match ranges.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    }
    debug!(line_count = lines.len(), windows = ranges.len(), "extract_error_window: called");
    if ranges.is_empty() {
        return None;
    }

    let blocks: Vec<String> = ranges
        .iter()
        .map(|&(start, end)| {
            (start..=end)
                .map(|i| format!("{:>5} | {}", i + 1, lines[i]))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();
    Some(blocks.join("\n...\n"))
}

/// Declaration lines, plus comment lines when `keep_comments`
pub fn outline(text: &str, keep_comments: bool) -> Option<String> {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            DECLARATION_PREFIXES.iter().any(|p| trimmed.starts_with(p))
                || (keep_comments && COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p)))
        })
        .collect();
    if kept.is_empty() { None } else { Some(kept.join("\n")) }
}
