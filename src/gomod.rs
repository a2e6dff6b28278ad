//! go.mod parsing.
//!
//! The pipeline needs three things from a go.mod: the declared module path,
//! any `Deprecated:` comment on the module directive, and the `retract`
//! directives the latest-version resolver applies.

use crate::version;

/// Parsed go.mod contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoModFile {
    pub module_path: String,
    pub deprecated: Option<String>,
    pub retract: Vec<Retraction>,
}

/// A retract directive. Single-version retractions have `low == high`.
#[derive(Debug, Clone, PartialEq)]
pub struct Retraction {
    pub low: String,
    pub high: String,
    pub rationale: Option<String>,
}

impl Retraction {
    pub fn contains(&self, v: &str) -> bool {
        version::compare(&self.low, v) != std::cmp::Ordering::Greater
            && version::compare(v, &self.high) != std::cmp::Ordering::Greater
    }
}

impl GoModFile {
    /// Parse go.mod content. Never fails; a missing module directive leaves
    /// `module_path` empty for the caller to reject.
    pub fn parse(content: &str) -> Self {
        let mut file = GoModFile::default();
        let mut in_retract_block = false;
        // Comment lines directly above the module directive.
        let mut comment_block: Vec<String> = Vec::new();

        for raw in content.lines() {
            let line = raw.trim();

            if let Some(comment) = line.strip_prefix("//") {
                comment_block.push(comment.trim().to_string());
                continue;
            }
            if line.is_empty() {
                comment_block.clear();
                continue;
            }

            if in_retract_block {
                if line == ")" {
                    in_retract_block = false;
                } else if let Some(r) = parse_retraction(line) {
                    file.retract.push(r);
                }
                comment_block.clear();
                continue;
            }

            if let Some(rest) = line.strip_prefix("module ") {
                let (path, inline) = split_inline_comment(rest);
                file.module_path = unquote(path.trim()).to_string();
                file.deprecated = deprecation_text(&comment_block, inline);
            } else if line == "retract (" {
                in_retract_block = true;
            } else if let Some(rest) = line.strip_prefix("retract ") {
                if let Some(r) = parse_retraction(rest) {
                    file.retract.push(r);
                }
            }
            comment_block.clear();
        }

        file
    }

    /// Whether any retract directive covers `v`.
    pub fn retracts(&self, v: &str) -> bool {
        self.retract.iter().any(|r| r.contains(v))
    }
}

/// Convenience: just the declared module path.
pub fn module_path(content: &str) -> Option<String> {
    let path = GoModFile::parse(content).module_path;
    if path.is_empty() { None } else { Some(path) }
}

fn parse_retraction(line: &str) -> Option<Retraction> {
    let (spec, inline) = split_inline_comment(line);
    let spec = spec.trim();
    let rationale = inline.map(|c| c.to_string());

    if let Some(range) = spec.strip_prefix('[') {
        let range = range.strip_suffix(']')?;
        let (low, high) = range.split_once(',')?;
        let (low, high) = (low.trim(), high.trim());
        if !version::is_valid(low) || !version::is_valid(high) {
            return None;
        }
        return Some(Retraction {
            low: low.to_string(),
            high: high.to_string(),
            rationale,
        });
    }

    if !version::is_valid(spec) {
        return None;
    }
    Some(Retraction {
        low: spec.to_string(),
        high: spec.to_string(),
        rationale,
    })
}

fn split_inline_comment(line: &str) -> (&str, Option<&str>) {
    match line.split_once("//") {
        Some((before, after)) => (before, Some(after.trim())),
        None => (line, None),
    }
}

fn deprecation_text(comment_block: &[String], inline: Option<&str>) -> Option<String> {
    comment_block
        .iter()
        .map(String::as_str)
        .chain(inline)
        .find_map(|c| c.strip_prefix("Deprecated:"))
        .map(|text| text.trim().to_string())
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}
