//! Minimal JSON path resolver.
//!
//! Supports the dotted subset used by assertions: an optional `$.` prefix,
//! `.`-separated field names, and `[n]` index suffixes on any segment
//! (`items[0]`, `[2]`, `matrix[1][0]`). No wildcards, filters, or slices.

use serde_json::Value;
use std::fmt;

/// A path that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError(String);

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PathError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(String),
    Index(usize),
}

/// Resolves `expression` against `root`.
///
/// Returns `Ok(None)` when any node along the path is missing, and `Err` only
/// when the expression itself is malformed.
pub fn resolve<'a>(root: &'a Value, expression: &str) -> Result<Option<&'a Value>, PathError> {
    let steps = parse(expression)?;
    let mut node = root;
    for step in &steps {
        let next = match step {
            Step::Field(name) => node.as_object().and_then(|o| o.get(name)),
            Step::Index(idx) => node.as_array().and_then(|a| a.get(*idx)),
        };
        match next {
            Some(n) => node = n,
            None => return Ok(None),
        }
    }
    Ok(Some(node))
}

fn parse(expression: &str) -> Result<Vec<Step>, PathError> {
    let trimmed = expression.trim();
    let body = trimmed
        .strip_prefix("$.")
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);

    let mut steps = Vec::new();
    if body.is_empty() {
        return Ok(steps);
    }

    for segment in body.split('.') {
        parse_segment(segment, &mut steps)?;
    }
    Ok(steps)
}

fn parse_segment(segment: &str, steps: &mut Vec<Step>) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError("empty path segment".to_string()));
    }

    let (name, mut rest) = match segment.find('[') {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };
    if !name.is_empty() {
        steps.push(Step::Field(name.to_string()));
    }

    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.find(']').map(|end| (&r[..end], &r[end + 1..])));
        let Some((digits, remainder)) = inner else {
            return Err(PathError(format!("unparseable segment '{segment}'")));
        };
        let idx = digits
            .trim()
            .parse::<usize>()
            .map_err(|_| PathError(format!("invalid index '{digits}' in segment '{segment}'")))?;
        steps.push(Step::Index(idx));
        rest = remainder;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_field_and_index() {
        let doc = json!({"data": {"items": [{"id": "7"}, {"id": "8"}]}});
        let v = resolve(&doc, "$.data.items[1].id").unwrap();
        assert_eq!(v, Some(&json!("8")));
    }

    #[test]
    fn test_prefix_is_optional() {
        let doc = json!({"code": 0});
        assert_eq!(resolve(&doc, "code").unwrap(), Some(&json!(0)));
        assert_eq!(resolve(&doc, "$.code").unwrap(), Some(&json!(0)));
        assert_eq!(resolve(&doc, "$").unwrap(), Some(&doc));
    }

    #[test]
    fn test_bare_index_selects_current_node() {
        let doc = json!([["a", "b"], ["c"]]);
        assert_eq!(resolve(&doc, "$[0][1]").unwrap(), Some(&json!("b")));
        assert_eq!(resolve(&doc, "[1].[0]").unwrap(), Some(&json!("c")));
    }

    #[test]
    fn test_missing_nodes_are_not_found() {
        let doc = json!({"data": {"items": []}});
        assert_eq!(resolve(&doc, "$.data.items[0].id").unwrap(), None);
        assert_eq!(resolve(&doc, "$.nope.deeper").unwrap(), None);
        assert_eq!(resolve(&doc, "$.data[0]").unwrap(), None);
    }

    #[test]
    fn test_malformed_expressions_error() {
        let doc = json!({});
        assert!(resolve(&doc, "$.items[x]").is_err());
        assert!(resolve(&doc, "$.items[0").is_err());
        assert!(resolve(&doc, "$.a..b").is_err());
    }
}
