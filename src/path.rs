//! Dotted/indexed path expressions over JSON trees.
//!
//! Include specifications address document data with expressions like
//! `author`, `meta.owner`, or `tags[2]`. This module parses those
//! expressions into segments and looks them up in a `serde_json` tree.
//! Discover-all mode uses the same notation when synthesizing the path
//! of a reference it found while walking.
use serde_json::Value as JsonValue;

/// One step of a parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object field access (`author`).
    Key(String),
    /// Array element access (`[2]`).
    Index(usize),
}

/// Parse a dotted/indexed path expression into segments.
///
/// `a.b[2].c` → `[Key("a"), Key("b"), Index(2), Key("c")]`. Malformed
/// bracket notation is kept as a literal key so that lookup simply finds
/// nothing, matching the resolver's silent-skip contract for absent paths.
pub fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        match part.split_once('[') {
            Some((head, rest)) => {
                let mut valid = true;
                let mut indices = Vec::new();
                for piece in rest.split('[') {
                    match piece.strip_suffix(']').and_then(|n| n.parse().ok()) {
                        Some(index) => indices.push(Segment::Index(index)),
                        None => {
                            valid = false;
                            break;
                        }
                    }
                }
                if valid {
                    if !head.is_empty() {
                        segments.push(Segment::Key(head.to_string()));
                    }
                    segments.extend(indices);
                } else {
                    segments.push(Segment::Key(part.to_string()));
                }
            }
            None => segments.push(Segment::Key(part.to_string())),
        }
    }
    segments
}

/// Look up the value at a path expression, `None` when absent.
pub fn get_path<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in parse_path(path) {
        current = match segment {
            Segment::Key(key) => current.as_object()?.get(&key)?,
            Segment::Index(index) => current.as_array()?.get(index)?,
        };
    }
    Some(current)
}

/// Append an object key to a synthesized path (`a` + `x` → `a.x`).
pub fn push_key(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

/// Append an array index to a synthesized path (`tags` + 2 → `tags[2]`).
pub fn push_index(base: &str, index: usize) -> String {
    format!("{base}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_and_nested() {
        assert_eq!(parse_path("author"), vec![Segment::Key("author".into())]);
        assert_eq!(
            parse_path("meta.owner"),
            vec![Segment::Key("meta".into()), Segment::Key("owner".into())]
        );
    }

    #[test]
    fn test_parse_bracket_notation() {
        assert_eq!(
            parse_path("tags[2]"),
            vec![Segment::Key("tags".into()), Segment::Index(2)]
        );
        assert_eq!(
            parse_path("a.b[0].c"),
            vec![
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Index(0),
                Segment::Key("c".into()),
            ]
        );
    }

    #[test]
    fn test_malformed_brackets_kept_literal() {
        assert_eq!(parse_path("a[x]"), vec![Segment::Key("a[x]".into())]);
    }

    #[test]
    fn test_get_path() {
        let value = json!({"a": {"b": [10, {"c": 20}]}});
        assert_eq!(get_path(&value, "a.b[0]"), Some(&json!(10)));
        assert_eq!(get_path(&value, "a.b[1].c"), Some(&json!(20)));
        assert_eq!(get_path(&value, "a.missing"), None);
        assert_eq!(get_path(&value, "a.b[9]"), None);
    }

    #[test]
    fn test_path_synthesis() {
        assert_eq!(push_key("", "a"), "a");
        assert_eq!(push_key("a", "x"), "a.x");
        assert_eq!(push_index("tags", 2), "tags[2]");
    }
}
