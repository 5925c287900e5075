//! Serialization of AST trees to and from a JSON value tree.
//!
//! Every node serializes as an object with a `"_type"` tag and (optionally)
//! a `"_position"` object, so trees survive a trip through any JSON tool and
//! come back structurally identical. The value tree composes with any serde
//! encoder if a host needs a format other than JSON text.

use crate::ast::SourceFile;
use crate::error::DeserializeError;
use serde_json::Value;

/// Convert an AST to a JSON value tree.
///
/// With `include_position = false` the `"_position"` objects are stripped;
/// a tree rebuilt from such a value reports
/// [`Position::unknown`](crate::ast::Position::unknown) everywhere.
#[must_use]
pub fn to_value(ast: &SourceFile, include_position: bool) -> Value {
    // The node model serializes infallibly (string keys, no fancy types);
    // NaN literals degrade to null per serde_json.
    let mut value = serde_json::to_value(ast).unwrap_or(Value::Null);
    if !include_position {
        strip_positions(&mut value);
    }
    value
}

/// Rebuild an AST from a JSON value tree.
///
/// # Errors
/// [`DeserializeError`] on an unknown `"_type"` tag or a missing required
/// field.
pub fn from_value(value: Value) -> Result<SourceFile, DeserializeError> {
    serde_json::from_value(value).map_err(DeserializeError::from)
}

/// Serialize an AST to compact JSON text.
#[must_use]
pub fn to_json(ast: &SourceFile, include_position: bool) -> String {
    to_value(ast, include_position).to_string()
}

/// Serialize an AST to pretty-printed JSON text.
#[must_use]
pub fn to_json_pretty(ast: &SourceFile, include_position: bool) -> String {
    format!("{:#}", to_value(ast, include_position))
}

/// Rebuild an AST from JSON text.
///
/// # Errors
/// [`DeserializeError`] on malformed JSON, an unknown `"_type"` tag, or a
/// missing required field.
pub fn from_json(json: &str) -> Result<SourceFile, DeserializeError> {
    serde_json::from_str(json).map_err(DeserializeError::from)
}

fn strip_positions(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("_position");
            for child in map.values_mut() {
                strip_positions(child);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_positions(child);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const SAMPLE: &str = r#"
        use <lib/shapes.scad>
        module box(size = [10, 10, 10], center = false) {
            if (center) translate(-size / 2) cube(size);
            else cube(size);
        }
        function area(w, h) = w * h;
        v = [for (i = [0:2:10]) if (i % 4 == 0) i * i];
        #box(size = [area(2, 3), 4, 5]);
    "#;

    #[test]
    fn test_round_trip_preserves_structure() {
        let ast = parse(SAMPLE).unwrap();
        let rebuilt = from_value(to_value(&ast, true)).unwrap();
        assert_eq!(ast, rebuilt);
    }

    #[test]
    fn test_json_text_round_trip() {
        let ast = parse(SAMPLE).unwrap();
        let rebuilt = from_json(&to_json(&ast, true)).unwrap();
        assert_eq!(ast, rebuilt);
    }

    #[test]
    fn test_value_tree_has_type_tags() {
        let ast = parse("x = 1 + 2;").unwrap();
        let value = to_value(&ast, true);
        let stmt = &value["statements"][0];
        assert_eq!(stmt["_type"], "Assignment");
        assert_eq!(stmt["value"]["_type"], "BinaryOp");
        assert_eq!(stmt["value"]["op"], "Add");
        assert_eq!(stmt["_position"]["line"], 1);
    }

    #[test]
    fn test_strip_positions() {
        let ast = parse("cube(1);").unwrap();
        let value = to_value(&ast, false);
        assert!(value["statements"][0].get("_position").is_none());
        let rebuilt = from_value(value).unwrap();
        assert!(rebuilt.statements[0].position.is_unknown());
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = from_json(r#"{"statements":[{"_type":"Nonsense","x":1}]}"#).unwrap_err();
        assert!(err.reason.contains("Nonsense") || err.reason.contains("unknown"));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        // Assignment without its `value` field
        let err = from_json(r#"{"statements":[{"_type":"Assignment","name":"x"}]}"#).unwrap_err();
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn test_pretty_json_parses_back() {
        let ast = parse("sphere(r = 2);").unwrap();
        let rebuilt = from_json(&to_json_pretty(&ast, true)).unwrap();
        assert_eq!(ast, rebuilt);
    }
}
