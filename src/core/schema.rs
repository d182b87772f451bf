//! Rewrites JSON schemas into the restricted dialect accepted by structured
//! output endpoints.
//!
//! The rewrite is shape-driven: it only looks at the JSON tree, so schemas
//! generated by `schemars`, loaded from files or written by hand all go
//! through the same path.
//!
//! Output guarantees:
//! - every object node has `additionalProperties: false` and lists every
//!   property in `required`
//! - `$ref` nodes are inlined from the local definitions table
//! - unsupported `format` values are removed
//! - the root is an explicit object schema with no definitions table

use schemars::JsonSchema;
use serde_json::{json, Map, Value};

/// `format` values the structured output contract rejects
const UNSUPPORTED_FORMATS: &[&str] = &["uri"];

/// Annotation keywords carried over from a `$ref` node onto the inlined schema
const REF_ANNOTATIONS: &[&str] = &["description", "title"];

const DEFINITION_PREFIXES: &[&str] = &["#/definitions/", "#/$defs/"];

/// Generate the sanitized schema for a Rust type
pub fn schema_for<T: JsonSchema>() -> Value {
    let root = schemars::schema_for!(T);
    let raw = serde_json::to_value(root).unwrap_or_else(|_| Value::Object(Map::new()));
    sanitize_schema(&raw)
}

/// Rewrite `schema` into the restricted dialect
pub fn sanitize_schema(schema: &Value) -> Value {
    let sanitizer = SchemaSanitizer::new(schema);
    let mut resolving = Vec::new();
    let root = sanitizer.rewrite(schema, &mut resolving);
    materialize_root(root)
}

/// Recursive tree rewrite with a local definitions table
struct SchemaSanitizer {
    definitions: Map<String, Value>,
    root: Value,
}

impl SchemaSanitizer {
    fn new(schema: &Value) -> Self {
        let mut definitions = Map::new();
        for table in ["definitions", "$defs"] {
            if let Some(Value::Object(entries)) = schema.get(table) {
                for (name, def) in entries {
                    definitions.insert(name.clone(), def.clone());
                }
            }
        }

        Self {
            definitions,
            root: schema.clone(),
        }
    }

    fn lookup(&self, reference: &str) -> Option<(&str, &Value)> {
        if reference == "#" {
            return Some(("#", &self.root));
        }
        DEFINITION_PREFIXES
            .iter()
            .find_map(|prefix| reference.strip_prefix(prefix))
            .and_then(|name| self.definitions.get_key_value(name))
            .map(|(name, def)| (name.as_str(), def))
    }

    fn rewrite(&self, node: &Value, resolving: &mut Vec<String>) -> Value {
        let Value::Object(source) = node else {
            return node.clone();
        };
        let mut map = source.clone();

        map.remove("$schema");
        map.remove("definitions");
        map.remove("$defs");

        // References are resolved before anything else is looked at
        if let Some(reference) = map.remove("$ref") {
            let resolved = self.resolve(reference.as_str().unwrap_or_default(), resolving);
            return merge_annotations(resolved, &map);
        }

        // `allOf: [single]` is how generators attach annotations to a reference
        if let Some(Value::Array(parts)) = map.get("allOf") {
            if parts.len() == 1 {
                let inner = self.rewrite(&parts[0], resolving);
                map.remove("allOf");
                return merge_annotations(inner, &map);
            }
        }

        for combinator in ["allOf", "anyOf", "oneOf"] {
            if let Some(Value::Array(parts)) = map.get(combinator) {
                let rewritten: Vec<Value> = parts.iter().map(|p| self.rewrite(p, resolving)).collect();
                map.insert(combinator.to_string(), Value::Array(rewritten));
            }
        }

        if let Some(Value::String(format)) = map.get("format") {
            if UNSUPPORTED_FORMATS.contains(&format.as_str()) {
                map.remove("format");
            }
        }

        match map.get("items") {
            Some(Value::Array(items)) => {
                let rewritten: Vec<Value> = items.iter().map(|i| self.rewrite(i, resolving)).collect();
                map.insert("items".to_string(), Value::Array(rewritten));
            }
            Some(items @ Value::Object(_)) => {
                let rewritten = self.rewrite(items, resolving);
                map.insert("items".to_string(), rewritten);
            }
            _ => {}
        }

        if is_object_node(&map) {
            self.close_object(&mut map, resolving);
        }

        Value::Object(map)
    }

    fn resolve(&self, reference: &str, resolving: &mut Vec<String>) -> Value {
        let Some((name, definition)) = self.lookup(reference) else {
            tracing::debug!("Unresolvable schema reference: {}", reference);
            return empty_object();
        };

        if resolving.iter().any(|r| r == name) {
            tracing::debug!("Recursive schema reference truncated: {}", reference);
            return empty_object();
        }

        resolving.push(name.to_string());
        let resolved = self.rewrite(definition, resolving);
        resolving.pop();
        resolved
    }

    fn close_object(&self, map: &mut Map<String, Value>, resolving: &mut Vec<String>) {
        let mut properties = match map.remove("properties") {
            Some(Value::Object(props)) => props,
            _ => Map::new(),
        };

        for value in properties.values_mut() {
            *value = self.rewrite(value, resolving);
        }

        let mut required: Vec<Value> = match map.remove("required") {
            Some(Value::Array(keys)) => keys.into_iter().filter(Value::is_string).collect(),
            _ => Vec::new(),
        };
        for key in properties.keys() {
            if !required.iter().any(|r| r.as_str() == Some(key.as_str())) {
                required.push(Value::String(key.clone()));
            }
        }

        if !map.contains_key("type") {
            map.insert("type".to_string(), json!("object"));
        }
        map.insert("properties".to_string(), Value::Object(properties));
        map.insert("required".to_string(), Value::Array(required));
        map.insert("additionalProperties".to_string(), Value::Bool(false));
    }
}

fn is_object_node(map: &Map<String, Value>) -> bool {
    let typed_object = match map.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("object")),
        _ => false,
    };
    typed_object || map.contains_key("properties")
}

fn merge_annotations(resolved: Value, siblings: &Map<String, Value>) -> Value {
    match resolved {
        Value::Object(mut resolved) => {
            for key in REF_ANNOTATIONS {
                if let Some(value) = siblings.get(*key) {
                    resolved.entry(key.to_string()).or_insert_with(|| value.clone());
                }
            }
            Value::Object(resolved)
        }
        other => other,
    }
}

fn empty_object() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": [],
        "additionalProperties": false
    })
}

/// The root must be an explicit object schema
fn materialize_root(root: Value) -> Value {
    let (is_object, is_empty) = match &root {
        Value::Object(map) => (is_object_node(map), map.is_empty()),
        _ => (false, false),
    };

    if is_object {
        root
    } else if is_empty {
        empty_object()
    } else {
        json!({
            "type": "object",
            "properties": { "value": root },
            "required": ["value"],
            "additionalProperties": false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeneratedQuestionSet;

    /// Walk every node, asserting the restricted dialect holds
    fn assert_restricted(node: &Value) {
        match node {
            Value::Object(map) => {
                assert!(!map.contains_key("$ref"), "reference left in {}", node);
                assert_ne!(map.get("format"), Some(&json!("uri")));
                if is_object_node(map) {
                    assert_eq!(map.get("additionalProperties"), Some(&json!(false)));
                    let props = map["properties"].as_object().unwrap();
                    let required = map["required"].as_array().unwrap();
                    for key in props.keys() {
                        assert!(required.contains(&json!(key)), "{} not required", key);
                    }
                }
                map.values().for_each(assert_restricted);
            }
            Value::Array(items) => items.iter().for_each(assert_restricted),
            _ => {}
        }
    }

    #[test]
    fn test_root_reference_is_expanded() {
        let schema = json!({
            "$ref": "#/definitions/Pick",
            "definitions": {
                "Pick": {
                    "type": "object",
                    "properties": {
                        "venueId": { "type": "string" },
                        "url": { "type": "string", "format": "uri" }
                    },
                    "required": ["venueId"]
                }
            }
        });

        let sanitized = sanitize_schema(&schema);

        assert_eq!(sanitized["type"], json!("object"));
        assert_eq!(sanitized["additionalProperties"], json!(false));
        assert_eq!(sanitized["required"], json!(["venueId", "url"]));
        assert!(sanitized.get("definitions").is_none());
        assert!(sanitized["properties"]["url"].get("format").is_none());
    }

    #[test]
    fn test_nested_references_and_arrays() {
        let schema = json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": { "$ref": "#/$defs/Item", "description": "one item" }
                }
            },
            "$defs": {
                "Item": {
                    "type": "object",
                    "properties": { "name": { "type": "string" } }
                }
            }
        });

        let sanitized = sanitize_schema(&schema);
        let item = &sanitized["properties"]["items"]["items"];

        assert_eq!(item["type"], json!("object"));
        assert_eq!(item["description"], json!("one item"));
        assert_eq!(item["required"], json!(["name"]));
        assert_restricted(&sanitized);
    }

    #[test]
    fn test_unresolvable_reference_degrades() {
        let schema = json!({
            "type": "object",
            "properties": { "ghost": { "$ref": "#/definitions/Missing" } }
        });

        let sanitized = sanitize_schema(&schema);
        assert_eq!(sanitized["properties"]["ghost"], empty_object());
    }

    #[test]
    fn test_recursive_reference_terminates() {
        let schema = json!({
            "$ref": "#/definitions/Node",
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "label": { "type": "string" },
                        "children": { "type": "array", "items": { "$ref": "#/definitions/Node" } }
                    }
                }
            }
        });

        let sanitized = sanitize_schema(&schema);
        assert_eq!(sanitized["properties"]["children"]["items"], empty_object());
        assert_restricted(&sanitized);
    }

    #[test]
    fn test_non_object_root_is_wrapped() {
        let sanitized = sanitize_schema(&json!({ "type": "string" }));
        assert_eq!(sanitized["type"], json!("object"));
        assert_eq!(sanitized["properties"]["value"]["type"], json!("string"));

        assert_eq!(sanitize_schema(&json!({})), empty_object());
    }

    #[test]
    fn test_generated_schema_is_restricted() {
        let schema = schema_for::<GeneratedQuestionSet>();

        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["required"], json!(["questions", "followUp"]));
        let question = &schema["properties"]["questions"]["items"];
        assert_eq!(question["type"], json!("object"));
        assert_eq!(question["properties"]["type"]["enum"], json!(["scale", "choice"]));
        assert_restricted(&schema);
    }
}
