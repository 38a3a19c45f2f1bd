use crate::annotation::{Annotation, MISSING_COMMENT_TYPE};
use crate::error::Result;
use crate::shape::{ShapeKind, ShapeNode};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of local component references.
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// OpenAPI Schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to a named component; excludes every inline field
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties for object types, in template order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    /// Required property names, in template order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Alternatives for heterogeneous arrays
    #[serde(rename = "oneOf", default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Schema>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl Schema {
    /// `{type: <schema_type>}`
    pub fn typed(schema_type: impl Into<String>) -> Self {
        Self {
            schema_type: Some(schema_type.into()),
            ..Self::default()
        }
    }

    /// `{$ref: ...}`; bare names are placed under `#/components/schemas/`.
    pub fn reference(name: &str) -> Self {
        let reference = if name.starts_with('#') {
            name.to_string()
        } else {
            format!("{}{}", COMPONENTS_PREFIX, name)
        };
        Self {
            reference: Some(reference),
            ..Self::default()
        }
    }
}

/// Compiles shape trees into OpenAPI schemas.
///
/// Compilation is a pure function of the tree: compiling the same tree twice
/// gives equal schemas.
pub struct SchemaCompiler;

impl SchemaCompiler {
    /// Compiles `node` and everything below it.
    pub fn compile(node: &ShapeNode) -> Schema {
        if let Some(reference) = node.annotation.reference() {
            debug!("Compiling {:?} as reference to {}", node.key(), reference);
            return Schema::reference(reference);
        }

        match &node.kind {
            ShapeKind::Simple => Self::compile_simple(&node.annotation),
            ShapeKind::Object { children } => Self::compile_object(&node.annotation, children),
            ShapeKind::Array { items, .. } => Self::compile_array(&node.annotation, items),
            ShapeKind::PartialRef(partial) => match partial.resolved() {
                Some(children) => Self::compile_object(&node.annotation, children),
                None => {
                    warn!(
                        "Unresolved partial '{}' reached the schema compiler; emitting an empty object",
                        partial.partial
                    );
                    Schema::typed("object")
                }
            },
        }
    }

    /// Compiles `node` into plain JSON values.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be represented as JSON.
    pub fn compile_value(node: &ShapeNode) -> Result<Value> {
        Ok(serde_json::to_value(Self::compile(node))?)
    }

    fn compile_simple(annotation: &Annotation) -> Schema {
        let field_type = annotation.field_type().unwrap_or(MISSING_COMMENT_TYPE);

        let mut schema = Self::annotated(field_type, annotation);
        schema.enum_values = annotation
            .enum_values()
            .iter()
            .map(|value| coerce_literal(field_type, value))
            .collect();
        schema.format = annotation.format().map(str::to_string);
        schema.example = annotation.example().map(|value| coerce_literal(field_type, value));

        if field_type == "array" {
            schema.items = Some(Box::new(Self::declared_items(annotation)));
        }

        schema
    }

    fn compile_object(annotation: &Annotation, children: &[ShapeNode]) -> Schema {
        let mut schema = Self::annotated("object", annotation);

        for child in children {
            let Some(key) = child.key() else {
                if let ShapeKind::PartialRef(partial) = &child.kind {
                    warn!("Unresolved partial '{}' inside an object was dropped", partial.partial);
                } else {
                    debug!("Skipping unnamed {} node inside an object", child.type_name());
                }
                continue;
            };

            // Duplicate keys keep the later schema but their original position
            schema.properties.insert(key.to_string(), Self::compile(child));
            schema.required.retain(|name| name != key);
            if child.required() {
                schema.required.push(key.to_string());
            }
        }

        if !schema.required.is_empty() {
            let order: Vec<&String> = schema.properties.keys().collect();
            schema
                .required
                .sort_by_key(|name| order.iter().position(|key| *key == name));
        }

        schema
    }

    fn compile_array(annotation: &Annotation, items: &[ShapeNode]) -> Schema {
        let mut schema = Self::annotated("array", annotation);

        let mut distinct: Vec<Schema> = Vec::new();
        for item in items {
            let compiled = Self::compile(item);
            if !distinct.contains(&compiled) {
                distinct.push(compiled);
            }
        }

        let items = match distinct.len() {
            0 => Self::declared_items(annotation),
            1 => distinct.remove(0),
            n => {
                debug!("Array has {} distinct item templates, emitting oneOf", n);
                Schema {
                    one_of: distinct,
                    ..Schema::default()
                }
            }
        };
        schema.items = Some(Box::new(items));

        schema
    }

    /// Schema with `type`, `description` and `nullable` taken from `annotation`.
    fn annotated(schema_type: &str, annotation: &Annotation) -> Schema {
        Schema {
            schema_type: Some(schema_type.to_string()),
            description: annotation.description().map(str::to_string),
            nullable: annotation.nullable().then_some(true),
            ..Schema::default()
        }
    }

    /// Item schema declared by an `items:` annotation key, or a bare object.
    fn declared_items(annotation: &Annotation) -> Schema {
        match annotation.items() {
            Some(items) if is_component_name(items) => Schema::reference(items),
            Some(items) => Schema::typed(items),
            None => Schema::typed("object"),
        }
    }
}

/// Scalar types and schema keywords are lower case; component names start
/// with an upper-case letter.
fn is_component_name(name: &str) -> bool {
    name.starts_with('#') || name.chars().next().is_some_and(char::is_uppercase)
}

/// Parses an annotation literal into the JSON value matching `field_type`,
/// falling back to the raw string.
fn coerce_literal(field_type: &str, raw: &str) -> Value {
    let coerced = match field_type {
        "integer" => raw.parse::<i64>().ok().map(Value::from),
        "number" => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "boolean" => raw.parse::<bool>().ok().map(Value::Bool),
        _ => None,
    };
    coerced.unwrap_or_else(|| Value::String(raw.to_string()))
}
