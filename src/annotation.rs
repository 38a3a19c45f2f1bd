//! Structured `@openapi` comment parsing.
//!
//! Two comment forms are recognised:
//!
//! ```text
//! # @openapi name:string required:false description:"Display name" enum:[a,b]
//! # @openapi_operation summary:"Show user" tags:[Users]
//! ```
//!
//! The first token of a field annotation is always `field_name:type`. The only
//! exception is a comment consisting of nothing but `conditional:true`, which
//! marks the following `if`/`unless` branch as conditional.

use indexmap::IndexMap;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder type emitted for properties that carry no annotation.
pub const MISSING_COMMENT_TYPE: &str = "TODO: MISSING COMMENT";

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@(openapi_operation|openapi)(?:\s+(.*))?$").expect("valid annotation tag regex")
});

static ATTRIBUTE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w?!]*):("(?:[^"\\]|\\.)*"|\[[^\]]*\]|[^\s"\[]+)"#)
        .expect("valid annotation attribute regex")
});

/// A raw attribute value as written in the comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Bare word or quoted string (quotes stripped)
    Text(String),
    /// Bracketed, comma-separated list
    List(Vec<String>),
}

impl AttrValue {
    /// Returns the textual value, or `None` for lists.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            AttrValue::List(_) => None,
        }
    }

    /// Returns the value as a list; a bare word becomes a one-element list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            AttrValue::Text(text) => vec![text.clone()],
            AttrValue::List(items) => items.clone(),
        }
    }
}

/// Ordered attribute map of a single comment.
pub type Attributes = IndexMap<String, AttrValue>;

/// Metadata attached to one shape node.
///
/// Built once, either from a parsed comment or as the unannotated default, and
/// only read afterwards. The `with_*` methods consume and return a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    field_name: Option<String>,
    field_type: Option<String>,
    description: Option<String>,
    required: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    enum_values: Vec<String>,
    format: Option<String>,
    example: Option<String>,
    items: Option<String>,
    nullable: Option<bool>,
    #[serde(default)]
    conditional: bool,
    reference: Option<String>,
}

impl Annotation {
    /// The unannotated sentinel. Compiles to `TODO: MISSING COMMENT`.
    pub fn missing() -> Self {
        Self::default()
    }

    /// Annotation for `field_name:field_type` with no further keys.
    pub fn typed(field_name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            field_type: Some(field_type.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn with_items(mut self, items: impl Into<String>) -> Self {
        self.items = Some(items.into());
        self
    }

    pub fn with_conditional(mut self, conditional: bool) -> Self {
        self.conditional = conditional;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Builds a field annotation from the positional `name:type` token and the
    /// remaining named attributes.
    fn from_attributes(field_name: String, field_type: Option<String>, attrs: &Attributes) -> Self {
        let mut annotation = Self {
            field_name: Some(field_name),
            field_type,
            ..Self::default()
        };

        for (key, value) in attrs {
            match key.as_str() {
                "description" => annotation.description = value.as_text().map(str::to_string),
                "required" => annotation.required = parse_bool(key, value),
                "nullable" => annotation.nullable = parse_bool(key, value),
                "conditional" => annotation.conditional = parse_bool(key, value).unwrap_or(false),
                "enum" => annotation.enum_values = value.to_list(),
                "format" => annotation.format = value.as_text().map(str::to_string),
                "example" => annotation.example = value.as_text().map(str::to_string),
                "items" => annotation.items = value.as_text().map(str::to_string),
                "ref" => annotation.reference = value.as_text().map(str::to_string),
                "field_name" => annotation.field_name = value.as_text().map(str::to_string),
                other => debug!("Ignoring unknown annotation key: {}", other),
            }
        }

        annotation
    }

    /// The key this node occupies, if the annotation overrides it.
    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    pub fn field_type(&self) -> Option<&str> {
        self.field_type.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tri-state `required` flag as written.
    pub fn required_flag(&self) -> Option<bool> {
        self.required
    }

    /// A field is required unless explicitly marked `required:false`.
    pub fn required(&self) -> bool {
        self.required != Some(false)
    }

    pub fn enum_values(&self) -> &[String] {
        &self.enum_values
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn example(&self) -> Option<&str> {
        self.example.as_deref()
    }

    pub fn items(&self) -> Option<&str> {
        self.items.as_deref()
    }

    pub fn nullable(&self) -> bool {
        self.nullable == Some(true)
    }

    pub fn is_conditional(&self) -> bool {
        self.conditional
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// True for the unannotated sentinel.
    pub fn is_missing(&self) -> bool {
        self.field_type.is_none() && self.field_name.is_none()
    }
}

/// Metadata attached to the enclosing controller action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationAnnotation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Keys with no dedicated field, in source order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: Attributes,
}

impl OperationAnnotation {
    fn from_attributes(attrs: Attributes) -> Self {
        let mut operation = Self::default();

        for (key, value) in attrs {
            let text = value.as_text().map(str::to_string);
            match key.as_str() {
                "summary" => operation.summary = text,
                "description" => operation.description = text,
                "operation_id" | "operationId" => operation.operation_id = text,
                "tags" => operation.tags = value.to_list(),
                "response_description" => operation.response_description = text,
                "status" => operation.status = text,
                _ => {
                    operation.extra.insert(key, value);
                }
            }
        }

        operation
    }
}

/// Result of parsing one comment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedComment {
    /// `@openapi name:type ...`
    Field(Annotation),
    /// `@openapi_operation ...`
    Operation(OperationAnnotation),
    /// `@openapi conditional:true` on its own
    ConditionalMarker,
}

impl ParsedComment {
    /// Whether a conditional branch preceded by this comment is optional.
    pub fn marks_conditional(&self) -> bool {
        match self {
            ParsedComment::ConditionalMarker => true,
            ParsedComment::Field(annotation) => annotation.is_conditional(),
            ParsedComment::Operation(_) => false,
        }
    }
}

/// Parser for `@openapi` and `@openapi_operation` comments.
pub struct AnnotationParser;

impl AnnotationParser {
    /// Parses a single comment line.
    ///
    /// Leading `#` characters and surrounding whitespace are ignored. Returns
    /// `None` when the line is not an annotation or carries no usable tokens.
    pub fn parse(comment: &str) -> Option<ParsedComment> {
        let text = comment.trim().trim_start_matches('#').trim();
        let captures = TAG_REGEX.captures(text)?;
        let tag = captures.get(1)?.as_str();
        let body = captures.get(2).map(|m| m.as_str()).unwrap_or("");

        if tag == "openapi_operation" {
            let attrs = Self::parse_attributes(body);
            if attrs.is_empty() {
                debug!("Empty operation annotation: {}", text);
                return None;
            }
            return Some(ParsedComment::Operation(OperationAnnotation::from_attributes(attrs)));
        }

        Self::parse_field(body)
    }

    /// The positional `name:type` token is taken off before the keyed
    /// attributes are collected, so a field may share its name with a key.
    fn parse_field(body: &str) -> Option<ParsedComment> {
        let captures = ATTRIBUTE_REGEX.captures(body)?;
        let (Some(whole), Some(name), Some(raw)) = (captures.get(0), captures.get(1), captures.get(2)) else {
            return None;
        };
        let field_name = name.as_str().to_string();
        let first_value = parse_value(raw.as_str());
        let attrs = Self::parse_attributes(&body[whole.end()..]);

        if attrs.is_empty() && field_name == "conditional" && first_value == AttrValue::Text("true".to_string()) {
            return Some(ParsedComment::ConditionalMarker);
        }

        let field_type = match first_value {
            AttrValue::Text(text) => Some(text),
            AttrValue::List(_) => {
                warn!("Field annotation for '{}' has a list in place of a type", field_name);
                None
            }
        };

        Some(ParsedComment::Field(Annotation::from_attributes(
            field_name, field_type, &attrs,
        )))
    }

    /// Splits an annotation body into ordered `key:value` attributes.
    ///
    /// Text between attributes that does not form a `key:value` pair is skipped.
    pub fn parse_attributes(body: &str) -> Attributes {
        let mut attrs = Attributes::new();
        let mut last_end = 0;

        for captures in ATTRIBUTE_REGEX.captures_iter(body) {
            let (Some(whole), Some(key), Some(raw)) = (captures.get(0), captures.get(1), captures.get(2))
            else {
                continue;
            };

            let gap = &body[last_end..whole.start()];
            if !gap.trim().is_empty() {
                debug!("Skipping unparsed annotation text: {:?}", gap.trim());
            }
            last_end = whole.end();

            attrs.insert(key.as_str().to_string(), parse_value(raw.as_str()));
        }

        let tail = &body[last_end..];
        if !tail.trim().is_empty() {
            debug!("Skipping unparsed annotation text: {:?}", tail.trim());
        }

        attrs
    }
}

fn parse_value(raw: &str) -> AttrValue {
    if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let items = inner
            .split(',')
            .map(|item| unquote(item.trim()))
            .filter(|item| !item.is_empty())
            .collect();
        return AttrValue::List(items);
    }

    AttrValue::Text(unquote(raw))
}

fn unquote(raw: &str) -> String {
    match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => raw.to_string(),
    }
}

fn parse_bool(key: &str, value: &AttrValue) -> Option<bool> {
    match value.as_text() {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => {
            warn!("Annotation key '{}' expects true or false, got {:?}", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(comment: &str) -> Annotation {
        match AnnotationParser::parse(comment) {
            Some(ParsedComment::Field(annotation)) => annotation,
            other => panic!("expected field annotation, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_field() {
        let annotation = field("# @openapi id:integer");

        assert_eq!(annotation.field_name(), Some("id"));
        assert_eq!(annotation.field_type(), Some("integer"));
        assert!(annotation.required());
        assert_eq!(annotation.required_flag(), None);
        assert!(!annotation.is_missing());
    }

    #[test]
    fn test_parse_enum_list() {
        let annotation = field("@openapi status:string enum:[active,inactive,suspended]");

        assert_eq!(
            annotation.enum_values(),
            &["active".to_string(), "inactive".to_string(), "suspended".to_string()]
        );
    }

    #[test]
    fn test_parse_enum_list_trims_elements() {
        let annotation = field(r#"@openapi kind:string enum:[ "a b" , c ,]"#);

        assert_eq!(annotation.enum_values(), &["a b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_parse_quoted_description() {
        let annotation = field(r#"# @openapi name:string description:"User's \"display\" name" required:false"#);

        assert_eq!(annotation.description(), Some(r#"User's "display" name"#));
        assert!(!annotation.required());
        assert_eq!(annotation.required_flag(), Some(false));
    }

    #[test]
    fn test_parse_format_example_items() {
        let annotation =
            field("@openapi created_at:string format:date-time example:2024-01-01T00:00:00Z");
        assert_eq!(annotation.format(), Some("date-time"));
        assert_eq!(annotation.example(), Some("2024-01-01T00:00:00Z"));

        let tags = field("@openapi tags:array items:string");
        assert_eq!(tags.items(), Some("string"));
    }

    #[test]
    fn test_boolean_literal_stays_string_for_type() {
        let annotation = field("@openapi flag:true");

        assert_eq!(annotation.field_name(), Some("flag"));
        assert_eq!(annotation.field_type(), Some("true"));
    }

    #[test]
    fn test_lone_conditional_is_marker() {
        assert_eq!(
            AnnotationParser::parse("# @openapi conditional:true"),
            Some(ParsedComment::ConditionalMarker)
        );
    }

    #[test]
    fn test_conditional_with_other_keys_is_field() {
        // Ambiguous grammar: with more than one key the first token is always
        // `field_name:type`, even when it reads `conditional:true`.
        let annotation = field(r#"@openapi conditional:true description:"x""#);

        assert_eq!(annotation.field_name(), Some("conditional"));
        assert_eq!(annotation.field_type(), Some("true"));
        assert_eq!(annotation.description(), Some("x"));
        assert!(!annotation.is_conditional());
    }

    #[test]
    fn test_conditional_key_on_field() {
        let annotation = field("@openapi email:string conditional:true");

        assert!(annotation.is_conditional());
        assert!(ParsedComment::Field(annotation).marks_conditional());
    }

    #[test]
    fn test_field_named_like_an_attribute_key() {
        let annotation = field(r#"# @openapi description:string description:"Post body""#);
        assert_eq!(annotation.field_name(), Some("description"));
        assert_eq!(annotation.field_type(), Some("string"));
        assert_eq!(annotation.description(), Some("Post body"));

        let annotation = field("# @openapi format:string format:uri");
        assert_eq!(annotation.field_name(), Some("format"));
        assert_eq!(annotation.field_type(), Some("string"));
        assert_eq!(annotation.format(), Some("uri"));

        let annotation = field("# @openapi required:boolean required:false");
        assert_eq!(annotation.field_type(), Some("boolean"));
        assert!(!annotation.required());
    }

    #[test]
    fn test_parse_operation() {
        let parsed = AnnotationParser::parse(
            r#"# @openapi_operation summary:"Show user" tags:[Users,Admin] operationId:showUser"#,
        );

        let Some(ParsedComment::Operation(operation)) = parsed else {
            panic!("expected operation annotation");
        };
        assert_eq!(operation.summary.as_deref(), Some("Show user"));
        assert_eq!(operation.tags, vec!["Users".to_string(), "Admin".to_string()]);
        assert_eq!(operation.operation_id.as_deref(), Some("showUser"));
        assert!(operation.extra.is_empty());
    }

    #[test]
    fn test_operation_keeps_unknown_keys() {
        let parsed = AnnotationParser::parse("@openapi_operation summary:List deprecated_since:v2");

        let Some(ParsedComment::Operation(operation)) = parsed else {
            panic!("expected operation annotation");
        };
        assert_eq!(
            operation.extra.get("deprecated_since"),
            Some(&AttrValue::Text("v2".to_string()))
        );
    }

    #[test]
    fn test_single_tag_becomes_list() {
        let Some(ParsedComment::Operation(operation)) =
            AnnotationParser::parse("@openapi_operation tags:Users")
        else {
            panic!("expected operation annotation");
        };

        assert_eq!(operation.tags, vec!["Users".to_string()]);
    }

    #[test]
    fn test_non_annotations_yield_none() {
        assert_eq!(AnnotationParser::parse("# just a comment"), None);
        assert_eq!(AnnotationParser::parse("# @openapi"), None);
        assert_eq!(AnnotationParser::parse("# @openapi_operation"), None);
        assert_eq!(AnnotationParser::parse("# @openapiname:string"), None);
        assert_eq!(AnnotationParser::parse("# @openapi no colon here"), None);
        assert_eq!(AnnotationParser::parse(""), None);
    }

    #[test]
    fn test_invalid_boolean_is_ignored() {
        let annotation = field("@openapi name:string required:maybe");

        assert_eq!(annotation.required_flag(), None);
        assert!(annotation.required());
    }

    #[test]
    fn test_reference_key() {
        let annotation = field("@openapi author:object ref:User");

        assert_eq!(annotation.reference(), Some("User"));
    }

    #[test]
    fn test_missing_sentinel() {
        let annotation = Annotation::missing();

        assert!(annotation.is_missing());
        assert!(annotation.required());
        assert_eq!(annotation.field_type(), None);
    }
}
