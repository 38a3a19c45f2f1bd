//! Inferred document shape.
//!
//! A [`ShapeNode`] tree mirrors the JSON document a template would emit. Parents
//! own their children; there is no sharing and no back-pointer. Code that needs
//! to know a node's ancestors uses [`ShapeNode::visit`], which hands the
//! ancestor chain to the callback.

use crate::annotation::{Annotation, MISSING_COMMENT_TYPE};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One node of the inferred document.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeNode {
    /// Document key; `None` for array roots and item templates
    pub name: Option<String>,
    pub annotation: Annotation,
    /// Produced inside a branch marked conditional; always optional
    pub is_conditional: bool,
    pub kind: ShapeKind,
}

/// Variant payload of a [`ShapeNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// A scalar (or opaquely typed) property
    Simple,
    /// Ordered child properties with unique keys
    Object { children: Vec<ShapeNode> },
    /// Item templates; `is_root` when the array is the whole document
    Array { items: Vec<ShapeNode>, is_root: bool },
    /// A partial include, replaced by its children once resolved
    PartialRef(PartialRef),
}

/// A reference to another template included with `partial!`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRef {
    /// Partial name as written in the template (`users/user`)
    pub partial: String,
    /// File the name resolved to
    pub path: Option<PathBuf>,
    /// Local bindings passed to the partial, as source text
    pub locals: IndexMap<String, String>,
    resolved: Option<Vec<ShapeNode>>,
}

impl PartialRef {
    pub fn new(partial: impl Into<String>) -> Self {
        Self {
            partial: partial.into(),
            ..Self::default()
        }
    }

    /// Stores the nodes parsed from the partial.
    pub fn resolve(&mut self, nodes: Vec<ShapeNode>) {
        self.resolved = Some(nodes);
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn resolved(&self) -> Option<&[ShapeNode]> {
        self.resolved.as_deref()
    }

    /// Takes the resolved nodes out, leaving the reference as a plain record.
    pub fn take_resolved(&mut self) -> Vec<ShapeNode> {
        self.resolved.take().unwrap_or_default()
    }
}

impl ShapeNode {
    pub fn simple(name: impl Into<String>, annotation: Annotation) -> Self {
        Self {
            name: Some(name.into()),
            annotation,
            is_conditional: false,
            kind: ShapeKind::Simple,
        }
    }

    pub fn object(name: Option<String>, annotation: Annotation, children: Vec<ShapeNode>) -> Self {
        Self {
            name,
            annotation,
            is_conditional: false,
            kind: ShapeKind::Object { children },
        }
    }

    /// A named array property.
    pub fn array(name: impl Into<String>, annotation: Annotation, items: Vec<ShapeNode>) -> Self {
        Self {
            name: Some(name.into()),
            annotation,
            is_conditional: false,
            kind: ShapeKind::Array {
                items,
                is_root: false,
            },
        }
    }

    /// An array emitted with `json.array!`.
    pub fn root_array(annotation: Annotation, items: Vec<ShapeNode>) -> Self {
        Self {
            name: None,
            annotation,
            is_conditional: false,
            kind: ShapeKind::Array {
                items,
                is_root: true,
            },
        }
    }

    /// Item template built from the properties found in one iteration body.
    ///
    /// A body that emitted only a nested root array becomes that array.
    pub fn item_template(mut children: Vec<ShapeNode>) -> Self {
        if children.len() == 1 && children[0].is_array_root() {
            if let Some(nested) = children.pop() {
                return nested;
            }
        }
        Self::object(None, Annotation::missing(), children)
    }

    pub fn partial_ref(partial: PartialRef) -> Self {
        Self {
            name: None,
            annotation: Annotation::missing(),
            is_conditional: false,
            kind: ShapeKind::PartialRef(partial),
        }
    }

    pub fn with_conditional(mut self, is_conditional: bool) -> Self {
        self.is_conditional = is_conditional;
        self
    }

    /// The key this node occupies in its parent object.
    ///
    /// An annotation `field_name` overrides the structural name.
    pub fn key(&self) -> Option<&str> {
        self.annotation.field_name().or(self.name.as_deref())
    }

    /// Whether the compiled schema lists this node as required.
    pub fn required(&self) -> bool {
        self.annotation.required() && !self.is_conditional
    }

    pub fn is_array_root(&self) -> bool {
        matches!(self.kind, ShapeKind::Array { is_root: true, .. })
    }

    /// Direct children: object properties, array items or resolved partial nodes.
    pub fn children(&self) -> &[ShapeNode] {
        match &self.kind {
            ShapeKind::Simple => &[],
            ShapeKind::Object { children } => children,
            ShapeKind::Array { items, .. } => items,
            ShapeKind::PartialRef(partial) => partial.resolved().unwrap_or(&[]),
        }
    }

    /// Type name reported to annotation tooling.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            ShapeKind::Simple => self.annotation.field_type().unwrap_or(MISSING_COMMENT_TYPE),
            ShapeKind::Object { .. } | ShapeKind::PartialRef(_) => "object",
            ShapeKind::Array { .. } => "array",
        }
    }

    /// Converts a resolved partial reference into the nodes it stands for.
    ///
    /// Every other node is returned unchanged as a single element. Nodes spliced
    /// from a conditional reference become conditional themselves.
    pub fn into_spliced(self) -> Vec<ShapeNode> {
        match self.kind {
            ShapeKind::PartialRef(mut partial) if partial.is_resolved() => {
                let conditional = self.is_conditional;
                partial
                    .take_resolved()
                    .into_iter()
                    .map(|node| {
                        if conditional {
                            node.with_conditional(true)
                        } else {
                            node
                        }
                    })
                    .collect()
            }
            kind => vec![ShapeNode { kind, ..self }],
        }
    }

    /// Depth-first pre-order traversal. The callback receives each node with
    /// its ancestors, root first.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&ShapeNode, &[&ShapeNode]),
    {
        let mut ancestors = Vec::new();
        self.visit_inner(&mut ancestors, f);
    }

    fn visit_inner<'a, F>(&'a self, ancestors: &mut Vec<&'a ShapeNode>, f: &mut F)
    where
        F: FnMut(&ShapeNode, &[&ShapeNode]),
    {
        f(self, ancestors);
        ancestors.push(self);
        for child in self.children() {
            child.visit_inner(ancestors, f);
        }
        ancestors.pop();
    }

    /// Flat list of every named property below this node.
    ///
    /// Paths are dotted; array items contribute a `[]` segment
    /// (`posts[].title`).
    pub fn flatten(&self) -> Vec<PropertyRecord> {
        let mut records = Vec::new();
        self.visit(&mut |node, ancestors| {
            let Some(name) = node.key() else {
                return;
            };
            if ancestors.is_empty() {
                return;
            }

            let mut segments: Vec<String> = Vec::new();
            for ancestor in ancestors.iter().skip(1) {
                match (ancestor.key(), &ancestor.kind) {
                    (Some(key), ShapeKind::Array { .. }) => segments.push(format!("{}[]", key)),
                    (Some(key), _) => segments.push(key.to_string()),
                    (None, _) => {}
                }
            }
            segments.push(name.to_string());

            records.push(PropertyRecord {
                path: segments.join("."),
                name: name.to_string(),
                field_type: node.type_name().to_string(),
                description: node.annotation.description().map(str::to_string),
                required: node.required(),
                conditional: node.is_conditional,
                annotated: !node.annotation.is_missing(),
            });
        });
        records
    }
}

/// Appends `node` to `children`, replacing an existing child with the same key
/// in place.
pub fn insert_child(children: &mut Vec<ShapeNode>, node: ShapeNode) {
    if let Some(key) = node.key() {
        if let Some(existing) = children.iter_mut().find(|c| c.key() == Some(key)) {
            debug!("Property '{}' defined twice, keeping the later definition", key);
            *existing = node;
            return;
        }
    }
    children.push(node);
}

/// One property as seen by annotation synchronisation tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Dotted path from the document root
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub conditional: bool,
    /// False when the property had no `@openapi` comment
    pub annotated: bool,
}
