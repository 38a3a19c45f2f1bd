//! Call-shape classification.
//!
//! Every predicate here is pure and total: it looks only at the receiver,
//! method name and arguments of a [`CallNode`] and never fails. [`classify`]
//! folds them into a single [`CallKind`] in priority order so the walker can
//! dispatch with one `match`.

use crate::ast::{Argument, CallNode, Receiver};

/// Identifier of the document builder inside a template.
pub const BUILDER_IDENT: &str = "json";

/// Method that emits a top-level array.
pub const ARRAY_EMISSION: &str = "array!";

/// Method that includes another template.
pub const PARTIAL_INCLUSION: &str = "partial!";

/// Keyword naming the partial in a hash argument.
pub const PARTIAL_KEYWORD: &str = "partial";

/// Builder methods that copy attributes of an object as properties.
/// `json.(obj, :a)` is sugar for `json.call(obj, :a)`.
pub const EXTRACTION_METHODS: &[&str] = &["extract!", "call"];

/// Builder methods that never produce a property themselves.
pub const NO_OP_METHODS: &[&str] = &[
    // cache directives
    "cache!",
    "cache_if!",
    "cache_root!",
    "cache_collection!",
    // key formatting
    "key_format!",
    "deep_format_keys!",
    // null handling
    "ignore_nil!",
    "nil!",
    "null!",
    // merge and manipulation
    "merge!",
    "set!",
    "child!",
    "attributes!",
    "target!",
];

/// What a call does to the document being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `partial!` with any receiver
    PartialInclusion,
    /// `json.array!`
    ArrayEmission,
    /// `json.extract!` / `json.(...)`
    Extraction,
    /// Reserved builder directive; only its block body matters
    NoOp,
    /// `json.<name>`
    DocumentProperty,
    /// Anything not addressed to the builder
    Foreign,
}

/// True when the receiver is the builder root: implicit or `json`.
pub fn is_builder_receiver(receiver: &Receiver) -> bool {
    match receiver {
        Receiver::Implicit => true,
        Receiver::Ident(name) => name == BUILDER_IDENT,
        Receiver::Expr(_) => false,
    }
}

pub fn is_array_emission(call: &CallNode) -> bool {
    call.method == ARRAY_EMISSION && is_builder_receiver(&call.receiver)
}

pub fn is_partial_inclusion(call: &CallNode) -> bool {
    call.method == PARTIAL_INCLUSION
}

pub fn is_extraction(call: &CallNode) -> bool {
    is_builder_receiver(&call.receiver) && EXTRACTION_METHODS.contains(&call.method.as_str())
}

pub fn is_no_op(call: &CallNode) -> bool {
    is_builder_receiver(&call.receiver) && NO_OP_METHODS.contains(&call.method.as_str())
}

/// True for a builder call that sets a property named after the method.
pub fn is_document_property(call: &CallNode) -> bool {
    is_builder_receiver(&call.receiver)
        && !call.method.is_empty()
        && call.method != ARRAY_EMISSION
        && call.method != PARTIAL_INCLUSION
        && !EXTRACTION_METHODS.contains(&call.method.as_str())
        && !NO_OP_METHODS.contains(&call.method.as_str())
}

/// True when any hash argument has a key literally named `partial`.
pub fn has_partial_keyword(args: &[Argument]) -> bool {
    args.iter().any(|arg| arg.hash_get(PARTIAL_KEYWORD).is_some())
}

/// Classifies a call. The first matching predicate wins.
pub fn classify(call: &CallNode) -> CallKind {
    if is_partial_inclusion(call) {
        CallKind::PartialInclusion
    } else if is_array_emission(call) {
        CallKind::ArrayEmission
    } else if is_extraction(call) {
        CallKind::Extraction
    } else if is_no_op(call) {
        CallKind::NoOp
    } else if is_document_property(call) {
        CallKind::DocumentProperty
    } else {
        CallKind::Foreign
    }
}
