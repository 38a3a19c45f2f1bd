//! Generic template syntax tree.
//!
//! The walker never looks at front-end specific nodes. The [`parser`](crate::parser)
//! module lowers Ruby source into this shape: statement sequences, method
//! calls, calls with a block, and guarded branches. Everything else becomes
//! [`TemplateNode::Other`].

use std::collections::BTreeMap;

/// One node of a lowered template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Statements evaluated in order
    Sequence(Vec<TemplateNode>),
    /// A method call without a block
    Call(CallNode),
    /// A call that opens a `do ... end` or `{ ... }` block
    Block(BlockNode),
    /// `if` / `unless` / ternary / `case`
    Conditional(ConditionalNode),
    /// Any other expression, kept only for its line number
    Other { line: usize },
}

impl TemplateNode {
    /// 1-based source line where the node starts.
    pub fn line(&self) -> Option<usize> {
        match self {
            TemplateNode::Sequence(nodes) => nodes.first().and_then(TemplateNode::line),
            TemplateNode::Call(call) => Some(call.line),
            TemplateNode::Block(block) => Some(block.line),
            TemplateNode::Conditional(cond) => Some(cond.line),
            TemplateNode::Other { line } => Some(*line),
        }
    }
}

/// The receiver of a method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// No explicit receiver (`partial! 'x'`)
    Implicit,
    /// A bare identifier such as `json`
    Ident(String),
    /// Any other expression, as source text
    Expr(String),
}

/// A method call: `receiver.method(args)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallNode {
    pub receiver: Receiver,
    pub method: String,
    pub args: Vec<Argument>,
    pub line: usize,
}

impl CallNode {
    pub fn new(receiver: Receiver, method: impl Into<String>, args: Vec<Argument>, line: usize) -> Self {
        Self {
            receiver,
            method: method.into(),
            args,
            line,
        }
    }

    /// Looks up `key` in the first hash argument that contains it.
    pub fn hash_value(&self, key: &str) -> Option<&Argument> {
        self.args.iter().find_map(|arg| arg.hash_get(key))
    }
}

/// A call argument, reduced to what shape inference needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// String literal contents
    Str(String),
    /// Symbol name without the leading colon
    Symbol(String),
    /// Hash literal or keyword arguments, in source order
    Hash(Vec<(String, Argument)>),
    /// Any other expression, as source text
    Expr(String),
}

impl Argument {
    /// Returns the value stored under `key` if this is a hash argument.
    pub fn hash_get(&self, key: &str) -> Option<&Argument> {
        match self {
            Argument::Hash(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Literal string or symbol text.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Argument::Str(s) | Argument::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Approximate source text, used to record partial local bindings.
    pub fn source_text(&self) -> String {
        match self {
            Argument::Str(s) => format!("{:?}", s),
            Argument::Symbol(s) => format!(":{}", s),
            Argument::Hash(pairs) => {
                let inner: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.source_text()))
                    .collect();
                format!("{{ {} }}", inner.join(", "))
            }
            Argument::Expr(text) => text.clone(),
        }
    }
}

/// A call with an attached block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    /// Must be a [`TemplateNode::Call`]; anything else is malformed
    pub call: Box<TemplateNode>,
    /// Block parameter names (`|item|` → `["item"]`)
    pub params: Vec<String>,
    pub body: Option<Box<TemplateNode>>,
    pub line: usize,
}

/// A guarded branch.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalNode {
    pub line: usize,
    pub then_branch: Option<Box<TemplateNode>>,
    pub else_branch: Option<Box<TemplateNode>>,
}

/// Comments of one template, indexed by 1-based line number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentIndex {
    comments: BTreeMap<usize, String>,
}

impl CommentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the comment text found on `line`. A later comment on the same
    /// line replaces the earlier one.
    pub fn insert(&mut self, line: usize, text: impl Into<String>) {
        self.comments.insert(line, text.into());
    }

    /// Raw comment text on `line`, if any.
    pub fn comment_for_line(&self, line: usize) -> Option<&str> {
        self.comments.get(&line).map(String::as_str)
    }

    /// All comments in line order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.comments.iter().map(|(line, text)| (*line, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(usize, S)> for CommentIndex {
    fn from_iter<T: IntoIterator<Item = (usize, S)>>(iter: T) -> Self {
        let mut index = Self::new();
        for (line, text) in iter {
            index.insert(line, text);
        }
        index
    }
}
