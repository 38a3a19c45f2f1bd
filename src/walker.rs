//! Template walker.
//!
//! Walks a lowered template and reconstructs the document it would emit as a
//! [`ShapeNode`] tree. Each `walk_*` method returns the nodes it produced; the
//! caller decides where they go, so nested blocks never share mutable state.
//!
//! Partials are parsed through a [`TemplateLoader`] and walked recursively. The
//! chain of templates currently being expanded is carried in the context so a
//! partial that includes itself is reported as a [`CyclicPartialError`] instead
//! of recursing forever.

use crate::annotation::{Annotation, AnnotationParser, OperationAnnotation, ParsedComment};
use crate::ast::{Argument, BlockNode, CallNode, ConditionalNode, TemplateNode};
use crate::classifier::{classify, has_partial_keyword, CallKind, PARTIAL_KEYWORD};
use crate::error::{CyclicPartialError, MalformedTemplateError, Result};
use crate::parser::{ParsedTemplate, TemplateParser};
use crate::resolver::{normalize_path, PartialResolver};
use crate::shape::{insert_child, PartialRef, PropertyRecord, ShapeKind, ShapeNode};
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Hash keys of `partial!` that configure the include rather than bind locals.
const PARTIAL_OPTION_KEYS: &[&str] = &["partial", "locals", "collection", "as", "cached"];

/// Source of parsed templates.
pub trait TemplateLoader {
    /// Whether a template exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Reads and parses the template at `path`.
    fn load(&self, path: &Path) -> Result<ParsedTemplate>;
}

/// Loads templates from disk with [`TemplateParser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl TemplateLoader for FileLoader {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load(&self, path: &Path) -> Result<ParsedTemplate> {
        TemplateParser::parse_file(path)
    }
}

/// Everything learned from walking one template.
#[derive(Debug, Clone)]
pub struct WalkResult {
    /// The walked template
    pub path: PathBuf,
    /// Document shape: an Object, or an Array root for `json.array!` templates
    pub root: ShapeNode,
    /// First `@openapi_operation` comment of the template
    pub operation: Option<OperationAnnotation>,
    /// Every partial included while walking, in inclusion order
    pub partials: Vec<PartialRef>,
    /// Recoverable problems, such as missing partials
    pub warnings: Vec<String>,
}

impl WalkResult {
    /// Flat property list consumed by annotation synchronisation tooling.
    pub fn properties(&self) -> Vec<PropertyRecord> {
        self.root.flatten()
    }
}

/// Per-template state threaded through the recursive walk.
#[derive(Clone, Copy)]
struct WalkContext<'a> {
    template: &'a ParsedTemplate,
    /// Normalised paths of the templates being expanded, root first
    chain: &'a [PathBuf],
    /// Inside a branch marked conditional
    conditional: bool,
}

/// Recursive-descent walker producing [`ShapeNode`] trees.
pub struct TemplateWalker<L = FileLoader> {
    loader: L,
    resolver: PartialResolver,
    cache: HashMap<PathBuf, Rc<ParsedTemplate>>,
    partials: Vec<PartialRef>,
    warnings: Vec<String>,
}

impl TemplateWalker<FileLoader> {
    /// Creates a walker reading templates from disk.
    pub fn new(resolver: PartialResolver) -> Self {
        Self::with_loader(FileLoader, resolver)
    }
}

impl Default for TemplateWalker<FileLoader> {
    fn default() -> Self {
        Self::new(PartialResolver::default())
    }
}

impl<L: TemplateLoader> TemplateWalker<L> {
    pub fn with_loader(loader: L, resolver: PartialResolver) -> Self {
        Self {
            loader,
            resolver,
            cache: HashMap::new(),
            partials: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Loads and walks the template at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template itself cannot be read or parsed, if a
    /// partial inclusion cycle is found, or if the syntax tree is malformed.
    /// Missing or unreadable partials are not errors; they are reported in
    /// [`WalkResult::warnings`].
    pub fn walk_file(&mut self, path: &Path) -> Result<WalkResult> {
        debug!("Walking template: {}", path.display());
        let template = self.load(path)?;
        self.walk_template(&template)
    }

    /// Walks an already parsed template.
    pub fn walk_template(&mut self, template: &ParsedTemplate) -> Result<WalkResult> {
        self.partials.clear();
        self.warnings.clear();

        let chain = vec![normalize_path(&template.path)];
        let ctx = WalkContext {
            template,
            chain: &chain,
            conditional: false,
        };

        let nodes = self.walk(&template.root, ctx)?;
        let root = Self::build_root(nodes);

        debug!(
            "Walked {}: {} top-level nodes, {} partials",
            template.path.display(),
            root.children().len(),
            self.partials.len()
        );

        Ok(WalkResult {
            path: template.path.clone(),
            root,
            operation: operation_annotation(template),
            partials: std::mem::take(&mut self.partials),
            warnings: std::mem::take(&mut self.warnings),
        })
    }

    /// Number of distinct templates parsed so far.
    pub fn cached_templates(&self) -> usize {
        self.cache.len()
    }

    fn load(&mut self, path: &Path) -> Result<Rc<ParsedTemplate>> {
        let key = normalize_path(path);
        if let Some(template) = self.cache.get(&key) {
            debug!("Using cached template: {}", path.display());
            return Ok(Rc::clone(template));
        }

        let template = Rc::new(self.loader.load(path)?);
        self.cache.insert(key, Rc::clone(&template));
        Ok(template)
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// The document root: the first emitted root array, otherwise an object
    /// holding every top-level node.
    fn build_root(mut nodes: Vec<ShapeNode>) -> ShapeNode {
        if let Some(pos) = nodes.iter().position(ShapeNode::is_array_root) {
            if nodes.len() > 1 {
                debug!(
                    "Template emits a root array; ignoring {} sibling nodes",
                    nodes.len() - 1
                );
            }
            return nodes.swap_remove(pos);
        }
        ShapeNode::object(None, Annotation::missing(), nodes)
    }

    /// Walks `node` and returns its nodes with partial references spliced in.
    fn walk(&mut self, node: &TemplateNode, ctx: WalkContext<'_>) -> Result<Vec<ShapeNode>> {
        let produced = match node {
            TemplateNode::Sequence(statements) => {
                let mut out = Vec::new();
                for statement in statements {
                    absorb(&mut out, self.walk(statement, ctx)?);
                }
                out
            }
            TemplateNode::Call(call) => self.walk_call(call, ctx)?,
            TemplateNode::Block(block) => self.walk_block(block, ctx)?,
            TemplateNode::Conditional(cond) => self.walk_conditional(cond, ctx)?,
            TemplateNode::Other { .. } => Vec::new(),
        };

        let mut out = Vec::new();
        absorb(&mut out, produced);
        Ok(out)
    }

    fn walk_body(&mut self, body: Option<&TemplateNode>, ctx: WalkContext<'_>) -> Result<Vec<ShapeNode>> {
        match body {
            Some(body) => self.walk(body, ctx),
            None => Ok(Vec::new()),
        }
    }

    fn walk_call(&mut self, call: &CallNode, ctx: WalkContext<'_>) -> Result<Vec<ShapeNode>> {
        check_call(call, ctx)?;

        match classify(call) {
            CallKind::PartialInclusion => self.walk_partial(call, ctx),
            CallKind::ArrayEmission => self.walk_array_emission(call, None, ctx),
            CallKind::Extraction => Ok(self.walk_extraction(call, ctx)),
            CallKind::DocumentProperty => Ok(vec![self.walk_property(call, ctx)]),
            CallKind::NoOp | CallKind::Foreign => Ok(Vec::new()),
        }
    }

    fn walk_block(&mut self, block: &BlockNode, ctx: WalkContext<'_>) -> Result<Vec<ShapeNode>> {
        let TemplateNode::Call(call) = block.call.as_ref() else {
            return Err(MalformedTemplateError {
                file: ctx.template.path.clone(),
                line: Some(block.line),
                message: "block is not attached to a method call".to_string(),
            }
            .into());
        };
        check_call(call, ctx)?;

        match classify(call) {
            CallKind::PartialInclusion => self.walk_partial(call, ctx),
            CallKind::ArrayEmission => self.walk_array_emission(call, Some(block), ctx),
            CallKind::DocumentProperty if block.params.is_empty() => {
                Ok(vec![self.walk_object(call, block, ctx)?])
            }
            CallKind::DocumentProperty => Ok(vec![self.walk_iteration(call, block, ctx)?]),
            CallKind::Extraction => Ok(self.walk_extraction(call, ctx)),
            // Directive and foreign blocks (`cache!`, `@items.each`) still hold properties
            CallKind::NoOp | CallKind::Foreign => self.walk_body(block.body.as_deref(), ctx),
        }
    }

    /// `json.name value`
    fn walk_property(&mut self, call: &CallNode, ctx: WalkContext<'_>) -> ShapeNode {
        let comment = comment_for(call.line, ctx);
        let conditional = is_conditional(comment.as_ref(), ctx);

        if let Some(items) = extracted_item(call) {
            debug!("Property '{}' extracts a collection", call.method);
            return ShapeNode::array(call.method.clone(), field_annotation(comment), vec![items])
                .with_conditional(conditional);
        }

        ShapeNode::simple(call.method.clone(), field_annotation(comment)).with_conditional(conditional)
    }

    /// `json.name do ... end`
    fn walk_object(&mut self, call: &CallNode, block: &BlockNode, ctx: WalkContext<'_>) -> Result<ShapeNode> {
        let comment = comment_for(call.line, ctx);
        let conditional = is_conditional(comment.as_ref(), ctx);
        let annotation = field_annotation(comment);

        let mut children = self.walk_body(block.body.as_deref(), ctx)?;

        if children.len() == 1 && children[0].is_array_root() {
            if let Some(ShapeNode {
                kind: ShapeKind::Array { items, .. },
                is_conditional: inner_conditional,
                ..
            }) = children.pop()
            {
                debug!("Collapsing '{}' into an array property", call.method);
                return Ok(ShapeNode::array(call.method.clone(), annotation, items)
                    .with_conditional(conditional || inner_conditional));
            }
        }

        let before = children.len();
        children.retain(|child| !child.is_array_root());
        if children.len() < before {
            self.warn(format!(
                "{}:{}: json.array! inside '{}' was dropped because the block also sets properties",
                ctx.template.path.display(),
                call.line,
                call.method
            ));
        }

        Ok(ShapeNode::object(Some(call.method.clone()), annotation, children).with_conditional(conditional))
    }

    /// `json.name collection do |item| ... end`
    fn walk_iteration(&mut self, call: &CallNode, block: &BlockNode, ctx: WalkContext<'_>) -> Result<ShapeNode> {
        let comment = comment_for(call.line, ctx);
        let conditional = is_conditional(comment.as_ref(), ctx);

        let children = self.walk_body(block.body.as_deref(), ctx)?;

        Ok(ShapeNode::array(
            call.method.clone(),
            field_annotation(comment),
            vec![ShapeNode::item_template(children)],
        )
        .with_conditional(conditional))
    }

    /// `json.array! ...`, with a block, a `partial:` keyword, or attribute names.
    fn walk_array_emission(
        &mut self,
        call: &CallNode,
        block: Option<&BlockNode>,
        ctx: WalkContext<'_>,
    ) -> Result<Vec<ShapeNode>> {
        let comment = comment_for(call.line, ctx);
        let conditional = is_conditional(comment.as_ref(), ctx);

        let items = if has_partial_keyword(&call.args) {
            match call.hash_value(PARTIAL_KEYWORD).and_then(Argument::as_literal) {
                Some(name) => {
                    let partial = partial_ref(name, call);
                    let node = self.expand_partial(partial, call, ctx)?;
                    vec![ShapeNode::item_template(node.into_spliced())]
                }
                None => {
                    self.warn(format!(
                        "{}:{}: array! partial name is not a literal",
                        ctx.template.path.display(),
                        call.line
                    ));
                    Vec::new()
                }
            }
        } else if let Some(block) = block {
            let children = self.walk_body(block.body.as_deref(), ctx)?;
            vec![ShapeNode::item_template(children)]
        } else if let Some(item) = extracted_item(call) {
            vec![item]
        } else {
            Vec::new()
        };

        Ok(vec![ShapeNode::root_array(field_annotation(comment), items).with_conditional(conditional)])
    }

    /// `json.partial! 'name', locals...`
    fn walk_partial(&mut self, call: &CallNode, ctx: WalkContext<'_>) -> Result<Vec<ShapeNode>> {
        let Some(name) = partial_name(call) else {
            self.warn(format!(
                "{}:{}: partial! without a literal partial name",
                ctx.template.path.display(),
                call.line
            ));
            return Ok(Vec::new());
        };

        let partial = partial_ref(name, call);
        let node = self.expand_partial(partial, call, ctx)?;

        // `partial!` with `collection:` renders the partial once per element
        if call.hash_value("collection").is_some() {
            let comment = comment_for(call.line, ctx);
            let conditional = is_conditional(comment.as_ref(), ctx);
            let item = ShapeNode::item_template(node.into_spliced());
            return Ok(vec![
                ShapeNode::root_array(field_annotation(comment), vec![item]).with_conditional(conditional)
            ]);
        }

        Ok(vec![node])
    }

    /// Resolves, parses and walks a partial, returning a resolved
    /// [`ShapeKind::PartialRef`] node.
    fn expand_partial(
        &mut self,
        mut partial: PartialRef,
        call: &CallNode,
        ctx: WalkContext<'_>,
    ) -> Result<ShapeNode> {
        let path = self.resolver.resolve(&partial.partial, &ctx.template.path);
        let key = normalize_path(&path);
        partial.path = Some(path.clone());

        let mut chain = ctx.chain.to_vec();
        chain.push(key.clone());
        if ctx.chain.contains(&key) {
            return Err(CyclicPartialError { chain }.into());
        }

        self.partials.push(partial.clone());

        let children = if !self.loader.exists(&path) {
            self.warn(format!(
                "{}:{}: partial '{}' not found at {}",
                ctx.template.path.display(),
                call.line,
                partial.partial,
                path.display()
            ));
            Vec::new()
        } else {
            match self.load(&path) {
                Ok(template) => {
                    debug!("Expanding partial '{}' from {}", partial.partial, path.display());
                    let sub_ctx = WalkContext {
                        template: &template,
                        chain: &chain,
                        conditional: ctx.conditional,
                    };
                    self.walk(&template.root, sub_ctx)?
                }
                Err(err) if err.is_unreadable() => {
                    self.warn(format!(
                        "{}:{}: partial '{}' could not be parsed: {}",
                        ctx.template.path.display(),
                        call.line,
                        partial.partial,
                        err
                    ));
                    Vec::new()
                }
                Err(err) => return Err(err),
            }
        };

        partial.resolve(children);
        Ok(ShapeNode::partial_ref(partial).with_conditional(ctx.conditional))
    }

    /// `json.extract! obj, :a, :b` / `json.(obj, :a, :b)`
    fn walk_extraction(&mut self, call: &CallNode, ctx: WalkContext<'_>) -> Vec<ShapeNode> {
        let comment = comment_for(call.line, ctx);
        let conditional = is_conditional(comment.as_ref(), ctx);
        let annotation = field_annotation(comment);

        call.args
            .iter()
            .skip(1)
            .filter_map(Argument::as_literal)
            .map(|name| {
                let own = if annotation.field_name() == Some(name) {
                    annotation.clone()
                } else {
                    Annotation::missing()
                };
                ShapeNode::simple(name, own).with_conditional(conditional)
            })
            .collect()
    }

    fn walk_conditional(&mut self, cond: &ConditionalNode, ctx: WalkContext<'_>) -> Result<Vec<ShapeNode>> {
        let marked = comment_for(cond.line, ctx).is_some_and(|c| c.marks_conditional());
        if marked {
            debug!("Conditional branch at line {}", cond.line);
        }
        let branch_ctx = WalkContext {
            conditional: ctx.conditional || marked,
            ..ctx
        };

        let mut out = Vec::new();
        for branch in [cond.then_branch.as_deref(), cond.else_branch.as_deref()]
            .into_iter()
            .flatten()
        {
            absorb(&mut out, self.walk(branch, branch_ctx)?);
        }
        Ok(out)
    }
}

/// Splices resolved partials and merges `produced` into `out` by key.
fn absorb(out: &mut Vec<ShapeNode>, produced: Vec<ShapeNode>) {
    for node in produced {
        for spliced in node.into_spliced() {
            insert_child(out, spliced);
        }
    }
}

fn check_call(call: &CallNode, ctx: WalkContext<'_>) -> Result<()> {
    if call.method.trim().is_empty() {
        return Err(MalformedTemplateError {
            file: ctx.template.path.clone(),
            line: Some(call.line),
            message: "call without a method name".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Parsed annotation on the line immediately above `line`.
fn comment_for(line: usize, ctx: WalkContext<'_>) -> Option<ParsedComment> {
    if line <= 1 {
        return None;
    }
    ctx.template
        .comments
        .comment_for_line(line - 1)
        .and_then(AnnotationParser::parse)
}

fn field_annotation(comment: Option<ParsedComment>) -> Annotation {
    match comment {
        Some(ParsedComment::Field(annotation)) => annotation,
        _ => Annotation::missing(),
    }
}

fn is_conditional(comment: Option<&ParsedComment>, ctx: WalkContext<'_>) -> bool {
    ctx.conditional || comment.is_some_and(ParsedComment::marks_conditional)
}

/// Item template for `json.name collection, :a, :b` and `json.array! collection, :a, :b`.
fn extracted_item(call: &CallNode) -> Option<ShapeNode> {
    if call.args.len() < 2 {
        return None;
    }
    let attributes = &call.args[1..];
    if !attributes.iter().all(|arg| matches!(arg, Argument::Symbol(_))) {
        return None;
    }

    let children = attributes
        .iter()
        .filter_map(Argument::as_literal)
        .map(|name| ShapeNode::simple(name, Annotation::missing()))
        .collect();
    Some(ShapeNode::object(None, Annotation::missing(), children))
}

fn partial_name(call: &CallNode) -> Option<&str> {
    match call.args.first() {
        Some(Argument::Str(name)) | Some(Argument::Symbol(name)) => Some(name),
        _ => call.hash_value(PARTIAL_KEYWORD).and_then(Argument::as_literal),
    }
}

/// Builds the reference record, capturing local bindings as source text.
fn partial_ref(name: &str, call: &CallNode) -> PartialRef {
    let mut partial = PartialRef::new(name);

    if let Some(Argument::Hash(locals)) = call.hash_value("locals") {
        for (key, value) in locals {
            partial.locals.insert(key.clone(), value.source_text());
        }
    }

    for arg in &call.args {
        if let Argument::Hash(pairs) = arg {
            for (key, value) in pairs {
                if !PARTIAL_OPTION_KEYS.contains(&key.as_str()) {
                    partial.locals.insert(key.clone(), value.source_text());
                }
            }
        }
    }

    partial
}

fn operation_annotation(template: &ParsedTemplate) -> Option<OperationAnnotation> {
    template
        .comments
        .iter()
        .find_map(|(_, text)| match AnnotationParser::parse(text) {
            Some(ParsedComment::Operation(operation)) => Some(operation),
            _ => None,
        })
}
