use crate::ast::{Argument, BlockNode, CallNode, CommentIndex, ConditionalNode, Receiver, TemplateNode};
use crate::error::{Error, Result};
use lib_ruby_parser::{ErrorLevel, Node, Parser, ParserOptions};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Template parser for Jbuilder source files.
///
/// The `TemplateParser` uses `lib-ruby-parser` to parse Ruby source into a syntax
/// tree, then lowers that tree into the generic [`TemplateNode`] shape and collects
/// every `#` comment into a line-indexed [`CommentIndex`].
///
/// # Example
///
/// ```no_run
/// use jbuilder_openapi::parser::TemplateParser;
/// use std::path::Path;
///
/// let parsed = TemplateParser::parse_file(Path::new("app/views/users/show.json.jbuilder")).unwrap();
/// println!("Found {} comments", parsed.comments.len());
/// ```
pub struct TemplateParser;

/// A successfully parsed template with its lowered syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTemplate {
    /// Path to the source file
    pub path: PathBuf,
    /// The lowered syntax tree
    pub root: TemplateNode,
    /// Comments indexed by line
    pub comments: CommentIndex,
}

impl TemplateParser {
    /// Parses a single template file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid Ruby syntax
    pub fn parse_file(path: &Path) -> Result<ParsedTemplate> {
        debug!("Parsing template: {}", path.display());

        let source = fs::read_to_string(path).map_err(|source| Error::Read {
            file: path.to_path_buf(),
            source,
        })?;

        let parsed = Self::parse_source(path, &source)?;
        debug!("Successfully parsed template: {}", path.display());

        Ok(parsed)
    }

    /// Parses template source text. `path` is recorded on the result and used
    /// in error messages only.
    pub fn parse_source(path: &Path, source: &str) -> Result<ParsedTemplate> {
        let options = ParserOptions {
            buffer_name: path.display().to_string(),
            ..Default::default()
        };
        let result = Parser::new(source.as_bytes().to_vec(), options).do_parse();

        if let Some(diagnostic) = result
            .diagnostics
            .iter()
            .find(|d| matches!(d.level, ErrorLevel::Error))
        {
            return Err(Error::Parse {
                file: path.to_path_buf(),
                message: diagnostic.render_message(),
            });
        }

        let lowering = Lowering::new(source);

        let root = match result.ast.as_deref() {
            Some(node) => lowering.lower(node),
            None => TemplateNode::Sequence(Vec::new()),
        };

        let mut comments = CommentIndex::new();
        for comment in &result.comments {
            let text = lowering.text(comment.location.begin, comment.location.end).trim();
            // `=begin`/`=end` documents never carry annotations
            if text.starts_with('#') {
                comments.insert(lowering.line_of(comment.location.begin), text);
            }
        }

        Ok(ParsedTemplate {
            path: path.to_path_buf(),
            root,
            comments,
        })
    }
}

/// Converts `lib-ruby-parser` nodes into [`TemplateNode`]s.
struct Lowering<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> Lowering<'a> {
    fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self { source, line_starts }
    }

    /// 1-based line of a byte offset.
    fn line_of(&self, pos: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= pos)
    }

    fn text(&self, begin: usize, end: usize) -> &'a str {
        self.source.get(begin..end).unwrap_or("")
    }

    fn node_text(&self, node: &Node) -> String {
        let loc = node.expression();
        self.text(loc.begin, loc.end).to_string()
    }

    fn node_line(&self, node: &Node) -> usize {
        self.line_of(node.expression().begin)
    }

    fn lower(&self, node: &Node) -> TemplateNode {
        match node {
            Node::Begin(begin) => {
                TemplateNode::Sequence(begin.statements.iter().map(|n| self.lower(n)).collect())
            }
            Node::Send(send) => TemplateNode::Call(CallNode {
                receiver: self.receiver(send.recv.as_deref()),
                method: send.method_name.clone(),
                args: send.args.iter().map(|arg| self.argument(arg)).collect(),
                line: self.node_line(node),
            }),
            Node::CSend(csend) => TemplateNode::Call(CallNode {
                receiver: Receiver::Expr(self.node_text(&csend.recv)),
                method: csend.method_name.clone(),
                args: csend.args.iter().map(|arg| self.argument(arg)).collect(),
                line: self.node_line(node),
            }),
            Node::Block(block) => TemplateNode::Block(BlockNode {
                call: Box::new(self.lower(&block.call)),
                params: block
                    .args
                    .as_deref()
                    .map(|args| self.param_names(args))
                    .unwrap_or_default(),
                body: block.body.as_deref().map(|body| Box::new(self.lower(body))),
                line: self.node_line(node),
            }),
            Node::If(cond) => {
                self.conditional(node, cond.if_true.as_deref(), cond.if_false.as_deref())
            }
            Node::IfMod(cond) => {
                self.conditional(node, cond.if_true.as_deref(), cond.if_false.as_deref())
            }
            Node::IfTernary(cond) => self.conditional(node, Some(&*cond.if_true), Some(&*cond.if_false)),
            Node::Case(case) => {
                let whens: Vec<TemplateNode> = case
                    .when_bodies
                    .iter()
                    .filter_map(|when| match when {
                        Node::When(when) => when.body.as_deref().map(|body| self.lower(body)),
                        _ => None,
                    })
                    .collect();
                TemplateNode::Conditional(ConditionalNode {
                    line: self.node_line(node),
                    then_branch: Some(Box::new(TemplateNode::Sequence(whens))),
                    else_branch: case.else_body.as_deref().map(|body| Box::new(self.lower(body))),
                })
            }
            other => TemplateNode::Other {
                line: self.node_line(other),
            },
        }
    }

    fn conditional(&self, node: &Node, if_true: Option<&Node>, if_false: Option<&Node>) -> TemplateNode {
        TemplateNode::Conditional(ConditionalNode {
            line: self.node_line(node),
            then_branch: if_true.map(|n| Box::new(self.lower(n))),
            else_branch: if_false.map(|n| Box::new(self.lower(n))),
        })
    }

    fn receiver(&self, recv: Option<&Node>) -> Receiver {
        match recv {
            None => Receiver::Implicit,
            Some(Node::Lvar(lvar)) => Receiver::Ident(lvar.name.clone()),
            // An unassigned identifier such as `json` parses as a bare call
            Some(Node::Send(send)) if send.recv.is_none() && send.args.is_empty() => {
                Receiver::Ident(send.method_name.clone())
            }
            Some(other) => Receiver::Expr(self.node_text(other)),
        }
    }

    fn argument(&self, node: &Node) -> Argument {
        match node {
            Node::Str(s) => Argument::Str(s.value.to_string_lossy()),
            Node::Sym(sym) => Argument::Symbol(sym.name.to_string_lossy()),
            Node::Hash(hash) => Argument::Hash(self.pairs(&hash.pairs)),
            Node::Kwargs(kwargs) => Argument::Hash(self.pairs(&kwargs.pairs)),
            other => Argument::Expr(self.node_text(other)),
        }
    }

    fn pairs(&self, pairs: &[Node]) -> Vec<(String, Argument)> {
        pairs
            .iter()
            .filter_map(|pair| match pair {
                Node::Pair(pair) => Some((self.hash_key(&pair.key), self.argument(&pair.value))),
                _ => None,
            })
            .collect()
    }

    fn hash_key(&self, node: &Node) -> String {
        match node {
            Node::Sym(sym) => sym.name.to_string_lossy(),
            Node::Str(s) => s.value.to_string_lossy(),
            other => self.node_text(other),
        }
    }

    fn param_names(&self, node: &Node) -> Vec<String> {
        match node {
            Node::Args(args) => args.args.iter().flat_map(|arg| self.param_names(arg)).collect(),
            Node::Arg(arg) => vec![arg.name.clone()],
            other => vec![self.node_text(other)],
        }
    }
}
