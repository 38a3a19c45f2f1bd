//! Jbuilder OpenAPI Generator - OpenAPI response schemas from annotated Jbuilder templates.
//!
//! Templates build JSON documents through calls such as `json.name`, `json.array!` and
//! `json.partial!`. This library reads those templates statically, reconstructs the shape of
//! the document they emit, and merges it with `# @openapi` comments to produce OpenAPI
//! schemas. Nothing is evaluated: only the structure of the calls matters.
//!
//! ```ruby
//! # @openapi id:integer description:"User ID"
//! json.id @user.id
//! # @openapi status:string enum:[active,inactive]
//! json.status @user.status
//! json.posts @user.posts do |post|
//!   json.partial! "posts/post", post: post
//! end
//! ```
//!
//! # Architecture
//!
//! 1. [`annotation`] - Parses `@openapi` and `@openapi_operation` comments
//! 2. [`parser`] - Parses Ruby source and lowers it into the [`ast`] used by the walker
//! 3. [`classifier`] - Decides what each builder call does to the document
//! 4. [`resolver`] - Maps partial names to template paths
//! 5. [`walker`] - Walks a template (and its partials) into a [`shape`] tree
//! 6. [`compiler`] - Compiles a shape tree into an OpenAPI schema
//! 7. [`scanner`] - Finds templates under a views directory
//! 8. [`openapi_builder`] - Assembles compiled schemas and route mappings into a document
//! 9. [`serializer`] - Serializes the document to YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use jbuilder_openapi::{
//!     compiler::SchemaCompiler,
//!     resolver::PartialResolver,
//!     walker::TemplateWalker,
//! };
//! use std::path::Path;
//!
//! let mut walker = TemplateWalker::new(PartialResolver::new());
//! let result = walker.walk_file(Path::new("app/views/users/show.json.jbuilder")).unwrap();
//!
//! for warning in &result.warnings {
//!     eprintln!("{}", warning);
//! }
//!
//! let schema = SchemaCompiler::compile_value(&result.root).unwrap();
//! println!("{}", serde_json::to_string_pretty(&schema).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod annotation;
pub mod ast;
pub mod classifier;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod error;
pub mod openapi_builder;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod serializer;
pub mod shape;
pub mod walker;
