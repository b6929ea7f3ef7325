//! Directive-driven Markdown processing.
//!
//! Documents are parsed with comrak into the tree in [`ast`], then extended
//! through `:name{key="value"}` directives:
//!
//! - `:include{url="..."}` pulls in another document, resolved through a
//!   [`quire_resolver::Resolver`]
//! - `:toc{}` becomes a table of contents
//! - `:attrs{#id .class}` decorates the following block
//!
//! A transformed document can be written back out as canonical Markdown or
//! rendered to HTML.
//!
//! # Example
//!
//! ```no_run
//! use quire_markdown::{
//!   MarkdownRenderer,
//!   Parser,
//!   Processor,
//!   TransformerRegistry,
//! };
//! use quire_resolver::{HttpResolver, Locator, Registry, ResolveContext};
//!
//! let processor =
//!   Processor::new(Parser::default(), TransformerRegistry::with_defaults());
//! let resolver = Registry::with_defaults(HttpResolver::new());
//! let document = processor
//!   .compile(
//!     ":include{url=\"chapter.md\"}\n",
//!     &Locator::from("book.md"),
//!     &resolver,
//!     &ResolveContext::new(),
//!   )
//!   .unwrap();
//! print!("{}", MarkdownRenderer::default().render(&document).unwrap());
//! ```

pub mod ast;
pub mod cache;
pub mod context;
pub mod directive;
pub mod embed;
pub mod error;
pub mod parser;
pub mod render;
pub mod rewrite;
pub mod syntax;

pub use ast::{Attributes, Directive, Document, Meta, Node, NodeKind};
pub use cache::SourceCache;
pub use context::TransformContext;
pub use directive::{Placement, Processor, Transformer, TransformerRegistry};
pub use error::{RenderError, RenderResult, TransformError, TransformResult};
pub use parser::{Parser, ParserOptions};
pub use render::{HtmlRenderer, MarkdownOptions, MarkdownRenderer};
pub use rewrite::LinkRewriter;
