//! Renderers for transformed documents.

pub mod format;
pub mod html;
pub mod markdown;
pub mod writer;

pub use format::{CodeFormatter, JsonFormatter};
pub use html::HtmlRenderer;
pub use markdown::{
  DirectivePosition,
  DirectiveRenderer,
  IncludeRenderer,
  ListIndent,
  MarkdownOptions,
  MarkdownOutput,
  MarkdownRenderer,
  SourceDirectiveRenderer,
};
pub use writer::LineIndentWriter;
