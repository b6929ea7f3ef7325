//! Configuration for the quire document compiler.
//!
//! A [`Config`] is assembled from zero or more TOML or JSON files, merged in
//! order, and then adjusted with `KEY=VALUE` overrides.

pub mod config;
pub mod error;

pub use config::{
  Config,
  HighlightConfig,
  HtmlConfig,
  HttpConfig,
  LinksConfig,
  ListIndentStyle,
  MarkdownConfig,
  PdfConfig,
};
pub use error::ConfigError;
