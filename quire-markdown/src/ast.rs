//! Document tree produced by the parser and consumed by the transformers and
//! renderers.
//!
//! Blocks and inlines share one [`Node`] type. Directives carry an open
//! string name, so new directive kinds plug in through the transformer
//! registry rather than through new node variants.

use std::{collections::HashMap, rc::Rc};

use indexmap::IndexMap;
use quire_resolver::Locator;
use serde_json::{Map, Value};

/// Ordered attribute map attached to nodes and directives.
pub type Attributes = IndexMap<String, String>;

/// Front matter of a document.
pub type Meta = Map<String, Value>;

/// Column alignment of a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
  #[default]
  None,
  Left,
  Center,
  Right,
}

/// Marker data of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListData {
  pub ordered:   bool,
  /// First number of an ordered list.
  pub start:     usize,
  /// `.` or `)` for ordered lists.
  pub delimiter: char,
  /// `-`, `*` or `+` for bullet lists.
  pub bullet:    char,
  pub tight:     bool,
}

impl ListData {
  #[must_use]
  pub const fn bullet(bullet: char) -> Self {
    Self {
      ordered: false,
      start: 1,
      delimiter: '.',
      bullet,
      tight: true,
    }
  }

  #[must_use]
  pub const fn ordered(start: usize) -> Self {
    Self {
      ordered: true,
      start,
      delimiter: '.',
      bullet: '-',
      tight: true,
    }
  }
}

/// A document pulled in by an include directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Included {
  /// Resolved locator of the included resource.
  pub locator:  Locator,
  /// Raw bytes as fetched, shared with the source cache.
  pub source:   Rc<[u8]>,
  /// Parsed and transformed subtree, adjusted for this directive.
  pub document: Document,
}

/// An inline `:name{...}` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
  pub name:       String,
  pub attributes: Attributes,
  pub included:   Option<Rc<Included>>,
}

impl Directive {
  #[must_use]
  pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
    Self {
      name: name.into(),
      attributes,
      included: None,
    }
  }

  #[must_use]
  pub fn attribute(&self, name: &str) -> Option<&str> {
    self.attributes.get(name).map(String::as_str)
  }

  /// Source form, `:name{key="value" ...}`.
  #[must_use]
  pub fn to_source(&self) -> String {
    let attributes: Vec<String> = self
      .attributes
      .iter()
      .map(|(key, value)| {
        if value.contains('"') {
          format!("{key}='{value}'")
        } else {
          format!("{key}=\"{value}\"")
        }
      })
      .collect();
    format!(":{}{{{}}}", self.name, attributes.join(" "))
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
  // Blocks
  Paragraph,
  Heading { level: u8 },
  BlockQuote,
  List(ListData),
  Item,
  CodeBlock { info: String, literal: String },
  HtmlBlock(String),
  ThematicBreak,
  Table { alignments: Vec<Alignment> },
  TableRow { header: bool },
  TableCell,

  // Inlines
  Text(String),
  SoftBreak,
  HardBreak,
  Emphasis,
  Strong,
  Strikethrough,
  Code(String),
  Link { url: String, title: String },
  Image { url: String, title: String },
  RawHtml(String),
  TaskCheckbox { checked: bool },
  Directive(Directive),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub kind:         NodeKind,
  pub attributes:   Attributes,
  pub children:     Vec<Self>,
  /// Whether the source had a blank line right before this node.
  pub blank_before: bool,
}

impl Node {
  #[must_use]
  pub fn new(kind: NodeKind) -> Self {
    Self {
      kind,
      attributes: Attributes::new(),
      children: Vec::new(),
      blank_before: false,
    }
  }

  #[must_use]
  pub fn with_children(kind: NodeKind, children: Vec<Self>) -> Self {
    Self {
      children,
      ..Self::new(kind)
    }
  }

  #[must_use]
  pub fn text(text: impl Into<String>) -> Self {
    Self::new(NodeKind::Text(text.into()))
  }

  #[must_use]
  pub fn directive(directive: Directive) -> Self {
    Self::new(NodeKind::Directive(directive))
  }

  #[must_use]
  pub const fn as_directive(&self) -> Option<&Directive> {
    match &self.kind {
      NodeKind::Directive(directive) => Some(directive),
      _ => None,
    }
  }

  pub const fn as_directive_mut(&mut self) -> Option<&mut Directive> {
    match &mut self.kind {
      NodeKind::Directive(directive) => Some(directive),
      _ => None,
    }
  }

  #[must_use]
  pub const fn heading_level(&self) -> Option<u8> {
    match self.kind {
      NodeKind::Heading { level } => Some(level),
      _ => None,
    }
  }

  #[must_use]
  pub const fn is_line_break(&self) -> bool {
    matches!(self.kind, NodeKind::SoftBreak | NodeKind::HardBreak)
  }

  /// Whether this node is a block-level node.
  #[must_use]
  pub const fn is_block(&self) -> bool {
    matches!(
      self.kind,
      NodeKind::Paragraph
        | NodeKind::Heading { .. }
        | NodeKind::BlockQuote
        | NodeKind::List(_)
        | NodeKind::Item
        | NodeKind::CodeBlock { .. }
        | NodeKind::HtmlBlock(_)
        | NodeKind::ThematicBreak
        | NodeKind::Table { .. }
        | NodeKind::TableRow { .. }
        | NodeKind::TableCell
    )
  }

  /// Concatenated text content, ignoring markup.
  #[must_use]
  pub fn plain_text(&self) -> String {
    let mut out = String::new();
    self.collect_text(&mut out);
    out
  }

  fn collect_text(&self, out: &mut String) {
    match &self.kind {
      NodeKind::Text(text) | NodeKind::Code(text) => out.push_str(text),
      NodeKind::SoftBreak | NodeKind::HardBreak => out.push(' '),
      _ => {
        for child in &self.children {
          child.collect_text(out);
        }
      },
    }
  }

  /// Visit this node and its descendants in pre-order.
  pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Self)) {
    visit(self);
    for child in &mut self.children {
      child.walk_mut(visit);
    }
  }

  /// Like [`Node::walk_mut`], but also visits the documents pulled in by
  /// include directives. Included documents shared with other nodes are
  /// copied before the first change.
  pub fn walk_included_mut(&mut self, visit: &mut impl FnMut(&mut Self)) {
    visit(self);
    if let NodeKind::Directive(Directive {
      included: Some(included),
      ..
    }) = &mut self.kind
    {
      for child in &mut Rc::make_mut(included).document.children {
        child.walk_included_mut(visit);
      }
    }
    for child in &mut self.children {
      child.walk_included_mut(visit);
    }
  }

  /// Visit this node and its descendants in pre-order.
  pub fn walk(&self, visit: &mut impl FnMut(&Self)) {
    visit(self);
    for child in &self.children {
      child.walk(visit);
    }
  }
}

/// Root of a parsed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
  pub children: Vec<Node>,
  pub meta:     Meta,
}

impl Document {
  #[must_use]
  pub fn new(children: Vec<Node>) -> Self {
    Self {
      children,
      meta: Meta::new(),
    }
  }

  pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
    for child in &mut self.children {
      child.walk_mut(visit);
    }
  }

  pub fn walk(&self, visit: &mut impl FnMut(&Node)) {
    for child in &self.children {
      child.walk(visit);
    }
  }

  /// See [`Node::walk_included_mut`].
  pub fn walk_included_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
    for child in &mut self.children {
      child.walk_included_mut(visit);
    }
  }

  /// Make heading ids unique across this document and everything it
  /// includes.
  ///
  /// Generated ids are handed out again in document order and `#id` links
  /// follow the heading they pointed at within their own document. Ids set
  /// explicitly are kept.
  pub fn renumber_heading_ids(&mut self) {
    renumber(&mut self.children, &mut HeadingIds::new());
  }

  /// Headings of this document, in order, without following includes.
  #[must_use]
  pub fn headings(&self) -> Vec<&Node> {
    fn collect<'a>(nodes: &'a [Node], out: &mut Vec<&'a Node>) {
      for node in nodes {
        if node.heading_level().is_some() {
          out.push(node);
        }
        collect(&node.children, out);
      }
    }

    let mut out = Vec::new();
    collect(&self.children, &mut out);
    out
  }
}

fn renumber(nodes: &mut [Node], ids: &mut HeadingIds) {
  let mut renamed = HashMap::new();
  assign_ids(nodes, ids, &mut renamed);
  if renamed.is_empty() {
    return;
  }
  for node in nodes {
    node.walk_mut(&mut |node| {
      if let NodeKind::Link { url, .. } = &mut node.kind
        && let Some(id) = url.strip_prefix('#').and_then(|old| renamed.get(old))
      {
        *url = format!("#{id}");
      }
    });
  }
}

fn assign_ids(
  nodes: &mut [Node],
  ids: &mut HeadingIds,
  renamed: &mut HashMap<String, String>,
) {
  for node in nodes {
    if node.heading_level().is_some() {
      let text = node.plain_text();
      match node.attributes.get("id").cloned() {
        Some(id) if !HeadingIds::is_generated(&id, &text) => ids.reserve(&id),
        current => {
          let id = ids.assign(&text);
          if let Some(old) = current
            && old != id
          {
            renamed.insert(old, id.clone());
          }
          node.attributes.insert("id".to_owned(), id);
        },
      }
      continue;
    }

    if let NodeKind::Directive(Directive {
      included: Some(included),
      ..
    }) = &mut node.kind
    {
      renumber(&mut Rc::make_mut(included).document.children, ids);
      continue;
    }
    assign_ids(&mut node.children, ids, renamed);
  }
}

/// Assigns unique, URL-friendly heading identifiers.
#[derive(Debug, Default)]
pub struct HeadingIds {
  seen: HashMap<String, usize>,
}

impl HeadingIds {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Identifier for a heading with the given text.
  ///
  /// Lowercase ASCII alphanumerics, `-` and `_` are kept, whitespace runs
  /// become a single `-`, everything else is dropped. Repeated identifiers
  /// get a numeric suffix.
  pub fn assign(&mut self, text: &str) -> String {
    let slug = Self::slug(text);
    let count = self.seen.entry(slug.clone()).or_insert(0);
    let id = if *count == 0 {
      slug
    } else {
      format!("{slug}-{count}")
    };
    *count += 1;
    id
  }

  /// Keep `id` from being handed out.
  pub fn reserve(&mut self, id: &str) {
    *self.seen.entry(id.to_owned()).or_insert(0) += 1;
  }

  /// Whether `id` has the shape [`HeadingIds::assign`] gives `text`.
  #[must_use]
  pub fn is_generated(id: &str, text: &str) -> bool {
    let slug = Self::slug(text);
    id == slug
      || id
        .strip_prefix(slug.as_str())
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
  }

  fn slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.trim().chars() {
      if c.is_whitespace() {
        pending_dash = true;
        continue;
      }
      let c = c.to_ascii_lowercase();
      if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
        if pending_dash && !slug.is_empty() {
          slug.push('-');
        }
        pending_dash = false;
        slug.push(c);
      }
    }
    if slug.is_empty() {
      slug.push_str("heading");
    }
    slug
  }
}
