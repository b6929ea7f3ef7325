//! Canonical Markdown output.
//!
//! Re-serializes a transformed [`Document`] into normalized Markdown.
//! Rendering a document, parsing the result and rendering again yields the
//! same text.

use std::{
  collections::HashMap,
  fmt::{self, Write as _},
  sync::Arc,
};

use unicode_width::UnicodeWidthStr;

use super::{format::CodeFormatter, writer::LineIndentWriter};
use crate::{
  ast::{Alignment, Attributes, Directive, Document, ListData, Node, NodeKind},
  directive::include,
  error::{RenderError, RenderResult},
};

/// Narrowest column a rendered table will use.
const MIN_COLUMN_WIDTH: usize = 2;

/// How the continuation lines of a list item are indented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListIndent {
  /// Aligned with the content after the item marker.
  #[default]
  Aligned,
  /// Always four spaces, unless the marker is wider.
  Uniform,
}

#[derive(Debug, Clone)]
pub struct MarkdownOptions {
  /// Render level 1 and 2 headings with `===`/`---` underlines.
  pub underline_headings: bool,
  /// Keep soft line breaks as newlines instead of spaces.
  pub soft_wraps:         bool,
  pub emphasis_token:     String,
  pub strong_token:       String,
  pub list_indent:        ListIndent,
  /// Append `{#id .class key="value"}` to headings that carry attributes.
  pub heading_attributes: bool,
}

impl Default for MarkdownOptions {
  fn default() -> Self {
    Self {
      underline_headings: false,
      soft_wraps:         false,
      emphasis_token:     "*".to_owned(),
      strong_token:       "**".to_owned(),
      list_indent:        ListIndent::Aligned,
      heading_attributes: false,
    }
  }
}

/// Where a directive appears in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectivePosition {
  /// Directly inside a block container. `first` is set when nothing
  /// precedes it in that container.
  Block { first: bool },
  /// Inside a paragraph or another inline container. Directives only
  /// parse at the end of a line, so renderers start a new block here and
  /// the line break that led up to the directive is dropped.
  Inline,
}

/// Renders one kind of directive back to Markdown.
pub trait DirectiveRenderer: Send + Sync {
  /// # Errors
  ///
  /// Returns an error if writing fails.
  fn render(
    &self,
    out: &mut MarkdownOutput<'_>,
    directive: &Directive,
    position: DirectivePosition,
  ) -> RenderResult<()>;
}

/// Writes a directive in its `:name{...}` source form.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceDirectiveRenderer;

impl DirectiveRenderer for SourceDirectiveRenderer {
  fn render(
    &self,
    out: &mut MarkdownOutput<'_>,
    directive: &Directive,
    position: DirectivePosition,
  ) -> RenderResult<()> {
    out.open_block(position)?;
    out.writer().write_str(&directive.to_source())?;
    Ok(())
  }
}

/// Replaces an include directive with the Markdown of the included
/// document. Unresolved includes keep their source form.
#[derive(Debug, Default, Clone, Copy)]
pub struct IncludeRenderer;

impl DirectiveRenderer for IncludeRenderer {
  fn render(
    &self,
    out: &mut MarkdownOutput<'_>,
    directive: &Directive,
    position: DirectivePosition,
  ) -> RenderResult<()> {
    let Some(included) = &directive.included else {
      return SourceDirectiveRenderer.render(out, directive, position);
    };
    if included.document.children.is_empty() {
      return Ok(());
    }
    out.open_block(position)?;
    out.render_blocks(&included.document.children)
  }
}

/// Serializes documents as canonical Markdown.
pub struct MarkdownRenderer {
  options:    MarkdownOptions,
  formatters: HashMap<String, Arc<dyn CodeFormatter>>,
  directives: HashMap<String, Arc<dyn DirectiveRenderer>>,
  fallback:   Option<Arc<dyn DirectiveRenderer>>,
}

impl Default for MarkdownRenderer {
  fn default() -> Self {
    Self::new(MarkdownOptions::default())
  }
}

impl MarkdownRenderer {
  /// A renderer that expands includes and writes every other directive in
  /// source form.
  #[must_use]
  pub fn new(options: MarkdownOptions) -> Self {
    let mut directives: HashMap<String, Arc<dyn DirectiveRenderer>> =
      HashMap::new();
    directives.insert(include::NAME.to_owned(), Arc::new(IncludeRenderer));
    Self {
      options,
      formatters: HashMap::new(),
      directives,
      fallback: Some(Arc::new(SourceDirectiveRenderer)),
    }
  }

  #[must_use]
  pub const fn options(&self) -> &MarkdownOptions {
    &self.options
  }

  /// Register a code formatter under each of its languages.
  #[must_use]
  pub fn with_formatter(mut self, formatter: impl CodeFormatter + 'static) -> Self {
    let formatter: Arc<dyn CodeFormatter> = Arc::new(formatter);
    for language in formatter.languages() {
      self
        .formatters
        .insert((*language).to_owned(), Arc::clone(&formatter));
    }
    self
  }

  #[must_use]
  pub fn with_directive_renderer(
    mut self,
    name: impl Into<String>,
    renderer: impl DirectiveRenderer + 'static,
  ) -> Self {
    self.directives.insert(name.into(), Arc::new(renderer));
    self
  }

  /// Fail with [`RenderError::MissingRenderer`] on directives without a
  /// registered renderer instead of writing their source form.
  #[must_use]
  pub fn without_fallback(mut self) -> Self {
    self.fallback = None;
    self
  }

  fn directive_renderer(&self, name: &str) -> RenderResult<&dyn DirectiveRenderer> {
    self
      .directives
      .get(name)
      .or(self.fallback.as_ref())
      .map(|renderer| &**renderer)
      .ok_or_else(|| RenderError::MissingRenderer(name.to_owned()))
  }

  /// Render `document`. Non-empty output ends with a single newline.
  ///
  /// # Errors
  ///
  /// Returns an error if a directive has no renderer.
  pub fn render(&self, document: &Document) -> RenderResult<String> {
    let mut out = MarkdownOutput::new(self);
    out.render_blocks(&document.children)?;

    let rendered = out.writer.into_string();
    let mut text = rendered.trim_start_matches('\n').to_owned();
    if !text.is_empty() {
      text.push('\n');
    }
    Ok(text)
  }
}

impl fmt::Debug for MarkdownRenderer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut directives: Vec<&str> =
      self.directives.keys().map(String::as_str).collect();
    directives.sort_unstable();
    f.debug_struct("MarkdownRenderer")
      .field("options", &self.options)
      .field("directives", &directives)
      .field("fallback", &self.fallback.is_some())
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, Copy)]
enum Parent {
  Container,
  Item,
  List(ListData),
  Inline,
}

/// In-progress Markdown output, handed to [`DirectiveRenderer`]s.
pub struct MarkdownOutput<'r> {
  renderer:      &'r MarkdownRenderer,
  writer:        LineIndentWriter,
  in_table_cell: bool,
}

impl<'r> MarkdownOutput<'r> {
  fn new(renderer: &'r MarkdownRenderer) -> Self {
    Self {
      renderer,
      writer: LineIndentWriter::new(),
      in_table_cell: false,
    }
  }

  pub const fn writer(&mut self) -> &mut LineIndentWriter {
    &mut self.writer
  }

  /// Separate a directive from whatever precedes it at `position`. Table
  /// cells cannot hold blocks and stay on one line.
  ///
  /// # Errors
  ///
  /// Returns an error if writing fails.
  pub fn open_block(&mut self, position: DirectivePosition) -> fmt::Result {
    match position {
      DirectivePosition::Block { first: true } => Ok(()),
      DirectivePosition::Inline if self.in_table_cell => Ok(()),
      DirectivePosition::Block { first: false } | DirectivePosition::Inline => {
        self.writer.write_str("\n\n")
      },
    }
  }

  /// Render a sequence of blocks at the current position.
  ///
  /// # Errors
  ///
  /// Returns an error if a directive has no renderer.
  pub fn render_blocks(&mut self, nodes: &[Node]) -> RenderResult<()> {
    self.render_children(nodes, Parent::Container)
  }

  fn render_children(&mut self, nodes: &[Node], parent: Parent) -> RenderResult<()> {
    for (index, node) in nodes.iter().enumerate() {
      let next = nodes.get(index + 1);
      if matches!(parent, Parent::Inline)
        && !self.in_table_cell
        && node.is_line_break()
      {
        if next.is_some_and(|next| next.as_directive().is_some()) {
          continue;
        }
        let previous = index.checked_sub(1).and_then(|i| nodes.get(i));
        if let Some(directive) = previous.and_then(Node::as_directive) {
          self.writer.write_str(line_after(directive))?;
          continue;
        }
      }
      self.render_node(node, parent, index, next)?;
    }
    Ok(())
  }

  /// Render into a fresh writer and return the text.
  fn render_detached(&mut self, nodes: &[Node]) -> RenderResult<String> {
    let saved = std::mem::take(&mut self.writer);
    let result = self.render_children(nodes, Parent::Inline);
    let detached = std::mem::replace(&mut self.writer, saved);
    result?;
    Ok(detached.into_string())
  }

  fn gap(&mut self, first: bool) -> fmt::Result {
    if first {
      Ok(())
    } else {
      self.writer.write_str("\n\n")
    }
  }

  fn line_gap(&mut self, node: &Node, first: bool) -> fmt::Result {
    if first {
      return Ok(());
    }
    self.writer.write_str("\n")?;
    if node.blank_before {
      self.writer.write_str("\n")?;
    }
    Ok(())
  }

  fn render_node(
    &mut self,
    node: &Node,
    parent: Parent,
    index: usize,
    next: Option<&Node>,
  ) -> RenderResult<()> {
    let renderer = self.renderer;
    let first = index == 0;

    match &node.kind {
      NodeKind::Paragraph => {
        self.gap(first)?;
        self.render_children(&node.children, Parent::Inline)?;
      },
      NodeKind::Heading { level } => {
        self.gap(first)?;
        self.render_heading(node, *level)?;
      },
      NodeKind::BlockQuote => {
        self.gap(first)?;
        if first && matches!(parent, Parent::Item) {
          self.writer.write_str("> ")?;
        }
        self.writer.push_indent("> ");
        let result = self.render_children(&node.children, Parent::Container);
        self.writer.pop_indent();
        result?;
      },
      NodeKind::List(list) => {
        self.line_gap(node, first)?;
        self.render_children(&node.children, Parent::List(*list))?;
      },
      NodeKind::Item => self.render_item(node, parent, index, next)?,
      NodeKind::CodeBlock { info, literal } => {
        self.gap(first)?;
        self.render_code_block(info, literal)?;
      },
      NodeKind::HtmlBlock(html) => {
        self.line_gap(node, first)?;
        self
          .writer
          .write_str(html.strip_suffix('\n').unwrap_or(html))?;
      },
      NodeKind::ThematicBreak => {
        self.gap(first)?;
        self.writer.write_str("---")?;
      },
      NodeKind::Table { alignments } => {
        self.gap(first)?;
        self.render_table(node, alignments)?;
      },
      NodeKind::TableRow { .. } | NodeKind::TableCell => {
        self.render_children(&node.children, Parent::Inline)?;
      },
      NodeKind::Text(text) => self.render_text(text)?,
      NodeKind::SoftBreak => {
        let soft = if renderer.options.soft_wraps { "\n" } else { " " };
        self.writer.write_str(soft)?;
      },
      NodeKind::HardBreak => self.writer.write_str("\\\n")?,
      NodeKind::Emphasis => {
        self.render_wrapped(&renderer.options.emphasis_token, &node.children)?;
      },
      NodeKind::Strong => {
        self.render_wrapped(&renderer.options.strong_token, &node.children)?;
      },
      NodeKind::Strikethrough => self.render_wrapped("~~", &node.children)?,
      NodeKind::Code(code) => self.render_code_span(code)?,
      NodeKind::Link { url, title } => {
        if title.is_empty() && is_autolink(node, url) {
          write!(self.writer, "<{url}>")?;
        } else {
          self.writer.write_str("[")?;
          self.render_children(&node.children, Parent::Inline)?;
          self.write_destination(url, title)?;
        }
      },
      NodeKind::Image { url, title } => {
        self.writer.write_str("![")?;
        self.render_children(&node.children, Parent::Inline)?;
        self.write_destination(url, title)?;
      },
      NodeKind::RawHtml(html) => self.writer.write_str(html)?,
      NodeKind::TaskCheckbox { checked } => {
        self
          .writer
          .write_str(if *checked { "[X] " } else { "[ ] " })?;
      },
      NodeKind::Directive(directive) => {
        let position = if matches!(parent, Parent::Inline) {
          DirectivePosition::Inline
        } else {
          DirectivePosition::Block { first }
        };
        renderer
          .directive_renderer(&directive.name)?
          .render(self, directive, position)?;
      },
    }
    Ok(())
  }

  fn render_heading(&mut self, node: &Node, level: u8) -> RenderResult<()> {
    let renderer = self.renderer;
    let options = &renderer.options;
    let attributes = if options.heading_attributes {
      attribute_block(&node.attributes)
    } else {
      None
    };

    if options.underline_headings && level <= 2 {
      let text = self.render_detached(&node.children)?;
      let underline = if level == 1 { "=" } else { "-" };
      let width = text.width().max(1);
      self.writer.write_str(&text)?;
      if let Some(attributes) = attributes {
        write!(self.writer, " {attributes}")?;
      }
      write!(self.writer, "\n{}", underline.repeat(width))?;
      return Ok(());
    }

    write!(self.writer, "{} ", "#".repeat(usize::from(level)))?;
    self.render_children(&node.children, Parent::Inline)?;
    if let Some(attributes) = attributes {
      write!(self.writer, " {attributes}")?;
    }
    Ok(())
  }

  fn render_item(
    &mut self,
    node: &Node,
    parent: Parent,
    index: usize,
    next: Option<&Node>,
  ) -> RenderResult<()> {
    let Parent::List(list) = parent else {
      return self.render_children(&node.children, Parent::Container);
    };

    if index > 0 && node.blank_before {
      self.writer.write_str("\n")?;
    }
    let marker = if list.ordered {
      format!("{}{} ", list.start + index, list.delimiter)
    } else {
      format!("{} ", list.bullet)
    };
    let indent = match self.renderer.options.list_indent {
      ListIndent::Uniform if marker.len() <= 4 => "    ".to_owned(),
      _ => " ".repeat(marker.len()),
    };

    self.writer.write_str(&marker)?;
    self.writer.push_indent(indent);
    self.writer.mark_block_start();
    let result = self.render_children(&node.children, Parent::Item);
    self.writer.pop_indent();
    result?;

    if next.is_some_and(|next| next.kind == NodeKind::Item) {
      self.writer.write_str("\n")?;
    }
    Ok(())
  }

  fn render_code_block(&mut self, info: &str, literal: &str) -> RenderResult<()> {
    let language = info.split_whitespace().next().unwrap_or_default();
    let mut code = self
      .renderer
      .formatters
      .get(language)
      .and_then(|formatter| formatter.format(literal))
      .unwrap_or_else(|| literal.to_owned());
    if !code.is_empty() && !code.ends_with('\n') {
      code.push('\n');
    }

    let fence = if info.contains('`') {
      "~".repeat(longest_run(&code, '~').max(2) + 1)
    } else {
      "`".repeat(longest_run(&code, '`').max(2) + 1)
    };
    write!(self.writer, "{fence}{info}\n{code}{fence}")?;
    Ok(())
  }

  fn render_table(&mut self, node: &Node, alignments: &[Alignment]) -> RenderResult<()> {
    let saved = std::mem::replace(&mut self.in_table_cell, true);
    let rows: RenderResult<Vec<Vec<String>>> = node
      .children
      .iter()
      .map(|row| {
        row
          .children
          .iter()
          .map(|cell| self.render_detached(&cell.children))
          .collect()
      })
      .collect();
    self.in_table_cell = saved;
    let rows = rows?;

    let columns = rows
      .iter()
      .map(Vec::len)
      .max()
      .unwrap_or(0)
      .max(alignments.len());
    let mut widths = vec![MIN_COLUMN_WIDTH; columns];
    for row in &rows {
      for (width, cell) in widths.iter_mut().zip(row) {
        *width = (*width).max(cell.width());
      }
    }

    let mut table = String::new();
    for (r, row) in rows.iter().enumerate() {
      if r > 0 {
        table.push('\n');
      }
      for (col, width) in widths.iter().enumerate() {
        let cell = row.get(col).map_or("", String::as_str);
        let alignment = if r == 0 {
          Alignment::Left
        } else {
          alignments.get(col).copied().unwrap_or_default()
        };
        push_cell(&mut table, cell, *width, alignment);
      }
      table.push('|');

      if r == 0 {
        table.push('\n');
        for (col, width) in widths.iter().enumerate() {
          let alignment = alignments.get(col).copied().unwrap_or_default();
          let left = if matches!(alignment, Alignment::Left | Alignment::Center) {
            ':'
          } else {
            '-'
          };
          let right = if matches!(alignment, Alignment::Right | Alignment::Center) {
            ':'
          } else {
            '-'
          };
          table.push('|');
          table.push(left);
          table.push_str(&"-".repeat(*width));
          table.push(right);
        }
        table.push('|');
      }
    }

    self.writer.write_str(&table)?;
    Ok(())
  }

  fn render_text(&mut self, text: &str) -> RenderResult<()> {
    let mut collapsed = collapse_whitespace(text);
    let line_start = self.writer.at_line_start();
    if line_start {
      collapsed = collapsed.trim_start().to_owned();
    }
    self
      .writer
      .write_str(&escape_text(&collapsed, line_start, self.in_table_cell))?;
    Ok(())
  }

  fn render_wrapped(&mut self, token: &str, children: &[Node]) -> RenderResult<()> {
    self.writer.push_prefix(token);
    let result = self.render_children(children, Parent::Inline);
    if self.writer.pop_prefix() {
      self.writer.write_str(token)?;
    }
    result
  }

  fn render_code_span(&mut self, code: &str) -> RenderResult<()> {
    let ticks = "`".repeat(longest_run(code, '`') + 1);
    let pad = code.starts_with('`')
      || code.ends_with('`')
      || (code.starts_with(' ') && code.ends_with(' ') && !code.trim().is_empty());
    let space = if pad { " " } else { "" };
    write!(self.writer, "{ticks}{space}{code}{space}{ticks}")?;
    Ok(())
  }

  fn write_destination(&mut self, url: &str, title: &str) -> RenderResult<()> {
    let needs_brackets = url.is_empty()
      || url.chars().any(|c| c.is_whitespace() || c == '<' || c == '>')
      || url.matches('(').count() != url.matches(')').count();
    if needs_brackets {
      let escaped = url.replace('<', "\\<").replace('>', "\\>");
      write!(self.writer, "](<{escaped}>")?;
    } else {
      write!(self.writer, "]({url}")?;
    }
    if !title.is_empty() {
      write!(self.writer, " \"{}\"", title.replace('"', "\\\""))?;
    }
    self.writer.write_str(")")?;
    Ok(())
  }
}

/// What replaces the line break after an inline directive: a plain newline
/// keeps it at the end of its line, included blocks need a blank line.
fn line_after(directive: &Directive) -> &'static str {
  let has_blocks = directive
    .included
    .as_ref()
    .is_some_and(|included| !included.document.children.is_empty());
  if has_blocks { "\n\n" } else { "\n" }
}

fn push_cell(out: &mut String, content: &str, width: usize, alignment: Alignment) {
  let pad = width.saturating_sub(content.width());
  out.push_str("| ");
  match alignment {
    Alignment::Center => {
      out.push_str(&" ".repeat(pad / 2));
      out.push_str(content);
      out.push_str(&" ".repeat(pad - pad / 2 + 1));
    },
    Alignment::Right => {
      out.push_str(&" ".repeat(pad));
      out.push_str(content);
      out.push(' ');
    },
    Alignment::Left | Alignment::None => {
      out.push_str(content);
      out.push_str(&" ".repeat(pad + 1));
    },
  }
}

/// `{#id .class key="value"}` with the id first, then classes, then the
/// remaining keys in alphabetical order.
fn attribute_block(attributes: &Attributes) -> Option<String> {
  let mut parts = Vec::new();
  if let Some(id) = attributes.get("id") {
    parts.push(format!("#{id}"));
  }
  if let Some(class) = attributes.get("class") {
    parts.extend(class.split_whitespace().map(|c| format!(".{c}")));
  }
  let mut others: Vec<(&String, &String)> = attributes
    .iter()
    .filter(|(key, _)| *key != "id" && *key != "class")
    .collect();
  others.sort_by(|a, b| a.0.cmp(b.0));
  parts.extend(others.into_iter().map(|(k, v)| format!("{k}=\"{v}\"")));

  (!parts.is_empty()).then(|| format!("{{{}}}", parts.join(" ")))
}

fn is_autolink(node: &Node, url: &str) -> bool {
  let [child] = node.children.as_slice() else {
    return false;
  };
  let NodeKind::Text(text) = &child.kind else {
    return false;
  };
  let has_scheme = url.split_once(':').is_some_and(|(scheme, _)| {
    scheme.len() >= 2
      && scheme
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
  });
  has_scheme
    && !url.chars().any(|c| c.is_whitespace() || c == '<' || c == '>')
    && (text == url || url.strip_prefix("mailto:") == Some(text.as_str()))
}

fn longest_run(text: &str, marker: char) -> usize {
  let mut longest = 0;
  let mut current = 0;
  for c in text.chars() {
    if c == marker {
      current += 1;
      longest = longest.max(current);
    } else {
      current = 0;
    }
  }
  longest
}

fn collapse_whitespace(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut in_space = false;
  for c in text.chars() {
    if matches!(c, ' ' | '\t' | '\n') {
      if !in_space {
        out.push(' ');
      }
      in_space = true;
    } else {
      out.push(c);
      in_space = false;
    }
  }
  out
}

fn looks_like_entity(rest: &str) -> bool {
  let body = &rest[1..];
  let end = body
    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '#'))
    .unwrap_or(body.len());
  end > 0 && body[end..].starts_with(';')
}

/// Backslash-escape the characters that would otherwise be read as markup.
fn escape_text(text: &str, line_start: bool, in_table_cell: bool) -> String {
  let mut out = String::with_capacity(text.len() + 8);
  let mut rest = text;

  if line_start {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && matches!(rest.as_bytes().get(digits), Some(b'.' | b')')) {
      out.push_str(&rest[..digits]);
      out.push('\\');
      rest = &rest[digits..];
    } else if rest.starts_with(['#', '-', '+', '=']) {
      out.push('\\');
    }
  }

  for (i, c) in rest.char_indices() {
    match c {
      '\\' | '*' | '_' | '`' | '[' | ']' | '<' | '>' | '~' => {
        out.push('\\');
        out.push(c);
      },
      '|' if in_table_cell => out.push_str("\\|"),
      '&' if looks_like_entity(&rest[i..]) => out.push_str("\\&"),
      _ => out.push(c),
    }
  }
  out
}
