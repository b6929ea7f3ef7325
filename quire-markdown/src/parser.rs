//! Markdown parsing.
//!
//! Block and inline structure comes from `comrak`. The resulting tree is
//! converted into [`crate::ast`] nodes, after which directives, task list
//! checkboxes, heading identifiers and front matter are layered on top.

use comrak::{
  Arena,
  nodes::{AstNode, ListDelimType, ListType, NodeValue, TableAlignment},
  options::Options,
  parse_document,
};
use log::trace;

use crate::{
  ast::{Alignment, Document, HeadingIds, ListData, Meta, Node, NodeKind},
  directive::grammar,
  error::TransformResult,
};

/// Options controlling how documents are parsed.
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
  /// Directive names left as plain text.
  pub ignore_directives: Vec<String>,
}

/// Parses Markdown source into a [`Document`].
#[derive(Debug, Clone, Default)]
pub struct Parser {
  options: ParserOptions,
}

impl Parser {
  #[must_use]
  pub const fn new(options: ParserOptions) -> Self {
    Self { options }
  }

  #[must_use]
  pub const fn options(&self) -> &ParserOptions {
    &self.options
  }

  /// Parse `source`.
  ///
  /// # Errors
  ///
  /// Returns an error if the front matter is not a valid YAML mapping.
  pub fn parse(&self, source: &str) -> TransformResult<Document> {
    let (front_matter, body) = split_front_matter(source);
    let meta = match front_matter {
      Some(yaml) => parse_meta(yaml)?,
      None => Meta::new(),
    };

    let arena = Arena::new();
    let root = parse_document(&arena, body, &comrak_options());

    let mut converter = Converter {
      ignore:      &self.options.ignore_directives,
      heading_ids: HeadingIds::new(),
    };
    let children = converter.convert_children(root, None);
    trace!("Parsed {} top-level blocks", children.len());

    Ok(Document { children, meta })
  }
}

fn comrak_options() -> Options<'static> {
  let mut options = Options::default();
  options.extension.table = true;
  options.extension.strikethrough = true;
  // Directive attribute values often hold URLs; keep them as plain text.
  options.extension.autolink = false;
  options.extension.tasklist = false;
  // Heading ids come from the converter.
  options.extension.header_id_prefix = None;
  options
}

/// Split a leading `---` YAML block from the Markdown body.
///
/// Returns the YAML text without its delimiters, or `None` when `source`
/// has no front matter.
#[must_use]
pub fn split_front_matter(source: &str) -> (Option<&str>, &str) {
  let Some(rest) = source.strip_prefix("---\n") else {
    return (None, source);
  };

  let mut offset = 0;
  for line in rest.split_inclusive('\n') {
    let content = line.trim_end_matches('\n').trim_end();
    if content == "---" || content == "..." {
      return (Some(&rest[..offset]), &rest[offset + line.len()..]);
    }
    offset += line.len();
  }
  (None, source)
}

fn parse_meta(yaml: &str) -> TransformResult<Meta> {
  if yaml.trim().is_empty() {
    return Ok(Meta::new());
  }
  let value: serde_json::Value = serde_yaml::from_str(yaml)?;
  Ok(match value {
    serde_json::Value::Object(map) => map,
    serde_json::Value::Null => Meta::new(),
    other => {
      let mut meta = Meta::new();
      meta.insert("value".to_owned(), other);
      meta
    },
  })
}

struct Converter<'o> {
  ignore:      &'o [String],
  heading_ids: HeadingIds,
}

impl Converter<'_> {
  fn convert_children<'a>(
    &mut self,
    parent: &'a AstNode<'a>,
    list: Option<&ListData>,
  ) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    let mut previous_end: Option<usize> = None;

    for (index, child) in parent.children().enumerate() {
      let (start, end) = {
        let data = child.data.borrow();
        (data.sourcepos.start.line, data.sourcepos.end.line)
      };
      let blank_before = match list {
        Some(list) => index > 0 && !list.tight,
        None => previous_end.is_some_and(|prev| prev + 1 < start),
      };
      previous_end = Some(end);

      for mut node in self.convert(child) {
        node.blank_before = blank_before;
        out.push(node);
      }
    }

    out
  }

  fn convert_inlines<'a>(&mut self, parent: &'a AstNode<'a>) -> Vec<Node> {
    let children = self.convert_children(parent, None);
    grammar::extract_directives(children, self.ignore)
  }

  /// Convert one comrak node. Unsupported node kinds are replaced by their
  /// children.
  fn convert<'a>(&mut self, node: &'a AstNode<'a>) -> Vec<Node> {
    let value = node.data.borrow().value.clone();
    let kind = match value {
      NodeValue::FrontMatter(_) => return Vec::new(),
      NodeValue::Paragraph => {
        return vec![Node::with_children(
          NodeKind::Paragraph,
          self.convert_inlines(node),
        )];
      },
      NodeValue::Heading(heading) => {
        let children = self.convert_inlines(node);
        let mut heading =
          Node::with_children(NodeKind::Heading { level: heading.level }, children);
        let id = self.heading_ids.assign(&heading.plain_text());
        heading.attributes.insert("id".to_owned(), id);
        return vec![heading];
      },
      NodeValue::List(list) => {
        let data = ListData {
          ordered:   matches!(list.list_type, ListType::Ordered),
          start:     list.start,
          delimiter: if matches!(list.delimiter, ListDelimType::Paren) {
            ')'
          } else {
            '.'
          },
          bullet:    char::from(list.bullet_char),
          tight:     list.tight,
        };
        let items = self.convert_children(node, Some(&data));
        return vec![Node::with_children(NodeKind::List(data), items)];
      },
      NodeValue::Item(_) => {
        let mut children = self.convert_children(node, None);
        attach_task_checkbox(&mut children);
        return vec![Node::with_children(NodeKind::Item, children)];
      },
      NodeValue::TableCell => {
        return vec![Node::with_children(
          NodeKind::TableCell,
          self.convert_inlines(node),
        )];
      },
      NodeValue::BlockQuote => NodeKind::BlockQuote,
      NodeValue::CodeBlock(code) => {
        NodeKind::CodeBlock {
          info:    code.info.to_string(),
          literal: code.literal.to_string(),
        }
      },
      NodeValue::HtmlBlock(html) => NodeKind::HtmlBlock(html.literal.to_string()),
      NodeValue::ThematicBreak => NodeKind::ThematicBreak,
      NodeValue::Table(table) => {
        NodeKind::Table {
          alignments: table
            .alignments
            .iter()
            .map(|alignment| {
              match alignment {
                TableAlignment::None => Alignment::None,
                TableAlignment::Left => Alignment::Left,
                TableAlignment::Center => Alignment::Center,
                TableAlignment::Right => Alignment::Right,
              }
            })
            .collect(),
        }
      },
      NodeValue::TableRow(header) => NodeKind::TableRow { header },
      NodeValue::Text(text) => NodeKind::Text(text.to_string()),
      NodeValue::SoftBreak => NodeKind::SoftBreak,
      NodeValue::LineBreak => NodeKind::HardBreak,
      NodeValue::Code(code) => NodeKind::Code(code.literal.to_string()),
      NodeValue::HtmlInline(html) => NodeKind::RawHtml(html.to_string()),
      NodeValue::Emph => NodeKind::Emphasis,
      NodeValue::Strong => NodeKind::Strong,
      NodeValue::Strikethrough => NodeKind::Strikethrough,
      NodeValue::Link(link) => {
        NodeKind::Link {
          url:   link.url.to_string(),
          title: link.title.to_string(),
        }
      },
      NodeValue::Image(link) => {
        NodeKind::Image {
          url:   link.url.to_string(),
          title: link.title.to_string(),
        }
      },
      _ => return self.convert_children(node, None),
    };

    let children = if matches!(kind, NodeKind::BlockQuote) {
      self.convert_children(node, None)
    } else if matches!(
      kind,
      NodeKind::Emphasis
        | NodeKind::Strong
        | NodeKind::Strikethrough
        | NodeKind::Link { .. }
        | NodeKind::Image { .. }
    ) {
      self.convert_inlines(node)
    } else {
      self.convert_children(node, None)
    };
    vec![Node::with_children(kind, children)]
  }
}

/// Turn a leading `[ ]`, `[x]` or `[X]` in an item's first paragraph into a
/// task checkbox.
fn attach_task_checkbox(children: &mut [Node]) {
  let Some(paragraph) = children.first_mut() else {
    return;
  };
  if paragraph.kind != NodeKind::Paragraph {
    return;
  }
  let Some(Node {
    kind: NodeKind::Text(text),
    ..
  }) = paragraph.children.first_mut()
  else {
    return;
  };

  let checked = match text.get(..4) {
    Some("[ ] ") => false,
    Some("[x] " | "[X] ") => true,
    _ => return,
  };
  let rest = text[4..].trim_start().to_owned();
  if rest.is_empty() {
    paragraph.children.remove(0);
  } else {
    *text = rest;
  }
  paragraph
    .children
    .insert(0, Node::new(NodeKind::TaskCheckbox { checked }));
}
