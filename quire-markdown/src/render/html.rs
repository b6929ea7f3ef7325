//! HTML output.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute, encode_text};
use log::warn;

use crate::{
  ast::{Alignment, Attributes, Document, Node, NodeKind},
  error::RenderResult,
  syntax::Highlighting,
};

/// Code blocks in this language are left for mermaid.js to draw.
const MERMAID: &str = "mermaid";

/// Renders documents as an HTML fragment.
#[derive(Debug, Default)]
pub struct HtmlRenderer {
  highlighting: Option<Highlighting>,
}

impl HtmlRenderer {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Highlight fenced code with `highlighting`.
  #[must_use]
  pub fn with_highlighting(mut self, highlighting: Highlighting) -> Self {
    self.highlighting = Some(highlighting);
    self
  }

  /// # Errors
  ///
  /// Returns an error if writing to the output fails.
  pub fn render(&self, document: &Document) -> RenderResult<String> {
    let mut out = String::new();
    self.render_nodes(&mut out, &document.children, false)?;
    Ok(out)
  }

  fn render_nodes(&self, out: &mut String, nodes: &[Node], tight: bool) -> RenderResult<()> {
    for node in nodes {
      self.render_node(out, node, tight)?;
    }
    Ok(())
  }

  fn render_node(&self, out: &mut String, node: &Node, tight: bool) -> RenderResult<()> {
    let attrs = attribute_string(&node.attributes);
    match &node.kind {
      NodeKind::Paragraph if tight => {
        self.render_nodes(out, &node.children, false)?;
        out.push('\n');
      },
      NodeKind::Paragraph => {
        write!(out, "<p{attrs}>")?;
        self.render_nodes(out, &node.children, false)?;
        out.push_str("</p>\n");
      },
      NodeKind::Heading { level } => {
        write!(out, "<h{level}{attrs}>")?;
        self.render_nodes(out, &node.children, false)?;
        writeln!(out, "</h{level}>")?;
      },
      NodeKind::BlockQuote => {
        writeln!(out, "<blockquote{attrs}>")?;
        self.render_nodes(out, &node.children, false)?;
        out.push_str("</blockquote>\n");
      },
      NodeKind::List(list) => {
        let tag = if list.ordered { "ol" } else { "ul" };
        if list.ordered && list.start != 1 {
          writeln!(out, "<ol start=\"{}\"{attrs}>", list.start)?;
        } else {
          writeln!(out, "<{tag}{attrs}>")?;
        }
        for item in &node.children {
          self.render_item(out, item, list.tight)?;
        }
        writeln!(out, "</{tag}>")?;
      },
      NodeKind::Item => self.render_item(out, node, tight)?,
      NodeKind::CodeBlock { info, literal } => {
        self.render_code_block(out, info, literal, &attrs)?;
      },
      NodeKind::HtmlBlock(html) => out.push_str(html),
      NodeKind::ThematicBreak => writeln!(out, "<hr{attrs} />")?,
      NodeKind::Table { alignments } => self.render_table(out, node, alignments, &attrs)?,
      NodeKind::TableRow { .. } | NodeKind::TableCell => {
        self.render_nodes(out, &node.children, false)?;
      },
      NodeKind::Text(text) => out.push_str(&encode_text(text)),
      NodeKind::SoftBreak => out.push('\n'),
      NodeKind::HardBreak => out.push_str("<br />\n"),
      NodeKind::Emphasis => self.render_tag(out, "em", &attrs, &node.children)?,
      NodeKind::Strong => self.render_tag(out, "strong", &attrs, &node.children)?,
      NodeKind::Strikethrough => self.render_tag(out, "del", &attrs, &node.children)?,
      NodeKind::Code(code) => write!(out, "<code{attrs}>{}</code>", encode_text(code))?,
      NodeKind::Link { url, title } => {
        write!(out, "<a href=\"{}\"", encode_double_quoted_attribute(url))?;
        if !title.is_empty() {
          write!(out, " title=\"{}\"", encode_double_quoted_attribute(title))?;
        }
        write!(out, "{attrs}>")?;
        self.render_nodes(out, &node.children, false)?;
        out.push_str("</a>");
      },
      NodeKind::Image { url, title } => {
        write!(
          out,
          "<img src=\"{}\" alt=\"{}\"",
          encode_double_quoted_attribute(url),
          encode_double_quoted_attribute(&node.plain_text())
        )?;
        if !title.is_empty() {
          write!(out, " title=\"{}\"", encode_double_quoted_attribute(title))?;
        }
        write!(out, "{attrs} />")?;
      },
      NodeKind::RawHtml(html) => out.push_str(html),
      NodeKind::TaskCheckbox { checked } => {
        let checked = if *checked { " checked=\"\"" } else { "" };
        write!(out, "<input type=\"checkbox\" disabled=\"\"{checked} /> ")?;
      },
      NodeKind::Directive(directive) => {
        if let Some(included) = &directive.included {
          self.render_nodes(out, &included.document.children, false)?;
        }
      },
    }
    Ok(())
  }

  fn render_item(&self, out: &mut String, item: &Node, tight: bool) -> RenderResult<()> {
    write!(out, "<li{}>", attribute_string(&item.attributes))?;
    if !tight || item.children.first().is_some_and(|c| c.kind != NodeKind::Paragraph) {
      out.push('\n');
    }
    self.render_nodes(out, &item.children, tight)?;
    if tight && out.ends_with('\n') {
      out.pop();
    }
    out.push_str("</li>\n");
    Ok(())
  }

  fn render_tag(
    &self,
    out: &mut String,
    tag: &str,
    attrs: &str,
    children: &[Node],
  ) -> RenderResult<()> {
    write!(out, "<{tag}{attrs}>")?;
    self.render_nodes(out, children, false)?;
    write!(out, "</{tag}>")?;
    Ok(())
  }

  fn render_code_block(
    &self,
    out: &mut String,
    info: &str,
    literal: &str,
    attrs: &str,
  ) -> RenderResult<()> {
    let language = info.split_whitespace().next().unwrap_or_default();
    if language == MERMAID {
      writeln!(out, "<pre class=\"mermaid\"{attrs}>{}</pre>", encode_text(literal))?;
      return Ok(());
    }

    if !language.is_empty()
      && let Some(highlighting) = &self.highlighting
    {
      match highlighting.highlight(literal, language) {
        Ok(Some(html)) => {
          out.push_str(&html);
          if !html.ends_with('\n') {
            out.push('\n');
          }
          return Ok(());
        },
        Ok(None) => {},
        Err(err) => warn!("Failed to highlight {language} code block: {err}"),
      }
    }

    let class = if language.is_empty() {
      String::new()
    } else {
      format!(
        " class=\"language-{}\"",
        encode_double_quoted_attribute(language)
      )
    };
    writeln!(out, "<pre{attrs}><code{class}>{}</code></pre>", encode_text(literal))?;
    Ok(())
  }

  fn render_table(
    &self,
    out: &mut String,
    table: &Node,
    alignments: &[Alignment],
    attrs: &str,
  ) -> RenderResult<()> {
    writeln!(out, "<table{attrs}>")?;
    let mut body_open = false;
    for row in &table.children {
      let header = matches!(row.kind, NodeKind::TableRow { header: true });
      if header {
        out.push_str("<thead>\n");
      } else if !body_open {
        out.push_str("<tbody>\n");
        body_open = true;
      }

      out.push_str("<tr>\n");
      let tag = if header { "th" } else { "td" };
      for (col, cell) in row.children.iter().enumerate() {
        let align = match alignments.get(col).copied().unwrap_or_default() {
          Alignment::None => "",
          Alignment::Left => " style=\"text-align: left\"",
          Alignment::Center => " style=\"text-align: center\"",
          Alignment::Right => " style=\"text-align: right\"",
        };
        write!(out, "<{tag}{align}>")?;
        self.render_nodes(out, &cell.children, false)?;
        writeln!(out, "</{tag}>")?;
      }
      out.push_str("</tr>\n");

      if header {
        out.push_str("</thead>\n");
      }
    }
    if body_open {
      out.push_str("</tbody>\n");
    }
    out.push_str("</table>\n");
    Ok(())
  }
}

/// Attributes as ` key="value"` pairs: `id`, then `class`, then the rest
/// alphabetically.
fn attribute_string(attributes: &Attributes) -> String {
  let mut keys: Vec<&String> = attributes.keys().collect();
  keys.sort_by_key(|key| {
    let rank = match key.as_str() {
      "id" => 0,
      "class" => 1,
      _ => 2,
    };
    (rank, key.as_str())
  });

  let mut out = String::new();
  for key in keys {
    let value = &attributes[key.as_str()];
    let _ = write!(out, " {key}=\"{}\"", encode_double_quoted_attribute(value));
  }
  out
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::parser::Parser;

  fn html(source: &str) -> String {
    let doc = Parser::default().parse(source).unwrap();
    HtmlRenderer::new().render(&doc).unwrap()
  }

  #[test]
  fn headings_carry_ids_and_text_is_escaped() {
    assert_eq!(
      html("# A & B\n\n1 < 2\n"),
      "<h1 id=\"a-b\">A &amp; B</h1>\n<p>1 &lt; 2</p>\n"
    );
  }

  #[test]
  fn tight_and_loose_lists() {
    assert_eq!(
      html("- a\n- b\n"),
      "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n"
    );
    assert_eq!(
      html("1. a\n\n1. b\n"),
      "<ol>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ol>\n"
    );
  }

  #[test]
  fn task_items_render_checkboxes() {
    assert_eq!(
      html("- [x] done\n"),
      "<ul>\n<li><input type=\"checkbox\" disabled=\"\" checked=\"\" /> done</li>\n</ul>\n"
    );
  }

  #[test]
  fn mermaid_blocks_are_left_for_the_browser() {
    assert_eq!(
      html("```mermaid\ngraph TD; A-->B\n```\n"),
      "<pre class=\"mermaid\">graph TD; A--&gt;B\n</pre>\n"
    );
  }

  #[test]
  fn plain_code_blocks_get_language_class() {
    assert_eq!(
      html("```nolang\nx < y\n```\n"),
      "<pre><code class=\"language-nolang\">x &lt; y\n</code></pre>\n"
    );
  }

  #[test]
  fn table_alignment() {
    assert_eq!(
      html("| a | b |\n|---|--:|\n| 1 | 2 |\n"),
      "<table>\n<thead>\n<tr>\n<th>a</th>\n<th style=\"text-align: right\">b</th>\n</tr>\n</thead>\n\
       <tbody>\n<tr>\n<td>1</td>\n<td style=\"text-align: right\">2</td>\n</tr>\n</tbody>\n</table>\n"
    );
  }

  #[test]
  fn attributes_are_ordered() {
    let mut attributes = Attributes::new();
    attributes.insert("data-z".into(), "1".into());
    attributes.insert("class".into(), "c".into());
    attributes.insert("id".into(), "i".into());
    attributes.insert("data-a".into(), "\"q\"".into());
    assert_eq!(
      attribute_string(&attributes),
      " id=\"i\" class=\"c\" data-a=\"&quot;q&quot;\" data-z=\"1\""
    );
  }
}
