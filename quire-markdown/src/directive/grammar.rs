//! Inline directive grammar.
//!
//! A directive is written `:name{key="value" ...}` and must close the line it
//! appears on. Text that merely looks like a directive (bad name, unbalanced
//! braces, malformed attributes, more content after the closing brace) stays
//! ordinary text.

use crate::ast::{Attributes, Directive, Node, NodeKind};

/// Split directive syntax out of a run of inline nodes.
///
/// Adjacent text nodes are merged first so that directives split across
/// several text nodes by the block parser are still recognised.
#[must_use]
pub fn extract_directives(inlines: Vec<Node>, ignore: &[String]) -> Vec<Node> {
  let merged = merge_text(inlines);
  let mut out = Vec::with_capacity(merged.len());
  let mut iter = merged.into_iter().peekable();

  while let Some(node) = iter.next() {
    let NodeKind::Text(text) = &node.kind else {
      out.push(node);
      continue;
    };

    let at_line_end = iter.peek().is_none_or(|next| {
      matches!(next.kind, NodeKind::SoftBreak | NodeKind::HardBreak)
    });
    if !at_line_end {
      out.push(node);
      continue;
    }

    match find_directive(text, ignore) {
      Some((start, directive)) => {
        let before = &text[..start];
        if !before.is_empty() {
          out.push(Node::text(before));
        }
        out.push(Node::directive(directive));
      },
      None => out.push(node),
    }
  }

  out
}

fn merge_text(inlines: Vec<Node>) -> Vec<Node> {
  let mut out: Vec<Node> = Vec::with_capacity(inlines.len());
  for node in inlines {
    if let NodeKind::Text(text) = &node.kind
      && let Some(Node {
        kind: NodeKind::Text(previous),
        ..
      }) = out.last_mut()
    {
      previous.push_str(text);
      continue;
    }
    out.push(node);
  }
  out
}

/// Find a directive that ends `line`, returning its byte offset.
fn find_directive(line: &str, ignore: &[String]) -> Option<(usize, Directive)> {
  let trimmed = line.trim_end();
  if !trimmed.ends_with('}') && !trimmed.ends_with(']') {
    return None;
  }

  trimmed.match_indices(':').find_map(|(start, _)| {
    let (len, directive) = parse_directive(&trimmed[start..])?;
    if start + len != trimmed.len() || is_ignored(&directive.name, ignore) {
      return None;
    }
    Some((start, directive))
  })
}

/// Whether `name` is on the ignore list.
#[must_use]
pub fn is_ignored(name: &str, ignore: &[String]) -> bool {
  ignore.iter().any(|ignored| ignored == name)
}

/// Parse `:name{attrs}` at the start of `input`, returning the consumed
/// length.
fn parse_directive(input: &str) -> Option<(usize, Directive)> {
  let rest = input.strip_prefix(':')?;
  let name_len = rest
    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
    .unwrap_or(rest.len());
  if name_len == 0 {
    return None;
  }
  let name = &rest[..name_len];

  let body = rest[name_len..].strip_prefix('{')?;
  let close = find_closing_brace(body)?;
  let attributes = parse_attributes(&body[..close])?;

  let consumed = 1 + name_len + 1 + close + 1;
  Some((consumed, Directive::new(name, attributes)))
}

/// Index of the `}` closing an attribute list, skipping quoted values.
fn find_closing_brace(body: &str) -> Option<usize> {
  let mut quote = None;
  for (idx, c) in body.char_indices() {
    match (quote, c) {
      (None, '"' | '\'') => quote = Some(c),
      (Some(open), c) if c == open => quote = None,
      (None, '}') => return Some(idx),
      (None, '{') => return None,
      _ => {},
    }
  }
  None
}

/// Parse an attribute list: `#id`, `.class`, `key="value"`, `key='value'`,
/// `key=value` and bare `key`, separated by whitespace.
///
/// Returns `None` when the list is malformed.
#[must_use]
pub fn parse_attributes(input: &str) -> Option<Attributes> {
  let mut attributes = Attributes::new();
  let mut classes: Vec<&str> = Vec::new();
  let mut remaining = input.trim_start();

  while !remaining.is_empty() {
    if let Some(rest) = remaining.strip_prefix('#') {
      let (id, rest) = split_word(rest);
      if id.is_empty() {
        return None;
      }
      attributes.insert("id".to_owned(), id.to_owned());
      remaining = rest;
    } else if let Some(rest) = remaining.strip_prefix('.') {
      let (class, rest) = split_word(rest);
      if class.is_empty() {
        return None;
      }
      classes.push(class);
      remaining = rest;
    } else {
      let (key, value, rest) = parse_key_value(remaining)?;
      if key == "class" {
        classes.push(value);
      } else {
        attributes.insert(key.to_owned(), value.to_owned());
      }
      remaining = rest;
    }

    let trimmed = remaining.trim_start();
    if trimmed.len() == remaining.len() && !trimmed.is_empty() {
      // Attributes must be separated by whitespace.
      return None;
    }
    remaining = trimmed;
  }

  if !classes.is_empty() {
    attributes.insert("class".to_owned(), classes.join(" "));
  }
  Some(attributes)
}

fn split_word(input: &str) -> (&str, &str) {
  let end = input
    .find(|c: char| c.is_whitespace() || matches!(c, '#' | '.' | '"' | '\''))
    .unwrap_or(input.len());
  input.split_at(end)
}

fn is_key_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}

fn parse_key_value(input: &str) -> Option<(&str, &str, &str)> {
  let first = input.chars().next()?;
  if !(first.is_ascii_alphabetic() || first == '_') {
    return None;
  }
  let key_len = input.find(|c: char| !is_key_char(c)).unwrap_or(input.len());
  let (key, rest) = input.split_at(key_len);

  let Some(after_eq) = rest.strip_prefix('=') else {
    return Some((key, "", rest));
  };

  for quote in ['"', '\''] {
    if let Some(quoted) = after_eq.strip_prefix(quote) {
      let end = quoted.find(quote)?;
      return Some((key, &quoted[..end], &quoted[end + 1..]));
    }
  }

  let end = after_eq
    .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '=' | '<' | '>' | '`'))
    .unwrap_or(after_eq.len());
  if end == 0 {
    return None;
  }
  Some((key, &after_eq[..end], &after_eq[end..]))
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use pretty_assertions::assert_eq;

  use super::*;

  fn directives(nodes: &[Node]) -> Vec<&Directive> {
    nodes.iter().filter_map(Node::as_directive).collect()
  }

  #[test]
  fn parses_quoted_attributes() {
    let attributes =
      parse_attributes(r#"url="./a b.md" shiftHeadings='2' bare=x flag"#)
        .unwrap();
    assert_eq!(attributes.get("url").unwrap(), "./a b.md");
    assert_eq!(attributes.get("shiftHeadings").unwrap(), "2");
    assert_eq!(attributes.get("bare").unwrap(), "x");
    assert_eq!(attributes.get("flag").unwrap(), "");
  }

  #[test]
  fn collects_id_and_classes() {
    let attributes = parse_attributes("#intro .wide .dark").unwrap();
    assert_eq!(attributes.get("id").unwrap(), "intro");
    assert_eq!(attributes.get("class").unwrap(), "wide dark");
  }

  #[test]
  fn rejects_malformed_attributes() {
    assert!(parse_attributes(r#"url="unterminated"#).is_none());
    assert!(parse_attributes(r#"a="1"b="2""#).is_none());
    assert!(parse_attributes("=oops").is_none());
  }

  #[test]
  fn directive_must_end_the_line() {
    let nodes = extract_directives(
      vec![Node::text(r#"See :include{url="a.md"}"#)],
      &[],
    );
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].kind, NodeKind::Text("See ".into()));
    assert_eq!(directives(&nodes)[0].name, "include");

    let nodes = extract_directives(
      vec![Node::text(r#":include{url="a.md"} and more"#)],
      &[],
    );
    assert!(directives(&nodes).is_empty());
  }

  #[test]
  fn merges_split_text_before_scanning() {
    let nodes = extract_directives(
      vec![
        Node::text(":toc{minLevel="),
        Node::text("\"2\"}"),
        Node::new(NodeKind::SoftBreak),
        Node::text("next line"),
      ],
      &[],
    );
    let found = directives(&nodes);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].attribute("minLevel"), Some("2"));
    assert_eq!(nodes.len(), 3);
  }

  #[test]
  fn content_after_on_the_same_line_rejects() {
    let nodes = extract_directives(
      vec![
        Node::text(":toc{}"),
        Node::with_children(NodeKind::Emphasis, vec![Node::text("x")]),
      ],
      &[],
    );
    assert!(directives(&nodes).is_empty());
  }

  #[test]
  fn ignored_names_stay_text() {
    let ignore = vec!["toc".to_owned()];
    let nodes = extract_directives(vec![Node::text(":toc{}")], &ignore);
    assert_eq!(nodes, vec![Node::text(":toc{}")]);

    let nodes = extract_directives(vec![Node::text(":attrs{.x}")], &ignore);
    assert_eq!(directives(&nodes).len(), 1);
  }

  #[test]
  fn plain_colons_are_not_directives() {
    for text in ["time: 10:30", "a :: b}", ":{x}", "https://x.org/{y}"] {
      let nodes = extract_directives(vec![Node::text(text)], &[]);
      assert!(directives(&nodes).is_empty(), "{text}");
    }
  }
}
