//! Indentation-aware text sink for the Markdown renderer.

use std::fmt;

/// A string writer that repeats a stack of line prefixes after every
/// newline.
///
/// Prefixes are pushed for block quotes (`> `) and list item bodies. Blank
/// lines receive the prefixes with trailing whitespace removed.
///
/// Renderers that should only emit an opening token when some content
/// follows register it with [`LineIndentWriter::push_prefix`]; the token is
/// written just before the next non-empty write.
#[derive(Debug)]
pub struct LineIndentWriter {
  out:           String,
  indents:       Vec<String>,
  pending:       Vec<(String, bool)>,
  after_newline: bool,
  block_start:   bool,
}

impl Default for LineIndentWriter {
  fn default() -> Self {
    Self::new()
  }
}

impl LineIndentWriter {
  #[must_use]
  pub const fn new() -> Self {
    Self {
      out:           String::new(),
      indents:       Vec::new(),
      pending:       Vec::new(),
      after_newline: true,
      block_start:   false,
    }
  }

  pub fn push_indent(&mut self, indent: impl Into<String>) {
    self.indents.push(indent.into());
  }

  pub fn pop_indent(&mut self) {
    self.indents.pop();
  }

  /// Register `prefix` to be written before the next content.
  pub fn push_prefix(&mut self, prefix: impl Into<String>) {
    self.pending.push((prefix.into(), false));
  }

  /// Drop the innermost prefix, returning whether it was written.
  pub fn pop_prefix(&mut self) -> bool {
    self.pending.pop().is_some_and(|(_, written)| written)
  }

  /// Treat the current position as the start of a block, as after a list
  /// marker.
  pub const fn mark_block_start(&mut self) {
    self.block_start = true;
  }

  /// Whether the next write begins a line of block content.
  #[must_use]
  pub fn at_line_start(&self) -> bool {
    (self.after_newline || self.block_start)
      && self.pending.iter().all(|(_, written)| *written)
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.out.is_empty()
  }

  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.out
  }

  #[must_use]
  pub fn into_string(self) -> String {
    self.out
  }

  fn flush_pending(&mut self) {
    if self.pending.iter().all(|(_, written)| *written) {
      return;
    }
    let unwritten: Vec<String> = self
      .pending
      .iter_mut()
      .filter(|(_, written)| !*written)
      .map(|(prefix, written)| {
        *written = true;
        prefix.clone()
      })
      .collect();
    for prefix in unwritten {
      self.write_raw(&prefix);
    }
  }

  fn write_raw(&mut self, s: &str) {
    for c in s.chars() {
      if c == '\r' {
        continue;
      }
      if self.after_newline {
        let indent: String = self.indents.concat();
        let trimmed = indent.trim_end();
        self.out.push_str(trimmed);
        if c != '\n' {
          self.out.push_str(&indent[trimmed.len()..]);
        }
      }
      self.out.push(c);
      self.after_newline = c == '\n';
      self.block_start = false;
    }
  }
}

impl fmt::Write for LineIndentWriter {
  fn write_str(&mut self, s: &str) -> fmt::Result {
    if s.is_empty() {
      return Ok(());
    }
    self.flush_pending();
    self.write_raw(s);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use std::fmt::Write as _;

  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn indents_follow_newlines() {
    let mut w = LineIndentWriter::new();
    w.write_str("- ").unwrap();
    w.push_indent("  ");
    w.write_str("a\n\nb").unwrap();
    w.pop_indent();
    w.write_str("\nc").unwrap();
    assert_eq!(w.as_str(), "- a\n\n  b\nc");
  }

  #[test]
  fn blank_quote_lines_are_trimmed() {
    let mut w = LineIndentWriter::new();
    w.push_indent("> ");
    w.write_str("a\n\nb\r\n").unwrap();
    assert_eq!(w.as_str(), "> a\n>\n> b\n");
  }

  #[test]
  fn prefixes_are_written_only_before_content() {
    let mut w = LineIndentWriter::new();
    w.push_prefix("*");
    w.write_str("").unwrap();
    assert!(!w.pop_prefix());
    assert_eq!(w.as_str(), "");

    w.push_prefix("**");
    w.write_str("x").unwrap();
    assert!(w.pop_prefix());
    assert_eq!(w.as_str(), "**x");
  }

  #[test]
  fn line_start_tracking() {
    let mut w = LineIndentWriter::new();
    assert!(w.at_line_start());
    w.write_str("1. ").unwrap();
    assert!(!w.at_line_start());
    w.mark_block_start();
    assert!(w.at_line_start());
    w.push_prefix("*");
    assert!(!w.at_line_start());
  }
}
