//! Reformatting of fenced code in canonical Markdown output.

use log::debug;

/// Rewrites the body of fenced code blocks of the languages it claims.
pub trait CodeFormatter: Send + Sync {
  /// Language names and aliases, matched against the first word of the
  /// fence info string.
  fn languages(&self) -> &[&'static str];

  /// The formatted code, or `None` to keep the original.
  fn format(&self, code: &str) -> Option<String>;
}

/// Pretty-prints JSON with two-space indentation. Invalid JSON is kept
/// as written.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl CodeFormatter for JsonFormatter {
  fn languages(&self) -> &[&'static str] {
    &["json", "jsonc", "json5"]
  }

  fn format(&self, code: &str) -> Option<String> {
    let value: serde_json::Value = match serde_json::from_str(code) {
      Ok(value) => value,
      Err(err) => {
        debug!("Leaving JSON block unformatted: {err}");
        return None;
      },
    };
    serde_json::to_string_pretty(&value).ok()
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn pretty_prints_keeping_key_order() {
    assert_eq!(
      JsonFormatter.format(r#"{"b":1,"a":[true,null]}"#).as_deref(),
      Some("{\n  \"b\": 1,\n  \"a\": [\n    true,\n    null\n  ]\n}")
    );
  }

  #[test]
  fn invalid_json_is_left_alone() {
    assert_eq!(JsonFormatter.format("{ nope"), None);
  }
}
