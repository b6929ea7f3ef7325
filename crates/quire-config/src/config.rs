use std::{
  collections::BTreeMap,
  fmt,
  fs,
  path::{Path, PathBuf},
  str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Configuration for the quire document compiler.
///
/// Every section has working defaults, so an empty file (or no file at all)
/// is a valid configuration. Fields are loaded from TOML or JSON files and
/// can be adjusted with `KEY=VALUE` overrides such as `pdf.scale=0.9`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// HTML layout and template variables.
  pub html: HtmlConfig,

  /// PDF page setup and browser invocation.
  pub pdf: PdfConfig,

  /// Canonical Markdown output.
  pub markdown: MarkdownConfig,

  /// Link rewriting in HTML output.
  pub links: LinksConfig,

  /// Remote resource fetching.
  pub http: HttpConfig,

  /// Syntax highlighting of fenced code in HTML output.
  pub highlight: HighlightConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HtmlConfig {
  /// Layout locator; the built-in layout when unset.
  pub layout: Option<String>,

  /// Variables exposed to templates and layouts as `Vars`.
  pub vars: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PdfConfig {
  /// Page margins in centimetres.
  pub margin_top:    f64,
  pub margin_bottom: f64,
  pub margin_left:   f64,
  pub margin_right:  f64,

  /// Rendering scale of the page contents.
  pub scale: f64,

  /// How long the browser may take to print, in seconds.
  pub timeout_secs: u64,

  /// Print background graphics.
  pub background: bool,

  /// Browser executable. Searched on `PATH` when unset.
  pub browser: Option<PathBuf>,
}

impl Default for PdfConfig {
  fn default() -> Self {
    Self {
      margin_top:    1.0,
      margin_bottom: 1.0,
      margin_left:   1.0,
      margin_right:  1.0,
      scale:         1.0,
      timeout_secs:  60,
      background:    false,
      browser:       None,
    }
  }
}

/// Indentation of list item continuation lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListIndentStyle {
  /// Align with the text after the list marker.
  #[default]
  Aligned,

  /// Always indent by four columns.
  Uniform,
}

impl FromStr for ListIndentStyle {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "aligned" => Ok(Self::Aligned),
      "uniform" => Ok(Self::Uniform),
      other => {
        Err(format!(
          "unknown list indent style '{other}', expected 'aligned' or \
           'uniform'"
        ))
      },
    }
  }
}

impl fmt::Display for ListIndentStyle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Aligned => "aligned",
      Self::Uniform => "uniform",
    })
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
  /// Write level 1 and 2 headings in Setext style.
  pub underline_headings: bool,

  /// Keep soft line breaks as newlines instead of spaces.
  pub soft_wraps: bool,

  pub list_indent: ListIndentStyle,

  /// Pretty-print fenced code in languages that have a formatter.
  pub format_code: bool,

  /// Directive names left as plain text.
  pub ignore_directives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinksConfig {
  /// Link destination prefixes and their replacements. The longest
  /// matching prefix wins.
  pub replacements: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
  /// Basic auth user name. Takes precedence over the environment.
  pub username: Option<String>,

  /// Basic auth password. Takes precedence over the environment.
  pub password: Option<String>,

  /// Per-request timeout in seconds.
  pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightConfig {
  pub enable: bool,

  /// Theme name; the highlighter's default when unset.
  pub theme: Option<String>,
}

impl Default for HighlightConfig {
  fn default() -> Self {
    Self {
      enable: true,
      theme:  None,
    }
  }
}

impl Config {
  /// Load configuration from a file (TOML or JSON).
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed, or if the format is
  /// unsupported.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let value = read_value(path)?;
    Self::from_value(value).map_err(|e| {
      ConfigError::Config(format!("Invalid config in {}: {e}", path.display()))
    })
  }

  /// Load and merge configuration files in order, then apply `KEY=VALUE`
  /// overrides.
  ///
  /// Later files win. Tables are merged key by key and lists are appended,
  /// so a later file only changes what it names.
  ///
  /// # Errors
  ///
  /// Returns an error if a file cannot be read or parsed, or if an override
  /// is malformed.
  pub fn load(
    config_files: &[PathBuf],
    config_overrides: &[String],
  ) -> Result<Self, ConfigError> {
    let mut merged = Value::Object(Map::new());
    for path in config_files {
      let value = read_value(path).map_err(|e| {
        ConfigError::Config(format!(
          "Failed to load config from {}: {e}",
          path.display()
        ))
      })?;
      merge_values(&mut merged, value);
    }

    if config_files.len() > 1 {
      log::info!("Loaded and merged {} config files", config_files.len());
    }

    let mut config = Self::from_value(merged)?;

    // Apply config overrides from --set KEY=VALUE flags
    if !config_overrides.is_empty() {
      config.apply_overrides(config_overrides)?;
    }

    Ok(config)
  }

  /// Apply configuration overrides from KEY=VALUE strings.
  ///
  /// Keys are dotted section paths such as `pdf.margin_top`. Map entries are
  /// addressed below their table: `html.vars.title=Report` or
  /// `links.replacements./docs=https://example.org/docs`. An empty value
  /// unsets optional fields.
  ///
  /// # Errors
  ///
  /// Returns an error if:
  ///
  /// - An override string is not in KEY=VALUE format
  /// - A key is not recognized
  /// - A value cannot be parsed as the expected type
  pub fn apply_overrides(
    &mut self,
    overrides: &[String],
  ) -> Result<(), ConfigError> {
    for override_str in overrides {
      let (key, value) = override_str.split_once('=').ok_or_else(|| {
        ConfigError::Config(format!(
          "Invalid config override format: '{override_str}'. Expected \
           KEY=VALUE"
        ))
      })?;

      self.apply_override(key.trim(), value.trim())?;
    }

    Ok(())
  }

  fn apply_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
      "html.layout" => self.html.layout = optional(value),
      "pdf.margin_top" => self.pdf.margin_top = parse(key, value)?,
      "pdf.margin_bottom" => self.pdf.margin_bottom = parse(key, value)?,
      "pdf.margin_left" => self.pdf.margin_left = parse(key, value)?,
      "pdf.margin_right" => self.pdf.margin_right = parse(key, value)?,
      "pdf.scale" => self.pdf.scale = parse(key, value)?,
      "pdf.timeout_secs" => self.pdf.timeout_secs = parse(key, value)?,
      "pdf.background" => self.pdf.background = parse_bool(key, value)?,
      "pdf.browser" => self.pdf.browser = optional(value).map(PathBuf::from),
      "markdown.underline_headings" => {
        self.markdown.underline_headings = parse_bool(key, value)?;
      },
      "markdown.soft_wraps" => self.markdown.soft_wraps = parse_bool(key, value)?,
      "markdown.list_indent" => {
        self.markdown.list_indent = value.parse().map_err(|e: String| {
          ConfigError::Config(format!("Invalid value for '{key}': '{value}' - {e}"))
        })?;
      },
      "markdown.format_code" => self.markdown.format_code = parse_bool(key, value)?,
      "markdown.ignore_directives" => {
        self.markdown.ignore_directives = value
          .split(',')
          .map(str::trim)
          .filter(|name| !name.is_empty())
          .map(ToOwned::to_owned)
          .collect();
      },
      "http.username" => self.http.username = optional(value),
      "http.password" => self.http.password = optional(value),
      "http.timeout_secs" => {
        self.http.timeout_secs = match optional(value) {
          Some(value) => Some(parse(key, &value)?),
          None => None,
        };
      },
      "highlight.enable" => self.highlight.enable = parse_bool(key, value)?,
      "highlight.theme" => self.highlight.theme = optional(value),
      _ => {
        if let Some(name) = key.strip_prefix("html.vars.") {
          self
            .html
            .vars
            .insert(name.to_owned(), Value::String(value.to_owned()));
        } else if let Some(prefix) = key.strip_prefix("links.replacements.") {
          self
            .links
            .replacements
            .insert(prefix.to_owned(), value.to_owned());
        } else {
          return Err(ConfigError::Config(format!(
            "Unknown configuration key: '{key}'"
          )));
        }
      },
    }
    Ok(())
  }

  fn from_value(value: Value) -> Result<Self, ConfigError> {
    Ok(serde_json::from_value(value)?)
  }
}

/// Read a config file into a generic value tree.
#[allow(
  clippy::option_if_let_else,
  reason = "Clearer with explicit match on extension"
)]
fn read_value(path: &Path) -> Result<Value, ConfigError> {
  let content = fs::read_to_string(path).map_err(|e| {
    ConfigError::Config(format!(
      "Failed to read config file: {}: {}",
      path.display(),
      e
    ))
  })?;

  match path.extension().and_then(|ext| ext.to_str()) {
    Some(ext) => {
      match ext.to_lowercase().as_str() {
        "json" => {
          serde_json::from_str(&content).map_err(|e| {
            ConfigError::Config(format!(
              "Failed to parse JSON config from {}: {}",
              path.display(),
              e
            ))
          })
        },
        "toml" => {
          toml::from_str(&content).map_err(|e| {
            ConfigError::Config(format!(
              "Failed to parse TOML config from {}: {}",
              path.display(),
              e
            ))
          })
        },
        _ => {
          Err(ConfigError::Config(format!(
            "Unsupported config file format: {}",
            path.display()
          )))
        },
      }
    },
    None => {
      Err(ConfigError::Config(format!(
        "Config file has no extension: {}",
        path.display()
      )))
    },
  }
}

/// Merge `other` into `base`: objects key by key, arrays appended, anything
/// else replaced.
fn merge_values(base: &mut Value, other: Value) {
  match (base, other) {
    (Value::Object(base), Value::Object(other)) => {
      for (key, value) in other {
        match base.get_mut(&key) {
          Some(existing) => merge_values(existing, value),
          None => {
            base.insert(key, value);
          },
        }
      }
    },
    (Value::Array(base), Value::Array(other)) => base.extend(other),
    (slot, other) => *slot = other,
  }
}

fn optional(value: &str) -> Option<String> {
  (!value.is_empty()).then(|| value.to_owned())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
  value.parse().map_err(|_| {
    ConfigError::Config(format!("Invalid value for '{key}': '{value}'"))
  })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
  match value.to_lowercase().as_str() {
    "true" | "yes" | "1" => Ok(true),
    "false" | "no" | "0" => Ok(false),
    _ => {
      Err(ConfigError::Config(format!(
        "Invalid boolean value for '{key}': '{value}'. Expected true/false, \
         yes/no, or 1/0"
      )))
    },
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::float_cmp, clippy::unwrap_used, reason = "Fine in tests")]
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  #[test]
  fn defaults() {
    let config = Config::default();
    assert_eq!(config.pdf.margin_top, 1.0);
    assert_eq!(config.pdf.scale, 1.0);
    assert_eq!(config.pdf.timeout_secs, 60);
    assert!(!config.pdf.background);
    assert!(config.highlight.enable);
    assert_eq!(config.markdown.list_indent, ListIndentStyle::Aligned);
  }

  #[test]
  fn merging_extends_tables_and_lists() {
    let mut base = json!({
      "html": { "vars": { "title": "A", "author": "me" } },
      "markdown": { "ignore_directives": ["toc"] },
    });
    merge_values(
      &mut base,
      json!({
        "html": { "vars": { "title": "B" } },
        "markdown": { "ignore_directives": ["attrs"] },
      }),
    );
    assert_eq!(
      base,
      json!({
        "html": { "vars": { "title": "B", "author": "me" } },
        "markdown": { "ignore_directives": ["toc", "attrs"] },
      })
    );
  }

  #[test]
  fn apply_overrides_typed_fields() {
    let mut config = Config::default();
    config
      .apply_overrides(&[
        "pdf.scale=0.8".to_owned(),
        "pdf.background=yes".to_owned(),
        "pdf.timeout_secs = 5".to_owned(),
        "markdown.list_indent=uniform".to_owned(),
        "markdown.ignore_directives=toc, attrs".to_owned(),
        "http.timeout_secs=10".to_owned(),
      ])
      .unwrap();

    assert_eq!(config.pdf.scale, 0.8);
    assert!(config.pdf.background);
    assert_eq!(config.pdf.timeout_secs, 5);
    assert_eq!(config.markdown.list_indent, ListIndentStyle::Uniform);
    assert_eq!(config.markdown.ignore_directives, vec!["toc", "attrs"]);
    assert_eq!(config.http.timeout_secs, Some(10));
  }

  #[test]
  fn apply_overrides_map_entries() {
    let mut config = Config::default();
    config
      .apply_overrides(&[
        "html.vars.title=Quarterly report".to_owned(),
        "links.replacements./docs=https://example.org/docs".to_owned(),
      ])
      .unwrap();

    assert_eq!(config.html.vars["title"], json!("Quarterly report"));
    assert_eq!(
      config.links.replacements["/docs"],
      "https://example.org/docs"
    );
  }

  #[test]
  fn empty_value_unsets_optional_fields() {
    let mut config = Config::default();
    config.html.layout = Some("layout.html".to_owned());
    config.apply_overrides(&["html.layout=".to_owned()]).unwrap();
    assert_eq!(config.html.layout, None);
  }

  #[test]
  fn invalid_overrides_are_rejected() {
    let mut config = Config::default();
    for bad in ["no-equals", "nope.key=1", "pdf.scale=big", "pdf.background=maybe"] {
      let err = config.apply_overrides(&[bad.to_owned()]).unwrap_err();
      assert!(matches!(err, ConfigError::Config(_)), "{bad}: {err}");
    }
  }

  #[test]
  fn list_indent_parses_case_insensitively() {
    assert_eq!("Uniform".parse(), Ok(ListIndentStyle::Uniform));
    assert!("ragged".parse::<ListIndentStyle>().is_err());
  }
}
