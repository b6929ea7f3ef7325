//! Syntect backend, extended with the two-face syntaxes and themes.

use std::sync::OnceLock;

use syntect::{
  highlighting::{Theme, ThemeSet},
  html::highlighted_html_for_string,
  parsing::SyntaxSet,
};
use two_face::theme::{EmbeddedLazyThemeSet, EmbeddedThemeName};

use super::{Highlighter, SyntaxError, SyntaxResult};

const DEFAULT_THEME: &str = "InspiredGitHub";

const EMBEDDED_THEMES: &[(&str, EmbeddedThemeName)] = &[
  ("Dracula", EmbeddedThemeName::Dracula),
  ("Github", EmbeddedThemeName::Github),
  ("GruvboxDark", EmbeddedThemeName::GruvboxDark),
  ("GruvboxLight", EmbeddedThemeName::GruvboxLight),
  ("MonokaiExtended", EmbeddedThemeName::MonokaiExtended),
  ("Nord", EmbeddedThemeName::Nord),
  ("OneHalfDark", EmbeddedThemeName::OneHalfDark),
  ("OneHalfLight", EmbeddedThemeName::OneHalfLight),
  ("SolarizedDark", EmbeddedThemeName::SolarizedDark),
  ("SolarizedLight", EmbeddedThemeName::SolarizedLight),
  ("TwoDark", EmbeddedThemeName::TwoDark),
  ("VisualStudioDarkPlus", EmbeddedThemeName::VisualStudioDarkPlus),
  ("Zenburn", EmbeddedThemeName::Zenburn),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct SyntectHighlighter;

impl SyntectHighlighter {
  fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(two_face::syntax::extra_newlines)
  }

  fn embedded_themes() -> &'static EmbeddedLazyThemeSet {
    static THEME_SET: OnceLock<EmbeddedLazyThemeSet> = OnceLock::new();
    THEME_SET.get_or_init(two_face::theme::extra)
  }

  fn default_themes() -> &'static ThemeSet {
    static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();
    THEME_SET.get_or_init(ThemeSet::load_defaults)
  }

  /// Look up a theme by name in syntect's defaults, then in two-face.
  /// Unknown names fall back to [`DEFAULT_THEME`].
  fn theme(name: Option<&str>) -> &'static Theme {
    let name = name.unwrap_or(DEFAULT_THEME);
    if let Some(theme) = Self::default_themes().themes.get(name) {
      return theme;
    }
    if let Some((_, embedded)) = EMBEDDED_THEMES
      .iter()
      .find(|(known, _)| known.eq_ignore_ascii_case(name))
    {
      return Self::embedded_themes().get(*embedded);
    }

    log::warn!("Unknown highlighting theme '{name}', using {DEFAULT_THEME}");
    Self::default_themes()
      .themes
      .get(DEFAULT_THEME)
      .unwrap_or_else(|| Self::embedded_themes().get(EmbeddedThemeName::InspiredGithub))
  }
}

impl Highlighter for SyntectHighlighter {
  fn name(&self) -> &'static str {
    "syntect"
  }

  fn supports_language(&self, language: &str) -> bool {
    Self::syntax_set().find_syntax_by_token(language).is_some()
  }

  fn highlight(
    &self,
    code: &str,
    language: &str,
    theme: Option<&str>,
  ) -> SyntaxResult<String> {
    let syntax_set = Self::syntax_set();
    let syntax = syntax_set
      .find_syntax_by_token(language)
      .ok_or_else(|| SyntaxError::UnsupportedLanguage(language.to_owned()))?;

    highlighted_html_for_string(code, syntax_set, syntax, Self::theme(theme))
      .map_err(|e| SyntaxError::HighlightingFailed(e.to_string()))
  }
}
