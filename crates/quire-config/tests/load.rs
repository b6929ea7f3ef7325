#![allow(
  clippy::expect_used,
  clippy::float_cmp,
  clippy::unwrap_used,
  reason = "Fine in tests"
)]
use std::fs;

use pretty_assertions::assert_eq;
use quire_config::{Config, ConfigError, ListIndentStyle};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn later_files_only_change_what_they_name() {
  let dir = TempDir::new().expect("tempdir");
  let base = dir.path().join("base.toml");
  let site = dir.path().join("site.json");
  fs::write(
    &base,
    r#"
[pdf]
scale      = 0.9
background = true

[html.vars]
title  = "Handbook"
author = "Docs team"

[markdown]
list_indent       = "uniform"
ignore_directives = ["attrs"]
"#,
  )
  .unwrap();
  fs::write(
    &site,
    r#"{
  "html": { "layout": "layouts/site.html", "vars": { "title": "Site handbook" } },
  "pdf": { "margin_top": 2.5 },
  "links": { "replacements": { "/assets": "https://cdn.example.org/assets" } }
}"#,
  )
  .unwrap();

  let config = Config::load(&[base, site], &["pdf.scale=1.1".to_owned()]).unwrap();

  assert_eq!(config.pdf.scale, 1.1);
  assert!(config.pdf.background);
  assert_eq!(config.pdf.margin_top, 2.5);
  assert_eq!(config.pdf.margin_bottom, 1.0);
  assert_eq!(config.html.layout.as_deref(), Some("layouts/site.html"));
  assert_eq!(config.html.vars["title"], json!("Site handbook"));
  assert_eq!(config.html.vars["author"], json!("Docs team"));
  assert_eq!(config.markdown.list_indent, ListIndentStyle::Uniform);
  assert_eq!(config.markdown.ignore_directives, vec!["attrs"]);
  assert_eq!(
    config.links.replacements["/assets"],
    "https://cdn.example.org/assets"
  );
}

#[test]
fn no_files_yields_defaults() {
  assert_eq!(Config::load(&[], &[]).unwrap(), Config::default());
}

#[test]
fn unknown_keys_are_rejected() {
  let dir = TempDir::new().expect("tempdir");
  let path = dir.path().join("quire.toml");
  fs::write(&path, "[pdf]\nmargins = 3\n").unwrap();

  let err = Config::from_file(&path).unwrap_err();
  assert!(err.to_string().contains("margins"), "{err}");
}

#[test]
fn unsupported_extension() {
  let dir = TempDir::new().expect("tempdir");
  let path = dir.path().join("quire.yaml");
  fs::write(&path, "pdf: {}\n").unwrap();

  let err = Config::load(&[path], &[]).unwrap_err();
  assert!(matches!(err, ConfigError::Config(_)));
  assert!(err.to_string().contains("Unsupported config file format"));
}
