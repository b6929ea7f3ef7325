//! HTML layouts: tera templates wrapping a rendered body.

use std::{collections::HashMap, str};

use log::debug;
use quire_markdown::{Meta, TransformError, embed};
use quire_resolver::{Locator, Registry, ResolveContext, Resolver};
use serde_json::{Map, Value};
use tera::Tera;

use super::{base_dir, template::template_context};
use crate::{
  error::{StageError, StageResult},
  pipeline::StageContext,
};

/// Name the layout is registered under. The `.html` suffix turns on tera's
/// autoescaping.
const LAYOUT_NAME: &str = "layout.html";

/// A layout template and the variables it is rendered with.
///
/// The template sees `Vars`, `Meta` and `Body` (the rendered document,
/// to be emitted with `| safe`). It can call `resolve(url=..., mime=...)`
/// to inline a resource, found relative to the layout, as a `data:` URL.
#[derive(Debug, Clone)]
pub struct Layout {
  locator: Locator,
  vars:    Map<String, Value>,
}

impl Default for Layout {
  fn default() -> Self {
    Self::new(quire_templates::default_layout(), Map::new())
  }
}

impl Layout {
  #[must_use]
  pub const fn new(locator: Locator, vars: Map<String, Value>) -> Self {
    Self { locator, vars }
  }

  #[must_use]
  pub const fn locator(&self) -> &Locator {
    &self.locator
  }

  /// Fetch the layout and render it around `body`.
  ///
  /// Built-in layouts are served from the `quire://` scheme in addition to
  /// whatever `ctx` can resolve.
  ///
  /// # Errors
  ///
  /// Returns an error if the layout cannot be fetched, is not valid UTF-8,
  /// or fails to render.
  pub fn render(
    &self,
    body: &str,
    meta: Meta,
    ctx: &StageContext,
  ) -> StageResult<String> {
    let resolver = ctx.resolver.with_embedded(quire_templates::resolver());
    let bytes = resolver.fetch(&self.locator, &ctx.resolve_ctx)?;
    let template = str::from_utf8(&bytes).map_err(|source| {
      TransformError::InvalidUtf8 {
        locator: self.locator.clone(),
        source,
      }
    })?;

    let layout_error = |source| {
      StageError::Layout {
        locator: self.locator.clone(),
        source,
      }
    };

    let mut tera = Tera::default();
    tera
      .add_raw_template(LAYOUT_NAME, template)
      .map_err(layout_error)?;

    let workdir = base_dir(&self.locator, &ctx.resolve_ctx);
    debug!("Rendering layout {} with working directory {workdir}", self.locator);
    tera.register_function(
      "resolve",
      resolve_function(resolver, ctx.resolve_ctx.clone().with_workdir(workdir)),
    );

    let mut context = template_context(&self.vars, meta);
    context.insert("Body", body);
    tera.render(LAYOUT_NAME, &context).map_err(layout_error)
  }
}

/// The `resolve(url, mime)` template function.
fn resolve_function(
  resolver: Registry,
  ctx: ResolveContext,
) -> impl tera::Function {
  move |args: &HashMap<String, tera::Value>| -> tera::Result<tera::Value> {
    let url = args
      .get("url")
      .and_then(tera::Value::as_str)
      .ok_or_else(|| tera::Error::msg("resolve() requires a `url` argument"))?;
    let mime = args.get("mime").and_then(tera::Value::as_str);

    embed::data_url(&Locator::from(url), mime, &resolver, &ctx)
      .map(tera::Value::String)
      .map_err(|err| tera::Error::chain(format!("Could not resolve '{url}'"), err))
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use std::fs;

  use pretty_assertions::assert_eq;
  use quire_resolver::HttpResolver;
  use serde_json::json;
  use tempfile::TempDir;

  use super::*;

  fn ctx() -> StageContext {
    StageContext::new(
      Registry::with_defaults(HttpResolver::new()),
      ResolveContext::new(),
    )
  }

  #[test]
  fn default_layout_wraps_body() {
    let meta = json!({ "title": "Notes" }).as_object().cloned().unwrap();
    let html = Layout::default()
      .render("<p>Hi &amp; bye</p>", meta, &ctx())
      .unwrap();

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Notes</title>"));
    assert!(html.contains("<p>Hi &amp; bye</p>"));
    assert!(html.contains("href=\"data:text/css;base64,"));
    assert!(!html.contains("mermaid"));
  }

  #[test]
  fn custom_layout_resolves_next_to_itself() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("theme")).unwrap();
    fs::write(dir.path().join("theme/logo.svg"), "<svg/>").unwrap();
    let layout = dir.path().join("theme/page.html");
    fs::write(
      &layout,
      "{{ Vars.site }}|{{ Meta.title }}|{{ resolve(url=\"logo.svg\") | safe }}|{{ Body | safe }}",
    )
    .unwrap();

    let vars = json!({ "site": "Docs" }).as_object().cloned().unwrap();
    let meta = json!({ "title": "A < B" }).as_object().cloned().unwrap();
    let html = Layout::new(Locator::from(layout.as_path()), vars)
      .render("<b>x</b>", meta, &ctx())
      .unwrap();

    assert_eq!(
      html,
      "Docs|A &lt; B|data:image/svg+xml;base64,PHN2Zy8+|<b>x</b>"
    );
  }

  #[test]
  fn template_errors_name_the_layout() {
    let dir = TempDir::new().unwrap();
    let layout = dir.path().join("broken.html");
    fs::write(&layout, "{% if %}").unwrap();

    let err = Layout::new(Locator::from(layout.as_path()), Map::new())
      .render("", Meta::new(), &ctx())
      .unwrap_err();
    assert!(matches!(err, StageError::Layout { .. }));
  }
}
