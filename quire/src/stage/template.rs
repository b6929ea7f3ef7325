//! Variable interpolation into Markdown with tera.

use serde_json::{Map, Value};
use tera::{Context, Tera};

use crate::{
  error::StageResult,
  pipeline::{Next, Payload, Stage, StageContext},
};

/// Build the context shared by templates and layouts: `Vars` and `Meta`.
pub(crate) fn template_context(vars: &Map<String, Value>, meta: Map<String, Value>) -> Context {
  let mut context = Context::new();
  context.insert("Vars", vars);
  context.insert("Meta", &meta);
  context
}

/// Renders the payload as a tera template with `Vars` (configured
/// variables) and `Meta` (front matter) in scope.
#[derive(Debug, Clone, Default)]
pub struct TemplateStage {
  vars: Map<String, Value>,
}

impl TemplateStage {
  #[must_use]
  pub const fn new(vars: Map<String, Value>) -> Self {
    Self { vars }
  }
}

impl Stage for TemplateStage {
  fn name(&self) -> &'static str {
    "template"
  }

  fn run(
    &self,
    payload: &mut Payload,
    _ctx: &StageContext,
    next: Next<'_>,
  ) -> StageResult<()> {
    let context = template_context(&self.vars, payload.meta());
    let rendered = Tera::one_off(payload.text()?, &context, false)?;
    payload.set_data(rendered);
    next.run(payload)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use pretty_assertions::assert_eq;
  use quire_resolver::{Locator, Registry, ResolveContext};
  use serde_json::json;

  use super::*;
  use crate::{
    error::StageError,
    pipeline::{ATTR_META, Pipeline},
  };

  fn run(stage: TemplateStage, source: &str, meta: Value) -> StageResult<String> {
    let mut payload = Payload::new(Locator::from("doc.md"), source.as_bytes().to_vec());
    payload.set_attribute(ATTR_META, meta);
    let ctx = StageContext::new(Registry::new(), ResolveContext::new());
    Pipeline::new().with(stage).run(&mut payload, &ctx)?;
    Ok(payload.text()?.to_owned())
  }

  #[test]
  fn vars_and_meta_are_interpolated() {
    let vars = json!({ "version": "1.2" }).as_object().cloned().unwrap();
    let out = run(
      TemplateStage::new(vars),
      "# {{ Meta.title }}\n\nVersion {{ Vars.version }} & more\n",
      json!({ "title": "Guide" }),
    )
    .unwrap();
    assert_eq!(out, "# Guide\n\nVersion 1.2 & more\n");
  }

  #[test]
  fn syntax_errors_abort() {
    let err = run(TemplateStage::default(), "{{ oops", json!({})).unwrap_err();
    assert!(matches!(err, StageError::Template(_)));
  }
}
