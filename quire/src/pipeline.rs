//! Stage composition.
//!
//! A [`Pipeline`] threads one [`Payload`] through a list of [`Stage`]s. Each
//! stage receives a [`Next`] continuation: it does its work, updates the
//! payload, and hands over by calling [`Next::run`]. A stage that returns
//! without calling it ends the run early.

use std::str;

use log::trace;
use quire_markdown::{Meta, TransformError};
use quire_resolver::{Locator, Registry, ResolveContext};
use serde_json::{Map, Value};

use crate::error::StageResult;

/// Payload attribute holding the document's front matter.
pub const ATTR_META: &str = "meta";

/// The document travelling through a pipeline.
#[derive(Debug, Clone)]
pub struct Payload {
  source:     Locator,
  data:       Vec<u8>,
  attributes: Map<String, Value>,
}

impl Payload {
  /// A payload for the document at `source`. Relative includes and images
  /// resolve against the directory of `source`.
  #[must_use]
  pub fn new(source: Locator, data: Vec<u8>) -> Self {
    Self {
      source,
      data,
      attributes: Map::new(),
    }
  }

  #[must_use]
  pub const fn source(&self) -> &Locator {
    &self.source
  }

  #[must_use]
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
    self.data = data.into();
  }

  #[must_use]
  pub fn into_data(self) -> Vec<u8> {
    self.data
  }

  /// The data as UTF-8 text.
  ///
  /// # Errors
  ///
  /// Returns an error if the data is not valid UTF-8.
  pub fn text(&self) -> StageResult<&str> {
    str::from_utf8(&self.data).map_err(|source| {
      TransformError::InvalidUtf8 {
        locator: self.source.clone(),
        source,
      }
      .into()
    })
  }

  pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
    self.attributes.insert(name.into(), value);
  }

  #[must_use]
  pub fn attribute(&self, name: &str) -> Option<&Value> {
    self.attributes.get(name)
  }

  /// Front matter published by an earlier stage, or an empty map.
  #[must_use]
  pub fn meta(&self) -> Meta {
    match self.attribute(ATTR_META) {
      Some(Value::Object(meta)) => meta.clone(),
      _ => Meta::new(),
    }
  }
}

/// Resources shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct StageContext {
  pub resolver:    Registry,
  pub resolve_ctx: ResolveContext,
}

impl StageContext {
  #[must_use]
  pub const fn new(resolver: Registry, resolve_ctx: ResolveContext) -> Self {
    Self {
      resolver,
      resolve_ctx,
    }
  }
}

/// One step of a pipeline.
pub trait Stage: Send + Sync {
  /// Name used in log messages.
  fn name(&self) -> &'static str;

  /// Process `payload`, then call `next` to continue the pipeline.
  ///
  /// # Errors
  ///
  /// Returns this stage's error, or the error of a later stage.
  fn run(
    &self,
    payload: &mut Payload,
    ctx: &StageContext,
    next: Next<'_>,
  ) -> StageResult<()>;
}

/// The rest of a pipeline, as seen from inside a stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
  stages: &'a [Box<dyn Stage>],
  ctx:    &'a StageContext,
}

impl Next<'_> {
  /// Run the remaining stages on `payload`.
  ///
  /// # Errors
  ///
  /// Returns the first stage error.
  pub fn run(self, payload: &mut Payload) -> StageResult<()> {
    let Some((stage, rest)) = self.stages.split_first() else {
      return Ok(());
    };
    trace!("Running stage '{}' on {}", stage.name(), payload.source());
    stage.run(payload, self.ctx, Next {
      stages: rest,
      ctx:    self.ctx,
    })
  }
}

/// An ordered list of stages.
#[derive(Default)]
pub struct Pipeline {
  stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with(mut self, stage: impl Stage + 'static) -> Self {
    self.stages.push(Box::new(stage));
    self
  }

  /// Stage names, in order.
  pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.stages.iter().map(|stage| stage.name())
  }

  /// Run every stage on `payload`.
  ///
  /// # Errors
  ///
  /// Returns the first stage error.
  pub fn run(&self, payload: &mut Payload, ctx: &StageContext) -> StageResult<()> {
    Next {
      stages: &self.stages,
      ctx,
    }
    .run(payload)
  }
}

impl std::fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("stages", &self.names().collect::<Vec<_>>())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use pretty_assertions::assert_eq;

  use super::*;

  /// Appends its tag before and after the rest of the pipeline runs.
  struct Tag(&'static str);

  impl Stage for Tag {
    fn name(&self) -> &'static str {
      self.0
    }

    fn run(
      &self,
      payload: &mut Payload,
      _ctx: &StageContext,
      next: Next<'_>,
    ) -> StageResult<()> {
      let mut data = payload.data().to_vec();
      data.extend_from_slice(format!("<{}", self.0).as_bytes());
      payload.set_data(data);
      next.run(payload)?;
      let mut data = payload.data().to_vec();
      data.extend_from_slice(format!("{}>", self.0).as_bytes());
      payload.set_data(data);
      Ok(())
    }
  }

  /// Stops the pipeline.
  struct Halt;

  impl Stage for Halt {
    fn name(&self) -> &'static str {
      "halt"
    }

    fn run(
      &self,
      _payload: &mut Payload,
      _ctx: &StageContext,
      _next: Next<'_>,
    ) -> StageResult<()> {
      Ok(())
    }
  }

  fn ctx() -> StageContext {
    StageContext::new(Registry::new(), ResolveContext::new())
  }

  #[test]
  fn stages_nest_in_order() {
    let pipeline = Pipeline::new().with(Tag("a")).with(Tag("b"));
    let mut payload = Payload::new(Locator::from("doc.md"), Vec::new());
    pipeline.run(&mut payload, &ctx()).unwrap();
    assert_eq!(payload.text().unwrap(), "<a<bb>a>");
  }

  #[test]
  fn a_stage_can_stop_the_run() {
    let pipeline = Pipeline::new().with(Tag("a")).with(Halt).with(Tag("b"));
    let mut payload = Payload::new(Locator::from("doc.md"), Vec::new());
    pipeline.run(&mut payload, &ctx()).unwrap();
    assert_eq!(payload.text().unwrap(), "<aa>");
    assert_eq!(pipeline.names().collect::<Vec<_>>(), vec!["a", "halt", "b"]);
  }

  #[test]
  fn meta_defaults_to_empty() {
    let mut payload = Payload::new(Locator::from("doc.md"), Vec::new());
    assert!(payload.meta().is_empty());

    payload.set_attribute(ATTR_META, serde_json::json!({ "title": "T" }));
    assert_eq!(payload.meta()["title"], "T");
  }

  #[test]
  fn invalid_utf8_names_the_source() {
    let payload = Payload::new(Locator::from("doc.md"), vec![0xff, 0xfe]);
    let err = payload.text().unwrap_err();
    assert!(err.to_string().contains("doc.md"), "{err}");
  }
}
