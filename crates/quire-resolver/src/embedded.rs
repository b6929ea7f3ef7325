use std::{
  collections::BTreeMap,
  io::{Cursor, Read},
};

use crate::{
  Locator,
  ResolveContext,
  ResolveError,
  ResolveResult,
  Resolver,
  registry::not_found,
};

/// Scheme under which embedded resources are served.
pub const SCHEME: &str = "quire";

/// Serves resources compiled into the binary, such as built-in layouts.
///
/// `quire://document.html` names the embedded file `document.html`.
#[derive(Debug, Default, Clone)]
pub struct EmbeddedResolver {
  files: BTreeMap<String, &'static str>,
}

impl EmbeddedResolver {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_file(mut self, name: impl Into<String>, contents: &'static str) -> Self {
    self.files.insert(name.into(), contents);
    self
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.files.keys().map(String::as_str)
  }
}

impl Resolver for EmbeddedResolver {
  fn resolve(
    &self,
    locator: &Locator,
    _ctx: &ResolveContext,
  ) -> ResolveResult<Box<dyn Read + Send>> {
    let name = match locator.host() {
      "" => locator.url_path().trim_start_matches('/'),
      host => host,
    };
    let contents = self.files.get(name).ok_or_else(|| {
      ResolveError::failed(
        locator,
        not_found(format!("no embedded resource named '{name}'")),
      )
    })?;
    Ok(Box::new(Cursor::new(contents.as_bytes())))
  }
}
