use std::{
  collections::HashMap,
  io::{self, Read},
  sync::Arc,
};

use log::{debug, trace};

use crate::{
  Locator,
  ResolveContext,
  ResolveError,
  ResolveResult,
  embedded::EmbeddedResolver,
  file::FileResolver,
  http::HttpResolver,
  stdin::StdinResolver,
};

/// Opens the resource named by a locator.
pub trait Resolver: Send + Sync {
  /// Open `locator` for reading.
  ///
  /// # Errors
  ///
  /// Returns an error if the resource cannot be reached.
  fn resolve(
    &self,
    locator: &Locator,
    ctx: &ResolveContext,
  ) -> ResolveResult<Box<dyn Read + Send>>;

  /// Read the whole resource, normalising CRLF line endings to LF.
  ///
  /// # Errors
  ///
  /// Returns an error if the resource cannot be opened or read.
  fn fetch(
    &self,
    locator: &Locator,
    ctx: &ResolveContext,
  ) -> ResolveResult<Vec<u8>> {
    let mut reader = self.resolve(locator, ctx)?;
    let mut data = Vec::new();
    reader
      .read_to_end(&mut data)
      .map_err(|err| ResolveError::failed(locator, err))?;
    Ok(normalize_newlines(data))
  }
}

/// Replace every `\r\n` with `\n`.
#[must_use]
pub fn normalize_newlines(data: Vec<u8>) -> Vec<u8> {
  if !data.windows(2).any(|w| w == b"\r\n") {
    return data;
  }
  let mut out = Vec::with_capacity(data.len());
  let mut iter = data.iter().peekable();
  while let Some(&byte) = iter.next() {
    if byte == b'\r' && iter.peek() == Some(&&b'\n') {
      continue;
    }
    out.push(byte);
  }
  out
}

/// Dispatches locators to resolvers by scheme.
///
/// Relative locators are joined against the context's working directory
/// before dispatch. Locators whose scheme has no resolver fall back to the
/// default scheme when one is set.
#[derive(Clone, Default)]
pub struct Registry {
  resolvers:      HashMap<String, Arc<dyn Resolver>>,
  default_scheme: Option<String>,
}

impl Registry {
  /// An empty registry.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// The standard set: `file` (also the default), `http`, `https` and
  /// `stdin`.
  #[must_use]
  pub fn with_defaults(http: HttpResolver) -> Self {
    let http = Arc::new(http);
    let mut registry = Self::new();
    registry.register("file", FileResolver);
    registry.register_shared("http", Arc::clone(&http) as Arc<dyn Resolver>);
    registry.register_shared("https", http);
    registry.register("stdin", StdinResolver::new());
    registry.set_default("file");
    registry
  }

  pub fn register(
    &mut self,
    scheme: impl Into<String>,
    resolver: impl Resolver + 'static,
  ) {
    self.register_shared(scheme, Arc::new(resolver));
  }

  pub fn register_shared(
    &mut self,
    scheme: impl Into<String>,
    resolver: Arc<dyn Resolver>,
  ) {
    let scheme = scheme.into().to_ascii_lowercase();
    trace!("Registering resolver for scheme '{scheme}'");
    self.resolvers.insert(scheme, resolver);
  }

  pub fn set_default(&mut self, scheme: impl Into<String>) {
    self.default_scheme = Some(scheme.into().to_ascii_lowercase());
  }

  /// A copy of this registry with one more scheme registered.
  #[must_use]
  pub fn extend(
    &self,
    scheme: impl Into<String>,
    resolver: impl Resolver + 'static,
  ) -> Self {
    let mut extended = self.clone();
    extended.register(scheme, resolver);
    extended
  }

  /// A copy of this registry that also serves `quire://` embedded files.
  #[must_use]
  pub fn with_embedded(&self, embedded: EmbeddedResolver) -> Self {
    self.extend(crate::embedded::SCHEME, embedded)
  }

  /// Registered schemes, sorted.
  #[must_use]
  pub fn schemes(&self) -> Vec<&str> {
    let mut schemes: Vec<&str> =
      self.resolvers.keys().map(String::as_str).collect();
    schemes.sort_unstable();
    schemes
  }

  fn lookup(&self, scheme: &str) -> Option<&Arc<dyn Resolver>> {
    self.resolvers.get(scheme).or_else(|| {
      self
        .default_scheme
        .as_ref()
        .and_then(|default| self.resolvers.get(default))
    })
  }
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Registry")
      .field("schemes", &self.schemes())
      .field("default_scheme", &self.default_scheme)
      .finish()
  }
}

impl Resolver for Registry {
  fn resolve(
    &self,
    locator: &Locator,
    ctx: &ResolveContext,
  ) -> ResolveResult<Box<dyn Read + Send>> {
    ctx.check_deadline(locator)?;

    let target = match ctx.workdir() {
      Some(workdir) if !locator.is_absolute() => {
        workdir.join_one(locator.as_str())
      },
      _ => locator.clone(),
    };

    let scheme = target.scheme();
    let Some(resolver) = self.lookup(&scheme) else {
      return Err(ResolveError::SchemeNotRegistered {
        scheme,
        locator: target,
      });
    };

    debug!("Resolving '{target}'");
    resolver.resolve(&target, ctx)
  }
}

/// Shorthand for an [`io::Error`] of kind `NotFound`.
pub(crate) fn not_found(message: String) -> io::Error {
  io::Error::new(io::ErrorKind::NotFound, message)
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use std::io::Cursor;

  use pretty_assertions::assert_eq;

  use super::*;

  struct Echo;

  impl Resolver for Echo {
    fn resolve(
      &self,
      locator: &Locator,
      _ctx: &ResolveContext,
    ) -> ResolveResult<Box<dyn Read + Send>> {
      Ok(Box::new(Cursor::new(locator.as_str().as_bytes().to_vec())))
    }
  }

  #[test]
  fn relative_locators_join_workdir() {
    let mut registry = Registry::new();
    registry.register("mem", Echo);
    let ctx = ResolveContext::new().with_workdir("mem://host/base");

    let data = registry.fetch(&Locator::from("docs/a.md"), &ctx).unwrap();
    assert_eq!(data, b"mem://host/base/docs/a.md");
  }

  #[test]
  fn unknown_scheme_without_default_fails() {
    let registry = Registry::new();
    let err = registry
      .resolve(&Locator::from("gopher://host/x"), &ResolveContext::new())
      .err()
      .unwrap();
    assert!(matches!(
      err,
      ResolveError::SchemeNotRegistered { ref scheme, .. } if scheme == "gopher"
    ));
  }

  #[test]
  fn unknown_scheme_uses_default() {
    let mut registry = Registry::new();
    registry.register("mem", Echo);
    registry.set_default("mem");
    let data = registry
      .fetch(&Locator::from("other://x/y"), &ResolveContext::new())
      .unwrap();
    assert_eq!(data, b"other://x/y");
  }

  #[test]
  fn extend_leaves_original_untouched() {
    let registry = Registry::new();
    let extended = registry.extend("mem", Echo);
    assert_eq!(registry.schemes(), Vec::<&str>::new());
    assert_eq!(extended.schemes(), vec!["mem"]);
  }

  #[test]
  fn crlf_is_normalised() {
    assert_eq!(normalize_newlines(b"a\r\nb\r\n\rc".to_vec()), b"a\nb\n\rc");
    assert_eq!(normalize_newlines(b"plain".to_vec()), b"plain");
  }

  #[test]
  fn expired_deadline_fails_fast() {
    let mut registry = Registry::new();
    registry.register("mem", Echo);
    let ctx = ResolveContext::new().with_deadline(std::time::Instant::now());
    let err = registry
      .resolve(&Locator::from("mem://x"), &ctx)
      .err()
      .unwrap();
    assert!(matches!(err, ResolveError::Timeout { .. }));
  }
}
