use quire_resolver::{Locator, ResolveContext, Resolver};

use crate::{cache::SourceCache, directive::Processor};

/// Everything a transformer needs while processing one document.
///
/// A context is created per compile and narrowed with
/// [`TransformContext::with_source`] as includes descend into other
/// documents.
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
  processor:   &'a Processor,
  resolver:    &'a dyn Resolver,
  resolve_ctx: &'a ResolveContext,
  cache:       &'a SourceCache,
  source:      &'a Locator,
}

impl<'a> TransformContext<'a> {
  #[must_use]
  pub const fn new(
    processor: &'a Processor,
    resolver: &'a dyn Resolver,
    resolve_ctx: &'a ResolveContext,
    cache: &'a SourceCache,
    source: &'a Locator,
  ) -> Self {
    Self {
      processor,
      resolver,
      resolve_ctx,
      cache,
      source,
    }
  }

  /// The same context, for a document located at `source`.
  #[must_use]
  pub const fn with_source<'b>(&self, source: &'b Locator) -> TransformContext<'b>
  where
    'a: 'b,
  {
    TransformContext {
      processor: self.processor,
      resolver: self.resolver,
      resolve_ctx: self.resolve_ctx,
      cache: self.cache,
      source,
    }
  }

  #[must_use]
  pub const fn processor(&self) -> &'a Processor {
    self.processor
  }

  #[must_use]
  pub const fn resolver(&self) -> &'a dyn Resolver {
    self.resolver
  }

  #[must_use]
  pub const fn resolve_ctx(&self) -> &'a ResolveContext {
    self.resolve_ctx
  }

  #[must_use]
  pub const fn cache(&self) -> &'a SourceCache {
    self.cache
  }

  /// Locator of the document being transformed.
  #[must_use]
  pub const fn source(&self) -> &'a Locator {
    self.source
  }
}
