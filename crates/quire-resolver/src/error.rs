use std::io;

use crate::Locator;

/// Result type for resource resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while resolving a [`Locator`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
  #[error("No resolver registered for scheme '{scheme}' (resolving '{locator}')")]
  SchemeNotRegistered { scheme: String, locator: Locator },

  #[error("Could not resolve '{locator}': {source}")]
  Failed {
    locator: Locator,
    #[source]
    source:  Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("Deadline exceeded while resolving '{locator}'")]
  Timeout { locator: Locator },

  #[error("Unexpected HTTP status {status} for '{locator}'")]
  Http { locator: Locator, status: u16 },
}

impl ResolveError {
  /// Wrap any underlying cause as a resolution failure.
  pub fn failed(
    locator: &Locator,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
  ) -> Self {
    Self::Failed {
      locator: locator.clone(),
      source:  source.into(),
    }
  }

  /// The locator that could not be resolved.
  #[must_use]
  pub const fn locator(&self) -> &Locator {
    match self {
      Self::SchemeNotRegistered { locator, .. }
      | Self::Failed { locator, .. }
      | Self::Timeout { locator }
      | Self::Http { locator, .. } => locator,
    }
  }

  /// Whether the underlying cause is a missing file or resource.
  #[must_use]
  pub fn is_not_found(&self) -> bool {
    match self {
      Self::Failed { source, .. } => source
        .downcast_ref::<io::Error>()
        .is_some_and(|err| err.kind() == io::ErrorKind::NotFound),
      Self::Http { status, .. } => *status == 404,
      _ => false,
    }
  }
}
