use std::{
  io::{self, Cursor, Read},
  sync::OnceLock,
};

use crate::{Locator, ResolveContext, ResolveError, ResolveResult, Resolver};

/// Serves standard input.
///
/// The stream is read once on first use and every later resolution gets a
/// copy of the same bytes.
#[derive(Debug, Default)]
pub struct StdinResolver {
  buffer: OnceLock<Vec<u8>>,
}

impl StdinResolver {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// A resolver that serves `data` instead of reading standard input.
  #[must_use]
  pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
    let buffer = OnceLock::new();
    let _ = buffer.set(data.into());
    Self { buffer }
  }
}

impl Resolver for StdinResolver {
  fn resolve(
    &self,
    locator: &Locator,
    _ctx: &ResolveContext,
  ) -> ResolveResult<Box<dyn Read + Send>> {
    if let Some(data) = self.buffer.get() {
      return Ok(Box::new(Cursor::new(data.clone())));
    }

    let mut data = Vec::new();
    io::stdin()
      .lock()
      .read_to_end(&mut data)
      .map_err(|err| ResolveError::failed(locator, err))?;
    let data = self.buffer.get_or_init(|| data);
    Ok(Box::new(Cursor::new(data.clone())))
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use super::*;

  #[test]
  fn serves_the_same_bytes_twice() {
    let resolver = StdinResolver::from_bytes("hello");
    let locator = Locator::from("stdin://");
    let ctx = ResolveContext::new();
    assert_eq!(resolver.fetch(&locator, &ctx).unwrap(), b"hello");
    assert_eq!(resolver.fetch(&locator, &ctx).unwrap(), b"hello");
  }
}
