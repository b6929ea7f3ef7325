use std::{fs::File, io::Read};

use log::trace;

use crate::{Locator, ResolveContext, ResolveError, ResolveResult, Resolver};

/// Reads resources from the local filesystem.
///
/// Plain paths are opened as-is. `file://` URLs open the concatenation of
/// their host and path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileResolver;

impl Resolver for FileResolver {
  fn resolve(
    &self,
    locator: &Locator,
    _ctx: &ResolveContext,
  ) -> ResolveResult<Box<dyn Read + Send>> {
    let path = locator.to_path_buf();
    trace!("Opening {}", path.display());
    let file =
      File::open(&path).map_err(|err| ResolveError::failed(locator, err))?;
    Ok(Box::new(file))
  }
}
