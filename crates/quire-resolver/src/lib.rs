//! Resource resolution for quire.
//!
//! A [`Locator`] names a resource by filesystem path or URL. A [`Registry`]
//! maps locator schemes to [`Resolver`] implementations and joins relative
//! locators against the working directory carried by a [`ResolveContext`].
//!
//! ```no_run
//! use quire_resolver::{HttpResolver, Locator, Registry, ResolveContext, Resolver};
//!
//! let registry = Registry::with_defaults(HttpResolver::new());
//! let ctx = ResolveContext::new().with_workdir("docs");
//! let bytes = registry.fetch(&Locator::from("intro.md"), &ctx)?;
//! # Ok::<(), quire_resolver::ResolveError>(())
//! ```

pub mod context;
pub mod embedded;
pub mod error;
pub mod file;
pub mod http;
pub mod locator;
pub mod registry;
pub mod stdin;

pub use context::ResolveContext;
pub use embedded::EmbeddedResolver;
pub use error::{ResolveError, ResolveResult};
pub use file::FileResolver;
pub use http::{Credentials, HttpResolver};
pub use locator::Locator;
pub use registry::{Registry, Resolver};
pub use stdin::StdinResolver;
