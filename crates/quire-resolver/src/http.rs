//! HTTP and HTTPS resources.

use std::{
  env,
  fmt,
  io::{Cursor, Read},
  time::Duration,
};

use base64::Engine;
use log::{debug, warn};
use ureq::Agent;

use crate::{
  Locator,
  ResolveContext,
  ResolveError,
  ResolveResult,
  Resolver,
};

/// Environment variable holding the basic-auth username.
pub const USERNAME_ENV: &str = "QUIRE_HTTP_BASIC_AUTH_USERNAME";

/// Environment variable holding the basic-auth password.
pub const PASSWORD_ENV: &str = "QUIRE_HTTP_BASIC_AUTH_PASSWORD";

/// Timeout applied when the resolution context carries no deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic-auth credentials sent with every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

impl Credentials {
  #[must_use]
  pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
    Self {
      username: username.into(),
      password: password.into(),
    }
  }

  /// Read credentials from [`USERNAME_ENV`] and [`PASSWORD_ENV`].
  ///
  /// Returns `None` unless the username is set and non-empty.
  #[must_use]
  pub fn from_env() -> Option<Self> {
    let username = env::var(USERNAME_ENV).ok().filter(|u| !u.is_empty())?;
    let password = env::var(PASSWORD_ENV).unwrap_or_default();
    Some(Self { username, password })
  }

  /// Value of the `Authorization` header.
  #[must_use]
  pub fn header_value(&self) -> String {
    let token = base64::engine::general_purpose::STANDARD
      .encode(format!("{}:{}", self.username, self.password));
    format!("Basic {token}")
  }
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .finish()
  }
}

/// Fetches `http://` and `https://` resources.
#[derive(Debug, Clone)]
pub struct HttpResolver {
  credentials: Option<Credentials>,
  timeout:     Duration,
}

impl Default for HttpResolver {
  fn default() -> Self {
    Self {
      credentials: None,
      timeout:     DEFAULT_TIMEOUT,
    }
  }
}

impl HttpResolver {
  /// A resolver picking up credentials from the environment.
  #[must_use]
  pub fn new() -> Self {
    Self::default().with_credentials(Credentials::from_env())
  }

  #[must_use]
  pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
    self.credentials = credentials;
    self
  }

  #[must_use]
  pub const fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  #[must_use]
  pub const fn credentials(&self) -> Option<&Credentials> {
    self.credentials.as_ref()
  }

  fn agent(&self, ctx: &ResolveContext) -> Agent {
    let timeout = ctx
      .remaining()
      .map_or(self.timeout, |remaining| remaining.min(self.timeout));
    Agent::config_builder()
      .timeout_global(Some(timeout))
      .http_status_as_error(false)
      .build()
      .into()
  }
}

impl Resolver for HttpResolver {
  fn resolve(
    &self,
    locator: &Locator,
    ctx: &ResolveContext,
  ) -> ResolveResult<Box<dyn Read + Send>> {
    let agent = self.agent(ctx);
    let mut request = agent.get(locator.as_str());
    if let Some(credentials) = &self.credentials {
      debug!("Sending basic auth as '{}'", credentials.username);
      request = request.header("Authorization", credentials.header_value());
    }

    let response = request.call().map_err(|err| {
      match err {
        ureq::Error::Timeout(_) => {
          ResolveError::Timeout {
            locator: locator.clone(),
          }
        },
        err => ResolveError::failed(locator, err),
      }
    })?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
      warn!("GET {locator} returned {status}");
      return Err(ResolveError::Http {
        locator: locator.clone(),
        status,
      });
    }

    let mut body = response.into_body();
    let data = body
      .read_to_vec()
      .map_err(|err| ResolveError::failed(locator, err))?;
    Ok(Box::new(Cursor::new(data)))
  }
}
