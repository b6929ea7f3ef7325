use std::time::{Duration, Instant};

use crate::{Locator, ResolveError, ResolveResult};

/// Per-resolution context: the working directory relative locators are
/// joined against, and an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
  workdir:  Option<Locator>,
  deadline: Option<Instant>,
}

impl ResolveContext {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_workdir(mut self, workdir: impl Into<Locator>) -> Self {
    self.workdir = Some(workdir.into());
    self
  }

  #[must_use]
  pub const fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(deadline);
    self
  }

  /// Set the deadline to `timeout` from now.
  #[must_use]
  pub fn with_timeout(self, timeout: Duration) -> Self {
    self.with_deadline(Instant::now() + timeout)
  }

  #[must_use]
  pub const fn workdir(&self) -> Option<&Locator> {
    self.workdir.as_ref()
  }

  #[must_use]
  pub const fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Time left before the deadline, if one is set.
  #[must_use]
  pub fn remaining(&self) -> Option<Duration> {
    self
      .deadline
      .map(|deadline| deadline.saturating_duration_since(Instant::now()))
  }

  /// Fail with [`ResolveError::Timeout`] once the deadline passed.
  ///
  /// # Errors
  ///
  /// Returns an error if the deadline has been reached.
  pub fn check_deadline(&self, locator: &Locator) -> ResolveResult<()> {
    match self.deadline {
      Some(deadline) if Instant::now() >= deadline => {
        Err(ResolveError::Timeout {
          locator: locator.clone(),
        })
      },
      _ => Ok(()),
    }
  }
}
