//! Per-compile memo of fetched and parsed sources.

use std::{
  cell::RefCell,
  collections::HashMap,
  rc::Rc,
};

use quire_resolver::Locator;

use crate::ast::Document;

/// A fetched resource and its parsed, transformed document.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSource {
  pub locator:  Locator,
  pub source:   Rc<[u8]>,
  pub document: Document,
}

/// Memoizes included sources for the duration of one compile.
///
/// Entries are keyed by the resolved locator string, so two directives that
/// reach the same resource through different relative paths share one
/// fetch. The cache also tracks which sources are currently being included
/// to detect include cycles.
#[derive(Debug, Default)]
pub struct SourceCache {
  entries:     RefCell<HashMap<String, Rc<CachedSource>>>,
  in_progress: RefCell<Vec<Locator>>,
}

impl SourceCache {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn get(&self, key: &str) -> Option<Rc<CachedSource>> {
    self.entries.borrow().get(key).cloned()
  }

  pub fn set(&self, key: impl Into<String>, entry: CachedSource) -> Rc<CachedSource> {
    let entry = Rc::new(entry);
    self
      .entries
      .borrow_mut()
      .insert(key.into(), Rc::clone(&entry));
    entry
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.borrow().len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.borrow().is_empty()
  }

  /// Mark `locator` as being included.
  ///
  /// Returns the include chain ending in `locator` if it is already being
  /// included.
  pub(crate) fn enter(&self, locator: &Locator) -> Result<(), Vec<Locator>> {
    let mut in_progress = self.in_progress.borrow_mut();
    if let Some(pos) = in_progress.iter().position(|l| l == locator) {
      let mut chain = in_progress[pos..].to_vec();
      chain.push(locator.clone());
      return Err(chain);
    }
    in_progress.push(locator.clone());
    Ok(())
  }

  pub(crate) fn leave(&self, locator: &Locator) {
    let mut in_progress = self.in_progress.borrow_mut();
    if let Some(pos) = in_progress.iter().rposition(|l| l == locator) {
      in_progress.remove(pos);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn enter_detects_cycles() {
    let cache = SourceCache::new();
    let a = Locator::from("a.md");
    let b = Locator::from("b.md");
    assert!(cache.enter(&a).is_ok());
    assert!(cache.enter(&b).is_ok());
    assert_eq!(cache.enter(&a), Err(vec![a.clone(), b.clone(), a.clone()]));
    cache.leave(&b);
    cache.leave(&a);
    assert!(cache.enter(&a).is_ok());
  }

  #[test]
  fn entries_are_shared() {
    let cache = SourceCache::new();
    let stored = cache.set("a.md", CachedSource {
      locator:  Locator::from("a.md"),
      source:   Rc::from(&b"# A"[..]),
      document: Document::default(),
    });
    let fetched = cache.get("a.md");
    assert!(fetched.is_some_and(|entry| Rc::ptr_eq(&entry, &stored)));
    assert_eq!(cache.len(), 1);
  }
}
