//! Shared, swappable snapshot of the configured edge graph.

use std::sync::{Arc, PoisonError, RwLock};

use wayfare_core::edge::EdgeGraph;

/// Holds the active [`EdgeGraph`] behind an `Arc` so decisions read a
/// consistent snapshot without holding any lock across an await point.
/// Reload swaps the whole graph; in-flight decisions finish on the old one.
pub struct EdgeCache {
  inner: RwLock<Arc<EdgeGraph>>,
}

impl EdgeCache {
  pub fn new(graph: EdgeGraph) -> Self {
    Self { inner: RwLock::new(Arc::new(graph)) }
  }

  pub fn current(&self) -> Arc<EdgeGraph> {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn replace(&self, graph: EdgeGraph) {
    *self.inner.write().unwrap_or_else(PoisonError::into_inner) =
      Arc::new(graph);
  }
}
