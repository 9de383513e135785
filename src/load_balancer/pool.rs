//! Backend pool with round-robin selection.
//!
//! # Responsibilities
//! - Hold the fixed set of upstream backends
//! - Rotate fairly over the alive subset for each request
//!
//! # Design Decisions
//! - Selection does one atomic increment plus at most one full scan; when
//!   the scan lands past dead backends the cursor is re-seated at the hit
//!   so the next caller starts from a live one

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// The fixed set of upstream backends plus the shared rotation cursor.
#[derive(Debug)]
pub struct ServerPool {
    backends: Vec<Arc<Backend>>,
    cursor: AtomicUsize,
}

impl ServerPool {
    /// Build the pool from the configured addresses. Startup-only; the
    /// backend set is immutable afterwards.
    pub fn new(addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        let backends = addrs
            .into_iter()
            .map(|addr| Arc::new(Backend::new(addr)))
            .collect();
        Self {
            backends,
            cursor: AtomicUsize::new(0),
        }
    }

    /// All backends, for health sweeps and status reporting.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    fn next_index(&self) -> usize {
        self.cursor
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
            % self.backends.len()
    }

    /// Pick the next alive backend in rotation, or `None` when all are
    /// down. Safe for concurrent callers; no lock is taken.
    pub fn select_next(&self) -> Option<Arc<Backend>> {
        if self.backends.is_empty() {
            return None;
        }

        let len = self.backends.len();
        let start = self.next_index();
        for i in 0..len {
            let idx = (start + i) % len;
            let backend = &self.backends[idx];
            if backend.is_alive() {
                if i != 0 {
                    // Amortize repeated scans past the same dead backends.
                    self.cursor.store(idx, Ordering::Relaxed);
                }
                return Some(backend.clone());
            }
        }
        None
    }
}
