//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track liveness (written by the health sweep, read by selection)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use url::Url;

/// A single upstream backend.
#[derive(Debug)]
pub struct Backend {
    /// The address of the backend.
    pub addr: SocketAddr,
    /// Pre-calculated base URL for forwarding.
    pub url: Url,
    /// Liveness flag, toggled by periodic probing.
    alive: AtomicBool,
}

impl Backend {
    /// Create a new backend, assumed alive until the first probe says
    /// otherwise.
    pub fn new(addr: SocketAddr) -> Self {
        let url = Url::parse(&format!("http://{}", addr)).expect("socket address forms a valid URL");
        Self {
            addr,
            url,
            alive: AtomicBool::new(true),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Relaxed);
    }
}
