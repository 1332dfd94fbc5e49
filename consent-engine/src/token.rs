//! Correlation tokens linking a host result to the request that caused it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide counter so tokens from different sessions never collide.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque token handed to the gateway (and prompt) for one negotiation.
///
/// The host must hand the same token back with the result. Results carrying
/// any other token are dropped by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(u64);

impl RequestToken {
    pub(crate) fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuild a token from the raw value a host carried across its own
    /// request/response boundary (e.g. a platform request code).
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
