// src/engine/authority.rs
//! Proof of being on the authoritative thread
//!
//! A `SimulationCore` hands out exactly one `AuthorityToken`. The token is
//! neither `Send` nor `Sync`, so it stays on the thread that created the
//! core; every world mutation takes `&AuthorityToken`, which makes applying
//! actions from a worker a compile error rather than a data race.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CORE_ID: AtomicU64 = AtomicU64::new(1);

/// Capability for mutating world state
pub struct AuthorityToken {
    core_id: u64,
    /// Pins the token to its thread
    _not_send: PhantomData<*const ()>,
}

impl AuthorityToken {
    /// Mint a token for a freshly created core
    pub(crate) fn issue() -> Self {
        Self {
            core_id: NEXT_CORE_ID.fetch_add(1, Ordering::Relaxed),
            _not_send: PhantomData,
        }
    }

    /// Identity of the core that issued this token
    pub fn core_id(&self) -> u64 {
        self.core_id
    }
}

impl fmt::Debug for AuthorityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityToken")
            .field("core_id", &self.core_id)
            .finish()
    }
}
