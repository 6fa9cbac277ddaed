//! Abort signal — a process-wide, lookup-by-token cancellation flag.
//!
//! Every long-running operation in a run (the model stream, each tool task)
//! receives an [`AbortToken`] and polls [`AbortToken::is_aborted`] cooperatively;
//! nothing here kills a task directly. Tokens are registered in a process-wide
//! table so a token handed to a detached tool task still resolves correctly
//! even if the owning session is gone by the time the task checks it.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

static REGISTRY: Lazy<DashMap<Uuid, Arc<AtomicBool>>> = Lazy::new(DashMap::new);

/// An opaque, cheaply cloneable handle to one run's cancellation flag.
///
/// `aborted()` on a cleared or never-registered token reads as `false` —
/// abort is something you opt into by creating a token, never an ambient
/// default.
#[derive(Clone, Debug)]
pub struct AbortToken {
    id: Uuid,
    flag: Arc<AtomicBool>,
}

impl AbortToken {
    /// Allocate a fresh, unaborted token and register it process-wide.
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        let flag = Arc::new(AtomicBool::new(false));
        REGISTRY.insert(id, flag.clone());
        Self { id, flag }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Mark this token (and every clone of it) as aborted. Idempotent.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Cheap, wait-free read of the abort flag.
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Remove this token from the process-wide table. The handle remains
    /// valid (clones still observe the same flag) but lookups by id will
    /// miss after this point.
    pub fn clear(&self) {
        REGISTRY.remove(&self.id);
    }

    /// Look up a token by id, e.g. to abort a run from outside the session
    /// that created it. Returns `None` if the token was never registered or
    /// has since been cleared.
    pub fn lookup(id: Uuid) -> Option<AbortToken> {
        REGISTRY.get(&id).map(|flag| AbortToken {
            id,
            flag: flag.clone(),
        })
    }

    /// `aborted?` on an absent token reads as `false`, matching the contract
    /// for callers holding only an id (e.g. a crashed session's last-known token).
    pub fn is_aborted_by_id(id: Uuid) -> bool {
        Self::lookup(id).is_some_and(|t| t.is_aborted())
    }
}

impl Default for AbortToken {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AbortToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for AbortToken {}
