//! Subagent Registry — tracks temporary child sessions spawned by a run,
//! addressed by the composite key `(session_id, role, index)`.
//!
//! Grounded in the teacher's `DashMap`-backed concurrent registry shape
//! (`SubagentRegistry` in the old `subagent.rs`), but the key scheme and
//! lifecycle are unlike the teacher's: there's no purpose-hash naming and no
//! recursive pause/resume/kill tree here — children are temporary workers
//! that run once and are never restarted.
//!
//! `spawn_subagent` is this module's one dependency on [`crate::session`]: it
//! is the dynamic-supervisor half of the registry, turning a [`SessionConfig`]
//! into a started [`AgentSession`] and registering the result in the same
//! `DashMap` the lower-level `start_subagent`/`stop_subagent` pair manages.

use std::sync::Arc;

use agenticlaw_core::SessionKey;
use dashmap::DashMap;

use crate::session::{AgentSession, SessionConfig};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SubagentKey {
    pub session_id: SessionKey,
    pub role: String,
    pub index: u32,
}

impl SubagentKey {
    pub fn new(session_id: impl Into<SessionKey>, role: impl Into<String>, index: u32) -> Self {
        Self { session_id: session_id.into(), role: role.into(), index }
    }
}

impl std::fmt::Display for SubagentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.session_id, self.role, self.index)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubagentStatus {
    Running,
    Complete,
    Failed,
}

impl std::fmt::Display for SubagentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Clone)]
pub struct SubagentEntry {
    pub key: SubagentKey,
    pub status: SubagentStatus,
    /// The child's own handle — an `AgentSession` in practice, carried as
    /// `Arc<dyn Any>` so a caller that built the entry by hand (rather than
    /// through `spawn_subagent`) isn't forced to hand over a real session.
    pub handle: Arc<dyn std::any::Any + Send + Sync>,
}

/// Options for [`SubagentRegistry::spawn_subagent`]: the config to start the
/// child with, the `(session_id, role)` pair it runs under, and either an
/// explicit `registry_key` or an `index` to build the composite key from.
pub struct SubagentOptions {
    pub session_id: SessionKey,
    pub role: String,
    pub index: u32,
    pub registry_key: Option<SubagentKey>,
    pub session_config: SessionConfig,
}

/// Process-wide registry of a session's subagents, keyed by the triple
/// `(owning session, role, index)` so a run can spawn several subagents of
/// the same role (e.g. three `"researcher"` children) without collisions.
#[derive(Default)]
pub struct SubagentRegistry {
    entries: DashMap<SubagentKey, SubagentEntry>,
}

impl SubagentRegistry {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Register a started subagent. Replaces any entry already at this key
    /// — children are never restarted, so a caller that reuses a key is
    /// expected to have already removed the previous one.
    pub fn start_subagent(&self, key: SubagentKey, handle: Arc<dyn std::any::Any + Send + Sync>) {
        self.entries.insert(key.clone(), SubagentEntry { key, status: SubagentStatus::Running, handle });
    }

    /// Construct and start a child `AgentSession` per `opts.session_config`,
    /// then register it — the dynamic-supervisor "spawn a configured child"
    /// operation. The registry key is `opts.registry_key` if given, otherwise
    /// the composite `(session_id, role, index)` built from `opts`.
    pub fn spawn_subagent(&self, opts: SubagentOptions) -> (SubagentKey, Arc<AgentSession>) {
        let key = opts
            .registry_key
            .clone()
            .unwrap_or_else(|| SubagentKey::new(opts.session_id.clone(), opts.role.clone(), opts.index));
        let session = Arc::new(AgentSession::start(opts.session_id, opts.session_config));
        self.start_subagent(key.clone(), session.clone());
        (key, session)
    }

    pub fn mark_complete(&self, key: &SubagentKey) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.status = SubagentStatus::Complete;
        }
    }

    pub fn mark_failed(&self, key: &SubagentKey) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.status = SubagentStatus::Failed;
        }
    }

    /// Remove a subagent entry outright, by key.
    pub fn stop_subagent(&self, key: &SubagentKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove whichever entry's handle is this exact `Arc`, for a caller
    /// that's holding the handle `spawn_subagent` returned rather than the
    /// key it was registered under.
    pub fn stop_subagent_by_handle(&self, handle: &Arc<dyn std::any::Any + Send + Sync>) -> bool {
        let key = self.entries.iter().find(|e| Arc::ptr_eq(&e.handle, handle)).map(|e| e.key.clone());
        match key {
            Some(key) => self.stop_subagent(&key),
            None => false,
        }
    }

    pub fn lookup(&self, key: &SubagentKey) -> Option<SubagentEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    pub fn list(&self) -> Vec<SubagentEntry> {
        self.entries.iter().map(|e| e.clone()).collect()
    }

    pub fn list_by_session(&self, session_id: &SessionKey) -> Vec<SubagentEntry> {
        self.entries.iter().filter(|e| &e.key.session_id == session_id).map(|e| e.clone()).collect()
    }

    pub fn list_by_role(&self, role: &str) -> Vec<SubagentEntry> {
        self.entries.iter().filter(|e| e.key.role == role).map(|e| e.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}
