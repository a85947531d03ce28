//! Per-call session store: DashMap keyed by call id, one async lock per call.
//!
//! Exactly one session exists per active call, so speech never leaks between
//! concurrent calls. Turns for different calls never contend; turns for the
//! same call are mutually exclusive, which also covers duplicate webhook
//! delivery of the same turn.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::engine::TurnContext;
use crate::error::SessionError;

/// One captured utterance: which step produced it, the literal recognized
/// speech (or the step's placeholder), the sentiment score computed once at
/// capture time, and optional request-context metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub step: String,
    pub speech: String,
    pub sentiment: f32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

/// Fields captured opportunistically from request context. First write wins:
/// finalization depends on the earliest known value.
#[derive(Debug, Clone, Default)]
pub struct CapturedFields {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl CapturedFields {
    /// Records whatever the request context carries, never overwriting a
    /// value that is already set.
    pub fn absorb(&mut self, ctx: &TurnContext) {
        if self.name.is_none() {
            if let Some(name) = ctx.name.as_deref().filter(|s| !s.trim().is_empty()) {
                self.name = Some(name.to_string());
            }
        }
        if self.phone.is_none() {
            if let Some(phone) = ctx.phone.as_deref().filter(|s| !s.trim().is_empty()) {
                self.phone = Some(phone.to_string());
            }
        }
    }
}

/// In-progress conversation state for one call. Created on the first webhook
/// for a call id, mutated once per turn, removed at finalization.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: String,
    pub flow_id: String,
    pub current_step: String,
    /// Append-only; insertion order is conversational order.
    pub transcript: Vec<TranscriptEntry>,
    pub captured: CapturedFields,
}

impl CallSession {
    pub fn new(call_id: &str, flow_id: &str, entry_step: &str) -> Self {
        Self {
            call_id: call_id.to_string(),
            flow_id: flow_id.to_string(),
            current_step: entry_step.to_string(),
            transcript: Vec::new(),
            captured: CapturedFields::default(),
        }
    }
}

/// Map value: the flow binding is duplicated outside the lock so `open` can
/// detect a conflicting flow without waiting on an in-flight turn.
struct SessionSlot {
    flow_id: String,
    session: Arc<Mutex<CallSession>>,
}

/// Keyed session store. The sole source of truth for in-progress call state.
pub struct SessionStore {
    inner: DashMap<String, SessionSlot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Returns the session for the call, creating it bound to the given flow
    /// if absent. The flow binding is fixed for the session's lifetime;
    /// opening an existing call under a different flow is a conflict, not a
    /// rebind.
    pub fn open(
        &self,
        call_id: &str,
        flow_id: &str,
        entry_step: &str,
    ) -> Result<Arc<Mutex<CallSession>>, SessionError> {
        let slot = self.inner.entry(call_id.to_string()).or_insert_with(|| SessionSlot {
            flow_id: flow_id.to_string(),
            session: Arc::new(Mutex::new(CallSession::new(call_id, flow_id, entry_step))),
        });
        if slot.flow_id != flow_id {
            return Err(SessionError::FlowConflict {
                call_id: call_id.to_string(),
                bound: slot.flow_id.clone(),
                requested: flow_id.to_string(),
            });
        }
        Ok(Arc::clone(&slot.session))
    }

    pub fn get(&self, call_id: &str) -> Result<Arc<Mutex<CallSession>>, SessionError> {
        self.inner
            .get(call_id)
            .map(|e| Arc::clone(&e.value().session))
            .ok_or_else(|| SessionError::Missing(call_id.to_string()))
    }

    /// Retires a session. Called exactly once per call, after finalization.
    pub fn remove(&self, call_id: &str) -> Result<(), SessionError> {
        self.inner
            .remove(call_id)
            .map(|_| ())
            .ok_or_else(|| SessionError::Missing(call_id.to_string()))
    }

    pub fn active_calls(&self) -> usize {
        self.inner.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(name: Option<&str>, phone: Option<&str>) -> TurnContext {
        TurnContext {
            name: name.map(String::from),
            referrer: None,
            phone: phone.map(String::from),
        }
    }

    #[test]
    fn captured_fields_are_first_write_wins() {
        let mut captured = CapturedFields::default();
        captured.absorb(&ctx(Some("John"), Some("+15550001111")));
        captured.absorb(&ctx(Some("Impostor"), Some("+15559999999")));
        assert_eq!(captured.name.as_deref(), Some("John"));
        assert_eq!(captured.phone.as_deref(), Some("+15550001111"));
    }

    #[test]
    fn blank_context_values_do_not_claim_the_slot() {
        let mut captured = CapturedFields::default();
        captured.absorb(&ctx(Some("  "), Some("")));
        assert!(captured.name.is_none());
        assert!(captured.phone.is_none());
        captured.absorb(&ctx(Some("John"), None));
        assert_eq!(captured.name.as_deref(), Some("John"));
    }

    #[test]
    fn open_is_idempotent_per_call_id() {
        let store = SessionStore::new();
        let a = store.open("CA123", "referral", "interest").unwrap();
        let b = store.open("CA123", "referral", "interest").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.active_calls(), 1);
    }

    #[test]
    fn open_under_a_different_flow_is_a_conflict() {
        let store = SessionStore::new();
        store.open("CA123", "referral", "interest").unwrap();
        let err = store.open("CA123", "intake", "name").unwrap_err();
        assert!(matches!(err, SessionError::FlowConflict { .. }));
        // The original binding survives the conflicting open.
        assert_eq!(store.active_calls(), 1);
        assert!(store.open("CA123", "referral", "interest").is_ok());
    }

    #[test]
    fn remove_retires_the_session() {
        let store = SessionStore::new();
        store.open("CA9", "referral", "interest").unwrap();
        assert!(store.remove("CA9").is_ok());
        assert!(store.get("CA9").is_err());
        assert!(store.remove("CA9").is_err());
    }
}
