//! # Session values
//!
//! A [`SessionValue`] is an immutable snapshot of one participant's session.
//! Every change produces a new value carrying the same [`SessionId`]; the
//! registry swaps whole values rather than mutating them in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

use crate::SessionError;

/// Stable identifier of a tracked session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil identifier, rejected by [`SessionValue::create`].
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability implemented by the host's live connection object.
///
/// Sessions only ever hold a weak reference to a handle; the host owns it and
/// decides when it goes away.
pub trait LiveHandle: Send + Sync {
    /// Whether the connection currently reports itself as connected.
    fn is_connected(&self) -> bool;
}

/// Immutable snapshot of a participant's session state.
#[derive(Clone)]
pub struct SessionValue {
    id: SessionId,
    display_name: String,
    live_handle: Option<Weak<dyn LiveHandle>>,
    counter: u64,
}

impl SessionValue {
    /// Creates a fresh session with a zero counter.
    ///
    /// Fails with [`SessionError::InvalidArgument`] when `id` is nil.
    pub fn create(
        id: SessionId,
        display_name: impl Into<String>,
        live_handle: Option<&Arc<dyn LiveHandle>>,
    ) -> Result<Self, SessionError> {
        if id.is_nil() {
            return Err(SessionError::invalid("session id must not be nil"));
        }

        Ok(Self {
            id,
            display_name: display_name.into(),
            live_handle: live_handle.map(Arc::downgrade),
            counter: 0,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Upgrades the handle if the host still holds the connection.
    pub fn live_handle(&self) -> Option<Arc<dyn LiveHandle>> {
        self.live_handle.as_ref().and_then(Weak::upgrade)
    }

    /// True iff a handle is present, still alive, and reports connected.
    ///
    /// Evaluated on every call; connectivity can change under the session
    /// at any moment.
    pub fn is_active(&self) -> bool {
        self.live_handle()
            .map(|handle| handle.is_connected())
            .unwrap_or(false)
    }

    /// Returns a copy with `counter + delta`.
    ///
    /// Negative deltas and `u64` overflow are rejected.
    pub fn with_increment(&self, delta: i64) -> Result<Self, SessionError> {
        let delta = u64::try_from(delta)
            .map_err(|_| SessionError::invalid(format!("increment must be non-negative, got {delta}")))?;
        let counter = self
            .counter
            .checked_add(delta)
            .ok_or_else(|| SessionError::invalid(format!("counter overflow adding {delta} to {}", self.counter)))?;

        Ok(Self {
            counter,
            ..self.clone()
        })
    }

    /// Returns a copy pointing at a different live handle (or none).
    pub fn with_live_handle(&self, live_handle: Option<&Arc<dyn LiveHandle>>) -> Self {
        Self {
            live_handle: live_handle.map(Arc::downgrade),
            ..self.clone()
        }
    }

    /// Returns a copy shown under `display_name`; id and counter are kept.
    pub fn with_display_name(&self, display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..self.clone()
        }
    }

    fn same_handle(&self, other: &Self) -> bool {
        match (&self.live_handle, &other.live_handle) {
            (None, None) => true,
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for SessionValue {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.display_name == other.display_name
            && self.counter == other.counter
            && self.same_handle(other)
    }
}

impl Eq for SessionValue {}

impl fmt::Debug for SessionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionValue")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("counter", &self.counter)
            .field("active", &self.is_active())
            .finish()
    }
}
