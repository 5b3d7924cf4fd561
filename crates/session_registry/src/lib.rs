//! # Session Registry
//!
//! Keyed, concurrency-safe tracking of participant sessions.
//!
//! - [`SessionValue`] is an immutable snapshot: identity, display name, a weak
//!   reference to the host's live connection, and an accrued counter.
//! - [`SessionRegistry`] stores values by [`SessionId`] and replaces them
//!   atomically with [`SessionRegistry::update`], so concurrent increments on
//!   the same session are never lost and updates on unrelated sessions never
//!   wait on each other's transforms.
//!
//! ```
//! use session_registry::{SessionId, SessionRegistry, SessionValue};
//!
//! let registry = SessionRegistry::new();
//! let id = SessionId::new();
//! registry.add(SessionValue::create(id, "p1", None).unwrap());
//!
//! assert!(registry.update(&id, |v| v.with_increment(1).unwrap()));
//! assert_eq!(registry.get(&id).unwrap().counter(), 1);
//!
//! registry.remove(&id);
//! assert!(registry.get(&id).is_none());
//! ```

pub mod error;
pub mod registry;
pub mod value;

pub use error::SessionError;
pub use registry::{RegistryStats, SessionRegistry};
pub use value::{LiveHandle, SessionId, SessionValue};
