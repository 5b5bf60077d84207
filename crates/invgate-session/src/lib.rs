//! Session state machine for the invgate client.
//!
//! [`Session`] owns the token and the user derived from it, coordinates the
//! [`AuthBackend`](invgate_core::backend::AuthBackend) calls with the
//! [`SessionStore`](invgate_core::store::SessionStore), and publishes every
//! state change on a `watch` channel. [`RouteGuard`] turns a
//! [`SessionView`] into a render/redirect decision.

pub mod error;
pub mod guard;
pub mod memory;
pub mod session;

pub use error::{Result, SessionError};
pub use guard::{GuardDecision, RouteGuard};
pub use memory::MemoryStore;
pub use session::{Identity, LoadingState, Rehydration, Session, SessionView};
