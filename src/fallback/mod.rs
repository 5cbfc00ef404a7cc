// Local fallback: a file-backed stand-in for the remote backend, used
// when no backend is configured. Same gateway surface, same async
// calling contract.
pub mod auth;
pub mod seed;
pub mod store;

pub use auth::{LocalAuth, DEFAULT_SESSION_HOURS};
pub use store::{LatencyProfile, LocalStore};
