//! Authentication: credential storage and bearer-token signing.
//!
//! Provides:
//! - Password hashing with iterated SHA-256 (100k rounds + per-user salt)
//! - Stateless HMAC-SHA256 signed tokens (no server-side session table;
//!   the claim itself is the session, expiry optional by configuration)
//! - Constant-time comparisons on every secret check

pub mod credentials;
pub mod token;

pub use credentials::{CredentialStore, NewUser, UserRecord};
pub use token::{Claim, TokenSigner};
