//! Access gate abstraction.
//!
//! Front ends ask an [`AccessGate`] whether a user-supplied credential is
//! acceptable before letting the session ask questions. How the credential
//! is verified is up to the implementation.

/// Verifies credentials typed by a user.
pub trait AccessGate: Send + Sync {
    fn verify(&self, attempt: &str) -> bool;

    /// True when every attempt is accepted (no credential configured).
    fn is_open(&self) -> bool {
        false
    }
}

/// Gate that admits everyone.
pub struct OpenGate;

impl AccessGate for OpenGate {
    fn verify(&self, _attempt: &str) -> bool {
        true
    }

    fn is_open(&self) -> bool {
        true
    }
}
