//! Message moderation: mute checks, banned-word rules and profile verification

pub mod gate;
pub mod verifier;

pub use gate::{BlockReason, Decision, ModerationGate};
pub use verifier::{AcceptAllVerifier, IdentityVerifier};
