//! Optional upstream check of a participant's claimed profile

use crate::core::message::ChatUser;

/// Verifies that a chat participant's profile is genuine
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, user: &ChatUser) -> bool;
}

/// Verifier that trusts every profile
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllVerifier;

impl IdentityVerifier for AcceptAllVerifier {
    fn verify(&self, _user: &ChatUser) -> bool {
        true
    }
}
