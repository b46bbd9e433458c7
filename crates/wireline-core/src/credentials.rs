//! Credential and session-key material
//!
//! [`Credentials`] hold everything needed to authenticate the logical
//! session: the identity key pair, registration metadata, and the map of
//! session-key records the transport layer rotates during handshakes. The
//! material itself is opaque to this crate; key agreement and wire crypto
//! live in the transport collaborator.

use hashbrown::HashMap;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::AuthError;
use crate::types::{SessionKeyId, Timestamp};

// ----------------------------------------------------------------------------
// Identity Key Pair
// ----------------------------------------------------------------------------

/// Long-term identity key material (Ed25519 signing + X25519 static DH)
///
/// Keys are stored as raw 32-byte arrays so the whole structure serializes
/// with the rest of the credentials; the dalek types are reconstructed on
/// demand by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityKeyPair {
    pub signing_secret: [u8; 32],
    pub signing_public: [u8; 32],
    pub dh_secret: [u8; 32],
    pub dh_public: [u8; 32],
}

impl IdentityKeyPair {
    /// Generate a fresh identity
    pub fn generate() -> Self {
        let signing = ed25519_dalek::SigningKey::generate(&mut OsRng);
        let dh = x25519_dalek::StaticSecret::random_from_rng(OsRng);
        let dh_public = x25519_dalek::PublicKey::from(&dh);

        Self {
            signing_secret: signing.to_bytes(),
            signing_public: signing.verifying_key().to_bytes(),
            dh_secret: dh.to_bytes(),
            dh_public: dh_public.to_bytes(),
        }
    }

    /// SHA-256 fingerprint of the public signing key, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_public);
        hex::encode(hasher.finalize())
    }

    fn is_zeroed(&self) -> bool {
        self.signing_secret == [0u8; 32] || self.signing_public == [0u8; 32]
    }
}

// ----------------------------------------------------------------------------
// Registration Metadata
// ----------------------------------------------------------------------------

/// Metadata assigned when the session was first established
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    /// Non-zero registration id chosen at session creation
    pub registration_id: u32,
    /// Stable device identifier for this client instance
    pub device_id: String,
    pub advertised_name: Option<String>,
}

impl RegistrationInfo {
    /// Generate fresh registration metadata
    pub fn generate() -> Self {
        // Registration ids are 14-bit on the wire; zero is reserved
        let registration_id = (OsRng.next_u32() % 16_380) + 1;
        Self {
            registration_id,
            device_id: uuid::Uuid::new_v4().to_string(),
            advertised_name: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Key Records
// ----------------------------------------------------------------------------

/// One session-key record
///
/// Material is immutable once stored; rotation replaces the whole record and
/// bumps the version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeyRecord {
    pub material: Vec<u8>,
    pub version: u32,
    pub rotated_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Credentials
// ----------------------------------------------------------------------------

/// Durable identity and session-key state for one logical session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub identity: IdentityKeyPair,
    pub registration: RegistrationInfo,
    pub session_keys: HashMap<SessionKeyId, SessionKeyRecord>,
}

impl Credentials {
    /// Create credentials for a brand-new session
    pub fn fresh() -> Self {
        Self {
            identity: IdentityKeyPair::generate(),
            registration: RegistrationInfo::generate(),
            session_keys: HashMap::new(),
        }
    }

    /// Check the material is usable for a handshake
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.identity.is_zeroed() {
            return Err(AuthError::CorruptCredentials {
                reason: "identity key material is zeroed".into(),
            });
        }
        if self.registration.registration_id == 0 {
            return Err(AuthError::CorruptCredentials {
                reason: "registration id is zero".into(),
            });
        }
        if self.registration.device_id.is_empty() {
            return Err(AuthError::CorruptCredentials {
                reason: "device id is empty".into(),
            });
        }
        Ok(())
    }

    /// Replace a session-key record with new material
    ///
    /// Inserts at version 1 when the id is new; otherwise the record is
    /// replaced wholesale with the version bumped. Existing material is never
    /// edited in place.
    pub fn rotate_session_key(&mut self, id: SessionKeyId, material: Vec<u8>) -> u32 {
        let version = self
            .session_keys
            .get(&id)
            .map(|record| record.version + 1)
            .unwrap_or(1);
        self.session_keys.insert(
            id,
            SessionKeyRecord {
                material,
                version,
                rotated_at: Timestamp::now(),
            },
        );
        version
    }

    /// Look up a session-key record
    pub fn session_key(&self, id: &SessionKeyId) -> Option<&SessionKeyRecord> {
        self.session_keys.get(id)
    }

    /// Drop all session keys (explicit logout only)
    pub fn clear_session_keys(&mut self) {
        self.session_keys.clear();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_credentials_are_valid() {
        let creds = Credentials::fresh();
        creds.validate().expect("fresh credentials must validate");
        assert!(creds.registration.registration_id > 0);
        assert!(creds.session_keys.is_empty());
        assert_eq!(creds.identity.fingerprint().len(), 64);
    }

    #[test]
    fn zeroed_identity_fails_validation() {
        let mut creds = Credentials::fresh();
        creds.identity.signing_secret = [0u8; 32];
        assert!(matches!(
            creds.validate(),
            Err(AuthError::CorruptCredentials { .. })
        ));
    }

    #[test]
    fn rotation_replaces_record_and_bumps_version() {
        let mut creds = Credentials::fresh();
        let id = SessionKeyId::new("sender-key-1");

        let v1 = creds.rotate_session_key(id.clone(), vec![1, 2, 3]);
        assert_eq!(v1, 1);
        assert_eq!(creds.session_key(&id).unwrap().material, vec![1, 2, 3]);

        let v2 = creds.rotate_session_key(id.clone(), vec![4, 5, 6]);
        assert_eq!(v2, 2);
        assert_eq!(creds.session_key(&id).unwrap().material, vec![4, 5, 6]);
        assert_eq!(creds.session_keys.len(), 1);
    }

    #[test]
    fn clear_session_keys_empties_the_map() {
        let mut creds = Credentials::fresh();
        creds.rotate_session_key(SessionKeyId::new("a"), vec![1]);
        creds.rotate_session_key(SessionKeyId::new("b"), vec![2]);
        creds.clear_session_keys();
        assert!(creds.session_keys.is_empty());
    }

    #[test]
    fn two_fresh_identities_differ() {
        let a = Credentials::fresh();
        let b = Credentials::fresh();
        assert_ne!(a.identity.signing_public, b.identity.signing_public);
        assert_ne!(a.registration.device_id, b.registration.device_id);
    }
}
