use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::RuntimeError;
use crate::hash;
use crate::types::{hex_bytes, ContractId, ContractSet, Handle, Principal, SECONDS_PER_DAY};

/// What the signer authorizes: decryption through `public_key` for handles
/// of `contracts`, for `validity_days` from `issued_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationMessage {
    #[serde(with = "hex_bytes")]
    pub public_key: [u8; 32],
    pub contracts: ContractSet,
    pub issued_at: u64,
    pub validity_days: u32,
}

impl AuthorizationMessage {
    pub fn digest(&self) -> [u8; 32] {
        hash::authorization_digest(self)
    }

    /// Last second (inclusive) at which the capability is valid.
    pub fn expires_at(&self) -> u64 {
        self.issued_at
            .saturating_add(u64::from(self.validity_days) * SECONDS_PER_DAY)
    }
}

/// Signed, time-bounded, contract-scoped grant to decrypt.
///
/// Holds the ephemeral private key, which is wiped on drop and never leaves
/// the client: requests carry only the public half plus a signature made
/// with it.
#[derive(Clone, Serialize, Deserialize)]
pub struct DecryptionCapability {
    pub signer: Principal,
    pub message: AuthorizationMessage,
    #[serde(with = "hex_bytes")]
    pub signature: [u8; 64],
    #[serde(with = "hex_bytes")]
    private_key: [u8; 32],
}

impl DecryptionCapability {
    pub(crate) fn new(
        signer: Principal,
        message: AuthorizationMessage,
        signature: [u8; 64],
        ephemeral: &SigningKey,
    ) -> Self {
        Self {
            signer,
            message,
            signature,
            private_key: ephemeral.to_bytes(),
        }
    }

    pub fn contracts(&self) -> &ContractSet {
        &self.message.contracts
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now <= self.message.expires_at()
    }

    pub fn covers(&self, required: &ContractSet) -> bool {
        required.is_subset(&self.message.contracts)
    }

    /// Checks the signer's signature over the authorization message.
    pub fn verify_signature(&self) -> Result<(), RuntimeError> {
        verify(&self.signer.0, &self.message.digest(), &self.signature)
    }

    /// Ephemeral-key signature over one decrypt request.
    pub(crate) fn sign_request(&self, handles: &[(Handle, ContractId)]) -> [u8; 64] {
        let key = SigningKey::from_bytes(&self.private_key);
        let digest = hash::request_digest(&self.message.digest(), handles);
        key.sign(&digest).to_bytes()
    }
}

impl Drop for DecryptionCapability {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl fmt::Debug for DecryptionCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionCapability")
            .field("signer", &self.signer)
            .field("contracts", &self.message.contracts.len())
            .field("issued_at", &self.message.issued_at)
            .field("validity_days", &self.message.validity_days)
            .finish_non_exhaustive()
    }
}

/// Strict ed25519 verification of `signature` by `public_key` over `digest`.
pub fn verify(public_key: &[u8; 32], digest: &[u8; 32], signature: &[u8; 64]) -> Result<(), RuntimeError> {
    let key = VerifyingKey::from_bytes(public_key).map_err(|_| RuntimeError::InvalidSignature)?;
    let signature = Signature::from_bytes(signature);
    key.verify_strict(digest, &signature)
        .map_err(|_| RuntimeError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn issue(signer: &SigningKey, issued_at: u64, validity_days: u32) -> DecryptionCapability {
        let ephemeral = SigningKey::generate(&mut OsRng);
        let message = AuthorizationMessage {
            public_key: ephemeral.verifying_key().to_bytes(),
            contracts: [ContractId([9; 32])].into(),
            issued_at,
            validity_days,
        };
        let signature = signer.sign(&message.digest()).to_bytes();
        DecryptionCapability::new(
            Principal(signer.verifying_key().to_bytes()),
            message,
            signature,
            &ephemeral,
        )
    }

    #[test]
    fn expiry_is_inclusive() {
        let signer = SigningKey::generate(&mut OsRng);
        let cap = issue(&signer, 1_000, 1);
        assert!(cap.is_valid_at(1_000 + SECONDS_PER_DAY));
        assert!(!cap.is_valid_at(1_000 + SECONDS_PER_DAY + 1));
    }

    #[test]
    fn scope_is_a_superset_check() {
        let signer = SigningKey::generate(&mut OsRng);
        let cap = issue(&signer, 0, 1);
        assert!(cap.covers(&ContractSet::new()));
        assert!(cap.covers(&[ContractId([9; 32])].into()));
        assert!(!cap.covers(&[ContractId([9; 32]), ContractId([1; 32])].into()));
    }

    #[test]
    fn signature_survives_serde() {
        let signer = SigningKey::generate(&mut OsRng);
        let cap = issue(&signer, 0, 365);
        let json = serde_json::to_string(&cap).unwrap();
        let back: DecryptionCapability = serde_json::from_str(&json).unwrap();
        assert!(back.verify_signature().is_ok());
        assert_eq!(back.message, cap.message);
    }

    #[test]
    fn tampered_message_fails_verification() {
        let signer = SigningKey::generate(&mut OsRng);
        let mut cap = issue(&signer, 0, 1);
        cap.message.validity_days = 365;
        assert_eq!(cap.verify_signature(), Err(RuntimeError::InvalidSignature));
    }

    #[test]
    fn request_signature_uses_ephemeral_key() {
        let signer = SigningKey::generate(&mut OsRng);
        let cap = issue(&signer, 0, 1);
        let handles = [(Handle([1; 32]), ContractId([9; 32]))];
        let sig = cap.sign_request(&handles);
        let digest = hash::request_digest(&cap.message.digest(), &handles);
        assert!(verify(&cap.message.public_key, &digest, &sig).is_ok());
        assert!(verify(&cap.signer.0, &digest, &sig).is_err());
    }

    #[test]
    fn debug_hides_key_material() {
        let signer = SigningKey::generate(&mut OsRng);
        let cap = issue(&signer, 0, 1);
        let rendered = format!("{cap:?}");
        assert!(!rendered.contains("private_key"));
        assert!(!rendered.contains("signature"));
    }
}
