use sha2::{Digest, Sha256};

use crate::capability::AuthorizationMessage;
use crate::types::{ContractId, ContractSet, Handle, Principal};

const AUTHORIZATION_DOMAIN: &[u8] = b"scoreboard.user-decrypt.v1";
const REQUEST_DOMAIN: &[u8] = b"scoreboard.decrypt-request.v1";

/// Cache key for a signer's capability over a contract set.
pub fn cache_key(signer: &Principal, contracts: &ContractSet) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signer.0);
    for contract in contracts {
        hasher.update(contract.0);
    }
    hex::encode(hasher.finalize())
}

/// Digest the signer signs to issue a capability.
pub fn authorization_digest(message: &AuthorizationMessage) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(AUTHORIZATION_DOMAIN);
    hasher.update(message.public_key);
    hasher.update((message.contracts.len() as u32).to_le_bytes());
    for contract in &message.contracts {
        hasher.update(contract.0);
    }
    hasher.update(message.issued_at.to_le_bytes());
    hasher.update(message.validity_days.to_le_bytes());
    hasher.finalize().into()
}

/// Digest the ephemeral key signs for one decrypt request.
pub fn request_digest(authorization: &[u8; 32], handles: &[(Handle, ContractId)]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(REQUEST_DOMAIN);
    hasher.update(authorization);
    hasher.update((handles.len() as u32).to_le_bytes());
    for (handle, contract) in handles {
        hasher.update(handle.0);
        hasher.update(contract.0);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contracts(ids: &[u8]) -> ContractSet {
        ids.iter().map(|&b| ContractId([b; 32])).collect()
    }

    fn message(contracts: ContractSet) -> AuthorizationMessage {
        AuthorizationMessage {
            public_key: [7; 32],
            contracts,
            issued_at: 1_000,
            validity_days: 1,
        }
    }

    #[test]
    fn cache_key_ignores_insertion_order() {
        let signer = Principal([1; 32]);
        let a: ContractSet = [ContractId([2; 32]), ContractId([3; 32])].into();
        let b: ContractSet = [ContractId([3; 32]), ContractId([2; 32])].into();
        assert_eq!(cache_key(&signer, &a), cache_key(&signer, &b));
    }

    #[test]
    fn cache_key_separates_signers_and_scopes() {
        let alice = Principal([1; 32]);
        let bob = Principal([2; 32]);
        assert_ne!(
            cache_key(&alice, &contracts(&[9])),
            cache_key(&bob, &contracts(&[9]))
        );
        assert_ne!(
            cache_key(&alice, &contracts(&[9])),
            cache_key(&alice, &contracts(&[9, 10]))
        );
    }

    #[test]
    fn authorization_digest_binds_every_field() {
        let base = message(contracts(&[9]));
        let digest = authorization_digest(&base);

        let mut other = base.clone();
        other.issued_at += 1;
        assert_ne!(authorization_digest(&other), digest);

        let mut other = base.clone();
        other.validity_days = 2;
        assert_ne!(authorization_digest(&other), digest);

        let mut other = base.clone();
        other.public_key = [8; 32];
        assert_ne!(authorization_digest(&other), digest);

        assert_ne!(authorization_digest(&message(contracts(&[9, 10]))), digest);
    }

    #[test]
    fn request_digest_binds_handles() {
        let auth = [5; 32];
        let c = ContractId([9; 32]);
        let one = request_digest(&auth, &[(Handle([1; 32]), c)]);
        let two = request_digest(&auth, &[(Handle([2; 32]), c)]);
        assert_ne!(one, two);
        assert_ne!(one, request_digest(&[6; 32], &[(Handle([1; 32]), c)]));
    }
}
