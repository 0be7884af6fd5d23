use std::future::Future;
use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use crate::error::ClientError;
use crate::types::Principal;

/// The account key that authorizes decryption. May live behind a wallet, so
/// signing is async and may fail.
pub trait AuthorizationSigner: Send + Sync {
    fn principal(&self) -> Principal;

    fn sign_authorization(
        &self,
        digest: [u8; 32],
    ) -> impl Future<Output = Result<[u8; 64], ClientError>> + Send;
}

/// In-process ed25519 signer.
pub struct LocalSigner {
    key: SigningKey,
}

impl LocalSigner {
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }
}

impl AuthorizationSigner for LocalSigner {
    fn principal(&self) -> Principal {
        Principal(self.key.verifying_key().to_bytes())
    }

    async fn sign_authorization(&self, digest: [u8; 32]) -> Result<[u8; 64], ClientError> {
        Ok(self.key.sign(&digest).to_bytes())
    }
}

impl<K: AuthorizationSigner> AuthorizationSigner for Arc<K> {
    fn principal(&self) -> Principal {
        (**self).principal()
    }

    fn sign_authorization(
        &self,
        digest: [u8; 32],
    ) -> impl Future<Output = Result<[u8; 64], ClientError>> + Send {
        (**self).sign_authorization(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::verify;

    #[tokio::test]
    async fn signature_verifies_under_principal() {
        let signer = LocalSigner::generate();
        let digest = [3u8; 32];
        let signature = signer.sign_authorization(digest).await.unwrap();
        assert!(verify(&signer.principal().0, &digest, &signature).is_ok());
    }

    #[test]
    fn principal_is_stable_for_a_secret() {
        let a = LocalSigner::from_bytes(&[4; 32]);
        let b = LocalSigner::from_bytes(&[4; 32]);
        assert_eq!(a.principal(), b.principal());
    }
}
