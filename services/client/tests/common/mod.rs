use std::sync::atomic::{AtomicUsize, Ordering};

use scoreboard_client::{AuthorizationSigner, ClientError, LocalSigner, Principal};

/// Counts signatures so tests can tell a cache hit from a re-sign.
pub struct CountingSigner {
    inner: LocalSigner,
    signed: AtomicUsize,
}

impl CountingSigner {
    pub fn new() -> Self {
        Self {
            inner: LocalSigner::generate(),
            signed: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

impl AuthorizationSigner for CountingSigner {
    fn principal(&self) -> Principal {
        self.inner.principal()
    }

    async fn sign_authorization(&self, digest: [u8; 32]) -> Result<[u8; 64], ClientError> {
        self.signed.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.inner.sign_authorization(digest).await
    }
}
