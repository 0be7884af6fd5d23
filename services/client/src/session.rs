use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::capability::{AuthorizationMessage, DecryptionCapability};
use crate::clock::Clock;
use crate::error::Result;
use crate::hash;
use crate::signer::AuthorizationSigner;
use crate::store::CapabilityStore;
use crate::types::{ContractSet, Principal};

/// Issues and caches decryption capabilities for one signer.
///
/// Lookup and issuance are serialized, so concurrent callers needing the
/// same contract set share one signature.
pub struct AuthorizationSession<S, K, C> {
    store: S,
    signer: K,
    clock: C,
    validity_days: u32,
    lock: Mutex<()>,
}

impl<S, K, C> AuthorizationSession<S, K, C>
where
    S: CapabilityStore,
    K: AuthorizationSigner,
    C: Clock,
{
    pub fn new(store: S, signer: K, clock: C, validity_days: u32) -> Self {
        Self {
            store,
            signer,
            clock,
            validity_days,
            lock: Mutex::new(()),
        }
    }

    pub fn principal(&self) -> Principal {
        self.signer.principal()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// A capability covering `contracts` that is valid now: the cached one
    /// if it still qualifies, otherwise a freshly signed one.
    pub async fn load_or_sign(&self, contracts: &ContractSet) -> Result<DecryptionCapability> {
        let _guard = self.lock.lock().await;

        let principal = self.signer.principal();
        let key = hash::cache_key(&principal, contracts);
        let now = self.clock.now();

        if let Some(cached) = self.cached(&key) {
            if cached.signer == principal && cached.is_valid_at(now) && cached.covers(contracts) {
                debug!(%principal, contracts = contracts.len(), "capability cache hit");
                return Ok(cached);
            }
            debug!(
                %principal,
                expires_at = cached.message.expires_at(),
                now,
                "cached capability no longer usable"
            );
        }

        let capability = self.issue(principal, contracts, now).await?;
        match serde_json::to_string(&capability) {
            Ok(entry) => {
                if let Err(e) = self.store.set(&key, entry) {
                    warn!(error = %e, "failed to persist capability; continuing uncached");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode capability"),
        }
        Ok(capability)
    }

    /// Drop the cached capability for `contracts`, e.g. after the runtime
    /// refused it.
    pub async fn invalidate(&self, contracts: &ContractSet) {
        let _guard = self.lock.lock().await;
        let key = hash::cache_key(&self.signer.principal(), contracts);
        match self.store.remove(&key) {
            Ok(()) => debug!(contracts = contracts.len(), "evicted cached capability"),
            Err(e) => warn!(error = %e, "failed to evict cached capability"),
        }
    }

    fn cached(&self, key: &str) -> Option<DecryptionCapability> {
        let entry = match self.store.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("capability cache miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "capability store read failed; treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&entry) {
            Ok(capability) => Some(capability),
            Err(e) => {
                warn!(error = %e, "corrupt capability entry; treating as miss");
                None
            }
        }
    }

    async fn issue(
        &self,
        principal: Principal,
        contracts: &ContractSet,
        now: u64,
    ) -> Result<DecryptionCapability> {
        let ephemeral = SigningKey::generate(&mut OsRng);
        let message = AuthorizationMessage {
            public_key: ephemeral.verifying_key().to_bytes(),
            contracts: contracts.clone(),
            issued_at: now,
            validity_days: self.validity_days,
        };
        let signature = self.signer.sign_authorization(message.digest()).await?;
        info!(
            %principal,
            contracts = contracts.len(),
            issued_at = now,
            validity_days = self.validity_days,
            "issued decryption capability"
        );
        Ok(DecryptionCapability::new(principal, message, signature, &ephemeral))
    }
}
