use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::error::{ClientError, HandleFailure, Result, RuntimeError};
use crate::runtime::{CiphertextRuntime, HandleResults, UserDecryptRequest};
use crate::session::AuthorizationSession;
use crate::signer::AuthorizationSigner;
use crate::store::CapabilityStore;
use crate::types::{ContractId, ContractSet, DecryptedValue, Handle, HandleRequest};

const OPERATION: &str = "user_decrypt";

/// Outcome of a batch: every requested handle lands in exactly one map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecryptReport {
    pub values: BTreeMap<Handle, DecryptedValue>,
    pub failures: BTreeMap<Handle, HandleFailure>,
}

impl DecryptReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn get(&self, handle: &Handle) -> Option<DecryptedValue> {
        self.values.get(handle).copied()
    }

    pub fn u32(&self, handle: &Handle) -> Option<u32> {
        self.get(handle).and_then(|v| v.as_u32())
    }

    pub fn bool(&self, handle: &Handle) -> Option<bool> {
        self.get(handle).and_then(|v| v.as_bool())
    }
}

/// Turns handle lists into plaintext through one batched runtime call,
/// obtaining the capability from the session first.
pub struct Decryptor<R, S, K, C> {
    runtime: R,
    session: AuthorizationSession<S, K, C>,
    config: ClientConfig,
}

impl<R, S, K, C> Decryptor<R, S, K, C>
where
    R: CiphertextRuntime,
    S: CapabilityStore,
    K: AuthorizationSigner,
    C: Clock,
{
    pub fn new(runtime: R, session: AuthorizationSession<S, K, C>, config: ClientConfig) -> Self {
        Self {
            runtime,
            session,
            config,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn session(&self) -> &AuthorizationSession<S, K, C> {
        &self.session
    }

    /// Decrypt `requests`. Zero handles resolve to their type's zero without
    /// a runtime call. Handle-level failures land in the report; only a
    /// rejected or exhausted request fails the whole call.
    pub async fn decrypt_many(&self, requests: &[HandleRequest]) -> Result<DecryptReport> {
        let mut report = DecryptReport::default();
        let mut pending: BTreeMap<Handle, HandleRequest> = BTreeMap::new();
        let mut conflicts: BTreeMap<Handle, ContractId> = BTreeMap::new();

        for request in requests {
            if request.handle.is_zero() {
                report
                    .values
                    .entry(request.handle)
                    .or_insert(DecryptedValue::zero(request.value_type));
                continue;
            }
            match pending.entry(request.handle) {
                Entry::Vacant(slot) => {
                    slot.insert(*request);
                }
                Entry::Occupied(slot) if slot.get().contract != request.contract => {
                    conflicts.entry(request.handle).or_insert(request.contract);
                }
                Entry::Occupied(_) => {}
            }
        }
        // A handle belongs to one contract; ambiguous requests are not sent.
        for (handle, second) in conflicts {
            if let Some(first) = pending.remove(&handle) {
                warn!(%handle, "handle requested under two contracts");
                report.failures.insert(
                    handle,
                    HandleFailure::ConflictingContracts {
                        first: first.contract,
                        second,
                    },
                );
            }
        }
        if pending.is_empty() {
            debug!(requested = requests.len(), "nothing to send to the runtime");
            return Ok(report);
        }

        let contracts: ContractSet = pending.values().map(|r| r.contract).collect();
        let handles: Vec<(Handle, ContractId)> =
            pending.values().map(|r| (r.handle, r.contract)).collect();

        let results = match self.request(&contracts, &handles).await {
            Err(ClientError::Rejected {
                source: RuntimeError::CapabilityExpired,
                ..
            }) => {
                warn!("runtime reports capability expired; re-signing");
                self.session.invalidate(&contracts).await;
                self.request(&contracts, &handles).await?
            }
            other => other?,
        };

        for (handle, result) in results {
            let Some(request) = pending.remove(&handle) else {
                debug!(%handle, "ignoring unrequested handle in runtime response");
                continue;
            };
            match result {
                Ok(value) if value.value_type() == request.value_type => {
                    report.values.insert(handle, value);
                }
                Ok(value) => {
                    report.failures.insert(
                        handle,
                        HandleFailure::TypeMismatch {
                            expected: request.value_type,
                            found: value.value_type(),
                        },
                    );
                }
                Err(error) => {
                    report.failures.insert(handle, HandleFailure::Rejected(error));
                }
            }
        }
        for handle in pending.into_keys() {
            report.failures.insert(handle, HandleFailure::Missing);
        }

        if !report.is_complete() {
            warn!(
                succeeded = report.values.len(),
                failed = report.failures.len(),
                "partial decrypt"
            );
        }
        Ok(report)
    }

    /// One authorized request, retried with backoff on transient failures.
    async fn request(
        &self,
        contracts: &ContractSet,
        handles: &[(Handle, ContractId)],
    ) -> Result<HandleResults> {
        let capability = self.session.load_or_sign(contracts).await?;
        let request = UserDecryptRequest::new(&capability, handles.to_vec());
        drop(capability);

        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match timeout(
                self.config.request_timeout(),
                self.runtime.user_decrypt(&request),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(RuntimeError::Timeout),
            };

            match outcome {
                Ok(results) => return Ok(results),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = policy.backoff(attempt);
                    warn!(attempt, ?delay, %error, "transient runtime failure; retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(ClientError::from_runtime(OPERATION, attempt, error)),
            }
        }
    }
}
