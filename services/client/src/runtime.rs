use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::capability::{self, AuthorizationMessage, DecryptionCapability};
use crate::clock::Clock;
use crate::error::RuntimeError;
use crate::hash;
use crate::types::{ContractId, DecryptedValue, EncryptedInput, Handle, Principal};

/// Per-handle outcomes of one decrypt request, in request order.
pub type HandleResults = Vec<(Handle, Result<DecryptedValue, RuntimeError>)>;

/// One batched decrypt request. Carries the public half of a capability and
/// a request signature made with its ephemeral key; never the key itself.
#[derive(Clone, Debug)]
pub struct UserDecryptRequest {
    pub signer: Principal,
    pub authorization: AuthorizationMessage,
    pub signature: [u8; 64],
    pub handles: Vec<(Handle, ContractId)>,
    pub request_signature: [u8; 64],
}

impl UserDecryptRequest {
    pub fn new(capability: &DecryptionCapability, handles: Vec<(Handle, ContractId)>) -> Self {
        let request_signature = capability.sign_request(&handles);
        Self {
            signer: capability.signer,
            authorization: capability.message.clone(),
            signature: capability.signature,
            handles,
            request_signature,
        }
    }
}

/// Client-side view of the ciphertext runtime.
pub trait CiphertextRuntime: Send + Sync {
    /// Encrypt a score for `owner` to submit to `contract`.
    fn encrypt_u32(
        &self,
        value: u32,
        owner: Principal,
        contract: ContractId,
    ) -> impl Future<Output = Result<EncryptedInput, RuntimeError>> + Send;

    /// Decrypt a batch. An `Err` rejects the whole request; per-handle
    /// failures are reported inside the results.
    fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> impl Future<Output = Result<HandleResults, RuntimeError>> + Send;
}

// ── In-process runtime ──────────────────────────────────────

struct Entry {
    contract: ContractId,
    value: DecryptedValue,
}

#[derive(Default)]
struct State {
    values: HashMap<Handle, Entry>,
    acl: HashSet<(Handle, Principal)>,
    nonce: u64,
    faults: VecDeque<RuntimeError>,
}

impl State {
    fn insert(&mut self, contract: ContractId, value: DecryptedValue) -> Handle {
        let mut hasher = Sha256::new();
        hasher.update(b"scoreboard.memory-runtime");
        hasher.update(contract.0);
        hasher.update(self.nonce.to_le_bytes());
        self.nonce += 1;
        let handle = Handle(hasher.finalize().into());
        self.values.insert(handle, Entry { contract, value });
        handle
    }
}

/// Runtime that keeps cleartext in memory and enforces the same checks a
/// real one does: authorization signature, request signature, expiry,
/// contract scope and per-handle ACLs.
pub struct MemoryRuntime<C> {
    clock: C,
    state: Mutex<State>,
    decrypt_calls: AtomicUsize,
    latency_ms: AtomicU64,
}

impl<C: Clock> MemoryRuntime<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: Mutex::new(State::default()),
            decrypt_calls: AtomicUsize::new(0),
            latency_ms: AtomicU64::new(0),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain maps behind; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `value` as produced by `contract`, decryptable by `reader`.
    pub fn insert_u32(&self, contract: ContractId, value: u32, reader: Principal) -> Handle {
        let mut state = self.state();
        let handle = state.insert(contract, DecryptedValue::U32(value));
        state.acl.insert((handle, reader));
        handle
    }

    pub fn insert_bool(&self, contract: ContractId, value: bool, reader: Principal) -> Handle {
        let mut state = self.state();
        let handle = state.insert(contract, DecryptedValue::Bool(value));
        state.acl.insert((handle, reader));
        handle
    }

    pub fn allow(&self, handle: Handle, account: Principal) {
        self.state().acl.insert((handle, account));
    }

    /// Number of `user_decrypt` calls received, failed ones included.
    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    /// Fail the next `user_decrypt` call with `error`. Queued faults are
    /// consumed in order.
    pub fn fail_next(&self, error: RuntimeError) {
        self.state().faults.push_back(error);
    }

    /// Delay every `user_decrypt` response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    fn check(&self, request: &UserDecryptRequest) -> Result<(), RuntimeError> {
        capability::verify(
            &request.signer.0,
            &request.authorization.digest(),
            &request.signature,
        )?;
        let digest = hash::request_digest(&request.authorization.digest(), &request.handles);
        capability::verify(
            &request.authorization.public_key,
            &digest,
            &request.request_signature,
        )?;

        if self.clock.now() > request.authorization.expires_at() {
            return Err(RuntimeError::CapabilityExpired);
        }
        for (_, contract) in &request.handles {
            if !request.authorization.contracts.contains(contract) {
                return Err(RuntimeError::ContractNotAuthorized(*contract));
            }
        }
        Ok(())
    }

    fn resolve(&self, request: &UserDecryptRequest) -> HandleResults {
        let state = self.state();
        request
            .handles
            .iter()
            .map(|&(handle, contract)| {
                let result = match state.values.get(&handle) {
                    None => Err(RuntimeError::UnknownHandle(handle)),
                    Some(entry)
                        if entry.contract != contract
                            || !state.acl.contains(&(handle, request.signer)) =>
                    {
                        Err(RuntimeError::AccessDenied(handle))
                    }
                    Some(entry) => Ok(entry.value),
                };
                (handle, result)
            })
            .collect()
    }
}

impl<C: Clock> CiphertextRuntime for MemoryRuntime<C> {
    async fn encrypt_u32(
        &self,
        value: u32,
        owner: Principal,
        contract: ContractId,
    ) -> Result<EncryptedInput, RuntimeError> {
        let handle = self.state().insert(contract, DecryptedValue::U32(value));

        let mut hasher = Sha256::new();
        hasher.update(b"scoreboard.input-proof");
        hasher.update(owner.0);
        hasher.update(contract.0);
        hasher.update(handle.0);
        let proof = hasher.finalize().to_vec();

        Ok(EncryptedInput { handle, proof })
    }

    async fn user_decrypt(&self, request: &UserDecryptRequest) -> Result<HandleResults, RuntimeError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let fault = self.state().faults.pop_front();
        if let Some(error) = fault {
            debug!(%error, "injected runtime fault");
            return Err(error);
        }

        self.check(request)?;
        Ok(self.resolve(request))
    }
}

impl<R: CiphertextRuntime> CiphertextRuntime for std::sync::Arc<R> {
    fn encrypt_u32(
        &self,
        value: u32,
        owner: Principal,
        contract: ContractId,
    ) -> impl Future<Output = Result<EncryptedInput, RuntimeError>> + Send {
        (**self).encrypt_u32(value, owner, contract)
    }

    fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> impl Future<Output = Result<HandleResults, RuntimeError>> + Send {
        (**self).user_decrypt(request)
    }
}
