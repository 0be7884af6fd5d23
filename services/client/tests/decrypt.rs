use std::sync::Arc;
use std::time::Duration;

mod common;

use common::CountingSigner;
use scoreboard_client::{
    AuthorizationSession, ClientConfig, ClientError, ContractId, DecryptedValue, Decryptor,
    ErrorKind, Handle, HandleFailure, HandleRequest, ManualClock, MemoryRuntime, MemoryStore,
    RetryPolicy, RuntimeError, ValueType, SECONDS_PER_DAY,
};

const T0: u64 = 1_700_000_000;
const BOARD: ContractId = ContractId([0xb0; 32]);
const OTHER_BOARD: ContractId = ContractId([0xb1; 32]);

type Runtime = Arc<MemoryRuntime<Arc<ManualClock>>>;

struct Harness {
    decryptor: Decryptor<Runtime, MemoryStore, Arc<CountingSigner>, Arc<ManualClock>>,
    runtime: Runtime,
    signer: Arc<CountingSigner>,
    session_clock: Arc<ManualClock>,
    runtime_clock: Arc<ManualClock>,
}

impl Harness {
    fn new(config: ClientConfig) -> Self {
        let signer = Arc::new(CountingSigner::new());
        let session_clock = Arc::new(ManualClock::new(T0));
        let runtime_clock = Arc::new(ManualClock::new(T0));
        let runtime = Arc::new(MemoryRuntime::new(runtime_clock.clone()));
        let session = AuthorizationSession::new(
            MemoryStore::new(),
            signer.clone(),
            session_clock.clone(),
            config.validity_days,
        );
        Self {
            decryptor: Decryptor::new(runtime.clone(), session, config),
            runtime,
            signer,
            session_clock,
            runtime_clock,
        }
    }

    fn me(&self) -> scoreboard_client::Principal {
        self.decryptor.session().principal()
    }
}

fn fast_retry(max_attempts: u32) -> ClientConfig {
    ClientConfig {
        retry: RetryPolicy {
            max_attempts,
            initial_backoff_ms: 10,
            max_backoff_ms: 100,
        },
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn zero_handle_skips_runtime() {
    let h = Harness::new(ClientConfig::default());

    let report = h
        .decryptor
        .decrypt_many(&[
            HandleRequest::u32(Handle::ZERO, BOARD),
            HandleRequest::u32(Handle::ZERO, BOARD),
        ])
        .await
        .unwrap();

    assert_eq!(report.u32(&Handle::ZERO), Some(0));
    assert!(report.is_complete());
    assert_eq!(h.runtime.decrypt_calls(), 0);
    assert_eq!(h.signer.count(), 0);
}

#[tokio::test]
async fn batch_goes_out_in_one_call() {
    let h = Harness::new(ClientConfig::default());
    let max = h.runtime.insert_u32(BOARD, 150, h.me());
    let total = h.runtime.insert_u32(BOARD, 330, h.me());
    let beats_bob = h.runtime.insert_bool(BOARD, true, h.me());
    let elsewhere = h.runtime.insert_u32(OTHER_BOARD, 7, h.me());

    let report = h
        .decryptor
        .decrypt_many(&[
            HandleRequest::u32(max, BOARD),
            HandleRequest::u32(total, BOARD),
            HandleRequest::bool(beats_bob, BOARD),
            HandleRequest::u32(elsewhere, OTHER_BOARD),
            HandleRequest::u32(Handle::ZERO, BOARD),
            HandleRequest::u32(max, BOARD),
        ])
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.u32(&max), Some(150));
    assert_eq!(report.u32(&total), Some(330));
    assert_eq!(report.bool(&beats_bob), Some(true));
    assert_eq!(report.u32(&elsewhere), Some(7));
    assert_eq!(report.u32(&Handle::ZERO), Some(0));
    assert_eq!(h.runtime.decrypt_calls(), 1);
    assert_eq!(h.signer.count(), 1);
}

#[tokio::test]
async fn capability_reused_across_batches() {
    let h = Harness::new(ClientConfig::default());
    let a = h.runtime.insert_u32(BOARD, 1, h.me());
    let b = h.runtime.insert_u32(BOARD, 2, h.me());

    h.decryptor.decrypt_many(&[HandleRequest::u32(a, BOARD)]).await.unwrap();
    h.session_clock.advance(SECONDS_PER_DAY);
    h.runtime_clock.advance(SECONDS_PER_DAY);
    h.decryptor.decrypt_many(&[HandleRequest::u32(b, BOARD)]).await.unwrap();

    assert_eq!(h.signer.count(), 1);
    assert_eq!(h.runtime.decrypt_calls(), 2);
}

#[tokio::test]
async fn partial_failure_keeps_successes() {
    let h = Harness::new(ClientConfig::default());
    let mine = h.runtime.insert_u32(BOARD, 42, h.me());
    let theirs = h.runtime.insert_u32(BOARD, 99, scoreboard_client::Principal([7; 32]));
    let unknown = Handle([0x55; 32]);

    let report = h
        .decryptor
        .decrypt_many(&[
            HandleRequest::u32(mine, BOARD),
            HandleRequest::u32(theirs, BOARD),
            HandleRequest::u32(unknown, BOARD),
        ])
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.u32(&mine), Some(42));
    assert_eq!(
        report.failures.get(&theirs),
        Some(&HandleFailure::Rejected(RuntimeError::AccessDenied(theirs)))
    );
    assert_eq!(
        report.failures.get(&unknown),
        Some(&HandleFailure::Rejected(RuntimeError::UnknownHandle(unknown)))
    );
}

#[tokio::test]
async fn wrong_contract_is_denied() {
    let h = Harness::new(ClientConfig::default());
    let handle = h.runtime.insert_u32(BOARD, 5, h.me());

    let report = h
        .decryptor
        .decrypt_many(&[HandleRequest::u32(handle, OTHER_BOARD)])
        .await
        .unwrap();

    assert_eq!(
        report.failures.get(&handle),
        Some(&HandleFailure::Rejected(RuntimeError::AccessDenied(handle)))
    );
}

#[tokio::test]
async fn same_handle_under_two_contracts_is_refused() {
    let h = Harness::new(ClientConfig::default());
    let shared = h.runtime.insert_u32(BOARD, 5, h.me());
    let other = h.runtime.insert_u32(BOARD, 6, h.me());

    let report = h
        .decryptor
        .decrypt_many(&[
            HandleRequest::u32(shared, BOARD),
            HandleRequest::u32(other, BOARD),
            HandleRequest::u32(shared, OTHER_BOARD),
        ])
        .await
        .unwrap();

    assert_eq!(report.u32(&other), Some(6));
    assert_eq!(report.get(&shared), None);
    assert_eq!(
        report.failures.get(&shared),
        Some(&HandleFailure::ConflictingContracts {
            first: BOARD,
            second: OTHER_BOARD,
        })
    );
    assert_eq!(h.runtime.decrypt_calls(), 1);
}

#[tokio::test]
async fn type_mismatch_reported() {
    let h = Harness::new(ClientConfig::default());
    let flag = h.runtime.insert_bool(BOARD, false, h.me());

    let report = h
        .decryptor
        .decrypt_many(&[HandleRequest::u32(flag, BOARD)])
        .await
        .unwrap();

    assert_eq!(
        report.failures.get(&flag),
        Some(&HandleFailure::TypeMismatch {
            expected: ValueType::U32,
            found: ValueType::Bool,
        })
    );
    assert!(report.values.is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retried() {
    let h = Harness::new(fast_retry(3));
    let handle = h.runtime.insert_u32(BOARD, 10, h.me());
    h.runtime.fail_next(RuntimeError::Unavailable("connection reset".into()));
    h.runtime.fail_next(RuntimeError::Timeout);

    let report = h
        .decryptor
        .decrypt_many(&[HandleRequest::u32(handle, BOARD)])
        .await
        .unwrap();

    assert_eq!(report.get(&handle), Some(DecryptedValue::U32(10)));
    assert_eq!(h.runtime.decrypt_calls(), 3);
    assert_eq!(h.signer.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_are_transient() {
    let h = Harness::new(fast_retry(2));
    let handle = h.runtime.insert_u32(BOARD, 10, h.me());
    for _ in 0..2 {
        h.runtime.fail_next(RuntimeError::Unavailable("down".into()));
    }

    let err = h
        .decryptor
        .decrypt_many(&[HandleRequest::u32(handle, BOARD)])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(err.is_retryable());
    assert!(matches!(err, ClientError::Transient { attempts: 2, .. }));
    assert_eq!(h.runtime.decrypt_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_runtime_times_out() {
    let config = ClientConfig {
        request_timeout_ms: 1_000,
        ..fast_retry(1)
    };
    let h = Harness::new(config);
    let handle = h.runtime.insert_u32(BOARD, 10, h.me());
    h.runtime.set_latency(Duration::from_secs(60));

    let err = h
        .decryptor
        .decrypt_many(&[HandleRequest::u32(handle, BOARD)])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transient {
            source: RuntimeError::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn authorization_failure_not_retried() {
    let h = Harness::new(fast_retry(3));
    let handle = h.runtime.insert_u32(BOARD, 10, h.me());
    h.runtime.fail_next(RuntimeError::InvalidSignature);

    let err = h
        .decryptor
        .decrypt_many(&[HandleRequest::u32(handle, BOARD)])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(err.operation(), Some("user_decrypt"));
    assert_eq!(h.runtime.decrypt_calls(), 1);
}

#[tokio::test]
async fn expired_capability_resigned_transparently() {
    let h = Harness::new(ClientConfig {
        validity_days: 1,
        ..ClientConfig::default()
    });
    let handle = h.runtime.insert_u32(BOARD, 10, h.me());

    h.decryptor.decrypt_many(&[HandleRequest::u32(handle, BOARD)]).await.unwrap();

    // The runtime's clock runs ahead: still valid locally, expired remotely.
    h.session_clock.advance(SECONDS_PER_DAY * 9 / 10);
    h.runtime_clock.advance(SECONDS_PER_DAY * 11 / 10);

    let report = h
        .decryptor
        .decrypt_many(&[HandleRequest::u32(handle, BOARD)])
        .await
        .unwrap();

    assert_eq!(report.u32(&handle), Some(10));
    assert_eq!(h.signer.count(), 2);
    assert_eq!(h.runtime.decrypt_calls(), 3);
}

#[tokio::test]
async fn injected_expiry_resigned_once() {
    let h = Harness::new(ClientConfig::default());
    let handle = h.runtime.insert_u32(BOARD, 10, h.me());
    h.runtime.fail_next(RuntimeError::CapabilityExpired);
    h.runtime.fail_next(RuntimeError::CapabilityExpired);

    let err = h
        .decryptor
        .decrypt_many(&[HandleRequest::u32(handle, BOARD)])
        .await
        .unwrap_err();

    // One recovery attempt, then the rejection surfaces.
    assert!(matches!(
        err,
        ClientError::Rejected {
            source: RuntimeError::CapabilityExpired,
            ..
        }
    ));
    assert_eq!(h.signer.count(), 2);
    assert_eq!(h.runtime.decrypt_calls(), 2);
}
