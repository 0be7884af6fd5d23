//! Submit a few games against the in-process runtime, then decrypt the
//! resulting handles in one batch.
//!
//!   RUST_LOG=scoreboard_client=debug cargo run -p scoreboard-client --example local_decrypt

use std::sync::Arc;

use anyhow::Context;
use scoreboard_client::{
    prepare_submission, AuthorizationSession, AuthorizationSigner, ClientConfig, ContractId,
    Decryptor, GameResult, HandleRequest, LocalSigner, MemoryRuntime, MemoryStore, SystemClock,
};
use tracing_subscriber::EnvFilter;

const BOARD: ContractId = ContractId([0x5c; 32]);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::from_env().context("loading client config")?;
    let signer = LocalSigner::generate();
    let me = signer.principal();
    let runtime = Arc::new(MemoryRuntime::new(SystemClock));

    // The ledger would fold these; here the runtime just holds the inputs.
    let mut handles = Vec::new();
    for (score, duration_secs) in [(100, 30), (150, 45), (80, 12)] {
        let submission = prepare_submission(&runtime, BOARD, me, GameResult { score, duration_secs })
            .await
            .context("preparing submission")?;
        runtime.allow(submission.ciphertext, me);
        handles.push(HandleRequest::u32(submission.ciphertext, BOARD));
    }

    match prepare_submission(&runtime, BOARD, me, GameResult { score: 999, duration_secs: 3 }).await {
        Ok(_) => anyhow::bail!("short game should have been refused"),
        Err(e) => tracing::info!(error = %e, kind = ?e.kind(), "refused locally"),
    }

    let session = AuthorizationSession::new(MemoryStore::new(), signer, SystemClock, config.validity_days);
    let decryptor = Decryptor::new(runtime.clone(), session, config);

    let report = decryptor.decrypt_many(&handles).await?;
    for request in &handles {
        println!("{} = {:?}", request.handle, report.get(&request.handle));
    }
    println!("runtime calls: {}", decryptor.runtime().decrypt_calls());
    Ok(())
}
