use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::runtime::CiphertextRuntime;
use crate::types::{ContractId, GameResult, Handle, Principal, MIN_GAME_DURATION_SECS};

/// Arguments for the ledger's `submit_score`, ready to send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub contract: ContractId,
    pub player: Principal,
    pub ciphertext: Handle,
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    pub duration_secs: u32,
}

/// Encrypt a finished game's score for `owner` to submit to `contract`.
/// Games shorter than the ledger minimum are refused without contacting
/// the runtime.
pub async fn prepare_submission<R: CiphertextRuntime>(
    runtime: &R,
    contract: ContractId,
    owner: Principal,
    result: GameResult,
) -> Result<Submission> {
    if result.duration_secs < MIN_GAME_DURATION_SECS {
        return Err(ClientError::GameTooShort {
            duration_secs: result.duration_secs,
            minimum: MIN_GAME_DURATION_SECS,
        });
    }

    let input = runtime
        .encrypt_u32(result.score, owner, contract)
        .await
        .map_err(|e| ClientError::from_runtime("encrypt_input", 1, e))?;
    debug!(%owner, handle = %input.handle, duration = result.duration_secs, "prepared submission");

    Ok(Submission {
        contract,
        player: owner,
        ciphertext: input.handle,
        proof: input.proof,
        duration_secs: result.duration_secs,
    })
}
