//! Client side of the encrypted scoreboard: decryption capabilities, batched
//! decryption, score submission and leaderboard ranking.

pub mod capability;
pub mod clock;
pub mod config;
pub mod decrypt;
pub mod error;
pub mod hash;
pub mod ranking;
pub mod runtime;
pub mod session;
pub mod signer;
pub mod store;
pub mod submission;
pub mod types;

pub use capability::{AuthorizationMessage, DecryptionCapability};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, RetryPolicy};
pub use decrypt::{DecryptReport, Decryptor};
pub use error::{ClientError, ConfigError, ErrorKind, HandleFailure, RuntimeError, StoreError};
pub use ranking::{rank_players, PlayerSummary, RankedEntry, Standing};
pub use runtime::{CiphertextRuntime, HandleResults, MemoryRuntime, UserDecryptRequest};
pub use session::AuthorizationSession;
pub use signer::{AuthorizationSigner, LocalSigner};
pub use store::{CapabilityStore, FileStore, MemoryStore};
pub use submission::{prepare_submission, Submission};
pub use types::*;
