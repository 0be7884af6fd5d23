use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Shortest game, in seconds, the ledger accepts. Checked locally too so a
/// doomed submission never reaches the runtime.
pub const MIN_GAME_DURATION_SECS: u32 = 10;

pub const SECONDS_PER_DAY: u64 = 86_400;

// ── Identifiers ─────────────────────────────────────────────

macro_rules! byte_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(#[serde(with = "hex_bytes")] pub [u8; 32]);

        impl $name {
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}..)", stringify!($name), &self.to_hex()[..12])
            }
        }
    };
}

byte_id!(
    /// A signer, identified by its ed25519 public key.
    Principal
);

byte_id!(
    /// Ledger contract id.
    ContractId
);

byte_id!(
    /// Opaque ciphertext reference.
    Handle
);

impl Handle {
    /// "No value yet", e.g. the aggregates of a player with no games.
    pub const ZERO: Handle = Handle([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

/// Contracts a capability is scoped to. Ordered, so hashing it is stable.
pub type ContractSet = BTreeSet<ContractId>;

// ── Values ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    U32,
    Bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecryptedValue {
    U32(u32),
    Bool(bool),
}

impl DecryptedValue {
    /// What the zero handle decrypts to.
    pub fn zero(value_type: ValueType) -> Self {
        match value_type {
            ValueType::U32 => Self::U32(0),
            ValueType::Bool => Self::Bool(false),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Self::U32(_) => ValueType::U32,
            Self::Bool(_) => ValueType::Bool,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::U32(v) => Some(v),
            Self::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            Self::U32(_) => None,
        }
    }
}

/// One handle to decrypt, with the contract it was produced by and the type
/// the caller expects back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleRequest {
    pub handle: Handle,
    pub contract: ContractId,
    pub value_type: ValueType,
}

impl HandleRequest {
    pub fn u32(handle: Handle, contract: ContractId) -> Self {
        Self {
            handle,
            contract,
            value_type: ValueType::U32,
        }
    }

    pub fn bool(handle: Handle, contract: ContractId) -> Self {
        Self {
            handle,
            contract,
            value_type: ValueType::Bool,
        }
    }
}

// ── Games ───────────────────────────────────────────────────

/// Outcome of a finished game, as reported by the game engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub score: u32,
    pub duration_secs: u32,
}

/// Runtime input: ciphertext handle plus the proof binding it to its owner
/// and target contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handle: Handle,
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
}

// ── Serde helpers ───────────────────────────────────────────

/// Fixed-size byte arrays as hex strings.
pub(crate) mod hex_bytes {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; N];
        hex::decode_to_slice(&s, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_serializes_as_hex() {
        let handle = Handle([0xab; 32]);
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        assert_eq!(serde_json::from_str::<Handle>(&json).unwrap(), handle);
    }

    #[test]
    fn short_hex_rejected() {
        assert!(serde_json::from_str::<Handle>("\"abcd\"").is_err());
    }

    #[test]
    fn zero_defaults_by_type() {
        assert!(Handle::ZERO.is_zero());
        assert_eq!(DecryptedValue::zero(ValueType::U32), DecryptedValue::U32(0));
        assert_eq!(
            DecryptedValue::zero(ValueType::Bool),
            DecryptedValue::Bool(false)
        );
    }
}
