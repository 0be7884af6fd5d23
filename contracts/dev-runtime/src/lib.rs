#![no_std]

//! Development ciphertext runtime.
//!
//! Implements the runtime surface the scoreboard ledger consumes (input
//! verification, add, max, greater-than, per-handle ACLs) over cleartext kept
//! behind opaque 32-byte handles. Only for local networks and tests: the input
//! proof carries the cleartext.

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, xdr::ToXdr, Address, Bytes, BytesN, Env,
};

// ── Storage types ────────────────────────────────────────────────────────────

#[contracttype]
#[derive(Clone)]
pub struct AclKey {
    pub handle: BytesN<32>,
    pub account: Address,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Nonce,
    Value(BytesN<32>),
    Acl(AclKey),
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Plaintext {
    U32(u32),
    Bool(bool),
}

/// Input produced for `(owner, contract)`; only `verify_input` from that
/// contract on behalf of that owner accepts it.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncryptedInput {
    pub handle: BytesN<32>,
    pub proof: Bytes,
}

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    InvalidInputProof = 1,
    HandleNotFound = 2,
    AccessDenied = 3,
    TypeMismatch = 4,
}

// ── Encodings ────────────────────────────────────────────────────────────────
// Input proof: 36 bytes = value (u32 LE) ‖ nonce (32 bytes).
// Input handle: SHA-256("fhe-dev/input" ‖ xdr(contract) ‖ xdr(owner) ‖ value LE ‖ nonce).
// Result handle: SHA-256(op tag ‖ lhs ‖ rhs ‖ counter LE).

const PROOF_SIZE: u32 = 36;
const INPUT_DOMAIN: &[u8] = b"fhe-dev/input";

pub fn is_sentinel(handle: &BytesN<32>) -> bool {
    handle.to_array() == [0u8; 32]
}

fn input_handle(
    env: &Env,
    value: u32,
    nonce: &BytesN<32>,
    owner: &Address,
    contract: &Address,
) -> BytesN<32> {
    let mut buf = Bytes::from_slice(env, INPUT_DOMAIN);
    buf.append(&contract.clone().to_xdr(env));
    buf.append(&owner.clone().to_xdr(env));
    buf.extend_from_array(&value.to_le_bytes());
    buf.append(&Bytes::from(nonce.clone()));
    env.crypto().sha256(&buf).to_bytes()
}

fn next_nonce(env: &Env) -> u64 {
    let nonce: u64 = env.storage().instance().get(&DataKey::Nonce).unwrap_or(0);
    env.storage().instance().set(&DataKey::Nonce, &(nonce + 1));
    nonce
}

fn has_access(env: &Env, handle: &BytesN<32>, account: &Address) -> bool {
    env.storage().persistent().has(&DataKey::Acl(AclKey {
        handle: handle.clone(),
        account: account.clone(),
    }))
}

fn grant(env: &Env, handle: &BytesN<32>, account: &Address) {
    env.storage().persistent().set(
        &DataKey::Acl(AclKey {
            handle: handle.clone(),
            account: account.clone(),
        }),
        &true,
    );
}

fn load(env: &Env, handle: &BytesN<32>) -> Result<Plaintext, Error> {
    env.storage()
        .persistent()
        .get(&DataKey::Value(handle.clone()))
        .ok_or(Error::HandleNotFound)
}

/// Operand read on behalf of `contract`. The zero handle reads as 0.
fn read_u32(env: &Env, contract: &Address, handle: &BytesN<32>) -> Result<u32, Error> {
    if is_sentinel(handle) {
        return Ok(0);
    }
    if !has_access(env, handle, contract) {
        return Err(Error::AccessDenied);
    }
    match load(env, handle)? {
        Plaintext::U32(value) => Ok(value),
        Plaintext::Bool(_) => Err(Error::TypeMismatch),
    }
}

fn store_result(
    env: &Env,
    tag: &[u8],
    lhs: &BytesN<32>,
    rhs: &BytesN<32>,
    value: Plaintext,
    contract: &Address,
) -> BytesN<32> {
    let mut buf = Bytes::from_slice(env, tag);
    buf.append(&Bytes::from(lhs.clone()));
    buf.append(&Bytes::from(rhs.clone()));
    buf.extend_from_array(&next_nonce(env).to_le_bytes());
    let handle = env.crypto().sha256(&buf).to_bytes();

    env.storage()
        .persistent()
        .set(&DataKey::Value(handle.clone()), &value);
    grant(env, &handle, contract);
    handle
}

// ── Contract ─────────────────────────────────────────────────────────────────

#[contract]
pub struct DevRuntime;

#[contractimpl]
impl DevRuntime {
    /// Build an input for `value` bound to `owner` submitting to `contract`.
    pub fn encrypt_input(env: Env, value: u32, owner: Address, contract: Address) -> EncryptedInput {
        let mut nonce_buf = Bytes::from_slice(&env, INPUT_DOMAIN);
        nonce_buf.extend_from_array(&next_nonce(&env).to_le_bytes());
        let nonce = env.crypto().sha256(&nonce_buf).to_bytes();

        let handle = input_handle(&env, value, &nonce, &owner, &contract);
        let mut proof = Bytes::new(&env);
        proof.extend_from_array(&value.to_le_bytes());
        proof.append(&Bytes::from(nonce));

        EncryptedInput { handle, proof }
    }

    /// Accept an input handle after checking its binding to `owner` and
    /// `contract`. The calling contract gains access to the handle.
    pub fn verify_input(
        env: Env,
        handle: BytesN<32>,
        proof: Bytes,
        owner: Address,
        contract: Address,
    ) -> Result<BytesN<32>, Error> {
        contract.require_auth();

        if proof.len() != PROOF_SIZE {
            return Err(Error::InvalidInputProof);
        }
        let mut value_bytes = [0u8; 4];
        proof.slice(0..4).copy_into_slice(&mut value_bytes);
        let mut nonce = [0u8; 32];
        proof.slice(4..PROOF_SIZE).copy_into_slice(&mut nonce);

        let value = u32::from_le_bytes(value_bytes);
        let expected = input_handle(
            &env,
            value,
            &BytesN::from_array(&env, &nonce),
            &owner,
            &contract,
        );
        if expected != handle {
            return Err(Error::InvalidInputProof);
        }

        env.storage()
            .persistent()
            .set(&DataKey::Value(handle.clone()), &Plaintext::U32(value));
        grant(&env, &handle, &contract);
        Ok(handle)
    }

    /// Wrapping 32-bit addition.
    pub fn add(
        env: Env,
        contract: Address,
        lhs: BytesN<32>,
        rhs: BytesN<32>,
    ) -> Result<BytesN<32>, Error> {
        contract.require_auth();
        let a = read_u32(&env, &contract, &lhs)?;
        let b = read_u32(&env, &contract, &rhs)?;
        Ok(store_result(
            &env,
            b"add",
            &lhs,
            &rhs,
            Plaintext::U32(a.wrapping_add(b)),
            &contract,
        ))
    }

    pub fn max(
        env: Env,
        contract: Address,
        lhs: BytesN<32>,
        rhs: BytesN<32>,
    ) -> Result<BytesN<32>, Error> {
        contract.require_auth();
        let a = read_u32(&env, &contract, &lhs)?;
        let b = read_u32(&env, &contract, &rhs)?;
        Ok(store_result(
            &env,
            b"max",
            &lhs,
            &rhs,
            Plaintext::U32(a.max(b)),
            &contract,
        ))
    }

    /// Encrypted `lhs > rhs`.
    pub fn gt(
        env: Env,
        contract: Address,
        lhs: BytesN<32>,
        rhs: BytesN<32>,
    ) -> Result<BytesN<32>, Error> {
        contract.require_auth();
        let a = read_u32(&env, &contract, &lhs)?;
        let b = read_u32(&env, &contract, &rhs)?;
        Ok(store_result(
            &env,
            b"gt",
            &lhs,
            &rhs,
            Plaintext::Bool(a > b),
            &contract,
        ))
    }

    /// Extend a handle's ACL. Only a contract already on the ACL may do so.
    pub fn allow(
        env: Env,
        contract: Address,
        handle: BytesN<32>,
        account: Address,
    ) -> Result<(), Error> {
        contract.require_auth();
        if !has_access(&env, &handle, &contract) {
            return Err(Error::AccessDenied);
        }
        grant(&env, &handle, &account);
        Ok(())
    }

    pub fn is_allowed(env: Env, handle: BytesN<32>, account: Address) -> bool {
        has_access(&env, &handle, &account)
    }

    /// Reveal a handle to an account on its ACL.
    pub fn decrypt(env: Env, handle: BytesN<32>, account: Address) -> Result<Plaintext, Error> {
        account.require_auth();
        if !has_access(&env, &handle, &account) {
            return Err(Error::AccessDenied);
        }
        load(&env, &handle)
    }
}
