#![no_std]

use soroban_sdk::{
    contract, contractclient, contracterror, contractimpl, contracttype, symbol_short, Address,
    Bytes, BytesN, Env, Vec,
};

mod storage;

/// Shortest game, in seconds, the ledger accepts.
pub const MIN_GAME_DURATION: u32 = 10;

// ── Cross-contract clients ───────────────────────────────────────────────────

/// Ciphertext runtime. Handles are opaque 32-byte references; the all-zero
/// handle is the "no value" sentinel and reads as encrypted 0.
#[contractclient(name = "RuntimeClient")]
pub trait CiphertextRuntime {
    fn verify_input(
        env: Env,
        handle: BytesN<32>,
        proof: Bytes,
        owner: Address,
        contract: Address,
    ) -> BytesN<32>;
    fn add(env: Env, contract: Address, lhs: BytesN<32>, rhs: BytesN<32>) -> BytesN<32>;
    fn max(env: Env, contract: Address, lhs: BytesN<32>, rhs: BytesN<32>) -> BytesN<32>;
    fn gt(env: Env, contract: Address, lhs: BytesN<32>, rhs: BytesN<32>) -> BytesN<32>;
    fn allow(env: Env, contract: Address, handle: BytesN<32>, account: Address);
}

// ── Storage types ────────────────────────────────────────────────────────────

#[contracttype]
#[derive(Clone)]
pub struct RecordKey {
    pub player: Address,
    pub index: u64,
}

#[contracttype]
#[derive(Clone)]
pub struct ComparisonKey {
    pub caller: Address,
    pub metric: Metric,
    pub player_a: Address,
    pub player_b: Address,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    Runtime,
    TotalGames,
    ActivePlayerCount,
    ActivePlayer(u64),
    Stats(Address),
    Record(RecordKey),
    PublicProfile(Address),
    Comparison(ComparisonKey),
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Metric {
    MaxScore,
    TotalScore,
}

/// Per-player aggregates. Exists once the player has submitted a game.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlayerStats {
    pub total_games: u64,
    pub max_score: BytesN<32>,
    pub total_score: BytesN<32>,
    pub first_play_time: u64,
    pub last_play_time: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameRecord {
    pub game_id: u64,
    pub player: Address,
    pub score: BytesN<32>,
    pub timestamp: u64,
    pub duration: u32,
}

/// One batch comparison outcome. `result` is `None` when either side has
/// no aggregate or the runtime refused the comparison.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchEntry {
    pub opponent: Address,
    pub result: Option<BytesN<32>>,
}

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    GameTooShort = 3,
    InvalidCiphertext = 4,
    InvalidIndex = 5,
    OffsetOutOfBounds = 6,
    PlayerNotFound = 7,
    ComparisonFailed = 8,
    RuntimeFailure = 9,
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn sentinel(env: &Env) -> BytesN<32> {
    BytesN::from_array(env, &[0u8; 32])
}

fn runtime_client(env: &Env) -> Result<RuntimeClient<'_>, Error> {
    let addr: Address = env
        .storage()
        .instance()
        .get(&DataKey::Runtime)
        .ok_or(Error::NotInitialized)?;
    Ok(RuntimeClient::new(env, &addr))
}

/// Unwraps a `try_*` runtime call. Any runtime error becomes `err`.
fn accepted<T, E, F>(result: Result<Result<T, E>, F>, err: Error) -> Result<T, Error> {
    match result {
        Ok(Ok(value)) => Ok(value),
        _ => Err(err),
    }
}

fn aggregate(env: &Env, player: &Address, metric: Metric) -> Option<BytesN<32>> {
    storage::stats(env, player).map(|stats| match metric {
        Metric::MaxScore => stats.max_score,
        Metric::TotalScore => stats.total_score,
    })
}

/// Encrypted `a > b` on `metric`, readable by `caller` and kept for later
/// retrieval under `(caller, metric, a, b)`. A failed comparison clears any
/// earlier stored result for that key.
fn compare_pair(
    env: &Env,
    runtime: &RuntimeClient,
    caller: &Address,
    metric: Metric,
    a: &Address,
    b: &Address,
) -> Result<BytesN<32>, Error> {
    let result = evaluate_pair(env, runtime, caller, metric, a, b);
    match &result {
        Ok(handle) => storage::set_comparison(env, caller, metric, a, b, handle),
        Err(_) => storage::remove_comparison(env, caller, metric, a, b),
    }
    result
}

fn evaluate_pair(
    env: &Env,
    runtime: &RuntimeClient,
    caller: &Address,
    metric: Metric,
    a: &Address,
    b: &Address,
) -> Result<BytesN<32>, Error> {
    let (lhs, rhs) = if a == b {
        // Self-comparison is always false, with or without games.
        let handle = aggregate(env, a, metric).unwrap_or_else(|| sentinel(env));
        (handle.clone(), handle)
    } else {
        (
            aggregate(env, a, metric).ok_or(Error::PlayerNotFound)?,
            aggregate(env, b, metric).ok_or(Error::PlayerNotFound)?,
        )
    };

    let this = env.current_contract_address();
    let result = accepted(runtime.try_gt(&this, &lhs, &rhs), Error::ComparisonFailed)?;
    accepted(
        runtime.try_allow(&this, &result, caller),
        Error::ComparisonFailed,
    )?;
    Ok(result)
}

fn compare_single(
    env: Env,
    caller: Address,
    metric: Metric,
    player_a: Address,
    player_b: Address,
) -> Result<BytesN<32>, Error> {
    caller.require_auth();
    let runtime = runtime_client(&env)?;
    let result = compare_pair(&env, &runtime, &caller, metric, &player_a, &player_b)?;
    env.events()
        .publish((symbol_short!("compared"), caller), (metric, 1u32));
    Ok(result)
}

fn compare_batch(
    env: Env,
    caller: Address,
    metric: Metric,
    others: Vec<Address>,
) -> Result<Vec<BatchEntry>, Error> {
    caller.require_auth();
    let runtime = runtime_client(&env)?;

    let mut entries = Vec::new(&env);
    for opponent in others.iter() {
        let result = compare_pair(&env, &runtime, &caller, metric, &caller, &opponent).ok();
        entries.push_back(BatchEntry { opponent, result });
    }

    env.events()
        .publish((symbol_short!("compared"), caller), (metric, entries.len()));
    Ok(entries)
}

// ── Contract ─────────────────────────────────────────────────────────────────

#[contract]
pub struct ScoreboardContract;

#[contractimpl]
impl ScoreboardContract {
    /// One-time setup. Sets admin and the ciphertext runtime.
    pub fn initialize(env: Env, admin: Address, runtime: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }
        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Runtime, &runtime);
        storage::bump_instance(&env);
        Ok(())
    }

    /// Admin can point the ledger at a different runtime deployment.
    pub fn set_runtime(env: Env, runtime: Address) -> Result<(), Error> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&DataKey::Admin)
            .ok_or(Error::NotInitialized)?;
        admin.require_auth();
        env.storage().instance().set(&DataKey::Runtime, &runtime);
        Ok(())
    }

    // ── Submission ───────────────────────────────────────────────────────────

    /// Record one finished game. `ciphertext` and `proof` come from the
    /// runtime's input encryption bound to `(player, this contract)`.
    ///
    /// Returns the global game id.
    pub fn submit_score(
        env: Env,
        player: Address,
        ciphertext: BytesN<32>,
        proof: Bytes,
        duration: u32,
    ) -> Result<u64, Error> {
        player.require_auth();

        // 1. Reject short games before touching the runtime
        if duration < MIN_GAME_DURATION {
            return Err(Error::GameTooShort);
        }

        // 2. Accept the ciphertext
        let runtime = runtime_client(&env)?;
        let this = env.current_contract_address();
        let score = accepted(
            runtime.try_verify_input(&ciphertext, &proof, &player, &this),
            Error::InvalidCiphertext,
        )?;

        // 3. Fold into aggregates; missing aggregates start from the sentinel
        let now = env.ledger().timestamp();
        let mut stats = storage::stats(&env, &player).unwrap_or_else(|| PlayerStats {
            total_games: 0,
            max_score: sentinel(&env),
            total_score: sentinel(&env),
            first_play_time: now,
            last_play_time: now,
        });
        let first_game = stats.total_games == 0;

        stats.max_score = accepted(
            runtime.try_max(&this, &stats.max_score, &score),
            Error::RuntimeFailure,
        )?;
        stats.total_score = accepted(
            runtime.try_add(&this, &stats.total_score, &score),
            Error::RuntimeFailure,
        )?;

        // 4. The player may decrypt all three handles
        for handle in [&stats.max_score, &stats.total_score, &score] {
            accepted(runtime.try_allow(&this, handle, &player), Error::RuntimeFailure)?;
        }

        // 5. Persist
        if first_game {
            storage::push_active_player(&env, &player);
        }
        let game_id = storage::next_game_id(&env);
        let record = GameRecord {
            game_id,
            player: player.clone(),
            score,
            timestamp: now,
            duration,
        };
        storage::set_record(&env, &player, stats.total_games, &record);
        stats.total_games += 1;
        stats.last_play_time = now;
        storage::set_stats(&env, &player, &stats);
        storage::bump_instance(&env);

        env.events().publish(
            (symbol_short!("submitted"), player),
            (game_id, now, duration),
        );
        Ok(game_id)
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn get_game_record(env: Env, player: Address, index: u64) -> Result<GameRecord, Error> {
        storage::record(&env, &player, index).ok_or(Error::InvalidIndex)
    }

    pub fn get_player_record_count(env: Env, player: Address) -> u64 {
        storage::stats(&env, &player).map_or(0, |stats| stats.total_games)
    }

    /// Sentinel handle if the player has no games.
    pub fn get_player_max_score(env: Env, player: Address) -> BytesN<32> {
        aggregate(&env, &player, Metric::MaxScore).unwrap_or_else(|| sentinel(&env))
    }

    /// Sentinel handle if the player has no games.
    pub fn get_player_total_score(env: Env, player: Address) -> BytesN<32> {
        aggregate(&env, &player, Metric::TotalScore).unwrap_or_else(|| sentinel(&env))
    }

    pub fn player_stats(env: Env, player: Address) -> Option<PlayerStats> {
        storage::stats(&env, &player)
    }

    pub fn get_active_players_count(env: Env) -> u64 {
        storage::active_player_count(&env)
    }

    /// Players in first-submission order. `offset == count` yields an empty
    /// page; anything past that is an error.
    pub fn get_active_players(env: Env, offset: u64, limit: u64) -> Result<Vec<Address>, Error> {
        let count = storage::active_player_count(&env);
        if offset > count {
            return Err(Error::OffsetOutOfBounds);
        }
        let end = offset.saturating_add(limit).min(count);

        let mut players = Vec::new(&env);
        for index in offset..end {
            if let Some(player) = storage::active_player(&env, index) {
                players.push_back(player);
            }
        }
        Ok(players)
    }

    pub fn total_games_played(env: Env) -> u64 {
        storage::total_games(&env)
    }

    // ── Profile ──────────────────────────────────────────────────────────────

    pub fn set_profile_visibility(env: Env, player: Address, is_public: bool) {
        player.require_auth();
        storage::set_public(&env, &player, is_public);
        env.events()
            .publish((symbol_short!("visible"), player), is_public);
    }

    pub fn is_public_profile(env: Env, player: Address) -> bool {
        storage::is_public(&env, &player)
    }

    // ── Comparisons ──────────────────────────────────────────────────────────

    /// Encrypted `max(a) > max(b)`, decryptable by `caller`.
    pub fn compare_max_scores(
        env: Env,
        caller: Address,
        player_a: Address,
        player_b: Address,
    ) -> Result<BytesN<32>, Error> {
        compare_single(env, caller, Metric::MaxScore, player_a, player_b)
    }

    /// Encrypted `total(a) > total(b)`, decryptable by `caller`.
    pub fn compare_total_scores(
        env: Env,
        caller: Address,
        player_a: Address,
        player_b: Address,
    ) -> Result<BytesN<32>, Error> {
        compare_single(env, caller, Metric::TotalScore, player_a, player_b)
    }

    /// `caller` against each of `others` on max score, in input order.
    pub fn batch_compare_max_scores(
        env: Env,
        caller: Address,
        others: Vec<Address>,
    ) -> Result<Vec<BatchEntry>, Error> {
        compare_batch(env, caller, Metric::MaxScore, others)
    }

    /// `caller` against each of `others` on total score, in input order.
    pub fn batch_compare_total_scores(
        env: Env,
        caller: Address,
        others: Vec<Address>,
    ) -> Result<Vec<BatchEntry>, Error> {
        compare_batch(env, caller, Metric::TotalScore, others)
    }

    /// Result handle of the latest `(caller, metric, a, b)` comparison.
    pub fn get_comparison(
        env: Env,
        caller: Address,
        metric: Metric,
        player_a: Address,
        player_b: Address,
    ) -> Option<BytesN<32>> {
        storage::comparison(&env, &caller, metric, &player_a, &player_b)
    }
}
