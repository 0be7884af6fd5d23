use soroban_sdk::{Address, BytesN, Env};

use crate::{ComparisonKey, DataKey, GameRecord, Metric, PlayerStats, RecordKey};

// Player data lives in persistent storage and is bumped on every write.
const ENTRY_TTL_THRESHOLD: u32 = 100_000;
const ENTRY_TTL_LEDGERS: u32 = 518_400; // ~30 days
const INSTANCE_TTL_LEDGERS: u32 = 518_400;

fn bump(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, ENTRY_TTL_THRESHOLD, ENTRY_TTL_LEDGERS);
}

pub fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(ENTRY_TTL_THRESHOLD, INSTANCE_TTL_LEDGERS);
}

// ── Aggregates and records ───────────────────────────────────────────────────

pub fn stats(env: &Env, player: &Address) -> Option<PlayerStats> {
    env.storage()
        .persistent()
        .get(&DataKey::Stats(player.clone()))
}

pub fn set_stats(env: &Env, player: &Address, stats: &PlayerStats) {
    let key = DataKey::Stats(player.clone());
    env.storage().persistent().set(&key, stats);
    bump(env, &key);
}

pub fn record(env: &Env, player: &Address, index: u64) -> Option<GameRecord> {
    env.storage().persistent().get(&DataKey::Record(RecordKey {
        player: player.clone(),
        index,
    }))
}

pub fn set_record(env: &Env, player: &Address, index: u64, record: &GameRecord) {
    let key = DataKey::Record(RecordKey {
        player: player.clone(),
        index,
    });
    env.storage().persistent().set(&key, record);
    bump(env, &key);
}

/// Global game counter; doubles as the next game id.
pub fn total_games(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::TotalGames)
        .unwrap_or(0)
}

pub fn next_game_id(env: &Env) -> u64 {
    let game_id = total_games(env);
    env.storage()
        .instance()
        .set(&DataKey::TotalGames, &(game_id + 1));
    game_id
}

// ── Active player registry ───────────────────────────────────────────────────

pub fn active_player_count(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::ActivePlayerCount)
        .unwrap_or(0)
}

pub fn active_player(env: &Env, index: u64) -> Option<Address> {
    env.storage()
        .persistent()
        .get(&DataKey::ActivePlayer(index))
}

/// Callers guarantee `player` is not yet registered.
pub fn push_active_player(env: &Env, player: &Address) {
    let index = active_player_count(env);
    let key = DataKey::ActivePlayer(index);
    env.storage().persistent().set(&key, player);
    bump(env, &key);
    env.storage()
        .instance()
        .set(&DataKey::ActivePlayerCount, &(index + 1));
}

// ── Profile flags ────────────────────────────────────────────────────────────

pub fn is_public(env: &Env, player: &Address) -> bool {
    env.storage()
        .persistent()
        .get(&DataKey::PublicProfile(player.clone()))
        .unwrap_or(false)
}

pub fn set_public(env: &Env, player: &Address, is_public: bool) {
    let key = DataKey::PublicProfile(player.clone());
    env.storage().persistent().set(&key, &is_public);
    bump(env, &key);
}

// ── Comparison results ───────────────────────────────────────────────────────

fn comparison_key(caller: &Address, metric: Metric, a: &Address, b: &Address) -> DataKey {
    DataKey::Comparison(ComparisonKey {
        caller: caller.clone(),
        metric,
        player_a: a.clone(),
        player_b: b.clone(),
    })
}

pub fn comparison(
    env: &Env,
    caller: &Address,
    metric: Metric,
    a: &Address,
    b: &Address,
) -> Option<BytesN<32>> {
    env.storage()
        .persistent()
        .get(&comparison_key(caller, metric, a, b))
}

pub fn set_comparison(
    env: &Env,
    caller: &Address,
    metric: Metric,
    a: &Address,
    b: &Address,
    result: &BytesN<32>,
) {
    let key = comparison_key(caller, metric, a, b);
    env.storage().persistent().set(&key, result);
    bump(env, &key);
}

pub fn remove_comparison(env: &Env, caller: &Address, metric: Metric, a: &Address, b: &Address) {
    env.storage()
        .persistent()
        .remove(&comparison_key(caller, metric, a, b));
}
