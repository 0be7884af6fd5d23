//! Leaderboard ordering from the caller's encrypted comparison outcomes.
//!
//! The ledger never reveals scores, only "am I greater than them" bits to
//! the caller who asked. That is enough to place everyone relative to the
//! caller, though not relative to each other; game counts break the ties.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::Principal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player: Principal,
    pub total_games: u64,
}

/// Where a player sits relative to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Standing {
    /// Caller is not greater than them.
    Above,
    Caller,
    /// Caller is strictly greater.
    Below,
    /// No comparison result.
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub player: Principal,
    pub total_games: u64,
    pub standing: Standing,
}

/// Rank `players` around `caller`. `caller_is_greater` maps each opponent to
/// the decrypted `compare(caller, opponent)` bit; missing entries rank last.
/// Ranks are 1-based.
pub fn rank_players(
    caller: Principal,
    players: &[PlayerSummary],
    caller_is_greater: &HashMap<Principal, bool>,
) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = players
        .iter()
        .map(|p| {
            let standing = if p.player == caller {
                Standing::Caller
            } else {
                match caller_is_greater.get(&p.player) {
                    Some(true) => Standing::Below,
                    Some(false) => Standing::Above,
                    None => Standing::Unknown,
                }
            };
            RankedEntry {
                rank: 0,
                player: p.player,
                total_games: p.total_games,
                standing,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        a.standing
            .cmp(&b.standing)
            .then(b.total_games.cmp(&a.total_games))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}
