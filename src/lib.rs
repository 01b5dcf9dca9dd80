//! Round-pairing core for the FIDE "Dutch" Swiss pairing system.
//!
//! Given the derived state of a tournament after N completed rounds, this
//! crate produces the pairing for round N+1: an ordered list of
//! `(white, black)` starting-number pairs plus at most one
//! pairing-allocated bye (`black == 0`).
//!
//! The crate is organized leaves-first: [`bigweight`] and [`matching`] are
//! general-purpose primitives; [`player`] derives pairing-ready state from
//! raw round history; [`bracket`] and [`weight_builder`] build the
//! per-bracket matching problem; [`bracket_pairer`] drives it to a decision;
//! [`engine`] ties the whole loop together. [`color_criteria`] runs once
//! per finalized pair, after matching, to decide who plays White.
//!
//! This crate performs no I/O: the tournament file parser, the CLI, and
//! output formatting beyond the ordered pair list are out of scope (see
//! `SPEC_FULL.md` §1).

pub mod bigweight;
pub mod bracket;
pub mod bracket_pairer;
pub mod color_criteria;
pub mod engine;
pub mod error;
pub mod matching;
pub mod player;
pub mod validity;
pub mod weight_builder;

pub use error::PairingError;
pub use player::{derive_players, DerivationConfig, Player, RawPlayer, RoundRecord};

/// Derives player state from `raw_players` and produces the pairing for
/// the next round in one call: the convenience entry point for callers
/// that don't need to inspect derived [`Player`] state directly.
///
/// The round number is `min(played rounds) + 1` across the eligible
/// roster, per `SPEC_FULL.md` §4.7.
pub fn pair_round(
    raw_players: &[RawPlayer],
    config: &DerivationConfig,
) -> Result<Vec<(u32, u32)>, PairingError> {
    let round_number = raw_players
        .iter()
        .filter(|p| !p.withdrawn)
        .map(|p| p.results.len())
        .min()
        .unwrap_or(0) as u32
        + 1;
    let players = derive_players(raw_players, config)?;
    engine::generate_pairings(players, round_number)
}
