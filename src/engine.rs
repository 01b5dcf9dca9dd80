//! Engine facade: iterates brackets, collapsing on local infeasibility,
//! and emits the final ordered pairing for one round.

use tracing::{debug, info};

use crate::bracket::Brackets;
use crate::bracket_pairer::BracketPairer;
use crate::color_criteria;
use crate::error::PairingError;
use crate::player::Player;
use crate::validity::ValidityOracle;

/// `(-1, -1)` sorts a bye pairing last under a descending sort, since no
/// real score pair can have a negative point total.
fn pair_sort_key(p1: &Player, p2: &Player) -> (i64, i64) {
    if p1.number == p2.number {
        return (-1, -1);
    }
    (p1.points.max(p2.points), p1.points.min(p2.points))
}

/// Produces the round `round_number` pairing for `players` (already
/// derived via [`crate::player::derive_players`]).
///
/// Returns the ordered list of `(white, black)` starting numbers, with
/// `black == 0` denoting a pairing-allocated bye.
pub fn generate_pairings(players: Vec<Player>, round_number: u32) -> Result<Vec<(u32, u32)>, PairingError> {
    if players.is_empty() {
        return Err(PairingError::EmptyRoster);
    }

    let mut validity = ValidityOracle::new(&players);
    if !validity.is_feasible() {
        return Err(PairingError::Unpairable { round: round_number });
    }

    let mut brackets = Brackets::new(players, round_number);
    let mut player_pairs: Vec<(Player, Player)> = Vec::new();
    let mut collapses = 0usize;

    while !brackets.is_finished() {
        let bracket = brackets.current_bracket();
        let bracket_size = bracket.mdp.len() + bracket.resident.len();
        let pairer = BracketPairer::new(bracket, &mut validity);

        match pairer.run() {
            None => {
                debug!("bracket infeasible, collapsing into the next score group");
                brackets.collapse();
                collapses += 1;
            }
            Some(pairs) => {
                let paired: std::collections::HashSet<u32> = pairs
                    .iter()
                    .flat_map(|(a, b)| [a.number, b.number])
                    .collect();
                debug!(pairs = pairs.len(), bracket_size, "bracket paired");
                brackets.apply_bracket_pairings(&paired);
                player_pairs.extend(pairs);
            }
        }
    }

    player_pairs.sort_by(|(a1, a2), (b1, b2)| pair_sort_key(b1, b2).cmp(&pair_sort_key(a1, a2)));

    let pairings = player_pairs
        .into_iter()
        .map(|(p1, p2)| {
            if p1.number == p2.number {
                (p1.number, 0)
            } else {
                color_criteria::assign_colors(&p1, &p2)
            }
        })
        .collect::<Vec<_>>();

    info!(
        round = round_number,
        pairs = pairings.len(),
        collapses,
        "round pairing complete"
    );
    Ok(pairings)
}
