//! The driver: heterogeneous MDP placement, homogeneous exchange counting
//! and sweeps, S1<->S2 transposition, and the completion check.
//!
//! [`BracketPairer`] owns a small matching instance scoped to one bracket
//! (built from [`crate::weight_builder`]'s criterion stack) and queries it
//! under a sequence of small, reversible weight perturbations rather than
//! asking it a single question. See `DESIGN.md` for why: the matcher is
//! treated as an oracle, not a black box.

use std::collections::HashSet;

use tracing::debug;

use crate::bigweight::BigWeight;
use crate::bracket::Bracket;
use crate::matching::MatchingSolver;
use crate::player::{Player, PlayerRole};
use crate::validity::ValidityOracle;
use crate::weight_builder;

/// Per-bracket matching instance: a [`MatchingSolver`] plus a cached weight
/// table so perturbations can be expressed as deltas against the last-set
/// weight, and idempotent no-ops on already-zeroed ("no edge") pairs.
struct BracketMatcher {
    players: Vec<Player>,
    solver: MatchingSolver,
    weights: Vec<Vec<BigWeight>>,
    max_weight: BigWeight,
    zero_weight: BigWeight,
    matching: Vec<usize>,
}

impl BracketMatcher {
    fn new(bracket: &Bracket) -> Self {
        let players = bracket.players();
        let n = players.len();
        let max_weight = weight_builder::max_weight(&bracket.descriptor);
        let width = max_weight.width();
        let zero_weight = BigWeight::zero(width);

        let mut solver = MatchingSolver::new(n, width);
        for _ in 0..n {
            solver.add_vertex();
        }

        let mut weights = vec![vec![zero_weight.clone(); n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let w = weight_builder::edge_weight(&players[i], &players[j], &bracket.descriptor);
                weights[i][j] = w.clone();
                weights[j][i] = w.clone();
                solver.set_edge_weight(i + 1, j + 1, w);
            }
        }

        let mut matcher = Self {
            players,
            solver,
            weights,
            max_weight,
            zero_weight,
            matching: vec![0; n],
        };
        matcher.update_matching();
        matcher
    }

    fn len(&self) -> usize {
        self.players.len()
    }

    fn set_weight(&mut self, i: usize, j: usize, w: BigWeight) {
        self.weights[i][j] = w.clone();
        self.weights[j][i] = w.clone();
        self.solver.set_edge_weight(i + 1, j + 1, w);
    }

    fn remove_weight(&mut self, i: usize, j: usize) {
        if self.weights[i][j].is_zero() {
            return;
        }
        self.set_weight(i, j, self.zero_weight.clone());
    }

    fn remove_weights(&mut self, i: usize, others: &[usize]) {
        for &j in others {
            self.remove_weight(i, j);
        }
    }

    /// Adds `value` to the cached weight of `(i, j)`, a no-op if that edge
    /// is already "no edge" (the absolute criteria forbid it outright).
    fn add_to_weight(&mut self, i: usize, j: usize, value: i64) {
        if self.weights[i][j].is_zero() {
            return;
        }
        let mut delta = BigWeight::zero(self.max_weight.width());
        delta.or_literal(value.unsigned_abs());
        let mut w = self.weights[i][j].clone();
        if value > 0 {
            w.add(&delta);
        } else if value < 0 {
            w.sub(&delta);
        } else {
            return;
        }
        self.set_weight(i, j, w);
    }

    /// Adds `value` to every edge `(i, other)` for `other` in `others`, in
    /// order; if `increment` is set, `value` rises by 1 after each one,
    /// forming the ladder perturbation used to force a lexicographic
    /// tie-break.
    fn add_to_weights(&mut self, i: usize, others: &[usize], mut value: i64, increment: bool) {
        for &j in others {
            self.add_to_weight(i, j, value);
            if increment {
                value += 1;
            }
        }
    }

    fn update_matching(&mut self) {
        self.solver.compute();
        for i in 0..self.len() {
            self.matching[i] = self.solver.mate(i + 1) - 1;
        }
    }

    /// Commits `(i, j)` as a decided pair: every other edge incident to
    /// either vertex is zeroed and their mutual edge is fixed at
    /// `max_weight`, so no later perturbation can unseat it.
    fn finalize_match(&mut self, i: usize, j: usize) {
        for k in 0..self.len() {
            self.remove_weight(i, k);
            self.remove_weight(j, k);
        }
        self.set_weight(i, j, self.max_weight.clone());
    }

    fn mate(&self, i: usize) -> usize {
        self.matching[i]
    }
}

/// Drives one bracket's matching instance through the full placement
/// sequence and reports whether the result can be accepted.
pub struct BracketPairer<'a> {
    bracket: Bracket,
    matcher: BracketMatcher,
    validity: &'a mut ValidityOracle,
    mdp: Vec<usize>,
    resident: Vec<usize>,
    lower: Vec<usize>,
    het_s1: Vec<usize>,
    het_s2: Vec<usize>,
    hom_s1: Vec<usize>,
    hom_s2: Vec<usize>,
    exchanges: i64,
}

impl<'a> BracketPairer<'a> {
    pub fn new(bracket: Bracket, validity: &'a mut ValidityOracle) -> Self {
        let matcher = BracketMatcher::new(&bracket);
        let mdp: Vec<usize> = (0..bracket.mdp.len()).collect();
        let resident: Vec<usize> =
            (bracket.mdp.len()..bracket.mdp.len() + bracket.resident.len()).collect();
        let lower: Vec<usize> =
            (bracket.mdp.len() + bracket.resident.len()..matcher.len()).collect();
        Self {
            bracket,
            matcher,
            validity,
            mdp,
            resident,
            lower,
            het_s1: Vec::new(),
            het_s2: Vec::new(),
            hom_s1: Vec::new(),
            hom_s2: Vec::new(),
            exchanges: 0,
        }
    }

    fn match_role(&self, i: usize) -> PlayerRole {
        self.matcher.players[self.matcher.mate(i)].role
    }

    fn has_resident_match(&self, i: usize) -> bool {
        self.match_role(i) == PlayerRole::Resident
    }

    fn in_s1(&self, i: usize) -> bool {
        let mate = self.matcher.mate(i);
        self.matcher.players[i] > self.matcher.players[mate] && self.match_role(i) == PlayerRole::Resident
    }

    fn in_s2(&self, i: usize) -> bool {
        let mate = self.matcher.mate(i);
        self.matcher.players[i] <= self.matcher.players[mate] || self.match_role(i) == PlayerRole::Lower
    }

    /// 4.6.2: decide which MDPs get a Resident partner at all.
    pub fn determine_heterogeneous_s1(&mut self) {
        let n = self.matcher.len() as i64;
        for mdp in self.mdp.clone() {
            if !self.has_resident_match(mdp) {
                self.matcher.add_to_weights(mdp, &self.resident.clone(), 1, false);
                self.matcher.update_matching();
            }
            if self.has_resident_match(mdp) {
                self.het_s1.push(mdp);
                self.matcher.add_to_weights(mdp, &self.resident.clone(), n, false);
            }
        }
        debug!(count = self.het_s1.len(), "heterogeneous S1 determined");
    }

    /// 4.6.3: decide, lexicographically, which Resident each S1 MDP gets.
    pub fn determine_heterogeneous_s2(&mut self) {
        for mdp in self.het_s1.clone() {
            let reversed: Vec<usize> = self.resident.iter().rev().copied().collect();
            self.matcher.add_to_weights(mdp, &reversed, 0, true);
            self.matcher.update_matching();

            let partner = self.matcher.mate(mdp);
            self.het_s2.push(partner);
            self.matcher.finalize_match(mdp, partner);
            self.validity.finalize(
                self.matcher.players[mdp].number,
                self.matcher.players[partner].number,
            );
        }
    }

    /// 4.6.4: split the unfinalized Residents and count how many want to
    /// cross from the upper half (S1) to the lower half (S2).
    pub fn determine_homogeneous_exchanges(&mut self) {
        let paired: HashSet<usize> = self.het_s2.iter().copied().collect();
        let remainder: Vec<usize> = self
            .resident
            .iter()
            .copied()
            .filter(|r| !paired.contains(r))
            .collect();
        let pairs = remainder.iter().filter(|&&r| self.has_resident_match(r)).count() / 2;

        self.hom_s1 = remainder[..pairs].to_vec();
        self.hom_s2 = remainder[pairs..].to_vec();

        let bracket_bits = self.bracket.descriptor.bracket_bits as i64;
        for (i, &resident) in remainder.iter().enumerate() {
            let value = ((((i < pairs) as i64) << (2 * bracket_bits)) - i as i64) << 1;
            self.matcher
                .add_to_weights(resident, &remainder[i + 1..], value, false);
        }
        self.matcher.update_matching();

        self.exchanges = self.hom_s1.iter().filter(|&&r| self.in_s2(r)).count() as i64;
        debug!(exchanges = self.exchanges, "homogeneous exchanges wanted");
    }

    /// 4.6.5: bottom-up sweep moving S1 residents into S2 until the wanted
    /// exchange count is satisfied.
    pub fn determine_moves_from_s1_to_s2(&mut self) {
        for i in (0..self.hom_s1.len()).rev() {
            if self.exchanges == 0 {
                return;
            }
            let resident = self.hom_s1[i];
            let lower_residents: Vec<usize> = self.hom_s1[i + 1..]
                .iter()
                .chain(self.hom_s2.iter())
                .copied()
                .collect();
            let was_exchanged = self.in_s2(resident);

            if !was_exchanged {
                self.matcher.add_to_weights(resident, &lower_residents, -1, false);
                self.matcher.update_matching();
            }

            if self.in_s2(resident) {
                self.exchanges -= 1;
                self.matcher.remove_weights(resident, &lower_residents);
            } else if !was_exchanged {
                self.matcher.add_to_weights(resident, &lower_residents, 1, false);
            }
        }
    }

    /// 4.6.6: top-down sweep moving S2 residents into S1. Asymmetric with
    /// 4.6.5: a successful move here also fences the mover off from Lower,
    /// since only this direction turns a would-be downfloater resident.
    pub fn determine_moves_from_s2_to_s1(&mut self) {
        for i in 0..self.hom_s2.len() {
            if self.exchanges == 0 {
                return;
            }
            let resident = self.hom_s2[i];
            let higher_residents: Vec<usize> = self
                .hom_s1
                .iter()
                .chain(self.hom_s2[i + 1..].iter())
                .copied()
                .collect();
            let was_exchanged = self.in_s1(resident);

            if !was_exchanged {
                self.matcher.add_to_weights(resident, &higher_residents, 1, false);
                self.matcher.update_matching();
            }

            if self.in_s2(resident) {
                self.exchanges -= 1;
                let mut fence: Vec<usize> =
                    higher_residents[..higher_residents.len().saturating_sub(1)].to_vec();
                fence.extend(self.lower.iter().copied());
                self.matcher.remove_weights(resident, &fence);
            } else if !was_exchanged {
                self.matcher.add_to_weights(resident, &higher_residents, -1, false);
            }
        }
    }

    /// 4.6.7: redefine S1/S2 by inspection and strip the intra-group
    /// perturbation edges so they can't be picked by the transpose step.
    pub fn perform_homogeneous_exchanges(&mut self) {
        let combined: Vec<usize> = self.hom_s1.iter().chain(self.hom_s2.iter()).copied().collect();
        self.hom_s1 = combined.iter().copied().filter(|&r| self.in_s1(r)).collect();
        self.hom_s2 = combined.iter().copied().filter(|&r| self.in_s2(r)).collect();

        for i in 0..self.hom_s1.len() {
            let rest = self.hom_s1[i + 1..].to_vec();
            self.matcher.remove_weights(self.hom_s1[i], &rest);
        }
        for i in 0..self.hom_s2.len() {
            let rest = self.hom_s2[i + 1..].to_vec();
            self.matcher.remove_weights(self.hom_s2[i], &rest);
        }
    }

    /// 4.6.8: lexicographic tie-break within each S1/S2 match, analogous to
    /// 4.6.3.
    pub fn transpose_homogeneous_s2(&mut self) {
        for resident in self.hom_s1.clone() {
            let reversed: Vec<usize> = self.hom_s2.iter().rev().copied().collect();
            self.matcher.add_to_weights(resident, &reversed, 0, true);
            self.matcher.update_matching();

            let partner = self.matcher.mate(resident);
            self.matcher.finalize_match(resident, partner);
            self.validity.finalize(
                self.matcher.players[resident].number,
                self.matcher.players[partner].number,
            );
        }
    }

    /// 4.6.9: the last/penultimate bracket always accepts; otherwise defer
    /// to the global validity oracle.
    pub fn check_completion_criterium(&mut self) -> bool {
        if self.bracket.descriptor.penultimate_pairing_bracket || self.bracket.descriptor.last_pairing_bracket {
            return true;
        }
        self.validity.is_feasible()
    }

    /// 4.6.10: the finalized pairs, `p1` ranked above `p2`, excluding any
    /// pair touching Lower; self-matches (byes) are included only when this
    /// is the last pairing bracket.
    pub fn pairs(&self) -> Vec<(Player, Player)> {
        let mut result = Vec::new();
        for i in 0..self.matcher.len() {
            let mate = self.matcher.mate(i);
            let p1 = &self.matcher.players[i];
            let p2 = &self.matcher.players[mate];
            if p1.role == PlayerRole::Lower || p2.role == PlayerRole::Lower {
                continue;
            }
            if p1 > p2 {
                result.push((p1.clone(), p2.clone()));
            }
            if p1.number == p2.number && self.bracket.descriptor.last_pairing_bracket {
                if p1.bye_received {
                    tracing::warn!(
                        player = p1.number,
                        "pairing-allocated bye given to a player who already received one"
                    );
                }
                result.push((p1.clone(), p2.clone()));
            }
        }
        result
    }

    /// Runs the full placement sequence (4.6.2 through 4.6.8) and returns
    /// the finalized pairs, or `None` if the bracket must collapse (4.6.9).
    pub fn run(mut self) -> Option<Vec<(Player, Player)>> {
        self.determine_heterogeneous_s1();
        self.determine_heterogeneous_s2();
        self.determine_homogeneous_exchanges();
        self.determine_moves_from_s1_to_s2();
        self.determine_moves_from_s2_to_s1();
        self.perform_homogeneous_exchanges();
        self.transpose_homogeneous_s2();

        if !self.check_completion_criterium() {
            return None;
        }
        Some(self.pairs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::Brackets;
    use crate::player::ColorPreference;
    use std::collections::HashSet as Set;

    fn player(number: u32, points: i64) -> Player {
        Player {
            number,
            points,
            color_preference: ColorPreference::NONE,
            color_difference: 0,
            color_double: false,
            float1: None,
            float2: None,
            opponents: Set::new(),
            colors: vec![],
            bye_received: false,
            top_scorer: false,
            role: PlayerRole::Resident,
        }
    }

    #[test]
    fn pairs_four_fresh_players_in_one_bracket() {
        let players = vec![player(1, 10), player(2, 10), player(3, 10), player(4, 10)];
        let mut validity = ValidityOracle::new(&players);
        let mut brackets = Brackets::new(players, 2);
        let bracket = brackets.current_bracket();

        let pairer = BracketPairer::new(bracket, &mut validity);
        let pairs = pairer.run().expect("bracket must be feasible");
        assert_eq!(pairs.len(), 2);

        let mut paired_numbers: Vec<u32> = pairs.iter().flat_map(|(a, b)| [a.number, b.number]).collect();
        paired_numbers.sort_unstable();
        assert_eq!(paired_numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn odd_bracket_produces_a_bye_only_when_last() {
        let players = vec![player(1, 10), player(2, 10), player(3, 10)];
        let mut validity = ValidityOracle::new(&players);
        let mut brackets = Brackets::new(players, 2);
        let bracket = brackets.current_bracket();
        assert!(bracket.descriptor.last_pairing_bracket);

        let pairer = BracketPairer::new(bracket, &mut validity);
        let pairs = pairer.run().expect("single bracket is always accepted");

        let byes = pairs.iter().filter(|(a, b)| a.number == b.number).count();
        assert_eq!(byes, 1);
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn never_pairs_prior_opponents() {
        let mut p1 = player(1, 20);
        let mut p2 = player(2, 20);
        p1.opponents.insert(2);
        p2.opponents.insert(1);
        let players = vec![p1, p2, player(3, 20), player(4, 20)];
        let mut validity = ValidityOracle::new(&players);
        let mut brackets = Brackets::new(players, 2);
        let bracket = brackets.current_bracket();

        let pairer = BracketPairer::new(bracket, &mut validity);
        let pairs = pairer.run().expect("bracket must be feasible");
        for (a, b) in &pairs {
            assert!(!a.opponents.contains(&b.number));
            assert!(!b.opponents.contains(&a.number));
        }
    }
}
