//! Score bucketing, MDP/Resident/Lower role assignment, and collapse.
//!
//! A [`Brackets`] instance walks the sorted player list bracket by bracket,
//! handing each [`BracketDescriptor`] to a `BracketPairer`; on infeasibility
//! the caller asks it to [`Brackets::collapse`] the current bracket into the
//! next one and retry.

use std::collections::HashMap;

use crate::player::{Player, PlayerRole};

/// The immutable, per-bracket sizing and flag data a [`crate::weight_builder::WeightBuilder`]
/// needs to size each criterion's bit width.
#[derive(Debug, Clone)]
pub struct BracketDescriptor {
    pub one_round_played: bool,
    pub two_rounds_played: bool,
    pub penultimate_pairing_bracket: bool,
    pub last_pairing_bracket: bool,
    pub min_bracket_score: i64,
    pub bracket_bits: u32,
    pub low_bracket_bits: u32,
    pub score_difference_total_bits: u32,
    pub score_difference_bit_dict: HashMap<i64, u32>,
}

/// `n.bit_length()` in the Python sense: the number of bits needed to
/// represent `n`, i.e. `ceil(log2(n+1))`. Zero for `n == 0`.
fn bit_length(n: usize) -> u32 {
    usize::BITS - n.leading_zeros()
}

fn score_difference_bits(
    mdp_list: &[Player],
    resident_list: &[Player],
) -> (u32, HashMap<i64, u32>) {
    let mut occurrences: HashMap<i64, u32> = HashMap::new();
    let min_resident_score = resident_list
        .last()
        .expect("a bracket always has at least one resident")
        .points;

    // Downfloat differential: score relative to one point below the
    // bracket's lowest resident, for every MDP and resident.
    for player in mdp_list.iter().chain(resident_list.iter()) {
        *occurrences.entry(player.points - min_resident_score + 10).or_insert(0) += 1;
    }

    // MDP-resident differences; MDPs never pair with one another.
    for mdp in mdp_list {
        let mut seen = std::collections::HashSet::new();
        for resident in resident_list {
            let d = mdp.points - resident.points;
            if seen.insert(d) {
                *occurrences.entry(d).or_insert(0) += 1;
            }
        }
    }

    // Resident-resident differences (non-zero only possible once the
    // bracket has absorbed a collapse).
    for (i, resident) in resident_list.iter().enumerate() {
        let mut seen = std::collections::HashSet::new();
        for other in &resident_list[i + 1..] {
            let d = resident.points - other.points;
            if seen.insert(d) {
                *occurrences.entry(d).or_insert(0) += 1;
            }
        }
    }

    let mut running_total = 0u32;
    let mut cumulative = HashMap::with_capacity(occurrences.len());
    let mut keys: Vec<i64> = occurrences.keys().copied().collect();
    keys.sort_unstable();
    for key in keys {
        let bits = bit_length(occurrences[&key] as usize);
        cumulative.insert(key, running_total);
        running_total += bits;
    }

    (running_total, cumulative)
}

impl BracketDescriptor {
    pub fn new(
        mdp_list: &[Player],
        resident_list: &[Player],
        lower_list: &[Player],
        round_number: u32,
        collapsed: bool,
    ) -> Self {
        let (score_difference_total_bits, score_difference_bit_dict) =
            score_difference_bits(mdp_list, resident_list);
        Self {
            one_round_played: round_number > 1,
            two_rounds_played: round_number > 2,
            penultimate_pairing_bracket: collapsed,
            last_pairing_bracket: lower_list.is_empty(),
            min_bracket_score: resident_list
                .last()
                .expect("a bracket always has at least one resident")
                .points,
            bracket_bits: bit_length(resident_list.len()),
            low_bracket_bits: bit_length(lower_list.len()),
            score_difference_total_bits,
            score_difference_bit_dict,
        }
    }
}

/// One bracket's worth of players, in `mdp ++ resident ++ lower` order
/// alongside the sizing descriptor derived from it.
pub struct Bracket {
    pub mdp: Vec<Player>,
    pub resident: Vec<Player>,
    pub lower: Vec<Player>,
    pub descriptor: BracketDescriptor,
}

impl Bracket {
    pub fn players(&self) -> Vec<Player> {
        self.mdp
            .iter()
            .chain(self.resident.iter())
            .chain(self.lower.iter())
            .cloned()
            .collect()
    }
}

/// Score-bucketed iteration state: groups players by identical points, then
/// walks the groups one bracket at a time, tracking MDPs carried over from a
/// prior bracket and whether the current bracket has absorbed a collapse.
pub struct Brackets {
    groups: Vec<Vec<Player>>,
    round_number: u32,
    index: usize,
    collapsed: bool,
    mdp_list: Vec<Player>,
}

impl Brackets {
    pub fn new(mut players: Vec<Player>, round_number: u32) -> Self {
        players.sort_by(|a, b| b.cmp(a));
        let mut groups: Vec<Vec<Player>> = Vec::new();
        for player in players {
            match groups.last_mut() {
                Some(group) if group.last().unwrap().points == player.points => {
                    group.push(player);
                }
                _ => groups.push(vec![player]),
            }
        }
        let mut brackets = Self {
            groups,
            round_number,
            index: 0,
            collapsed: false,
            mdp_list: Vec::new(),
        };
        brackets.assign_roles();
        brackets
    }

    fn resident_group(&self) -> &[Player] {
        self.groups.get(self.index).map(Vec::as_slice).unwrap_or(&[])
    }

    fn lower_group(&self) -> &[Player] {
        self.groups
            .get(self.index + 1)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn assign_roles(&mut self) {
        for mdp in &mut self.mdp_list {
            mdp.role = PlayerRole::Mdp;
        }
        if let Some(group) = self.groups.get_mut(self.index) {
            for resident in group {
                resident.role = PlayerRole::Resident;
            }
        }
        if let Some(group) = self.groups.get_mut(self.index + 1) {
            for lower in group {
                lower.role = PlayerRole::Lower;
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.index == self.groups.len()
    }

    pub fn current_bracket(&self) -> Bracket {
        let resident = self.resident_group().to_vec();
        let lower = self.lower_group().to_vec();
        let descriptor = BracketDescriptor::new(
            &self.mdp_list,
            &resident,
            &lower,
            self.round_number,
            self.collapsed,
        );
        Bracket {
            mdp: self.mdp_list.clone(),
            resident,
            lower,
            descriptor,
        }
    }

    /// Record a completed bracket's pairings: everyone not paired off
    /// becomes an MDP carried into the next bracket.
    pub fn apply_bracket_pairings(&mut self, paired: &std::collections::HashSet<u32>) {
        let mut candidates = std::mem::take(&mut self.mdp_list);
        candidates.extend(self.resident_group().iter().cloned());
        self.mdp_list = candidates
            .into_iter()
            .filter(|p| !paired.contains(&p.number))
            .collect();
        self.index += 1;
        self.assign_roles();
    }

    /// Merge every bracket after the current one into a single final
    /// bracket and mark the current bracket as penultimate.
    pub fn collapse(&mut self) {
        let merged: Vec<Player> = self.groups[self.index + 1..]
            .iter()
            .flatten()
            .cloned()
            .collect();
        self.groups.truncate(self.index + 1);
        self.groups.push(merged);
        self.collapsed = true;
        self.assign_roles();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::ColorPreference;
    use std::collections::HashSet;

    fn player(number: u32, points: i64) -> Player {
        Player {
            number,
            points,
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
    fn bit_length_matches_python_semantics() {
        assert_eq!(bit_length(0), 0);
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(3), 2);
        assert_eq!(bit_length(4), 3);
    }

    #[test]
    fn groups_players_by_identical_points() {
        let players = vec![player(1, 20), player(2, 20), player(3, 10)];
        let brackets = Brackets::new(players, 2);
        assert_eq!(brackets.groups.len(), 2);
        assert_eq!(brackets.groups[0].len(), 2);
        assert_eq!(brackets.groups[1].len(), 1);
    }

    #[test]
    fn first_bracket_has_no_mdps_and_sees_next_group_as_lower() {
        let players = vec![player(1, 20), player(2, 20), player(3, 10)];
        let brackets = Brackets::new(players, 2);
        let bracket = brackets.current_bracket();
        assert!(bracket.mdp.is_empty());
        assert_eq!(bracket.resident.len(), 2);
        assert_eq!(bracket.lower.len(), 1);
        assert!(!bracket.descriptor.last_pairing_bracket);
    }

    #[test]
    fn collapse_merges_remaining_groups_into_one() {
        let players = vec![
            player(1, 30),
            player(2, 20),
            player(3, 20),
            player(4, 10),
        ];
        let mut brackets = Brackets::new(players, 3);
        brackets.collapse();
        assert_eq!(brackets.groups.len(), 2);
        assert_eq!(brackets.groups[1].len(), 3);
        assert!(brackets.current_bracket().descriptor.penultimate_pairing_bracket);
    }

    #[test]
    fn apply_bracket_pairings_carries_unpaired_residents_as_mdps() {
        let players = vec![player(1, 20), player(2, 20), player(3, 10), player(4, 10)];
        let mut brackets = Brackets::new(players, 2);
        let mut paired = HashSet::new();
        paired.insert(1);
        paired.insert(2);
        brackets.apply_bracket_pairings(&paired);
        assert!(brackets.mdp_list.is_empty());
        assert_eq!(brackets.index, 1);
        let bracket = brackets.current_bracket();
        assert!(bracket.mdp.is_empty());
        assert_eq!(bracket.resident.len(), 2);
    }
}
