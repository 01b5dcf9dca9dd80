//! The criterion stack: builds one [`BigWeight`] per candidate bracket edge
//! by repeatedly growing the value leftward and OR/adding each criterion's
//! own contribution, highest priority first.
//!
//! Each criterion is a plain function returning the bit width it needs for
//! this bracket plus its contribution at that width; the builder folds them
//! in declaration order so an earlier criterion's bits always dominate every
//! later one's, by construction of [`BigWeight::shift_left_grow`].

use crate::bigweight::BigWeight;
use crate::bracket::BracketDescriptor;
use crate::player::{Float, Player, PlayerRole, PreferenceStrength};

fn c1_never_played(p1: &Player, p2: &Player) -> bool {
    !p2.opponents.contains(&p1.number)
}

fn c3_absolute_clash(p1: &Player, p2: &Player) -> bool {
    let topscorer = p1.top_scorer || p2.top_scorer;
    let same_side = p1.color_preference.side == p2.color_preference.side;
    let both_absolute = p1.color_preference.strength == PreferenceStrength::Absolute
        && p2.color_preference.strength == PreferenceStrength::Absolute;
    topscorer || !same_side || !both_absolute
}

/// A single (bit width, contribution) pair; the contribution is built
/// against its own local zero of that width, so callers only ever add it
/// into the low bits just opened by [`BigWeight::shift_left_grow`].
type Criterion = fn(&Player, &Player, &BracketDescriptor) -> (u32, BigWeight);

fn c5_same_bracket(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    let _ = p1;
    let mut w = BigWeight::zero(d.bracket_bits);
    if p2.role != PlayerRole::Lower {
        w.or_literal(1);
    }
    (d.bracket_bits, w)
}

fn c6_score_difference(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    let width = d.score_difference_total_bits;
    let mut w = BigWeight::zero(width);
    if p2.role == PlayerRole::Lower {
        return (width, w);
    }
    let d1 = p1.points - d.min_bracket_score + 10;
    let d2 = p2.points - d.min_bracket_score + 10;
    let d3 = p1.points - p2.points;

    let mut term = BigWeight::zero(1);
    term.or_literal(1);
    term.shift_left_grow(*d.score_difference_bit_dict.get(&d1).unwrap_or(&0));
    w.add(&term);

    let mut term = BigWeight::zero(1);
    term.or_literal(1);
    term.shift_left_grow(*d.score_difference_bit_dict.get(&d2).unwrap_or(&0));
    w.add(&term);

    let mut term = BigWeight::zero(1);
    term.or_literal(1);
    term.shift_left_grow(*d.score_difference_bit_dict.get(&d3).unwrap_or(&0));
    w.sub(&term);

    (width, w)
}

fn c7_downfloat_selection(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    if d.penultimate_pairing_bracket || d.last_pairing_bracket {
        return (0, BigWeight::zero(0));
    }
    let width = d.low_bracket_bits + d.score_difference_total_bits;
    let mut w = BigWeight::zero(width);
    if p2.role == PlayerRole::Lower {
        w.or_literal(1);
    }
    w.shift_left_grow(d.score_difference_total_bits);

    if p1.role != PlayerRole::Lower {
        let diff = p1.points - d.min_bracket_score + 10;
        let mut term = BigWeight::zero(1);
        term.or_literal(1);
        term.shift_left_grow(*d.score_difference_bit_dict.get(&diff).unwrap_or(&0));
        w.add(&term);
    }
    if p2.role != PlayerRole::Lower {
        let diff = p2.points - d.min_bracket_score + 10;
        let mut term = BigWeight::zero(1);
        term.or_literal(1);
        term.shift_left_grow(*d.score_difference_bit_dict.get(&diff).unwrap_or(&0));
        w.add(&term);
    }
    (width, w)
}

fn c8_topscorer_conflict(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    let mut w = BigWeight::zero(d.bracket_bits);
    if p2.role == PlayerRole::Lower {
        return (d.bracket_bits, w);
    }
    let topscorer = p1.top_scorer || p2.top_scorer;
    let at_least_2 = p1.color_difference.abs() > 1 && p2.color_difference.abs() > 1;
    let conflict = p1.color_preference.side == p2.color_preference.side;
    if !(topscorer && at_least_2 && conflict) {
        w.or_literal(1);
    }
    (d.bracket_bits, w)
}

fn c9_topscorer_double_conflict(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    let mut w = BigWeight::zero(d.bracket_bits);
    if p2.role == PlayerRole::Lower {
        return (d.bracket_bits, w);
    }
    let topscorer = p1.top_scorer || p2.top_scorer;
    let double = p1.color_double && p2.color_double;
    let conflict = p1.color_preference.side == p2.color_preference.side;
    if !(topscorer && double && conflict) {
        w.or_literal(1);
    }
    (d.bracket_bits, w)
}

/// Reconstructed: unlike C11 (restricted to Strong-or-above), C10 penalizes
/// any same-side preference conflict, including Mild. No source file for
/// C10 was retrieved in the pack; this follows C11's shape at the next
/// priority tier up. See `DESIGN.md`.
fn c10_color_conflict(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    let mut w = BigWeight::zero(d.bracket_bits);
    if p2.role == PlayerRole::Lower {
        return (d.bracket_bits, w);
    }
    let conflict = p1.color_preference.side == p2.color_preference.side
        && p1.color_preference.side != crate::player::PreferenceSide::None;
    if !conflict {
        w.or_literal(1);
    }
    (d.bracket_bits, w)
}

fn c11_strong_conflict(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    let mut w = BigWeight::zero(d.bracket_bits);
    if p2.role == PlayerRole::Lower {
        return (d.bracket_bits, w);
    }
    let strong = p1.color_preference.strength >= PreferenceStrength::Strong
        && p2.color_preference.strength >= PreferenceStrength::Strong;
    let conflict = p1.color_preference.side == p2.color_preference.side;
    if !(strong && conflict) {
        w.or_literal(1);
    }
    (d.bracket_bits, w)
}

fn c12_prevent_double_down_float1(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    if p2.role == PlayerRole::Lower || !d.one_round_played {
        return (0, BigWeight::zero(0));
    }
    let mut w = BigWeight::zero(d.bracket_bits);
    let prevented_1 = p1.float1 == Some(Float::Down) && p1.points <= p2.points;
    let prevented_2 = p2.float1 == Some(Float::Down);
    let mut count = 0u64;
    if prevented_1 {
        count += 1;
    }
    if prevented_2 {
        count += 1;
    }
    w.or_literal(count);
    (d.bracket_bits, w)
}

fn c13_prevent_double_up_float1(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    if p2.role == PlayerRole::Lower || !d.one_round_played {
        return (0, BigWeight::zero(0));
    }
    let mut w = BigWeight::zero(d.bracket_bits);
    let prevented_1 = p1.float1 == Some(Float::Up) && p1.points >= p2.points;
    let prevented_2 = p2.float1 == Some(Float::Up);
    let mut count = 0u64;
    if prevented_1 {
        count += 1;
    }
    if prevented_2 {
        count += 1;
    }
    w.or_literal(count);
    (d.bracket_bits, w)
}

fn c14_prevent_double_down_float2(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    if p2.role == PlayerRole::Lower || !d.one_round_played {
        return (0, BigWeight::zero(0));
    }
    let mut w = BigWeight::zero(d.bracket_bits);
    let prevented_1 = p1.float2 == Some(Float::Down) && p1.points <= p2.points;
    let prevented_2 = p2.float2 == Some(Float::Down);
    let mut count = 0u64;
    if prevented_1 {
        count += 1;
    }
    if prevented_2 {
        count += 1;
    }
    w.or_literal(count);
    (d.bracket_bits, w)
}

/// Reconstructed: the Up-float analogue of C14, gated on `two_rounds_played`
/// since it reads `float_2`. See `DESIGN.md`.
fn c15_prevent_double_up_float2(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    if p2.role == PlayerRole::Lower || !d.two_rounds_played {
        return (0, BigWeight::zero(0));
    }
    let mut w = BigWeight::zero(d.bracket_bits);
    let prevented_1 = p1.float2 == Some(Float::Up) && p1.points >= p2.points;
    let prevented_2 = p2.float2 == Some(Float::Up);
    let mut count = 0u64;
    if prevented_1 {
        count += 1;
    }
    if prevented_2 {
        count += 1;
    }
    w.or_literal(count);
    (d.bracket_bits, w)
}

fn c16_score_float1_down(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    if p2.role == PlayerRole::Lower || !d.one_round_played {
        return (0, BigWeight::zero(0));
    }
    let width = d.score_difference_total_bits;
    let mut w = BigWeight::zero(width);
    let prev_1 = p1.float1 == Some(Float::Down);
    let prev_2 = p2.float1 == Some(Float::Down);
    let diff1 = p1.points - d.min_bracket_score + 10;
    let diff2 = p2.points - d.min_bracket_score + 10;

    let mut term = BigWeight::zero(1);
    term.or_literal(prev_1 as u64);
    term.shift_left_grow(*d.score_difference_bit_dict.get(&diff1).unwrap_or(&0));
    w.add(&term);

    let mut term = BigWeight::zero(1);
    term.or_literal(prev_2 as u64);
    term.shift_left_grow(*d.score_difference_bit_dict.get(&diff2).unwrap_or(&0));
    w.add(&term);

    if prev_1 && p1.points > p2.points {
        let diff3 = p1.points - p2.points;
        let mut term = BigWeight::zero(1);
        term.or_literal(1);
        term.shift_left_grow(*d.score_difference_bit_dict.get(&diff3).unwrap_or(&0));
        w.sub(&term);
    }
    (width, w)
}

/// Reconstructed: the Up-float subtractive analogue of C19, but gated on
/// `one_round_played` and reading `float_1` (mirroring C16's gate/field
/// choice rather than C19's). See `DESIGN.md`.
fn c17_score_float1_up(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    if p2.role == PlayerRole::Lower || !d.one_round_played {
        return (0, BigWeight::zero(0));
    }
    let width = d.score_difference_total_bits;
    let mut w = BigWeight::zero(width);
    let double = p2.float1 == Some(Float::Up) && p1.points > p2.points;
    if double {
        let diff = p1.points - d.min_bracket_score + 10;
        let mut term = BigWeight::zero(1);
        term.or_literal(1);
        term.shift_left_grow(*d.score_difference_bit_dict.get(&diff).unwrap_or(&0));
        w.sub(&term);
    }
    (width, w)
}

/// Reconstructed: the `float_2` analogue of C16, gated on
/// `two_rounds_played`. See `DESIGN.md`.
fn c18_score_float2_down(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    if p2.role == PlayerRole::Lower || !d.two_rounds_played {
        return (0, BigWeight::zero(0));
    }
    let width = d.score_difference_total_bits;
    let mut w = BigWeight::zero(width);
    let prev_1 = p1.float2 == Some(Float::Down);
    let prev_2 = p2.float2 == Some(Float::Down);
    let diff1 = p1.points - d.min_bracket_score + 10;
    let diff2 = p2.points - d.min_bracket_score + 10;

    let mut term = BigWeight::zero(1);
    term.or_literal(prev_1 as u64);
    term.shift_left_grow(*d.score_difference_bit_dict.get(&diff1).unwrap_or(&0));
    w.add(&term);

    let mut term = BigWeight::zero(1);
    term.or_literal(prev_2 as u64);
    term.shift_left_grow(*d.score_difference_bit_dict.get(&diff2).unwrap_or(&0));
    w.add(&term);

    if prev_1 && p1.points > p2.points {
        let diff3 = p1.points - p2.points;
        let mut term = BigWeight::zero(1);
        term.or_literal(1);
        term.shift_left_grow(*d.score_difference_bit_dict.get(&diff3).unwrap_or(&0));
        w.sub(&term);
    }
    (width, w)
}

fn c19_score_float2_up(p1: &Player, p2: &Player, d: &BracketDescriptor) -> (u32, BigWeight) {
    if p2.role == PlayerRole::Lower || !d.two_rounds_played {
        return (0, BigWeight::zero(0));
    }
    let width = d.score_difference_total_bits;
    let mut w = BigWeight::zero(width);
    let double = p2.float2 == Some(Float::Up) && p1.points > p2.points;
    if double {
        let diff = p1.points - d.min_bracket_score + 10;
        let mut term = BigWeight::zero(1);
        term.or_literal(1);
        term.shift_left_grow(*d.score_difference_bit_dict.get(&diff).unwrap_or(&0));
        w.sub(&term);
    }
    (width, w)
}

/// The quality-criterion stack, C5 through C19, in descending priority
/// order. C1/C3 (absolute) and C4 (bye, only in the last/penultimate
/// bracket) are handled directly by [`WeightBuilder::edge_weight`] since
/// they are not each a uniform (shift, contribution) pair.
const QUALITY_CRITERIA: &[Criterion] = &[
    c5_same_bracket,
    c6_score_difference,
    c7_downfloat_selection,
    c8_topscorer_conflict,
    c9_topscorer_double_conflict,
    c10_color_conflict,
    c11_strong_conflict,
    c12_prevent_double_down_float1,
    c13_prevent_double_up_float1,
    c14_prevent_double_down_float2,
    c15_prevent_double_up_float2,
    c16_score_float1_down,
    c17_score_float1_up,
    c18_score_float2_down,
    c19_score_float2_up,
];

/// Bits reserved past the criterion stack for the driver's own additive
/// perturbations (nudges, ladders, exchange-counting bonuses).
fn trailing_bits(d: &BracketDescriptor) -> u32 {
    3 * d.bracket_bits + 1
}

/// Computes the declared bit width every edge weight in this bracket is
/// built at, and the corresponding sentinel value used to finalize a match
/// (guaranteed to dominate any quality-criterion weight plus any driver
/// perturbation built on top of it, while still fitting in that width).
pub fn max_weight(d: &BracketDescriptor) -> BigWeight {
    let mut w = BigWeight::zero(1);
    w.or_literal(1);
    w.shift_left_grow(2);
    for criterion in QUALITY_CRITERIA {
        let (shift, _) = criterion(&dummy_resident(), &dummy_resident(), d);
        w.shift_left_grow(shift);
    }
    w.shift_left_grow(3 * d.bracket_bits);
    w.shift_left_grow(2);
    w.shift_right(1);
    let mut one = BigWeight::zero(w.width());
    one.or_literal(1);
    w.sub(&one);
    w
}

/// A placeholder resident used only to probe each criterion's declared
/// shift width, which never depends on the players' own data.
fn dummy_resident() -> Player {
    Player {
        number: 1,
        points: 0,
        color_preference: crate::player::ColorPreference::NONE,
        color_difference: 0,
        color_double: false,
        float1: None,
        float2: None,
        opponents: std::collections::HashSet::new(),
        colors: vec![],
        bye_received: false,
        top_scorer: false,
        role: PlayerRole::Resident,
    }
}

/// Builds the per-edge [`BigWeight`] for an ordered pair `(p1, p2)` with
/// `p1` ranked above `p2`. Returns an all-zero value (the matching solver's
/// "no edge" sentinel) if either absolute criterion (C1, C3) is violated.
pub fn edge_weight(p1: &Player, p2: &Player, d: &BracketDescriptor) -> BigWeight {
    if !c1_never_played(p1, p2) || !c3_absolute_clash(p1, p2) {
        return BigWeight::zero(0);
    }

    let mut w = BigWeight::zero(0);
    w.shift_left_grow(2);
    if d.penultimate_pairing_bracket || d.last_pairing_bracket {
        let bye_term = 1 + p1.bye_received as u64 + p2.bye_received as u64;
        w.or_literal(bye_term);
    }

    for criterion in QUALITY_CRITERIA {
        let (shift, contribution) = criterion(p1, p2, d);
        w.shift_left_grow(shift);
        w.add(&contribution);
    }

    w.shift_left_grow(trailing_bits(d));
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::BracketDescriptor;
    use crate::player::{Color, ColorPreference, PreferenceSide};
    use std::collections::{HashMap, HashSet};

    fn descriptor() -> BracketDescriptor {
        let mut dict = HashMap::new();
        dict.insert(10i64, 0u32);
        BracketDescriptor {
            one_round_played: true,
            two_rounds_played: true,
            penultimate_pairing_bracket: false,
            last_pairing_bracket: false,
            min_bracket_score: 0,
            bracket_bits: 2,
            low_bracket_bits: 1,
            score_difference_total_bits: 1,
            score_difference_bit_dict: dict,
        }
    }

    fn player(number: u32) -> Player {
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
    fn prior_opponents_have_no_edge() {
        let d = descriptor();
        let mut p1 = player(1);
        let mut p2 = player(2);
        p1.opponents.insert(2);
        p2.opponents.insert(1);
        let w = edge_weight(&p1, &p2, &d);
        assert!(w.is_zero());
    }

    #[test]
    fn non_topscorers_with_same_absolute_preference_have_no_edge() {
        let d = descriptor();
        let mut p1 = player(1);
        let mut p2 = player(2);
        p1.color_preference = ColorPreference {
            side: PreferenceSide::White,
            strength: PreferenceStrength::Absolute,
        };
        p2.color_preference = p1.color_preference;
        let w = edge_weight(&p1, &p2, &d);
        assert!(w.is_zero());
    }

    #[test]
    fn topscorers_can_share_absolute_preference() {
        let d = descriptor();
        let mut p1 = player(1);
        let mut p2 = player(2);
        p1.top_scorer = true;
        p1.color_preference = ColorPreference {
            side: PreferenceSide::White,
            strength: PreferenceStrength::Absolute,
        };
        p2.color_preference = p1.color_preference;
        let w = edge_weight(&p1, &p2, &d);
        assert!(!w.is_zero());
    }

    #[test]
    fn lower_role_partner_skips_score_difference_weighting() {
        let d = descriptor();
        let p1 = player(1);
        let mut p2 = player(2);
        p2.role = PlayerRole::Lower;
        // Should not panic on a missing score-difference dict key and must
        // still produce a valid (non-zero, since C1/C3 pass) edge weight.
        let w = edge_weight(&p1, &p2, &d);
        assert!(!w.is_zero());
    }

    #[test]
    fn color_double_colors_field_reads_back() {
        let mut p = player(1);
        p.colors = vec![Some(Color::White), Some(Color::White)];
        assert_eq!(p.played_colors().count(), 2);
    }

    #[test]
    fn max_weight_dominates_any_constructed_edge_weight() {
        let d = descriptor();
        let p1 = player(1);
        let p2 = player(2);
        let w = edge_weight(&p1, &p2, &d);
        let max = max_weight(&d);
        assert!(max > w);
    }
}
