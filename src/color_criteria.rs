//! E1-E5: which of a finalized pair gets White, decided after the matching
//! is complete. Unlike the C-series these never feed the matcher; they are
//! a short-circuiting chain evaluated once per output pair.

use crate::player::{Player, PreferenceSide, PreferenceStrength};

/// `Some(true)` means `player_1` gets White, `Some(false)` means `player_2`
/// does; `None` means this criterion is not conclusive and the next one in
/// the chain should be tried.
type ColorVerdict = Option<bool>;

/// E1: if both have a preference and they disagree, grant both what they want.
fn e1(p1: &Player, p2: &Player) -> ColorVerdict {
    let exists = p1.color_preference.side != PreferenceSide::None
        && p2.color_preference.side != PreferenceSide::None;
    let no_conflict = p1.color_preference.side != p2.color_preference.side;
    if exists && no_conflict {
        return Some(p1.color_preference.side == PreferenceSide::White);
    }
    None
}

/// E2: grant the stronger preference; if both are Absolute and tied in
/// strength, grant the larger color-difference magnitude.
fn e2(p1: &Player, p2: &Player) -> ColorVerdict {
    let same_strength = p1.color_preference.strength == p2.color_preference.strength;
    let same_difference = p1.color_difference.abs() == p2.color_difference.abs();
    let both_absolute = p1.color_preference.strength == PreferenceStrength::Absolute
        && p2.color_preference.strength == PreferenceStrength::Absolute;

    if !same_strength {
        return if p1.color_preference.strength > p2.color_preference.strength {
            Some(p1.color_preference.side == PreferenceSide::White)
        } else {
            Some(p2.color_preference.side == PreferenceSide::Black)
        };
    }
    if both_absolute && !same_difference {
        return if p1.color_difference.abs() > p2.color_difference.abs() {
            Some(p1.color_preference.side == PreferenceSide::White)
        } else {
            Some(p2.color_preference.side == PreferenceSide::Black)
        };
    }
    None
}

/// E3: alternate relative to the most recent round the two played
/// different colors (own histories, not against each other). Colors are
/// compared from the tail; a history of length 0 on either side falls
/// through as inconclusive.
fn e3(p1: &Player, p2: &Player) -> ColorVerdict {
    let colors_1: Vec<_> = p1.played_colors().collect();
    let colors_2: Vec<_> = p2.played_colors().collect();
    for (c1, c2) in colors_1.iter().rev().zip(colors_2.iter().rev()) {
        if c1 != c2 {
            return Some(*c1 == crate::player::Color::Black);
        }
    }
    None
}

/// E4: grant the higher-ranked player's own non-None preference.
fn e4(p1: &Player, p2: &Player) -> ColorVerdict {
    if p1 > p2 && p1.color_preference.side != PreferenceSide::None {
        return Some(p1.color_preference.side == PreferenceSide::White);
    }
    if p2 > p1 && p2.color_preference.side != PreferenceSide::None {
        return Some(p2.color_preference.side == PreferenceSide::Black);
    }
    None
}

/// E5: terminal fallback. The higher-ranked player gets White iff their
/// starting number is odd.
fn e5(p1: &Player, p2: &Player) -> bool {
    if p1.number < p2.number {
        p1.number % 2 == 1
    } else {
        p2.number % 2 == 0
    }
}

/// Decide which of `p1`/`p2` plays White, running E1-E5 in order and
/// stopping at the first conclusive verdict. `p1`/`p2` need not be ordered
/// by rank; the caller passes whichever two players were finalized
/// together.
pub fn assign_colors(p1: &Player, p2: &Player) -> (u32, u32) {
    let white_is_p1 = e1(p1, p2)
        .or_else(|| e2(p1, p2))
        .or_else(|| e3(p1, p2))
        .or_else(|| e4(p1, p2))
        .unwrap_or_else(|| e5(p1, p2));

    if white_is_p1 {
        (p1.number, p2.number)
    } else {
        (p2.number, p1.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{Color, ColorPreference, PlayerRole};
    use std::collections::HashSet;

    fn base(number: u32) -> Player {
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
    fn e1_grants_disagreeing_preferences() {
        let mut p1 = base(1);
        p1.color_preference = ColorPreference {
            side: PreferenceSide::White,
            strength: PreferenceStrength::Mild,
        };
        let mut p2 = base(2);
        p2.color_preference = ColorPreference {
            side: PreferenceSide::Black,
            strength: PreferenceStrength::Mild,
        };
        let (white, black) = assign_colors(&p1, &p2);
        assert_eq!((white, black), (1, 2));
    }

    #[test]
    fn e5_falls_back_to_parity_of_higher_ranked_number() {
        let mut p1 = base(4);
        p1.points = 20;
        let p2 = base(7);
        // p1 outranks p2 (higher points); p1.number is even so it gets Black.
        let (white, black) = assign_colors(&p1, &p2);
        assert_eq!((white, black), (7, 4));
    }

    #[test]
    fn e3_alternates_from_most_recent_differing_round() {
        let mut p1 = base(1);
        p1.colors = vec![Some(Color::White), Some(Color::Black)];
        let mut p2 = base(2);
        p2.colors = vec![Some(Color::Black), Some(Color::Black)];
        // Most recent round: p1=Black, p2=Black -> equal, skip.
        // Previous round: p1=White, p2=Black -> differ; p1 had White, so
        // p1 now gets the opposite, i.e. Black.
        let (white, black) = assign_colors(&p1, &p2);
        assert_eq!((white, black), (2, 1));
    }
}
