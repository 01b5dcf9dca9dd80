//! Player-state derivation: turning raw per-round results into the
//! pairing attributes the rest of the engine consumes.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::PairingError;

/// The color a player was assigned in a single played round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// The color side of a color preference, including "no preference".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreferenceSide {
    White,
    None,
    Black,
}

impl PreferenceSide {
    pub fn opposite(self) -> PreferenceSide {
        match self {
            PreferenceSide::White => PreferenceSide::Black,
            PreferenceSide::Black => PreferenceSide::White,
            PreferenceSide::None => PreferenceSide::None,
        }
    }
}

/// How strongly a player needs `side`, ordered from weakest to strongest
/// so `strength >= PreferenceStrength::Strong` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PreferenceStrength {
    None,
    Mild,
    Strong,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPreference {
    pub side: PreferenceSide,
    pub strength: PreferenceStrength,
}

impl ColorPreference {
    pub const NONE: ColorPreference = ColorPreference {
        side: PreferenceSide::None,
        strength: PreferenceStrength::None,
    };
}

/// Whether a player was floated up or down at a given past round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Float {
    Up,
    Down,
}

/// A player's transient position within the bracket currently being paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerRole {
    /// Moved down from a higher bracket, still unpaired.
    Mdp,
    /// Belongs to this bracket's own score group.
    Resident,
    /// Belongs to the next lower bracket; visible only as a downfloat target.
    Lower,
}

/// Derived, round-pairing-ready player state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub number: u32,
    /// Points scored so far, stored as points x 10.
    pub points: i64,
    pub color_preference: ColorPreference,
    pub color_difference: i32,
    pub color_double: bool,
    pub float1: Option<Float>,
    pub float2: Option<Float>,
    pub opponents: HashSet<u32>,
    pub colors: Vec<Option<Color>>,
    pub bye_received: bool,
    pub top_scorer: bool,
    pub role: PlayerRole,
}

impl Player {
    /// True iff the most recent two played (non-bye) games were the same
    /// color; used only during derivation, kept for callers that want to
    /// re-check the invariant.
    pub fn played_colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.colors.iter().filter_map(|c| *c)
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl Eq for Player {}

impl std::hash::Hash for Player {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.number.hash(state);
    }
}

/// Ranking order: higher points first, lower starting number breaks ties.
impl Ord for Player {
    fn cmp(&self, other: &Self) -> Ordering {
        self.points
            .cmp(&other.points)
            .then_with(|| other.number.cmp(&self.number))
    }
}

impl PartialOrd for Player {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One round's result for a single player, already resolved to a points
/// contribution; this is what the (out-of-scope) tournament file parser
/// hands the core.
#[derive(Debug, Clone)]
pub struct RoundRecord {
    /// `None` denotes a bye or a result with no opponent (forfeit win).
    pub opponent: Option<u32>,
    pub color: Option<Color>,
    /// Points earned this round, x 10.
    pub points_delta: i64,
}

/// A player's full history plus configuration needed to derive its
/// [`Player`] state.
#[derive(Debug, Clone)]
pub struct RawPlayer {
    pub number: u32,
    /// Withdrawn / zeroed players are dropped before pairing.
    pub withdrawn: bool,
    pub results: Vec<RoundRecord>,
    /// Acceleration bonus, x 10, indexed by round (0-based).
    pub acceleration: Vec<i64>,
}

/// Tournament-wide configuration needed for derivation.
#[derive(Debug, Clone)]
pub struct DerivationConfig {
    pub total_rounds: u32,
    pub is_last_round: bool,
    /// Pairs of starting numbers treated as if they had already played.
    pub forbidden_pairs: Vec<(u32, u32)>,
}

/// The single acceleration bonus attributed to round `round_idx`, or 0 past
/// the end of the configured acceleration array. Acceleration is a per-round
/// bonus, not a cumulative series, so this is never summed over a range.
fn acceleration_at(raw: &RawPlayer, round_idx: usize) -> i64 {
    raw.acceleration.get(round_idx).copied().unwrap_or(0)
}

fn points_before_round(raw: &RawPlayer, round_idx: usize) -> i64 {
    let played: i64 = raw.results[..round_idx].iter().map(|r| r.points_delta).sum();
    played + acceleration_at(raw, round_idx)
}

fn float_at(raw_by_number: &HashMap<u32, &RawPlayer>, raw: &RawPlayer, rounds_ago: usize) -> Option<Float> {
    if raw.results.len() < rounds_ago {
        return None;
    }
    let idx = raw.results.len() - rounds_ago;
    let record = &raw.results[idx];
    let Some(opponent_number) = record.opponent else {
        // A bye or unpaired round is itself a downfloat.
        return Some(Float::Down);
    };
    let opponent = raw_by_number.get(&opponent_number)?;
    let mine = points_before_round(raw, idx);
    let theirs = points_before_round(opponent, idx);
    match mine.cmp(&theirs) {
        Ordering::Greater => Some(Float::Down),
        Ordering::Less => Some(Float::Up),
        Ordering::Equal => None,
    }
}

fn derive_color_preference(played: &[Color]) -> (ColorPreference, i32, bool) {
    let whites = played.iter().filter(|c| **c == Color::White).count() as i32;
    let blacks = played.iter().filter(|c| **c == Color::Black).count() as i32;
    let diff = whites - blacks;
    let double = played.len() >= 2 && played[played.len() - 1] == played[played.len() - 2];

    let side = match diff.cmp(&0) {
        Ordering::Greater => PreferenceSide::Black,
        Ordering::Less => PreferenceSide::White,
        Ordering::Equal => match played.last() {
            Some(last) => last.opposite().into(),
            None => PreferenceSide::None,
        },
    };
    let strength = if diff.abs() > 1 || double {
        PreferenceStrength::Absolute
    } else if diff.abs() == 1 {
        PreferenceStrength::Strong
    } else if side != PreferenceSide::None {
        PreferenceStrength::Mild
    } else {
        PreferenceStrength::None
    };
    (ColorPreference { side, strength }, diff, double)
}

impl From<Color> for PreferenceSide {
    fn from(c: Color) -> Self {
        match c {
            Color::White => PreferenceSide::White,
            Color::Black => PreferenceSide::Black,
        }
    }
}

/// Derive pairing-ready [`Player`] state for every eligible player in the
/// roster: withdrawn players and players missing the most recently played
/// round are dropped, forbidden pairs are folded into `opponents`, and
/// `top_scorer` is evaluated only when pairing the final round.
pub fn derive_players(
    raw_players: &[RawPlayer],
    config: &DerivationConfig,
) -> Result<Vec<Player>, PairingError> {
    let eligible: Vec<&RawPlayer> = raw_players.iter().filter(|p| !p.withdrawn).collect();
    if eligible.is_empty() {
        return Err(PairingError::EmptyRoster);
    }

    let min_played = eligible
        .iter()
        .map(|p| p.results.len())
        .min()
        .unwrap_or(0);

    let mut seen_numbers = HashSet::new();
    for p in &eligible {
        if !seen_numbers.insert(p.number) {
            return Err(PairingError::InvalidInput(format!(
                "duplicate starting number {}",
                p.number
            )));
        }
    }

    let by_number: HashMap<u32, &RawPlayer> = eligible.iter().map(|p| (p.number, *p)).collect();
    for &(a, b) in &config.forbidden_pairs {
        if !by_number.contains_key(&a) || !by_number.contains_key(&b) {
            return Err(PairingError::InvalidInput(format!(
                "forbidden pair ({a}, {b}) names an unknown starting number"
            )));
        }
    }

    let max_score = min_played as i64 * 10;

    let mut players = Vec::with_capacity(eligible.len());
    for raw in eligible.iter().filter(|p| p.results.len() == min_played) {
        let points: i64 = raw.results.iter().map(|r| r.points_delta).sum::<i64>()
            + acceleration_at(raw, raw.results.len());

        let colors: Vec<Option<Color>> = raw.results.iter().map(|r| r.color).collect();
        let played: Vec<Color> = colors.iter().filter_map(|c| *c).collect();
        let (color_preference, color_difference, color_double) = derive_color_preference(&played);

        let mut opponents: HashSet<u32> = raw.results.iter().filter_map(|r| r.opponent).collect();
        for &(a, b) in &config.forbidden_pairs {
            if a == raw.number {
                opponents.insert(b);
            } else if b == raw.number {
                opponents.insert(a);
            }
        }
        opponents.remove(&raw.number);

        let bye_received = raw.results.iter().any(|r| r.opponent.is_none());
        let top_scorer = config.is_last_round && points * 2 > max_score;

        players.push(Player {
            number: raw.number,
            points,
            color_preference,
            color_difference,
            color_double,
            float1: float_at(&by_number, raw, 1),
            float2: float_at(&by_number, raw, 2),
            opponents,
            colors,
            bye_received,
            top_scorer,
            role: PlayerRole::Resident,
        });
    }

    Ok(players)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(opponent: Option<u32>, color: Option<Color>, points_delta: i64) -> RoundRecord {
        RoundRecord {
            opponent,
            color,
            points_delta,
        }
    }

    #[test]
    fn color_preference_after_two_whites_is_absolute_black() {
        let (pref, diff, double) =
            derive_color_preference(&[Color::White, Color::White]);
        assert_eq!(pref.side, PreferenceSide::Black);
        assert_eq!(pref.strength, PreferenceStrength::Absolute);
        assert_eq!(diff, 2);
        assert!(double);
    }

    #[test]
    fn color_preference_balanced_opposes_last_color() {
        let (pref, diff, double) = derive_color_preference(&[Color::White, Color::Black]);
        assert_eq!(diff, 0);
        assert!(!double);
        assert_eq!(pref.side, PreferenceSide::White);
        assert_eq!(pref.strength, PreferenceStrength::Mild);
    }

    #[test]
    fn derive_players_drops_withdrawn_and_applies_forbidden_pairs() {
        let raw = vec![
            RawPlayer {
                number: 1,
                withdrawn: false,
                results: vec![record(Some(2), Some(Color::White), 10)],
                acceleration: vec![],
            },
            RawPlayer {
                number: 2,
                withdrawn: false,
                results: vec![record(Some(1), Some(Color::Black), 0)],
                acceleration: vec![],
            },
            RawPlayer {
                number: 3,
                withdrawn: true,
                results: vec![],
                acceleration: vec![],
            },
        ];
        let config = DerivationConfig {
            total_rounds: 5,
            is_last_round: false,
            forbidden_pairs: vec![(1, 2)],
        };
        let players = derive_players(&raw, &config).unwrap();
        assert_eq!(players.len(), 2);
        let p1 = players.iter().find(|p| p.number == 1).unwrap();
        assert!(p1.opponents.contains(&2));
    }

    #[test]
    fn rank_order_prefers_higher_points_then_lower_number() {
        let mut a = Player {
            number: 5,
            points: 20,
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
        };
        let mut b = a.clone();
        b.number = 3;
        // Same points: lower number ranks higher.
        assert!(b > a);
        a.points = 30;
        assert!(a > b);
    }

    #[test]
    fn bye_round_is_a_down_float() {
        let by_number = HashMap::new();
        let raw = RawPlayer {
            number: 1,
            withdrawn: false,
            results: vec![record(None, None, 10)],
            acceleration: vec![],
        };
        assert_eq!(float_at(&by_number, &raw, 1), Some(Float::Down));
    }

    #[test]
    fn acceleration_is_a_single_round_bonus_not_a_running_sum() {
        let raw = RawPlayer {
            number: 1,
            withdrawn: false,
            results: vec![record(None, None, 10)],
            acceleration: vec![10, 10],
        };
        let config = DerivationConfig {
            total_rounds: 5,
            is_last_round: false,
            forbidden_pairs: vec![],
        };
        let players = derive_players(&[raw], &config).unwrap();
        // One played round (10) plus only the acceleration element indexed
        // by the round about to be paired (index 1, also 10) -- not the
        // sum of both acceleration entries (which would wrongly give 30).
        assert_eq!(players[0].points, 20);
    }
}
