//! Performance benchmarks for the round-pairing core.
//!
//! Synthetic rosters at increasing player counts, fresh (round 1) and
//! mid-tournament (several rounds of already-played history), so both the
//! cheap all-fresh path and the criterion-stack-heavy path are covered.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use dutch_pairing::player::{derive_players, Color, DerivationConfig, RawPlayer, RoundRecord};
use dutch_pairing::{pair_round, PairingError};

const PLAYER_COUNTS: [usize; 6] = [8, 16, 32, 64, 128, 256];

fn fresh_roster(count: usize) -> Vec<RawPlayer> {
    (1..=count as u32)
        .map(|number| RawPlayer {
            number,
            withdrawn: false,
            results: vec![],
            acceleration: vec![],
        })
        .collect()
}

/// A roster that already has 3 played rounds, round-robin paired by
/// starting number so every player's history is plausible and no two
/// players are forced to have played each other twice.
fn seasoned_roster(count: usize) -> Vec<RawPlayer> {
    let mut raw: Vec<RawPlayer> = fresh_roster(count);
    for round in 0..3u32 {
        let shift = round as usize;
        for i in 0..count {
            let opponent = (i + shift + 1) % count;
            if opponent == i {
                continue;
            }
            let (white, black) = if i < opponent { (i, opponent) } else { (opponent, i) };
            if raw[white].results.len() as u32 == round && raw[black].results.len() as u32 == round {
                let opponent_number = raw[black].number;
                raw[white].results.push(RoundRecord {
                    opponent: Some(opponent_number),
                    color: Some(Color::White),
                    points_delta: 10,
                });
                let white_number = raw[white].number;
                raw[black].results.push(RoundRecord {
                    opponent: Some(white_number),
                    color: Some(Color::Black),
                    points_delta: 0,
                });
            }
        }
        for p in raw.iter_mut() {
            if p.results.len() as u32 == round {
                p.results.push(RoundRecord {
                    opponent: None,
                    color: None,
                    points_delta: 5,
                });
            }
        }
    }
    raw
}

fn config() -> DerivationConfig {
    DerivationConfig {
        total_rounds: 9,
        is_last_round: false,
        forbidden_pairs: vec![],
    }
}

fn bench_round_one_pairing(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_one_pairing");
    group.measurement_time(Duration::from_secs(10));

    for &count in &PLAYER_COUNTS {
        group.bench_with_input(BenchmarkId::new("generate_pairings", count), &count, |b, &count| {
            let raw = fresh_roster(count);
            b.iter(|| {
                let result: Result<Vec<(u32, u32)>, PairingError> = pair_round(black_box(&raw), &config());
                black_box(result).expect("fresh roster must always be pairable");
            });
        });
    }
    group.finish();
}

fn bench_mid_tournament_pairing(c: &mut Criterion) {
    let mut group = c.benchmark_group("mid_tournament_pairing");
    group.measurement_time(Duration::from_secs(10));

    for &count in &PLAYER_COUNTS {
        group.bench_with_input(BenchmarkId::new("generate_pairings", count), &count, |b, &count| {
            let raw = seasoned_roster(count);
            b.iter(|| {
                let result: Result<Vec<(u32, u32)>, PairingError> = pair_round(black_box(&raw), &config());
                black_box(result).expect("seasoned roster must always be pairable");
            });
        });
    }
    group.finish();
}

fn bench_player_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("player_derivation");

    for &count in &PLAYER_COUNTS {
        group.bench_with_input(BenchmarkId::new("derive_players", count), &count, |b, &count| {
            let raw = seasoned_roster(count);
            b.iter(|| {
                black_box(derive_players(black_box(&raw), &config())).expect("derivation must succeed");
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_round_one_pairing,
    bench_mid_tournament_pairing,
    bench_player_derivation
);
criterion_main!(benches);
