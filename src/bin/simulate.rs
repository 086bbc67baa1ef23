use clap::Parser;
use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use uno_sync::config::{RoomSettings, ScoringConfig, MAX_PLAYERS, MIN_PLAYERS};
use uno_sync::game::{Match, MatchPlayer, MatchStatus};
use uno_sync::players::{take_turn, Difficulty};
use uno_sync::UnoResult;

/// Plays computer-only matches and reports win rates per seat.
#[derive(Debug, Parser)]
#[command(name = "simulate", version, about = "Simulate computer-only UNO matches")]
struct Args {
    /// Number of matches to play
    #[arg(short = 'n', long, default_value_t = 100)]
    games: u32,

    /// Difficulty of each seat, in seat order
    #[arg(short, long, value_enum, num_args = 2.., default_values_t = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard])]
    players: Vec<Difficulty>,

    /// Base seed; match i uses seed + i
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Points needed to win a match
    #[arg(long, default_value_t = 500)]
    points_to_win: u32,

    /// Disable stacking of draw cards
    #[arg(long)]
    no_stacking: bool,
}

const MAX_TURNS: u32 = 10_000;

#[derive(Debug, Clone, Copy)]
struct MatchReport {
    winner: Option<usize>,
    turns: u32,
    rounds: u32,
}

fn play_match(args: &Args, seed: u64) -> UnoResult<MatchReport> {
    let players = args
        .players
        .iter()
        .enumerate()
        .map(|(seat, difficulty)| {
            MatchPlayer::computer(format!("cpu-{seat}"), format!("Seat {seat} ({difficulty:?})"), *difficulty)
        })
        .collect();
    let settings = RoomSettings {
        stacking_enabled: !args.no_stacking,
        points_to_win: args.points_to_win,
        ..RoomSettings::default()
    };

    let mut game = Match::start_seeded(players, settings, ScoringConfig::default(), seed)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));
    let mut turns = 0;

    while turns < MAX_TURNS {
        match &game.status {
            MatchStatus::Finished { winner } => {
                let winner = game.seat_of(winner);
                return Ok(MatchReport {
                    winner,
                    turns,
                    rounds: game.round,
                });
            }
            MatchStatus::RoundOver { winner } => {
                debug!("Round {} won by {}", game.round, winner);
                game.new_round()?;
            }
            MatchStatus::InProgress => {
                let seat = game.turn.current_player_index;
                let difficulty = args.players[seat];
                take_turn(&mut game, seat, difficulty, &mut rng)?;
                turns += 1;
            }
        }
    }

    Ok(MatchReport {
        winner: None,
        turns,
        rounds: game.round,
    })
}

fn main() -> UnoResult<()> {
    env_logger::init();
    let args = Args::parse();

    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&args.players.len()) {
        return Err(uno_sync::UnoError::Validation(format!(
            "between {MIN_PLAYERS} and {MAX_PLAYERS} players required"
        )));
    }

    println!("🎮 UNO Simulation");
    println!("=================");
    println!("  - Seats: {:?}", args.players);
    println!("  - Matches: {}", args.games);
    println!("  - Stacking: {}", !args.no_stacking);

    let reports: Vec<MatchReport> = (0..args.games)
        .into_par_iter()
        .map(|i| play_match(&args, args.seed.wrapping_add(u64::from(i))))
        .collect::<UnoResult<_>>()?;

    let mut wins = vec![0u32; args.players.len()];
    let mut completed = 0u32;
    let mut total_turns = 0u64;
    let mut total_rounds = 0u64;
    for report in &reports {
        if let Some(seat) = report.winner {
            wins[seat] += 1;
            completed += 1;
            total_turns += u64::from(report.turns);
            total_rounds += u64::from(report.rounds);
        }
    }

    println!("\n📊 Results:");
    for (seat, (difficulty, count)) in args.players.iter().zip(&wins).enumerate() {
        let rate = if completed > 0 {
            f64::from(*count) / f64::from(completed) * 100.0
        } else {
            0.0
        };
        println!("  Seat {seat} ({difficulty:?}): {count} wins ({rate:.1}%)");
    }
    println!("Completed matches: {}/{}", completed, args.games);
    if completed > 0 {
        println!(
            "Average rounds: {:.1}, average turns: {:.1}",
            total_rounds as f64 / f64::from(completed),
            total_turns as f64 / f64::from(completed)
        );
    }
    info!("Simulation finished");
    Ok(())
}
