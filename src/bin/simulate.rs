//! Seeds a database with a demo tournament and plays it to completion:
//! registers pairs, generates the schedule, records random (but decisive)
//! scores until every match is decided, then consolidates and prints the
//! final standings.

use clap::Parser;
use diesel::{Connection, SqliteConnection};
use diesel_migrations::MigrationHarness;
use rand::Rng;
use volea::{
    MIGRATIONS,
    tournaments::{
        Tournament, create_tournament,
        matches::{TournamentMatch, generate::generate_matches, record::record_score},
        open_registration,
        pairs::{Pair, register_pair},
        standings::consolidate,
    },
};

#[derive(Parser)]
struct Args {
    /// Player limit: 8 runs a 4-pair round robin, 16 an 8-pair knockout.
    #[arg(long, default_value_t = 16)]
    players: i64,
    /// Database to write to. Defaults to an in-memory database.
    #[arg(long)]
    database_url: Option<String>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let db_url = args
        .database_url
        .unwrap_or_else(|| ":memory:".to_string());

    let mut conn = SqliteConnection::establish(&db_url).unwrap();
    conn.run_pending_migrations(MIGRATIONS).unwrap();

    let tournament =
        create_tournament("Simulated Open", args.players, &mut conn).unwrap();
    let tournament = open_registration(&tournament, &mut conn).unwrap();

    for i in 0..tournament.expected_pairs() {
        register_pair(
            &tournament,
            &format!("Player {}", 2 * i + 1),
            &format!("Player {}", 2 * i + 2),
            &mut conn,
        )
        .unwrap();
    }

    generate_matches(&tournament, &mut conn).unwrap();
    let tournament = Tournament::fetch(&tournament.id, &mut conn).unwrap();

    // knockout matches only become scoreable once their participants
    // resolve, so keep sweeping until nothing is pending
    loop {
        let pending: Vec<TournamentMatch> =
            TournamentMatch::of_tournament(&tournament.id, &mut conn)
                .into_iter()
                .filter(|m| !m.is_decided() && m.is_resolved())
                .collect();

        if pending.is_empty() {
            break;
        }

        for m in pending {
            let loser_games = rand::rng().random_range(0..=4);
            let (a, b) = if rand::rng().random_bool(0.5) {
                (6, loser_games)
            } else {
                (loser_games, 6)
            };
            record_score(&m.id, a, b, &mut conn).unwrap();
        }
    }

    let standings = consolidate(&tournament, &mut conn).unwrap();

    println!("Final standings for {}:", tournament.name);
    for entry in standings {
        let pair = Pair::fetch(&entry.pair_id, &mut conn).unwrap();
        println!(
            "  {}. {} / {} ({} points)",
            entry.placement, pair.player_one, pair.player_two, entry.points
        );
    }
}
