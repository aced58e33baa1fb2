use std::collections::HashMap;

use chrono::Utc;
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::CoreError,
    schema::{tournament_rankings, tournaments},
    tournaments::{
        BracketShape, Tournament, TournamentStatus,
        matches::{Round, TournamentMatch},
        pairs::Pair,
    },
};

/// A final standing for one pair. Derived data: created only by
/// consolidation, deleted and regenerated whenever consolidation re-runs or
/// the tournament is reopened.
#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct RankingEntry {
    pub id: String,
    pub tournament_id: String,
    pub pair_id: String,
    pub placement: i64,
    pub points: i64,
    pub created_at: chrono::NaiveDateTime,
}

impl RankingEntry {
    pub fn of_tournament(
        tid: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Vec<Self> {
        tournament_rankings::table
            .filter(tournament_rankings::tournament_id.eq(tid))
            .order_by((
                tournament_rankings::placement.asc(),
                tournament_rankings::pair_id.asc(),
            ))
            .load::<RankingEntry>(conn)
            .unwrap()
    }
}

/// Ranking points awarded per placement. A fixed table, so that rankings
/// across tournaments of the same shape are comparable.
fn points_for(shape: BracketShape, placement: i64) -> i64 {
    match (shape, placement) {
        (BracketShape::SingleElimination, 1) => 100,
        (BracketShape::SingleElimination, 2) => 60,
        (BracketShape::SingleElimination, 3) => 40,
        (BracketShape::SingleElimination, 5) => 20,
        (BracketShape::RoundRobin, 1) => 50,
        (BracketShape::RoundRobin, 2) => 30,
        (BracketShape::RoundRobin, 3) => 20,
        (BracketShape::RoundRobin, 4) => 10,
        _ => unreachable!("no such placement for this bracket shape"),
    }
}

/// Derives final standings from completed match results and freezes the
/// tournament as `completed`.
///
/// Fails with `IncompleteResults` (writing nothing) unless every match has
/// a recorded winner. Idempotent: re-running with unchanged results deletes
/// the previous ranking rows and reinserts an identical set. Deleting and
/// inserting the rankings and the status change are one transaction.
pub fn consolidate(
    tournament: &Tournament,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<RankingEntry>, CoreError> {
    conn.transaction(
        |conn| -> Result<Result<Vec<RankingEntry>, CoreError>, diesel::result::Error> {
            let matches = TournamentMatch::of_tournament(&tournament.id, conn);

            let undecided =
                matches.iter().filter(|m| !m.is_decided()).count();
            if matches.is_empty() || undecided > 0 {
                return Ok(Err(CoreError::IncompleteResults { undecided }));
            }

            let placements = match tournament.shape() {
                BracketShape::RoundRobin => round_robin_placements(
                    &matches,
                    &Pair::of_tournament(&tournament.id, conn),
                ),
                BracketShape::SingleElimination => {
                    elimination_placements(&matches)
                }
            };

            diesel::delete(tournament_rankings::table.filter(
                tournament_rankings::tournament_id.eq(&tournament.id),
            ))
            .execute(conn)?;

            let now = Utc::now().naive_utc();
            let rows = placements
                .iter()
                .map(|(pair_id, placement)| {
                    (
                        tournament_rankings::id
                            .eq(Uuid::now_v7().to_string()),
                        tournament_rankings::tournament_id
                            .eq(&tournament.id),
                        tournament_rankings::pair_id.eq(pair_id.clone()),
                        tournament_rankings::placement.eq(*placement),
                        tournament_rankings::points
                            .eq(points_for(tournament.shape(), *placement)),
                        tournament_rankings::created_at.eq(now),
                    )
                })
                .collect::<Vec<_>>();

            let n = diesel::insert_into(tournament_rankings::table)
                .values(&rows)
                .execute(conn)?;
            assert_eq!(n, placements.len());

            diesel::update(
                tournaments::table.filter(tournaments::id.eq(&tournament.id)),
            )
            .set(tournaments::status.eq(TournamentStatus::Completed.as_str()))
            .execute(conn)?;

            tracing::info!(
                tournament = %tournament.id,
                entries = placements.len(),
                "consolidated rankings"
            );

            Ok(Ok(RankingEntry::of_tournament(&tournament.id, conn)))
        },
    )
    .unwrap()
}

/// Reopens a completed tournament for score corrections. The rankings are
/// stale the moment new scores can be entered, so they are deleted; matches
/// and scores stay intact for editing.
pub fn reopen_tournament(
    tournament: &Tournament,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Tournament, CoreError> {
    match tournament.status() {
        TournamentStatus::Completed => {}
        other => return Err(CoreError::WrongStatus(other)),
    }

    conn.transaction(|conn| -> Result<(), diesel::result::Error> {
        diesel::delete(
            tournament_rankings::table.filter(
                tournament_rankings::tournament_id.eq(&tournament.id),
            ),
        )
        .execute(conn)?;

        diesel::update(
            tournaments::table.filter(tournaments::id.eq(&tournament.id)),
        )
        .set(tournaments::status.eq(TournamentStatus::InProgress.as_str()))
        .execute(conn)?;

        Ok(())
    })
    .unwrap();

    tracing::info!(tournament = %tournament.id, "reopened tournament");

    Tournament::fetch(&tournament.id, conn)
}

/// Knockout placements: final winner first, final loser second, the two
/// semifinal losers share third, the four quarterfinal losers share fifth.
/// Assumes every match is decided.
fn elimination_placements(
    matches: &[TournamentMatch],
) -> Vec<(String, i64)> {
    let of_round = |round: Round| {
        matches
            .iter()
            .filter(move |m| m.round() == round)
            .sorted_by_key(|m| m.seq)
    };

    let final_match = of_round(Round::Final)
        .exactly_one()
        .ok()
        .expect("a knockout bracket has exactly one final");

    let mut placements = Vec::with_capacity(8);
    placements.push((
        final_match
            .winner_id
            .clone()
            .expect("all matches are decided"),
        1,
    ));
    placements.push((
        final_match.loser_id().expect("all matches are decided"),
        2,
    ));
    for semi in of_round(Round::Semifinal) {
        placements
            .push((semi.loser_id().expect("all matches are decided"), 3));
    }
    for quarter in of_round(Round::Quarterfinal) {
        placements
            .push((quarter.loser_id().expect("all matches are decided"), 5));
    }

    placements
}

/// Round-robin placements: a strict 1..=4 ordering by wins (descending),
/// breaking ties by game difference (games scored minus games conceded
/// across the pair's matches, descending) and finally by registration
/// order. Ties are never left ambiguous. Assumes every match is decided.
fn round_robin_placements(
    matches: &[TournamentMatch],
    pairs: &[Pair],
) -> Vec<(String, i64)> {
    #[derive(Default)]
    struct Tally {
        wins: i64,
        game_diff: i64,
    }

    let mut tallies: HashMap<&str, Tally> = pairs
        .iter()
        .map(|pair| (pair.id.as_str(), Tally::default()))
        .collect();

    for m in matches {
        let pair_one = m.pair_one_id.as_deref().expect("round-robin matches are always resolved");
        let pair_two = m.pair_two_id.as_deref().expect("round-robin matches are always resolved");
        let score_one = m.score_one.expect("all matches are decided");
        let score_two = m.score_two.expect("all matches are decided");

        tallies.get_mut(pair_one).unwrap().game_diff += score_one - score_two;
        tallies.get_mut(pair_two).unwrap().game_diff += score_two - score_one;

        let winner = m.winner_id.as_deref().expect("all matches are decided");
        tallies.get_mut(winner).unwrap().wins += 1;
    }

    pairs
        .iter()
        .sorted_by_key(|pair| {
            let tally = &tallies[pair.id.as_str()];
            (-tally.wins, -tally.game_diff, pair.seq)
        })
        .enumerate()
        .map(|(idx, pair)| (pair.id.clone(), idx as i64 + 1))
        .collect()
}
