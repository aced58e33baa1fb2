use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use uuid::Uuid;

use crate::{
    error::CoreError,
    schema::{tournament_matches, tournament_rankings, tournaments},
    tournaments::{
        BracketShape, Tournament, TournamentStatus,
        matches::{Round, TournamentMatch},
        pairs::Pair,
    },
};

/// A match emitted by the planner, before database ids exist. Pair slots are
/// indices into the registration-ordered pair list; feeder slots are indices
/// into the planned match list itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMatch {
    pub round: Round,
    pub seq: i64,
    pub pair_one: Option<usize>,
    pub pair_two: Option<usize>,
    pub feeder_one: Option<usize>,
    pub feeder_two: Option<usize>,
}

impl PlannedMatch {
    fn pairing(round: Round, seq: i64, a: usize, b: usize) -> Self {
        PlannedMatch {
            round,
            seq,
            pair_one: Some(a),
            pair_two: Some(b),
            feeder_one: None,
            feeder_two: None,
        }
    }

    fn placeholder(round: Round, seq: i64, a: usize, b: usize) -> Self {
        PlannedMatch {
            round,
            seq,
            pair_one: None,
            pair_two: None,
            feeder_one: Some(a),
            feeder_two: Some(b),
        }
    }
}

/// Plans the match schedule for `pair_count` pairs. Pure and deterministic:
/// the same shape and count always produce the same plan, and the input
/// registration order fully determines who meets whom.
///
/// Round robin (4 pairs): the six unordered pairings, all in a single round.
///
/// Single elimination (8 pairs): four quarterfinals pairing neighbours in
/// registration order, then two semifinal placeholders fed by quarterfinals
/// 1+2 and 3+4, then a final placeholder fed by the two semifinals.
pub fn plan_matches(shape: BracketShape, pair_count: usize) -> Vec<PlannedMatch> {
    let mut planned = Vec::new();

    match shape {
        BracketShape::RoundRobin => {
            assert_eq!(pair_count, 4);
            let mut seq = 0;
            for a in 0..pair_count {
                for b in (a + 1)..pair_count {
                    planned.push(PlannedMatch::pairing(
                        Round::RoundRobin,
                        seq,
                        a,
                        b,
                    ));
                    seq += 1;
                }
            }
        }
        BracketShape::SingleElimination => {
            assert_eq!(pair_count, 8);
            for seq in 0..4 {
                planned.push(PlannedMatch::pairing(
                    Round::Quarterfinal,
                    seq as i64,
                    2 * seq,
                    2 * seq + 1,
                ));
            }
            for seq in 0..2 {
                planned.push(PlannedMatch::placeholder(
                    Round::Semifinal,
                    seq as i64,
                    2 * seq,
                    2 * seq + 1,
                ));
            }
            planned.push(PlannedMatch::placeholder(Round::Final, 0, 4, 5));
        }
    }

    planned
}

/// Generates the tournament's schedule from its registered pairs.
///
/// Runs as one transaction: any previously generated matches (and any
/// rankings derived from them) are deleted, the planned matches are
/// inserted, and the tournament moves to `in_progress`. Regenerating an
/// in-progress tournament therefore discards all recorded results.
pub fn generate_matches(
    tournament: &Tournament,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<TournamentMatch>, CoreError> {
    match tournament.status() {
        TournamentStatus::Open | TournamentStatus::InProgress => {}
        other => return Err(CoreError::WrongStatus(other)),
    }

    conn.transaction(
        |conn| -> Result<Result<(), CoreError>, diesel::result::Error> {
            let pairs = Pair::of_tournament(&tournament.id, conn);
            if pairs.len() != tournament.expected_pairs() {
                return Ok(Err(CoreError::InvalidPairCount {
                    expected: tournament.expected_pairs(),
                    found: pairs.len(),
                }));
            }

            diesel::delete(tournament_rankings::table.filter(
                tournament_rankings::tournament_id.eq(&tournament.id),
            ))
            .execute(conn)?;
            diesel::delete(tournament_matches::table.filter(
                tournament_matches::tournament_id.eq(&tournament.id),
            ))
            .execute(conn)?;

            let planned = plan_matches(tournament.shape(), pairs.len());
            let ids: Vec<String> = planned
                .iter()
                .map(|_| Uuid::now_v7().to_string())
                .collect();

            let rows = planned
                .iter()
                .zip(&ids)
                .map(|(m, id)| {
                    (
                        tournament_matches::id.eq(id.clone()),
                        tournament_matches::tournament_id.eq(&tournament.id),
                        tournament_matches::round.eq(m.round.as_str()),
                        tournament_matches::seq.eq(m.seq),
                        tournament_matches::pair_one_id
                            .eq(m.pair_one.map(|i| pairs[i].id.clone())),
                        tournament_matches::pair_two_id
                            .eq(m.pair_two.map(|i| pairs[i].id.clone())),
                        tournament_matches::feeder_one_id
                            .eq(m.feeder_one.map(|i| ids[i].clone())),
                        tournament_matches::feeder_two_id
                            .eq(m.feeder_two.map(|i| ids[i].clone())),
                        tournament_matches::score_one.eq(None::<i64>),
                        tournament_matches::score_two.eq(None::<i64>),
                        tournament_matches::winner_id.eq(None::<String>),
                    )
                })
                .collect::<Vec<_>>();

            let n = diesel::insert_into(tournament_matches::table)
                .values(&rows)
                .execute(conn)?;
            assert_eq!(n, planned.len());

            diesel::update(
                tournaments::table.filter(tournaments::id.eq(&tournament.id)),
            )
            .set(tournaments::status.eq(TournamentStatus::InProgress.as_str()))
            .execute(conn)?;

            tracing::info!(
                tournament = %tournament.id,
                matches = planned.len(),
                shape = ?tournament.shape(),
                "generated schedule"
            );

            Ok(Ok(()))
        },
    )
    .unwrap()?;

    Ok(TournamentMatch::of_tournament(&tournament.id, conn))
}
