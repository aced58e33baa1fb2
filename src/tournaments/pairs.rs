use chrono::Utc;
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::CoreError,
    schema::{tournament_matches, tournament_pairs},
    tournaments::{Tournament, TournamentStatus},
};

/// A two-player team entered into one tournament. `seq` is the registration
/// order, which doubles as the deterministic ordering key for schedule
/// generation and for ranking tie-breaks.
#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct Pair {
    pub id: String,
    pub tournament_id: String,
    pub player_one: String,
    pub player_two: String,
    pub seq: i64,
    pub created_at: chrono::NaiveDateTime,
}

impl Pair {
    pub fn fetch(
        pair_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Self, CoreError> {
        tournament_pairs::table
            .filter(tournament_pairs::id.eq(pair_id))
            .first::<Pair>(conn)
            .optional()
            .unwrap()
            .ok_or(CoreError::PairNotFound)
    }

    /// All pairs of a tournament in registration order.
    pub fn of_tournament(
        tid: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Vec<Pair> {
        tournament_pairs::table
            .filter(tournament_pairs::tournament_id.eq(tid))
            .order_by(tournament_pairs::seq.asc())
            .load::<Pair>(conn)
            .unwrap()
    }
}

pub fn register_pair(
    tournament: &Tournament,
    player_one: &str,
    player_two: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Pair, CoreError> {
    match tournament.status() {
        TournamentStatus::Open => {}
        other => return Err(CoreError::WrongStatus(other)),
    }

    conn.transaction(
        |conn| -> Result<Result<Pair, CoreError>, diesel::result::Error> {
            let existing = Pair::of_tournament(&tournament.id, conn);
            if existing.len() >= tournament.expected_pairs() {
                return Ok(Err(CoreError::TournamentFull));
            }

            let seq = existing.last().map(|pair| pair.seq + 1).unwrap_or(0);

            let id = Uuid::now_v7().to_string();
            let n = diesel::insert_into(tournament_pairs::table)
                .values((
                    tournament_pairs::id.eq(&id),
                    tournament_pairs::tournament_id.eq(&tournament.id),
                    tournament_pairs::player_one.eq(player_one),
                    tournament_pairs::player_two.eq(player_two),
                    tournament_pairs::seq.eq(seq),
                    tournament_pairs::created_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            assert_eq!(n, 1);

            tracing::info!(
                tournament = %tournament.id,
                pair = %id,
                seq,
                "registered pair"
            );

            Ok(Pair::fetch(&id, conn))
        },
    )
    .unwrap()
}

/// Withdraws a pair from an open tournament. Pairs are immutable once the
/// schedule has been generated.
pub fn remove_pair(
    tournament: &Tournament,
    pair_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<(), CoreError> {
    match tournament.status() {
        TournamentStatus::Open => {}
        other => return Err(CoreError::WrongStatus(other)),
    }

    conn.transaction(
        |conn| -> Result<Result<(), CoreError>, diesel::result::Error> {
            let has_matches: i64 = tournament_matches::table
                .filter(tournament_matches::tournament_id.eq(&tournament.id))
                .count()
                .get_result(conn)?;
            if has_matches > 0 {
                return Ok(Err(CoreError::PairsLocked));
            }

            let n = diesel::delete(
                tournament_pairs::table.filter(
                    tournament_pairs::id
                        .eq(pair_id)
                        .and(tournament_pairs::tournament_id.eq(&tournament.id)),
                ),
            )
            .execute(conn)?;

            if n == 0 {
                return Ok(Err(CoreError::PairNotFound));
            }

            Ok(Ok(()))
        },
    )
    .unwrap()
}
