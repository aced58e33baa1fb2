use std::fmt;

use chrono::Utc;
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::CoreError,
    schema::{
        tournament_matches, tournament_pairs, tournament_rankings, tournaments,
    },
};

pub mod matches;
pub mod pairs;
pub mod standings;

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct Tournament {
    pub id: String,
    pub name: String,
    pub created_at: chrono::NaiveDateTime,
    pub status: String,
    pub max_players: i64,
}

/// Life cycle of a tournament. Registration happens while `Open`; schedule
/// generation moves the tournament to `InProgress`; consolidation freezes it
/// as `Completed`. A completed tournament can be reopened for corrections.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentStatus {
    Draft,
    Open,
    InProgress,
    Completed,
}

impl TournamentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentStatus::Draft => "draft",
            TournamentStatus::Open => "open",
            TournamentStatus::InProgress => "in_progress",
            TournamentStatus::Completed => "completed",
        }
    }

    pub fn parse(status: &str) -> Self {
        match status {
            "draft" => TournamentStatus::Draft,
            "open" => TournamentStatus::Open,
            "in_progress" => TournamentStatus::InProgress,
            "completed" => TournamentStatus::Completed,
            _ => panic!("unknown tournament status `{status}`"),
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape of the schedule, derived from the player limit: 8 players
/// (4 pairs) play an all-vs-all round robin, 16 players (8 pairs) play a
/// three-round knockout bracket.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BracketShape {
    RoundRobin,
    SingleElimination,
}

impl Tournament {
    pub fn fetch(
        tid: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Self, CoreError> {
        tournaments::table
            .filter(tournaments::id.eq(tid))
            .first::<Tournament>(conn)
            .optional()
            .unwrap()
            .ok_or(CoreError::TournamentNotFound)
    }

    pub fn status(&self) -> TournamentStatus {
        TournamentStatus::parse(&self.status)
    }

    pub fn expected_pairs(&self) -> usize {
        (self.max_players / 2) as usize
    }

    pub fn shape(&self) -> BracketShape {
        if self.max_players == 8 {
            BracketShape::RoundRobin
        } else {
            BracketShape::SingleElimination
        }
    }

    pub(crate) fn set_status(
        &self,
        status: TournamentStatus,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> QueryResult<()> {
        let n = diesel::update(
            tournaments::table.filter(tournaments::id.eq(&self.id)),
        )
        .set(tournaments::status.eq(status.as_str()))
        .execute(conn)?;
        assert_eq!(n, 1);
        Ok(())
    }
}

pub fn create_tournament(
    name: &str,
    max_players: i64,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Tournament, CoreError> {
    if max_players != 8 && max_players != 16 {
        return Err(CoreError::InvalidPlayerLimit(max_players));
    }

    let tid = Uuid::now_v7().to_string();

    let n = diesel::insert_into(tournaments::table)
        .values((
            tournaments::id.eq(&tid),
            tournaments::name.eq(name),
            tournaments::created_at.eq(Utc::now().naive_utc()),
            tournaments::status.eq(TournamentStatus::Draft.as_str()),
            tournaments::max_players.eq(max_players),
        ))
        .execute(conn)
        .unwrap();
    assert_eq!(n, 1);

    tracing::info!(tournament = %tid, max_players, "created tournament");

    Ok(Tournament::fetch(&tid, conn).expect("the row was just inserted"))
}

/// Opens a draft tournament for pair registration.
pub fn open_registration(
    tournament: &Tournament,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Tournament, CoreError> {
    match tournament.status() {
        TournamentStatus::Draft => {}
        other => return Err(CoreError::WrongStatus(other)),
    }

    tournament
        .set_status(TournamentStatus::Open, conn)
        .unwrap();

    Tournament::fetch(&tournament.id, conn)
}

/// Deletes a tournament together with everything it owns: pairs, matches
/// and rankings.
pub fn delete_tournament(
    tournament: &Tournament,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) {
    conn.transaction(|conn| -> QueryResult<()> {
        diesel::delete(
            tournament_rankings::table.filter(
                tournament_rankings::tournament_id.eq(&tournament.id),
            ),
        )
        .execute(conn)?;
        diesel::delete(
            tournament_matches::table
                .filter(tournament_matches::tournament_id.eq(&tournament.id)),
        )
        .execute(conn)?;
        diesel::delete(
            tournament_pairs::table
                .filter(tournament_pairs::tournament_id.eq(&tournament.id)),
        )
        .execute(conn)?;
        diesel::delete(
            tournaments::table.filter(tournaments::id.eq(&tournament.id)),
        )
        .execute(conn)?;
        Ok(())
    })
    .unwrap();

    tracing::info!(tournament = %tournament.id, "deleted tournament");
}
