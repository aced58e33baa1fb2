use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};

use crate::{
    error::CoreError,
    schema::tournament_matches,
    tournaments::{Tournament, TournamentStatus, matches::TournamentMatch},
};

/// Records a score for a match and computes its winner.
///
/// Scores must be non-negative and decisive (padel as modelled here does
/// not allow a match to stand as a draw). In a knockout tournament the
/// winner is propagated into the participant slot of the match this one
/// feeds. Re-recording a score is allowed as a correction: if the winner
/// changes, the downstream slot is rewritten, and any result already
/// recorded downstream is cleared since it was played against a
/// participant that is no longer advancing. The whole operation is a
/// single transaction.
pub fn record_score(
    match_id: &str,
    score_one: i64,
    score_two: i64,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<TournamentMatch, CoreError> {
    conn.transaction(
        |conn| -> Result<Result<TournamentMatch, CoreError>, diesel::result::Error> {
            let m = match tournament_matches::table
                .filter(tournament_matches::id.eq(match_id))
                .first::<TournamentMatch>(conn)
                .optional()?
            {
                Some(m) => m,
                None => return Ok(Err(CoreError::MatchNotFound)),
            };

            let tournament = Tournament::fetch(&m.tournament_id, conn)
                .expect("every match belongs to a tournament");
            match tournament.status() {
                TournamentStatus::InProgress => {}
                other => return Ok(Err(CoreError::WrongStatus(other))),
            }

            let (Some(pair_one), Some(pair_two)) =
                (m.pair_one_id.clone(), m.pair_two_id.clone())
            else {
                return Ok(Err(CoreError::StaleParticipant));
            };

            if score_one < 0 || score_two < 0 || score_one == score_two {
                return Ok(Err(CoreError::InvalidScore(score_one, score_two)));
            }

            let winner = if score_one > score_two {
                pair_one
            } else {
                pair_two
            };

            let n = diesel::update(
                tournament_matches::table
                    .filter(tournament_matches::id.eq(&m.id)),
            )
            .set((
                tournament_matches::score_one.eq(Some(score_one)),
                tournament_matches::score_two.eq(Some(score_two)),
                tournament_matches::winner_id.eq(Some(winner.clone())),
            ))
            .execute(conn)?;
            assert_eq!(n, 1);

            tracing::info!(
                tournament = %m.tournament_id,
                match_id = %m.id,
                round = %m.round,
                score_one,
                score_two,
                "recorded score"
            );

            if m.winner_id.as_ref() != Some(&winner) {
                propagate_winner(&m.id, &winner, conn)?;
            }

            Ok(Ok(TournamentMatch::fetch(&m.id, conn)
                .expect("the match was just updated")))
        },
    )
    .unwrap()
}

/// Writes `winner` into the slot of the match fed by `match_id`, if any.
/// When the slot already held a different pair and that downstream match
/// had been scored, the downstream result is structurally inconsistent and
/// is cleared, cascading further down the bracket.
fn propagate_winner(
    match_id: &str,
    winner: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<(), diesel::result::Error> {
    let next = tournament_matches::table
        .filter(
            tournament_matches::feeder_one_id
                .eq(match_id)
                .or(tournament_matches::feeder_two_id.eq(match_id)),
        )
        .first::<TournamentMatch>(conn)
        .optional()?;

    let Some(next) = next else {
        return Ok(());
    };

    let fills_slot_one = next.feeder_one_id.as_deref() == Some(match_id);
    let current = if fills_slot_one {
        &next.pair_one_id
    } else {
        &next.pair_two_id
    };
    if current.as_deref() == Some(winner) {
        return Ok(());
    }

    if fills_slot_one {
        diesel::update(
            tournament_matches::table
                .filter(tournament_matches::id.eq(&next.id)),
        )
        .set(tournament_matches::pair_one_id.eq(Some(winner.to_string())))
        .execute(conn)?;
    } else {
        diesel::update(
            tournament_matches::table
                .filter(tournament_matches::id.eq(&next.id)),
        )
        .set(tournament_matches::pair_two_id.eq(Some(winner.to_string())))
        .execute(conn)?;
    }

    tracing::debug!(
        from = %match_id,
        to = %next.id,
        winner,
        "propagated winner into next round"
    );

    if next.is_decided() {
        clear_result(&next, conn)?;
        invalidate_downstream(&next.id, conn)?;
    }

    Ok(())
}

/// Clears the participant slot fed by `match_id` in the next match down the
/// bracket, since the feeder's winner is no longer known. Cascades through
/// any further rounds that had already been resolved or scored.
fn invalidate_downstream(
    match_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<(), diesel::result::Error> {
    let next = tournament_matches::table
        .filter(
            tournament_matches::feeder_one_id
                .eq(match_id)
                .or(tournament_matches::feeder_two_id.eq(match_id)),
        )
        .first::<TournamentMatch>(conn)
        .optional()?;

    let Some(next) = next else {
        return Ok(());
    };

    if next.feeder_one_id.as_deref() == Some(match_id) {
        diesel::update(
            tournament_matches::table
                .filter(tournament_matches::id.eq(&next.id)),
        )
        .set(tournament_matches::pair_one_id.eq(None::<String>))
        .execute(conn)?;
    } else {
        diesel::update(
            tournament_matches::table
                .filter(tournament_matches::id.eq(&next.id)),
        )
        .set(tournament_matches::pair_two_id.eq(None::<String>))
        .execute(conn)?;
    }

    tracing::debug!(match_id = %next.id, "cleared stale participant slot");

    if next.is_decided() {
        clear_result(&next, conn)?;
        invalidate_downstream(&next.id, conn)?;
    }

    Ok(())
}

fn clear_result(
    m: &TournamentMatch,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<(), diesel::result::Error> {
    diesel::update(
        tournament_matches::table.filter(tournament_matches::id.eq(&m.id)),
    )
    .set((
        tournament_matches::score_one.eq(None::<i64>),
        tournament_matches::score_two.eq(None::<i64>),
        tournament_matches::winner_id.eq(None::<String>),
    ))
    .execute(conn)?;

    tracing::info!(
        match_id = %m.id,
        round = %m.round,
        "invalidated downstream result after upstream correction"
    );

    Ok(())
}
