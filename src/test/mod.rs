//! End-to-end workloads for the tournament core, run against an in-memory
//! database with the embedded migrations applied.

use std::collections::HashSet;

use diesel::{Connection, SqliteConnection};
use diesel_migrations::MigrationHarness;

use crate::{
    MIGRATIONS,
    error::CoreError,
    tournaments::{
        Tournament, TournamentStatus, create_tournament, delete_tournament,
        open_registration,
        matches::{
            Participant, Slot, TournamentMatch, generate::generate_matches,
            record::record_score,
        },
        pairs::{Pair, register_pair, remove_pair},
        standings::{RankingEntry, consolidate, reopen_tournament},
    },
};

fn setup() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").unwrap();
    conn.run_pending_migrations(MIGRATIONS).unwrap();
    conn
}

/// Creates a tournament, opens registration and fills it to capacity.
fn seeded_tournament(
    max_players: i64,
    conn: &mut SqliteConnection,
) -> (Tournament, Vec<Pair>) {
    let tournament =
        create_tournament("Club Open", max_players, conn).unwrap();
    let tournament = open_registration(&tournament, conn).unwrap();

    let pairs = (0..tournament.expected_pairs())
        .map(|i| {
            register_pair(
                &tournament,
                &format!("Player {}", 2 * i + 1),
                &format!("Player {}", 2 * i + 2),
                conn,
            )
            .unwrap()
        })
        .collect();

    (tournament, pairs)
}

fn in_progress(
    max_players: i64,
    conn: &mut SqliteConnection,
) -> (Tournament, Vec<Pair>, Vec<TournamentMatch>) {
    let (tournament, pairs) = seeded_tournament(max_players, conn);
    let matches = generate_matches(&tournament, conn).unwrap();
    let tournament = Tournament::fetch(&tournament.id, conn).unwrap();
    (tournament, pairs, matches)
}

fn ranking_set(entries: &[RankingEntry]) -> HashSet<(String, i64, i64)> {
    entries
        .iter()
        .map(|e| (e.pair_id.clone(), e.placement, e.points))
        .collect()
}

#[test]
fn tournament_creation_rejects_odd_player_limits() {
    let mut conn = setup();

    assert_eq!(
        create_tournament("Club Open", 12, &mut conn).unwrap_err(),
        CoreError::InvalidPlayerLimit(12)
    );
}

#[test]
fn registration_respects_the_pair_limit() {
    let mut conn = setup();
    let (tournament, pairs) = seeded_tournament(8, &mut conn);

    assert_eq!(pairs.len(), 4);
    assert_eq!(
        register_pair(&tournament, "Late A", "Late B", &mut conn)
            .unwrap_err(),
        CoreError::TournamentFull
    );
}

#[test]
fn pairs_are_locked_once_the_schedule_exists() {
    let mut conn = setup();
    let (tournament, pairs, _) = in_progress(8, &mut conn);

    // the tournament moved out of `open` when the schedule was generated
    assert_eq!(
        remove_pair(&tournament, &pairs[0].id, &mut conn).unwrap_err(),
        CoreError::WrongStatus(TournamentStatus::InProgress)
    );
}

#[test]
fn pairs_can_withdraw_while_registration_is_open() {
    let mut conn = setup();
    let (tournament, pairs) = seeded_tournament(8, &mut conn);

    remove_pair(&tournament, &pairs[3].id, &mut conn).unwrap();
    assert_eq!(Pair::of_tournament(&tournament.id, &mut conn).len(), 3);

    // generation now sees too few pairs
    assert_eq!(
        generate_matches(&tournament, &mut conn).unwrap_err(),
        CoreError::InvalidPairCount {
            expected: 4,
            found: 3
        }
    );

    // a replacement picks up a fresh seq and fills the roster again
    let replacement =
        register_pair(&tournament, "Sub A", "Sub B", &mut conn).unwrap();
    assert_eq!(replacement.seq, 3);
    generate_matches(&tournament, &mut conn).unwrap();
}

#[test]
fn round_robin_schedule_is_all_pairings() {
    let mut conn = setup();
    let (tournament, pairs, matches) = in_progress(8, &mut conn);

    assert_eq!(tournament.status(), TournamentStatus::InProgress);
    assert_eq!(matches.len(), 6);
    assert!(matches.iter().all(|m| m.round == "RR" && m.is_resolved()));
    assert!(
        matches
            .iter()
            .all(|m| m.feeder_one_id.is_none() && m.feeder_two_id.is_none())
    );

    // each pair meets every other pair exactly once
    let pairings: HashSet<(String, String)> = matches
        .iter()
        .map(|m| {
            let a = m.pair_one_id.clone().unwrap();
            let b = m.pair_two_id.clone().unwrap();
            if a < b { (a, b) } else { (b, a) }
        })
        .collect();
    assert_eq!(pairings.len(), 6);
    for (i, a) in pairs.iter().enumerate() {
        for b in &pairs[i + 1..] {
            let key = if a.id < b.id {
                (a.id.clone(), b.id.clone())
            } else {
                (b.id.clone(), a.id.clone())
            };
            assert!(pairings.contains(&key));
        }
    }
}

#[test]
fn knockout_schedule_has_placeholder_topology() {
    let mut conn = setup();
    let (_, pairs, matches) = in_progress(16, &mut conn);

    assert_eq!(matches.len(), 7);

    let quarters = &matches[..4];
    let semis = &matches[4..6];
    let final_match = &matches[6];

    for (i, qf) in quarters.iter().enumerate() {
        assert_eq!(qf.round, "QF");
        assert_eq!(qf.pair_one_id.as_ref(), Some(&pairs[2 * i].id));
        assert_eq!(qf.pair_two_id.as_ref(), Some(&pairs[2 * i + 1].id));
    }

    for (i, sf) in semis.iter().enumerate() {
        assert_eq!(sf.round, "SF");
        assert!(!sf.is_resolved());
        assert_eq!(
            sf.participant(Slot::One),
            Participant::AwaitingWinner {
                match_id: quarters[2 * i].id.clone()
            }
        );
        assert_eq!(
            sf.participant(Slot::Two),
            Participant::AwaitingWinner {
                match_id: quarters[2 * i + 1].id.clone()
            }
        );
    }

    assert_eq!(final_match.round, "F");
    assert_eq!(
        final_match.participant(Slot::One),
        Participant::AwaitingWinner {
            match_id: semis[0].id.clone()
        }
    );
    assert_eq!(
        final_match.participant(Slot::Two),
        Participant::AwaitingWinner {
            match_id: semis[1].id.clone()
        }
    );
}

#[test]
fn recording_sets_the_winner_and_rejects_indecisive_scores() {
    let mut conn = setup();
    let (_, _, matches) = in_progress(8, &mut conn);

    let m = record_score(&matches[0].id, 6, 2, &mut conn).unwrap();
    assert_eq!(m.winner_id, m.pair_one_id);
    assert_eq!((m.score_one, m.score_two), (Some(6), Some(2)));

    assert_eq!(
        record_score(&matches[1].id, 4, 4, &mut conn).unwrap_err(),
        CoreError::InvalidScore(4, 4)
    );
    assert_eq!(
        record_score(&matches[1].id, -1, 3, &mut conn).unwrap_err(),
        CoreError::InvalidScore(-1, 3)
    );
    assert_eq!(
        record_score("no-such-match", 6, 2, &mut conn).unwrap_err(),
        CoreError::MatchNotFound
    );
}

#[test]
fn quarterfinal_winners_fill_the_semifinals() {
    let mut conn = setup();
    let (_, _, matches) = in_progress(16, &mut conn);

    let scores = [(6, 2), (6, 3), (6, 1), (6, 4)];
    for (qf, (a, b)) in matches[..4].iter().zip(scores) {
        record_score(&qf.id, a, b, &mut conn).unwrap();
    }

    let matches = TournamentMatch::of_tournament(
        &matches[0].tournament_id,
        &mut conn,
    );
    let winner_of =
        |i: usize| matches[i].winner_id.clone().unwrap();

    assert_eq!(matches[4].pair_one_id, Some(winner_of(0)));
    assert_eq!(matches[4].pair_two_id, Some(winner_of(1)));
    assert_eq!(matches[5].pair_one_id, Some(winner_of(2)));
    assert_eq!(matches[5].pair_two_id, Some(winner_of(3)));
    assert!(!matches[6].is_resolved());
}

#[test]
fn placeholder_matches_cannot_be_scored() {
    let mut conn = setup();
    let (_, _, matches) = in_progress(16, &mut conn);

    assert_eq!(
        record_score(&matches[4].id, 6, 2, &mut conn).unwrap_err(),
        CoreError::StaleParticipant
    );
}

#[test]
fn rescoring_an_upstream_match_invalidates_downstream_results() {
    let mut conn = setup();
    let (tournament, _, matches) = in_progress(16, &mut conn);

    for qf in &matches[..4] {
        record_score(&qf.id, 6, 2, &mut conn).unwrap();
    }
    record_score(&matches[4].id, 6, 4, &mut conn).unwrap();
    record_score(&matches[5].id, 6, 3, &mut conn).unwrap();
    record_score(&matches[6].id, 7, 6, &mut conn).unwrap();

    // flip the winner of the first quarterfinal
    record_score(&matches[0].id, 2, 6, &mut conn).unwrap();

    let matches =
        TournamentMatch::of_tournament(&tournament.id, &mut conn);

    // the semifinal slot now holds the corrected winner, its stale result
    // is gone, and the invalidation cascaded into the final
    assert_eq!(matches[4].pair_one_id, matches[0].winner_id);
    assert!(!matches[4].is_decided());
    assert_eq!(matches[4].score_one, None);
    assert!(!matches[6].is_resolved());
    assert!(!matches[6].is_decided());

    // the final cannot be scored until the semifinal is replayed
    assert_eq!(
        record_score(&matches[6].id, 6, 0, &mut conn).unwrap_err(),
        CoreError::StaleParticipant
    );

    // consolidation is blocked too
    assert_eq!(
        consolidate(&tournament, &mut conn).unwrap_err(),
        CoreError::IncompleteResults { undecided: 2 }
    );

    // replaying the affected matches restores a consistent bracket
    record_score(&matches[4].id, 6, 1, &mut conn).unwrap();
    let final_id = matches[6].id.clone();
    record_score(&final_id, 6, 3, &mut conn).unwrap();
    consolidate(&tournament, &mut conn).unwrap();
}

#[test]
fn consolidation_requires_every_result() {
    let mut conn = setup();
    let (tournament, _, matches) = in_progress(8, &mut conn);

    for m in &matches[..5] {
        record_score(&m.id, 6, 2, &mut conn).unwrap();
    }

    assert_eq!(
        consolidate(&tournament, &mut conn).unwrap_err(),
        CoreError::IncompleteResults { undecided: 1 }
    );
    assert!(RankingEntry::of_tournament(&tournament.id, &mut conn).is_empty());
    assert_eq!(
        Tournament::fetch(&tournament.id, &mut conn)
            .unwrap()
            .status(),
        TournamentStatus::InProgress
    );
}

#[test]
fn knockout_consolidation_assigns_shared_placements() {
    let mut conn = setup();
    let (tournament, _, matches) = in_progress(16, &mut conn);

    for qf in &matches[..4] {
        record_score(&qf.id, 6, 2, &mut conn).unwrap();
    }
    let matches = TournamentMatch::of_tournament(&tournament.id, &mut conn);
    record_score(&matches[4].id, 6, 4, &mut conn).unwrap();
    record_score(&matches[5].id, 3, 6, &mut conn).unwrap();
    record_score(&matches[6].id, 6, 2, &mut conn).unwrap();

    let entries = consolidate(&tournament, &mut conn).unwrap();
    assert_eq!(entries.len(), 8);

    let placements: Vec<i64> =
        entries.iter().map(|e| e.placement).collect();
    assert_eq!(placements, vec![1, 2, 3, 3, 5, 5, 5, 5]);

    let matches = TournamentMatch::of_tournament(&tournament.id, &mut conn);
    assert_eq!(entries[0].pair_id, matches[6].winner_id.clone().unwrap());
    assert_eq!(entries[0].points, 100);
    assert_eq!(entries[1].pair_id, matches[6].loser_id().unwrap());
    assert_eq!(entries[1].points, 60);
    assert!(entries[2..4].iter().all(|e| e.points == 40));
    assert!(entries[4..].iter().all(|e| e.points == 20));

    assert_eq!(
        Tournament::fetch(&tournament.id, &mut conn)
            .unwrap()
            .status(),
        TournamentStatus::Completed
    );
}

#[test]
fn consolidation_is_idempotent() {
    let mut conn = setup();
    let (tournament, _, matches) = in_progress(8, &mut conn);

    let scores = [(6, 2), (6, 0), (2, 6), (6, 3), (1, 6), (6, 4)];
    for (m, (a, b)) in matches.iter().zip(scores) {
        record_score(&m.id, a, b, &mut conn).unwrap();
    }

    let first = consolidate(&tournament, &mut conn).unwrap();
    let second = consolidate(&tournament, &mut conn).unwrap();

    assert_eq!(first.len(), 4);
    assert_eq!(ranking_set(&first), ranking_set(&second));
    assert_eq!(
        RankingEntry::of_tournament(&tournament.id, &mut conn).len(),
        4
    );
}

#[test]
fn reopening_discards_rankings_but_keeps_scores() {
    let mut conn = setup();
    let (tournament, _, matches) = in_progress(8, &mut conn);

    let scores = [(6, 2), (6, 0), (2, 6), (6, 3), (1, 6), (6, 4)];
    for (m, (a, b)) in matches.iter().zip(scores) {
        record_score(&m.id, a, b, &mut conn).unwrap();
    }
    consolidate(&tournament, &mut conn).unwrap();
    let tournament = Tournament::fetch(&tournament.id, &mut conn).unwrap();

    // no edits while the tournament is frozen
    assert_eq!(
        record_score(&matches[0].id, 0, 6, &mut conn).unwrap_err(),
        CoreError::WrongStatus(TournamentStatus::Completed)
    );

    let tournament = reopen_tournament(&tournament, &mut conn).unwrap();
    assert_eq!(tournament.status(), TournamentStatus::InProgress);
    assert!(RankingEntry::of_tournament(&tournament.id, &mut conn).is_empty());

    // scores survived the reopen
    let kept = TournamentMatch::of_tournament(&tournament.id, &mut conn);
    assert!(kept.iter().all(|m| m.is_decided()));

    // edit a result and re-consolidate; the rankings follow the new scores
    record_score(&matches[0].id, 0, 6, &mut conn).unwrap();
    let entries = consolidate(&tournament, &mut conn).unwrap();
    let expected = {
        let matches =
            TournamentMatch::of_tournament(&tournament.id, &mut conn);
        let pairs = Pair::of_tournament(&tournament.id, &mut conn);
        let wins = |pair: &Pair| {
            matches
                .iter()
                .filter(|m| m.winner_id.as_ref() == Some(&pair.id))
                .count() as i64
        };
        pairs.iter().map(|p| (p.id.clone(), wins(p))).collect::<Vec<_>>()
    };
    for entry in &entries {
        let (_, wins) = expected
            .iter()
            .find(|(id, _)| id == &entry.pair_id)
            .unwrap();
        // more wins can never rank below fewer wins
        for other in &entries {
            let (_, other_wins) = expected
                .iter()
                .find(|(id, _)| id == &other.pair_id)
                .unwrap();
            if wins > other_wins {
                assert!(entry.placement < other.placement);
            }
        }
    }
}

#[test]
fn reopening_requires_a_completed_tournament() {
    let mut conn = setup();
    let (tournament, _, _) = in_progress(8, &mut conn);

    assert_eq!(
        reopen_tournament(&tournament, &mut conn).unwrap_err(),
        CoreError::WrongStatus(TournamentStatus::InProgress)
    );
}

#[test]
fn deleting_a_tournament_removes_everything_it_owns() {
    let mut conn = setup();
    let (tournament, _, matches) = in_progress(8, &mut conn);

    let scores = [(6, 2), (6, 0), (2, 6), (6, 3), (1, 6), (6, 4)];
    for (m, (a, b)) in matches.iter().zip(scores) {
        record_score(&m.id, a, b, &mut conn).unwrap();
    }
    consolidate(&tournament, &mut conn).unwrap();

    delete_tournament(&tournament, &mut conn);

    assert_eq!(
        Tournament::fetch(&tournament.id, &mut conn).unwrap_err(),
        CoreError::TournamentNotFound
    );
    assert!(Pair::of_tournament(&tournament.id, &mut conn).is_empty());
    assert!(TournamentMatch::of_tournament(&tournament.id, &mut conn).is_empty());
    assert!(RankingEntry::of_tournament(&tournament.id, &mut conn).is_empty());
}

#[test]
fn regeneration_discards_results_and_rankings() {
    let mut conn = setup();
    let (tournament, _, matches) = in_progress(8, &mut conn);

    let scores = [(6, 2), (6, 0), (2, 6), (6, 3), (1, 6), (6, 4)];
    for (m, (a, b)) in matches.iter().zip(scores) {
        record_score(&m.id, a, b, &mut conn).unwrap();
    }
    consolidate(&tournament, &mut conn).unwrap();
    let tournament = Tournament::fetch(&tournament.id, &mut conn).unwrap();
    let tournament = reopen_tournament(&tournament, &mut conn).unwrap();

    let fresh = generate_matches(&tournament, &mut conn).unwrap();
    assert_eq!(fresh.len(), 6);
    assert!(fresh.iter().all(|m| !m.is_decided()));
    assert!(RankingEntry::of_tournament(&tournament.id, &mut conn).is_empty());
}
