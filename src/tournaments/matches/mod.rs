use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{error::CoreError, schema::tournament_matches};

pub mod generate;
pub mod record;

/// The round a match belongs to. Round-robin tournaments only ever use
/// `RoundRobin`; knockout tournaments use the other three. The derived
/// ordering is play order.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Round {
    RoundRobin,
    Quarterfinal,
    Semifinal,
    Final,
}

impl Round {
    pub fn as_str(self) -> &'static str {
        match self {
            Round::RoundRobin => "RR",
            Round::Quarterfinal => "QF",
            Round::Semifinal => "SF",
            Round::Final => "F",
        }
    }

    pub fn parse(round: &str) -> Self {
        match round {
            "RR" => Round::RoundRobin,
            "QF" => Round::Quarterfinal,
            "SF" => Round::Semifinal,
            "F" => Round::Final,
            _ => panic!("unknown round `{round}`"),
        }
    }
}

/// Which of a match's two participant slots is meant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    One,
    Two,
}

/// A participant slot of a match: either a concrete pair, or a placeholder
/// that will be filled with the winner of an earlier match once that match
/// is decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participant {
    Pair(String),
    AwaitingWinner { match_id: String },
}

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct TournamentMatch {
    pub id: String,
    pub tournament_id: String,
    pub round: String,
    pub seq: i64,
    pub pair_one_id: Option<String>,
    pub pair_two_id: Option<String>,
    pub feeder_one_id: Option<String>,
    pub feeder_two_id: Option<String>,
    pub score_one: Option<i64>,
    pub score_two: Option<i64>,
    pub winner_id: Option<String>,
}

impl TournamentMatch {
    pub fn fetch(
        match_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Self, CoreError> {
        tournament_matches::table
            .filter(tournament_matches::id.eq(match_id))
            .first::<TournamentMatch>(conn)
            .optional()
            .unwrap()
            .ok_or(CoreError::MatchNotFound)
    }

    /// All matches of a tournament in play order (rounds in sequence, then
    /// match sequence within the round).
    pub fn of_tournament(
        tid: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Vec<Self> {
        tournament_matches::table
            .filter(tournament_matches::tournament_id.eq(tid))
            .load::<TournamentMatch>(conn)
            .unwrap()
            .into_iter()
            .sorted_by_key(|m| (m.round(), m.seq))
            .collect()
    }

    pub fn round(&self) -> Round {
        Round::parse(&self.round)
    }

    pub fn participant(&self, slot: Slot) -> Participant {
        let (pair, feeder) = match slot {
            Slot::One => (&self.pair_one_id, &self.feeder_one_id),
            Slot::Two => (&self.pair_two_id, &self.feeder_two_id),
        };
        match pair {
            Some(pair) => Participant::Pair(pair.clone()),
            None => Participant::AwaitingWinner {
                match_id: feeder
                    .clone()
                    .expect("an unresolved slot must have a feeder match"),
            },
        }
    }

    /// Whether both participant slots hold a concrete pair.
    pub fn is_resolved(&self) -> bool {
        self.pair_one_id.is_some() && self.pair_two_id.is_some()
    }

    pub fn is_decided(&self) -> bool {
        self.winner_id.is_some()
    }

    /// The pair that lost this match. Only meaningful once decided.
    pub fn loser_id(&self) -> Option<String> {
        let winner = self.winner_id.as_ref()?;
        if self.pair_one_id.as_ref() == Some(winner) {
            self.pair_two_id.clone()
        } else {
            self.pair_one_id.clone()
        }
    }
}
