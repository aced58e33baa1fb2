use thiserror::Error;

use crate::tournaments::TournamentStatus;

/// Failures reported by the core operations. All of these are deterministic
/// validation failures reported synchronously to the caller; the enclosing
/// transaction rolls back whenever one is returned, so no partial writes
/// are ever visible.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("tournament not found")]
    TournamentNotFound,
    #[error("match not found")]
    MatchNotFound,
    #[error("pair not found")]
    PairNotFound,
    #[error("a tournament takes 8 or 16 players, not {0}")]
    InvalidPlayerLimit(i64),
    #[error("expected {expected} registered pairs, found {found}")]
    InvalidPairCount { expected: usize, found: usize },
    #[error("the tournament already has its full complement of pairs")]
    TournamentFull,
    #[error("pairs cannot be changed once matches exist")]
    PairsLocked,
    #[error("invalid score {0}-{1}: scores must be non-negative and decisive")]
    InvalidScore(i64, i64),
    #[error("{undecided} matches are still missing a winner")]
    IncompleteResults { undecided: usize },
    #[error("this match is still awaiting the winner of an earlier round")]
    StaleParticipant,
    #[error("operation not permitted while the tournament is {0}")]
    WrongStatus(TournamentStatus),
}
