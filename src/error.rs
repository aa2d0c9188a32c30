//! Error types for the rating engine.
//!
//! Precondition violations (unknown players, malformed ranks, unknown colour or
//! result codes) mean the input data is corrupt and the caller should stop.
//! `OptimizerFailed` is terminal for the tournament being rated and, in a
//! cascade, for every tournament after it.

use thiserror::Error;

use crate::collection::PlayerId;

#[derive(Debug, Error)]
pub enum RatingError {
    /// A game references a player id that is missing from the player map
    #[error("game record involves player with no entry in player list: white={white} black={black}")]
    UnknownPlayer { white: PlayerId, black: PlayerId },

    /// A rank string is not `<n>k` or `<n>d`
    #[error("player {player}: unknown rank format {raw:?}")]
    RankFormat { player: PlayerId, raw: String },

    /// A tournament reached rating without a date
    #[error("tournament {tournament} has no date")]
    MissingDate { tournament: String },

    #[error("unknown player colour {0:?}")]
    UnknownColor(String),

    #[error("unknown game result {0:?}")]
    UnknownResult(String),

    /// Both optimizer stages failed to converge
    #[error("rating optimization failed for tournament {tournament}: {reason}")]
    OptimizerFailed { tournament: String, reason: String },

    /// The negative log-posterior Hessian could not be factorised
    #[error("posterior Hessian is not positive definite ({players} players)")]
    NotPositiveDefinite { players: usize },

    #[error("invalid spline table: {0}")]
    Spline(String),

    #[error("invalid date {raw:?}: {source}")]
    Date {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl RatingError {
    /// True for errors that indicate upstream data corruption.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            RatingError::UnknownPlayer { .. }
                | RatingError::RankFormat { .. }
                | RatingError::UnknownColor(_)
                | RatingError::UnknownResult(_)
                | RatingError::MissingDate { .. }
        )
    }
}
