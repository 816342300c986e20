use std::fmt::Display;

use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{status::Custom, Responder},
    serde::json::Json,
    Request,
};
use thiserror::Error;

use crate::model::{api::Message, common::election::ElectionId};

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while serving a request. All of these are
/// recoverable: they become an HTTP status and a human-readable message.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed admin or voter parameters.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A vote arrived for an election that is missing, closed, or past its end time.
    #[error("Voting is closed for election {0}")]
    ElectionClosed(ElectionId),
    /// An admin tried to change an election that is no longer accepting votes.
    #[error("Election {0} is not open")]
    ElectionNotOpen(ElectionId),
    /// The voter already has a vote recorded in this election.
    #[error("You have already voted in election {0}")]
    AlreadyVoted(ElectionId),
    /// The ledger already holds this (identity, election) pair.
    #[error("A vote is already recorded for this identity in election {0}")]
    DuplicateVote(ElectionId),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Error {
    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidInput(_) | Self::ElectionClosed(_) | Self::ElectionNotOpen(_) => {
                Status::BadRequest
            }
            Self::AlreadyVoted(_) => Status::Forbidden,
            Self::DuplicateVote(_) => Status::Conflict,
            Self::NotFound(_) => Status::NotFound,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Internal(_) | Self::Db(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let message = match status.class() {
            StatusClass::ServerError => {
                error!("{self}");
                // Don't leak database internals to clients.
                "Internal server error".to_string()
            }
            _ => {
                warn!("{self}");
                self.to_string()
            }
        };
        Custom(status, Json(Message::new(message))).respond_to(req)
    }
}
