// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Domain errors raised by the marketplace operations.

use crate::models::{RequestStatus, Role};
use thiserror::Error;

/// Errors returned by store-facing operations.
///
/// Everything except `Store` is a user-level failure: the command aborts and
/// no row has been written.
#[derive(Debug, Error)]
pub enum MarketError {
    /// A user-entered field failed validation.
    #[error("{0}")]
    Validation(String),

    /// A referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// No session is active.
    #[error("Not logged in; run `minibors auth login` first")]
    NotAuthenticated,

    /// Email/password or email/PIN did not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The acting user lacks the role an operation requires.
    #[error("Operation requires role '{required}' (user {user_id} is '{actual}')")]
    Forbidden {
        required: Role,
        actual: Role,
        user_id: i64,
    },

    /// The acting user is not allowed to touch someone else's record.
    #[error("{0}")]
    NotOwner(String),

    /// A review was attempted on something that already left `pending`.
    #[error("{entity} {id} is already {status}")]
    InvalidState {
        entity: &'static str,
        id: i64,
        status: RequestStatus,
    },

    /// A purchase exceeded the shares left on the stock at commit time.
    #[error("Only {available} shares of {symbol} available, requested {requested}")]
    InsufficientShares {
        symbol: String,
        requested: i64,
        available: i64,
    },

    /// A uniqueness rule was violated (email taken, complaint already filed).
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

impl MarketError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MarketError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type MarketResult<T> = std::result::Result<T, MarketError>;
