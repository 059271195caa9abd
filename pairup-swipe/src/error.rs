use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::r2d2::PoolError;

use pairup_shared::errors::{AppError, ErrorCode};

/// Failures of the swipe engine and its stores.
///
/// A transition that returns an error has written nothing.
#[derive(Debug, thiserror::Error)]
pub enum SwipeError {
    #[error("identity '{0}' already exists")]
    DuplicateIdentity(String),

    #[error("an identity cannot evaluate itself")]
    InvalidEdge,

    #[error("identity '{0}' not found")]
    UnknownIdentity(String),

    #[error("pair is already matched")]
    AlreadyMatched,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type SwipeResult<T> = Result<T, SwipeError>;

impl From<DieselError> for SwipeError {
    fn from(err: DieselError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<PoolError> for SwipeError {
    fn from(err: PoolError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Maps a unique violation on insert to `DuplicateIdentity`.
pub(crate) fn duplicate_or_store(err: DieselError, handle: &str) -> SwipeError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            SwipeError::DuplicateIdentity(handle.to_string())
        }
        other => other.into(),
    }
}

impl From<SwipeError> for AppError {
    fn from(err: SwipeError) -> Self {
        let code = match &err {
            SwipeError::DuplicateIdentity(_) => ErrorCode::IdentityAlreadyExists,
            SwipeError::InvalidEdge => ErrorCode::InvalidEdge,
            SwipeError::UnknownIdentity(_) => ErrorCode::IdentityNotFound,
            SwipeError::AlreadyMatched => ErrorCode::AlreadyMatched,
            SwipeError::StoreUnavailable(_) => ErrorCode::ServiceUnavailable,
        };
        AppError::new(code, err.to_string())
    }
}
