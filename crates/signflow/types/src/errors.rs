//! Shared error taxonomy for workflow operations.

use crate::{DocumentId, PlacementId};

/// Errors surfaced by workflow operations.
///
/// Geometry violations are deliberately absent: out-of-bounds placement
/// geometry is clamped on write, never rejected.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("invalid signing token")]
    InvalidToken,

    #[error("signing token expired")]
    ExpiredToken,

    #[error("token is valid but not a signing link")]
    WrongTokenPurpose,

    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("signer not found: {0}")]
    SignerNotFound(String),

    #[error("placement not found: {0}")]
    PlacementNotFound(PlacementId),

    #[error("actor is neither the owner nor the token's signer")]
    NotAuthorized,

    #[error("document {0} is already in a terminal state")]
    AlreadyFinalized(DocumentId),

    #[error("no signed placements to composite")]
    NoSignedPlacements,

    #[error("document {0} has no composite artifact yet")]
    CompositeNotReady(DocumentId),

    #[error("compositor failure: {0}")]
    Compositor(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Result type alias for workflow operations.
pub type SigningResult<T> = Result<T, SigningError>;
