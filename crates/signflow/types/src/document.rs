//! Documents: one signing job from upload to terminal state.

use crate::{DocumentId, FileRef, OwnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a document.
///
/// `Signed` and `Rejected` are terminal; no operation transitions out of
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Signed,
    Rejected,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Signed => "signed",
            DocumentStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// One signing job.
///
/// Invariant: `composite_file` is `Some` if and only if `status` is
/// `Signed`. The store's `complete_document` sets both in one transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub owner_id: OwnerId,
    /// Reference to the uploaded source artifact.
    pub source_file: FileRef,
    /// Reference to the composite artifact, present only once signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite_file: Option<FileRef>,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_pending(&self) -> bool {
        self.status == DocumentStatus::Pending
    }

    /// A terminal document admits no further workflow transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, DocumentStatus::Signed | DocumentStatus::Rejected)
    }
}
