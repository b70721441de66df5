//! Signers: the required parties for one document.
//!
//! A document's signer set is replaced wholesale whenever the owner
//! (re)initiates a signing batch. Replacing the set deletes the previous
//! rows and their tokens, which is the only way an outstanding signing
//! token is ever revoked.

use crate::{DocumentId, SignerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-signer status. Both `Signed` and `Rejected` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerStatus {
    Pending,
    Signed,
    Rejected,
}

impl std::fmt::Display for SignerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignerStatus::Pending => "pending",
            SignerStatus::Signed => "signed",
            SignerStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// One required party for a document.
///
/// `email` is the identity key within the document's signer set; it is not
/// globally unique. `signing_order` zero means no ordering constraint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Signer {
    pub id: SignerId,
    pub document_id: DocumentId,
    pub name: String,
    pub email: String,
    pub signing_order: u32,
    pub status: SignerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    /// Capability token minted for this signer.
    pub token: String,
    pub token_expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Signer {
    pub fn is_pending(&self) -> bool {
        self.status == SignerStatus::Pending
    }
}

/// Signer as requested by the owner when creating a batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignerRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub signing_order: u32,
}

/// Fully prepared signer row for insertion, token already minted.
#[derive(Clone, Debug)]
pub struct NewSigner {
    pub name: String,
    pub email: String,
    pub signing_order: u32,
    pub token: String,
    pub token_expires_at: DateTime<Utc>,
}
