//! Store-level input records and the audit trail shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signflow_types::{DocumentId, FileRef, OwnerId};

/// Input for document creation.
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub title: String,
    pub owner_id: OwnerId,
    pub source_file: FileRef,
}

/// What happened, for the audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DocumentCreated,
    SigningBatchCreated,
    PlacementAdded,
    PlacementMoved,
    PlacementSigned,
    PlacementDeleted,
    SignerSigned,
    DocumentFinalized,
    DocumentRejected,
    CompositeDownloaded,
}

/// Audit event as submitted by the engine.
#[derive(Clone, Debug)]
pub struct AuditEvent {
    pub document_id: DocumentId,
    /// Human-readable identity of whoever acted (owner id or signer email).
    pub actor: String,
    pub action: AuditAction,
    pub detail: String,
}

/// Stored audit record. Append-only; `sequence` is monotonic per store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub sequence: u64,
    pub document_id: DocumentId,
    pub actor: String,
    pub action: AuditAction,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}
