use crate::model::{AuditEvent, AuditRecord, NewDocument};
use crate::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signflow_types::{
    Document, DocumentId, DocumentStatus, FileRef, NewSigner, OwnerId, Placement,
    PlacementContent, PlacementDraft, PlacementId, PlacementRect, Signer, SignerId,
};

/// Storage interface for document lifecycle records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new pending document.
    async fn create_document(&self, new: NewDocument) -> StoreResult<Document>;

    async fn get_document(&self, id: DocumentId) -> StoreResult<Option<Document>>;

    /// Documents belonging to one owner, newest first.
    async fn list_documents_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Document>>;

    /// Compare-and-set status transition.
    ///
    /// Fails with `InvariantViolation` when the current status does not
    /// match `expected_from`. Transitions into `Signed` must go through
    /// [`DocumentStore::complete_document`], which also installs the
    /// composite reference.
    async fn transition_document(
        &self,
        id: DocumentId,
        expected_from: DocumentStatus,
        to: DocumentStatus,
    ) -> StoreResult<Document>;

    /// Atomically transition `Pending -> Signed` and set the composite
    /// artifact reference in the same critical section.
    async fn complete_document(&self, id: DocumentId, composite: FileRef)
        -> StoreResult<Document>;
}

/// Storage interface for signer rows.
#[async_trait]
pub trait SignerStore: Send + Sync {
    /// Replace the document's entire signer set in one transaction:
    /// delete every existing row (superseding its token), then insert the
    /// new batch in the given order.
    async fn replace_signers(
        &self,
        document_id: DocumentId,
        signers: Vec<NewSigner>,
    ) -> StoreResult<Vec<Signer>>;

    async fn get_signer(&self, id: SignerId) -> StoreResult<Option<Signer>>;

    /// Look a signer up by their identity key within one document.
    async fn find_signer_by_email(
        &self,
        document_id: DocumentId,
        email: &str,
    ) -> StoreResult<Option<Signer>>;

    /// All signers for a document, ordered by signing order then id.
    async fn list_signers(&self, document_id: DocumentId) -> StoreResult<Vec<Signer>>;

    /// The single pending signer with the lowest signing order (ties
    /// broken by id). This is deliberately a one-row lookup: signers that
    /// share an order value are not treated as a parallel tier.
    async fn next_pending_signer(&self, document_id: DocumentId) -> StoreResult<Option<Signer>>;

    /// Mark a signer signed. Idempotent for already-signed rows; fails for
    /// rejected ones.
    async fn mark_signer_signed(&self, id: SignerId, at: DateTime<Utc>) -> StoreResult<Signer>;

    async fn mark_signer_rejected(
        &self,
        id: SignerId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Signer>;

    /// The aggregate condition gating finalization: true iff every signer
    /// row for the document is signed.
    async fn all_signers_signed(&self, document_id: DocumentId) -> StoreResult<bool>;

    async fn count_pending_signers(&self, document_id: DocumentId) -> StoreResult<usize>;
}

/// Storage interface for placements.
///
/// Geometry is clamped on every write path; out-of-bounds values never
/// reach storage.
#[async_trait]
pub trait PlacementStore: Send + Sync {
    async fn create_placement(
        &self,
        document_id: DocumentId,
        draft: PlacementDraft,
    ) -> StoreResult<Placement>;

    async fn get_placement(&self, id: PlacementId) -> StoreResult<Option<Placement>>;

    async fn list_placements(&self, document_id: DocumentId) -> StoreResult<Vec<Placement>>;

    /// Placements eligible for compositing.
    async fn list_signed_placements(&self, document_id: DocumentId)
        -> StoreResult<Vec<Placement>>;

    /// Update geometry only. Never touches placement status, signed or not.
    async fn update_geometry(
        &self,
        id: PlacementId,
        rect: PlacementRect,
    ) -> StoreResult<Placement>;

    /// Transition pending -> signed exactly once, supplying the content.
    /// A contentless signed placement is legal; the compositor skips it.
    /// Signing an already-signed placement is a `Conflict`.
    async fn sign_placement(
        &self,
        id: PlacementId,
        content: Option<PlacementContent>,
        at: DateTime<Utc>,
    ) -> StoreResult<Placement>;

    async fn delete_placement(&self, id: PlacementId) -> StoreResult<()>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, event: AuditEvent) -> StoreResult<AuditRecord>;

    /// Events for one document, oldest first.
    async fn list_audit(&self, document_id: DocumentId) -> StoreResult<Vec<AuditRecord>>;
}

/// Unified storage bundle consumed by the workflow engine.
pub trait SignflowStore: DocumentStore + SignerStore + PlacementStore + AuditStore {}

impl<T> SignflowStore for T where T: DocumentStore + SignerStore + PlacementStore + AuditStore {}
