//! In-memory reference implementation of the SignFlow storage traits.
//!
//! Deterministic and test-friendly. Ids are sequential integers;
//! production deployments should use a transactional backend as the
//! source of truth.

use crate::model::{AuditEvent, AuditRecord, NewDocument};
use crate::traits::{AuditStore, DocumentStore, PlacementStore, SignerStore};
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signflow_types::{
    Document, DocumentId, DocumentStatus, FileRef, NewSigner, OwnerId, Placement,
    PlacementContent, PlacementDraft, PlacementId, PlacementRect, PlacementStatus, Signer,
    SignerId, SignerStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

/// In-memory SignFlow storage adapter.
pub struct InMemorySignflowStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
    signers: RwLock<HashMap<SignerId, Signer>>,
    placements: RwLock<HashMap<PlacementId, Placement>>,
    audits: RwLock<Vec<AuditRecord>>,
    next_document_id: AtomicI64,
    next_signer_id: AtomicI64,
    next_placement_id: AtomicI64,
}

impl Default for InMemorySignflowStore {
    fn default() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            signers: RwLock::new(HashMap::new()),
            placements: RwLock::new(HashMap::new()),
            audits: RwLock::new(Vec::new()),
            next_document_id: AtomicI64::new(1),
            next_signer_id: AtomicI64::new(1),
            next_placement_id: AtomicI64::new(1),
        }
    }
}

impl InMemorySignflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Backend(format!("{} lock poisoned", what))
}

#[async_trait]
impl DocumentStore for InMemorySignflowStore {
    async fn create_document(&self, new: NewDocument) -> StoreResult<Document> {
        let mut guard = self.documents.write().map_err(|_| poisoned("documents"))?;

        let now = Utc::now();
        let document = Document {
            id: DocumentId::new(self.next_document_id.fetch_add(1, Ordering::SeqCst)),
            title: new.title,
            owner_id: new.owner_id,
            source_file: new.source_file,
            composite_file: None,
            status: DocumentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        guard.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: DocumentId) -> StoreResult<Option<Document>> {
        let guard = self.documents.read().map_err(|_| poisoned("documents"))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_documents_for_owner(&self, owner: OwnerId) -> StoreResult<Vec<Document>> {
        let guard = self.documents.read().map_err(|_| poisoned("documents"))?;
        let mut values = guard
            .values()
            .filter(|doc| doc.owner_id == owner)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(values)
    }

    async fn transition_document(
        &self,
        id: DocumentId,
        expected_from: DocumentStatus,
        to: DocumentStatus,
    ) -> StoreResult<Document> {
        if to == DocumentStatus::Signed {
            return Err(StoreError::InvariantViolation(
                "signed documents require a composite; use complete_document".to_string(),
            ));
        }

        let mut guard = self.documents.write().map_err(|_| poisoned("documents"))?;
        let document = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("document {} not found", id)))?;

        if document.status != expected_from {
            return Err(StoreError::InvariantViolation(format!(
                "invalid document transition: expected {}, found {}",
                expected_from, document.status
            )));
        }

        document.status = to;
        document.updated_at = Utc::now();
        Ok(document.clone())
    }

    async fn complete_document(
        &self,
        id: DocumentId,
        composite: FileRef,
    ) -> StoreResult<Document> {
        let mut guard = self.documents.write().map_err(|_| poisoned("documents"))?;
        let document = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("document {} not found", id)))?;

        if document.status != DocumentStatus::Pending {
            return Err(StoreError::InvariantViolation(format!(
                "cannot complete document in status {}",
                document.status
            )));
        }

        document.status = DocumentStatus::Signed;
        document.composite_file = Some(composite);
        document.updated_at = Utc::now();
        Ok(document.clone())
    }
}

#[async_trait]
impl SignerStore for InMemorySignflowStore {
    async fn replace_signers(
        &self,
        document_id: DocumentId,
        signers: Vec<NewSigner>,
    ) -> StoreResult<Vec<Signer>> {
        let mut guard = self.signers.write().map_err(|_| poisoned("signers"))?;

        // Delete-all + insert under one write lock: the previous batch and
        // its tokens are superseded atomically.
        guard.retain(|_, signer| signer.document_id != document_id);

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(signers.len());
        for new in signers {
            let signer = Signer {
                id: SignerId::new(self.next_signer_id.fetch_add(1, Ordering::SeqCst)),
                document_id,
                name: new.name,
                email: new.email,
                signing_order: new.signing_order,
                status: SignerStatus::Pending,
                signed_at: None,
                token: new.token,
                token_expires_at: new.token_expires_at,
                rejection_reason: None,
                rejected_at: None,
                created_at: now,
            };
            guard.insert(signer.id, signer.clone());
            inserted.push(signer);
        }
        Ok(inserted)
    }

    async fn get_signer(&self, id: SignerId) -> StoreResult<Option<Signer>> {
        let guard = self.signers.read().map_err(|_| poisoned("signers"))?;
        Ok(guard.get(&id).cloned())
    }

    async fn find_signer_by_email(
        &self,
        document_id: DocumentId,
        email: &str,
    ) -> StoreResult<Option<Signer>> {
        let guard = self.signers.read().map_err(|_| poisoned("signers"))?;
        Ok(guard
            .values()
            .find(|signer| signer.document_id == document_id && signer.email == email)
            .cloned())
    }

    async fn list_signers(&self, document_id: DocumentId) -> StoreResult<Vec<Signer>> {
        let guard = self.signers.read().map_err(|_| poisoned("signers"))?;
        let mut values = guard
            .values()
            .filter(|signer| signer.document_id == document_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| {
            a.signing_order
                .cmp(&b.signing_order)
                .then(a.id.cmp(&b.id))
        });
        Ok(values)
    }

    async fn next_pending_signer(&self, document_id: DocumentId) -> StoreResult<Option<Signer>> {
        let guard = self.signers.read().map_err(|_| poisoned("signers"))?;
        Ok(guard
            .values()
            .filter(|signer| signer.document_id == document_id && signer.is_pending())
            .min_by(|a, b| {
                a.signing_order
                    .cmp(&b.signing_order)
                    .then(a.id.cmp(&b.id))
            })
            .cloned())
    }

    async fn mark_signer_signed(&self, id: SignerId, at: DateTime<Utc>) -> StoreResult<Signer> {
        let mut guard = self.signers.write().map_err(|_| poisoned("signers"))?;
        let signer = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("signer {} not found", id)))?;

        match signer.status {
            SignerStatus::Rejected => Err(StoreError::InvariantViolation(format!(
                "signer {} already rejected",
                id
            ))),
            SignerStatus::Signed => Ok(signer.clone()),
            SignerStatus::Pending => {
                signer.status = SignerStatus::Signed;
                signer.signed_at = Some(at);
                Ok(signer.clone())
            }
        }
    }

    async fn mark_signer_rejected(
        &self,
        id: SignerId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Signer> {
        let mut guard = self.signers.write().map_err(|_| poisoned("signers"))?;
        let signer = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("signer {} not found", id)))?;

        if signer.status != SignerStatus::Pending {
            return Err(StoreError::InvariantViolation(format!(
                "signer {} is {}, not pending",
                id, signer.status
            )));
        }

        signer.status = SignerStatus::Rejected;
        signer.rejection_reason = Some(reason.to_string());
        signer.rejected_at = Some(at);
        Ok(signer.clone())
    }

    async fn all_signers_signed(&self, document_id: DocumentId) -> StoreResult<bool> {
        let guard = self.signers.read().map_err(|_| poisoned("signers"))?;
        let mut signers = guard
            .values()
            .filter(|signer| signer.document_id == document_id)
            .peekable();
        if signers.peek().is_none() {
            return Ok(false);
        }
        Ok(signers.all(|signer| signer.status == SignerStatus::Signed))
    }

    async fn count_pending_signers(&self, document_id: DocumentId) -> StoreResult<usize> {
        let guard = self.signers.read().map_err(|_| poisoned("signers"))?;
        Ok(guard
            .values()
            .filter(|signer| signer.document_id == document_id && signer.is_pending())
            .count())
    }
}

#[async_trait]
impl PlacementStore for InMemorySignflowStore {
    async fn create_placement(
        &self,
        document_id: DocumentId,
        draft: PlacementDraft,
    ) -> StoreResult<Placement> {
        let mut guard = self.placements.write().map_err(|_| poisoned("placements"))?;

        let placement = Placement {
            id: PlacementId::new(self.next_placement_id.fetch_add(1, Ordering::SeqCst)),
            document_id,
            signer_email: draft.signer_email,
            page_number: draft.page_number,
            rect: draft.rect.clamped(),
            kind: draft.kind,
            content: None,
            status: PlacementStatus::Pending,
            created_at: Utc::now(),
            signed_at: None,
        };
        guard.insert(placement.id, placement.clone());
        Ok(placement)
    }

    async fn get_placement(&self, id: PlacementId) -> StoreResult<Option<Placement>> {
        let guard = self.placements.read().map_err(|_| poisoned("placements"))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_placements(&self, document_id: DocumentId) -> StoreResult<Vec<Placement>> {
        let guard = self.placements.read().map_err(|_| poisoned("placements"))?;
        let mut values = guard
            .values()
            .filter(|placement| placement.document_id == document_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|placement| placement.id);
        Ok(values)
    }

    async fn list_signed_placements(
        &self,
        document_id: DocumentId,
    ) -> StoreResult<Vec<Placement>> {
        let guard = self.placements.read().map_err(|_| poisoned("placements"))?;
        let mut values = guard
            .values()
            .filter(|placement| placement.document_id == document_id && placement.is_signed())
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|placement| placement.id);
        Ok(values)
    }

    async fn update_geometry(
        &self,
        id: PlacementId,
        rect: PlacementRect,
    ) -> StoreResult<Placement> {
        let mut guard = self.placements.write().map_err(|_| poisoned("placements"))?;
        let placement = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("placement {} not found", id)))?;

        // Geometry stays editable after signing; status is untouched.
        placement.rect = rect.clamped();
        Ok(placement.clone())
    }

    async fn sign_placement(
        &self,
        id: PlacementId,
        content: Option<PlacementContent>,
        at: DateTime<Utc>,
    ) -> StoreResult<Placement> {
        let mut guard = self.placements.write().map_err(|_| poisoned("placements"))?;
        let placement = guard
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("placement {} not found", id)))?;

        if placement.status == PlacementStatus::Signed {
            return Err(StoreError::Conflict(format!(
                "placement {} already signed",
                id
            )));
        }

        placement.content = content;
        placement.status = PlacementStatus::Signed;
        placement.signed_at = Some(at);
        Ok(placement.clone())
    }

    async fn delete_placement(&self, id: PlacementId) -> StoreResult<()> {
        let mut guard = self.placements.write().map_err(|_| poisoned("placements"))?;
        guard
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("placement {} not found", id)))
    }
}

#[async_trait]
impl AuditStore for InMemorySignflowStore {
    async fn append_audit(&self, event: AuditEvent) -> StoreResult<AuditRecord> {
        let mut guard = self.audits.write().map_err(|_| poisoned("audits"))?;

        let record = AuditRecord {
            sequence: guard.len() as u64 + 1,
            document_id: event.document_id,
            actor: event.actor,
            action: event.action,
            detail: event.detail,
            created_at: Utc::now(),
        };
        guard.push(record.clone());
        Ok(record)
    }

    async fn list_audit(&self, document_id: DocumentId) -> StoreResult<Vec<AuditRecord>> {
        let guard = self.audits.read().map_err(|_| poisoned("audits"))?;
        Ok(guard
            .iter()
            .filter(|record| record.document_id == document_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuditAction;

    fn new_document() -> NewDocument {
        NewDocument {
            title: "Contract".to_string(),
            owner_id: OwnerId::new(1),
            source_file: FileRef::new("source-1"),
        }
    }

    fn new_signer(email: &str, order: u32) -> NewSigner {
        NewSigner {
            name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            signing_order: order,
            token: format!("token-{}", email),
            token_expires_at: Utc::now() + chrono::Duration::hours(72),
        }
    }

    fn draft(email: &str) -> PlacementDraft {
        PlacementDraft {
            signer_email: email.to_string(),
            page_number: 1,
            rect: PlacementRect::new(0.1, 0.1, 0.3, 0.1),
            kind: Default::default(),
        }
    }

    #[tokio::test]
    async fn documents_get_sequential_ids() {
        let store = InMemorySignflowStore::new();
        let first = store.create_document(new_document()).await.unwrap();
        let second = store.create_document(new_document()).await.unwrap();
        assert_eq!(first.id, DocumentId::new(1));
        assert_eq!(second.id, DocumentId::new(2));
    }

    #[tokio::test]
    async fn transition_checks_expected_state() {
        let store = InMemorySignflowStore::new();
        let doc = store.create_document(new_document()).await.unwrap();

        let result = store
            .transition_document(doc.id, DocumentStatus::Signed, DocumentStatus::Rejected)
            .await;
        assert!(matches!(result, Err(StoreError::InvariantViolation(_))));

        let rejected = store
            .transition_document(doc.id, DocumentStatus::Pending, DocumentStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(rejected.status, DocumentStatus::Rejected);
    }

    #[tokio::test]
    async fn transition_refuses_the_signed_state() {
        let store = InMemorySignflowStore::new();
        let doc = store.create_document(new_document()).await.unwrap();

        let result = store
            .transition_document(doc.id, DocumentStatus::Pending, DocumentStatus::Signed)
            .await;
        assert!(matches!(result, Err(StoreError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn complete_sets_composite_and_status_together() {
        let store = InMemorySignflowStore::new();
        let doc = store.create_document(new_document()).await.unwrap();

        let signed = store
            .complete_document(doc.id, FileRef::new("composite-1"))
            .await
            .unwrap();
        assert_eq!(signed.status, DocumentStatus::Signed);
        assert_eq!(signed.composite_file, Some(FileRef::new("composite-1")));

        // Second completion must fail: the transition is single-shot.
        let again = store
            .complete_document(doc.id, FileRef::new("composite-2"))
            .await;
        assert!(matches!(again, Err(StoreError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn replace_signers_supersedes_the_previous_batch() {
        let store = InMemorySignflowStore::new();
        let doc = store.create_document(new_document()).await.unwrap();

        let first = store
            .replace_signers(doc.id, vec![new_signer("a@x.com", 0), new_signer("b@x.com", 0)])
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        let second = store
            .replace_signers(doc.id, vec![new_signer("c@x.com", 0)])
            .await
            .unwrap();
        assert_eq!(second.len(), 1);

        let listed = store.list_signers(doc.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].email, "c@x.com");
        // Old rows (and their tokens) are gone.
        assert!(store.get_signer(first[0].id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn next_pending_signer_breaks_order_ties_by_id() {
        let store = InMemorySignflowStore::new();
        let doc = store.create_document(new_document()).await.unwrap();
        let signers = store
            .replace_signers(
                doc.id,
                vec![
                    new_signer("b@x.com", 2),
                    new_signer("a@x.com", 1),
                    new_signer("tie@x.com", 1),
                ],
            )
            .await
            .unwrap();

        let next = store.next_pending_signer(doc.id).await.unwrap().unwrap();
        assert_eq!(next.email, "a@x.com");

        store
            .mark_signer_signed(signers[1].id, Utc::now())
            .await
            .unwrap();
        let next = store.next_pending_signer(doc.id).await.unwrap().unwrap();
        assert_eq!(next.email, "tie@x.com");
    }

    #[tokio::test]
    async fn aggregate_is_false_for_empty_signer_sets() {
        let store = InMemorySignflowStore::new();
        let doc = store.create_document(new_document()).await.unwrap();
        assert!(!store.all_signers_signed(doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn marking_signed_is_idempotent_but_rejected_is_final() {
        let store = InMemorySignflowStore::new();
        let doc = store.create_document(new_document()).await.unwrap();
        let signers = store
            .replace_signers(doc.id, vec![new_signer("a@x.com", 0), new_signer("b@x.com", 0)])
            .await
            .unwrap();

        let when = Utc::now();
        let signed = store.mark_signer_signed(signers[0].id, when).await.unwrap();
        let again = store
            .mark_signer_signed(signers[0].id, Utc::now())
            .await
            .unwrap();
        assert_eq!(again.signed_at, signed.signed_at);

        store
            .mark_signer_rejected(signers[1].id, "not me", Utc::now())
            .await
            .unwrap();
        let result = store.mark_signer_signed(signers[1].id, Utc::now()).await;
        assert!(matches!(result, Err(StoreError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn placement_geometry_is_clamped_on_create_and_update() {
        let store = InMemorySignflowStore::new();
        let doc = store.create_document(new_document()).await.unwrap();

        let mut wild = draft("a@x.com");
        wild.rect = PlacementRect::new(2.0, -5.0, 1.5, -0.1);
        let placement = store.create_placement(doc.id, wild).await.unwrap();
        assert_eq!(placement.rect, PlacementRect::new(0.96, 0.0, 0.98, 0.02));

        let moved = store
            .update_geometry(placement.id, PlacementRect::new(-1.0, 0.5, 0.5, 0.5))
            .await
            .unwrap();
        assert_eq!(moved.rect, PlacementRect::new(0.0, 0.5, 0.5, 0.5));
    }

    #[tokio::test]
    async fn placements_sign_exactly_once_but_stay_movable() {
        let store = InMemorySignflowStore::new();
        let doc = store.create_document(new_document()).await.unwrap();
        let placement = store.create_placement(doc.id, draft("a@x.com")).await.unwrap();

        let content = Some(PlacementContent::Text {
            text: "Alice".to_string(),
            font: "cursive".to_string(),
        });
        let signed = store
            .sign_placement(placement.id, content.clone(), Utc::now())
            .await
            .unwrap();
        assert_eq!(signed.status, PlacementStatus::Signed);
        assert!(signed.signed_at.is_some());

        let again = store.sign_placement(placement.id, content, Utc::now()).await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));

        // Size/position edits after signing do not reset status.
        let moved = store
            .update_geometry(placement.id, PlacementRect::new(0.2, 0.2, 0.2, 0.1))
            .await
            .unwrap();
        assert_eq!(moved.status, PlacementStatus::Signed);
    }

    #[tokio::test]
    async fn audit_records_are_sequenced_and_filtered_per_document() {
        let store = InMemorySignflowStore::new();
        let doc_a = store.create_document(new_document()).await.unwrap();
        let doc_b = store.create_document(new_document()).await.unwrap();

        for (doc, action) in [
            (doc_a.id, AuditAction::DocumentCreated),
            (doc_b.id, AuditAction::DocumentCreated),
            (doc_a.id, AuditAction::SigningBatchCreated),
        ] {
            store
                .append_audit(AuditEvent {
                    document_id: doc,
                    actor: "owner:1".to_string(),
                    action,
                    detail: String::new(),
                })
                .await
                .unwrap();
        }

        let records = store.list_audit(doc_a.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].sequence < records[1].sequence);
    }
}
