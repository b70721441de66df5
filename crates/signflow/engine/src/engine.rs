//! The workflow orchestrator.
//!
//! Owns the Document/Signer lifecycle: it replaces signer batches and
//! mints their tokens, decides who gets notified and when, records and
//! signs placements, and runs the idempotent finalization that turns a
//! fully-signed document into a composite artifact.
//!
//! The orchestrator coordinates; it never composes pages or sends mail
//! itself. Those live behind the [`crate::external`] contracts.

use crate::config::EngineConfig;
use crate::external::{BlobStore, Compositor, NotificationIntent, Notifier};
use crate::locks::DocumentLocks;
use chrono::Utc;
use signflow_store::{AuditAction, AuditEvent, NewDocument, SignflowStore};
use signflow_token::{TokenError, TokenIssuer};
use signflow_types::{
    Document, DocumentId, DocumentStatus, NewSigner, OwnerId, Placement, PlacementContent,
    PlacementDraft, PlacementId, PlacementRect, Signer, SignerRequest, SigningError,
    SigningResult,
};
use std::sync::Arc;

// ── Actors and operation payloads ────────────────────────────────────

/// Who is asking.
///
/// Owners authenticate out-of-band (accounts are not this crate's
/// concern); external signers hold a bearer capability token. Possession
/// of a verifying token is the entire credential.
#[derive(Clone, Debug)]
pub enum Actor {
    Owner(OwnerId),
    Bearer(String),
}

impl Actor {
    pub fn bearer(token: impl Into<String>) -> Self {
        Actor::Bearer(token.into())
    }
}

/// Content submitted with a sign action. An image wins over text when
/// both are present; neither is also legal (the placement signs empty
/// and the compositor skips it).
#[derive(Clone, Debug, Default)]
pub struct SignSubmission {
    pub text: Option<String>,
    pub font: Option<String>,
    pub image_bytes: Option<Vec<u8>>,
}

impl SignSubmission {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            image_bytes: Some(bytes),
            ..Default::default()
        }
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }
}

/// What finalization concluded.
#[derive(Clone, Debug)]
pub enum FinalizeOutcome {
    /// Every signer signed; the composite exists and the document is
    /// terminal.
    Completed { document: Document },
    /// Signers are still outstanding.
    StillPending { pending_count: usize },
    /// The document was already terminal; nothing happened.
    AlreadyClosed { status: DocumentStatus },
}

/// Resolved identity after authorization.
enum ActingParty {
    Owner(OwnerId),
    Signer(Signer),
}

// ── Engine ───────────────────────────────────────────────────────────

/// The signing workflow engine.
///
/// Every operation runs on an independent worker over the shared store.
/// Per-signer actions for different signers proceed in parallel; only the
/// aggregate-check-and-finalize sequence is serialized per document (see
/// [`DocumentLocks`]).
pub struct WorkflowEngine<S> {
    store: Arc<S>,
    issuer: TokenIssuer,
    compositor: Arc<dyn Compositor>,
    notifier: Arc<dyn Notifier>,
    blobs: Arc<dyn BlobStore>,
    locks: DocumentLocks,
    config: EngineConfig,
}

impl<S: SignflowStore> WorkflowEngine<S> {
    /// Build an engine. Fails when the configured token secret is
    /// missing or too weak.
    pub fn new(
        config: EngineConfig,
        store: Arc<S>,
        compositor: Arc<dyn Compositor>,
        notifier: Arc<dyn Notifier>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, TokenError> {
        let issuer = TokenIssuer::new(config.token_secret.clone(), config.token_ttl_hours)?;
        Ok(Self {
            store,
            issuer,
            compositor,
            notifier,
            blobs,
            locks: DocumentLocks::new(),
            config,
        })
    }

    /// The issuer, for boundary layers that only need verification.
    pub fn token_issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    // ── Documents ────────────────────────────────────────────────────

    /// Register an uploaded document: source bytes go to the blob store,
    /// the record starts pending.
    pub async fn create_document(
        &self,
        owner: OwnerId,
        title: impl Into<String>,
        source_bytes: Vec<u8>,
    ) -> SigningResult<Document> {
        let title = title.into();
        let source_file = self
            .blobs
            .put("source", source_bytes)
            .await
            .map_err(|err| SigningError::Storage(err.to_string()))?;

        let document = self
            .store
            .create_document(NewDocument {
                title: title.clone(),
                owner_id: owner,
                source_file,
            })
            .await?;

        tracing::info!(document_id = %document.id, owner = %owner, "document registered");
        self.audit(
            document.id,
            format!("owner:{}", owner),
            AuditAction::DocumentCreated,
            title,
        )
        .await;
        Ok(document)
    }

    pub async fn get_document(&self, actor: &Actor, id: DocumentId) -> SigningResult<Document> {
        let document = self.require_document(id).await?;
        self.authorize(actor, &document).await?;
        Ok(document)
    }

    /// An owner's documents, newest first.
    pub async fn list_documents(&self, owner: OwnerId) -> SigningResult<Vec<Document>> {
        Ok(self.store.list_documents_for_owner(owner).await?)
    }

    // ── Signing batches ──────────────────────────────────────────────

    /// Replace the document's signer set and fan out signing requests.
    ///
    /// The previous batch and its tokens are superseded wholesale; this
    /// is the only revocation mechanism for outstanding tokens. When
    /// ordering is disabled every signer is notified immediately and all
    /// order values are forced to zero; when enabled, only the single
    /// pending signer with the lowest order is notified.
    pub async fn create_signing_batch(
        &self,
        owner: OwnerId,
        document_id: DocumentId,
        requests: Vec<SignerRequest>,
        ordering_enabled: bool,
        custom_message: Option<String>,
    ) -> SigningResult<Vec<Signer>> {
        let document = self.require_document(document_id).await?;
        if document.owner_id != owner {
            return Err(SigningError::NotAuthorized);
        }
        if document.is_terminal() {
            return Err(SigningError::AlreadyFinalized(document_id));
        }

        let token_expires_at = Utc::now() + self.issuer.ttl();
        let mut batch = Vec::with_capacity(requests.len());
        for request in requests {
            let token = self.issuer.mint(document_id, &request.email)?;
            batch.push(NewSigner {
                name: request.name,
                email: request.email,
                signing_order: if ordering_enabled {
                    request.signing_order
                } else {
                    0
                },
                token,
                token_expires_at,
            });
        }

        let signers = self.store.replace_signers(document_id, batch).await?;

        if ordering_enabled {
            if let Some(next) = self.store.next_pending_signer(document_id).await? {
                self.deliver(NotificationIntent::SigningRequest {
                    document_id,
                    document_title: document.title.clone(),
                    signer_name: next.name.clone(),
                    signer_email: next.email.clone(),
                    token: next.token.clone(),
                    custom_message: custom_message.clone(),
                })
                .await;
            }
        } else {
            for signer in &signers {
                self.deliver(NotificationIntent::SigningRequest {
                    document_id,
                    document_title: document.title.clone(),
                    signer_name: signer.name.clone(),
                    signer_email: signer.email.clone(),
                    token: signer.token.clone(),
                    custom_message: custom_message.clone(),
                })
                .await;
            }
        }

        tracing::info!(
            document_id = %document_id,
            signers = signers.len(),
            ordering_enabled,
            "signing batch created"
        );
        self.audit(
            document_id,
            format!("owner:{}", owner),
            AuditAction::SigningBatchCreated,
            format!(
                "{} signer(s), ordering {}",
                signers.len(),
                if ordering_enabled { "on" } else { "off" }
            ),
        )
        .await;
        Ok(signers)
    }

    pub async fn get_signers(
        &self,
        actor: &Actor,
        document_id: DocumentId,
    ) -> SigningResult<Vec<Signer>> {
        let document = self.require_document(document_id).await?;
        self.authorize(actor, &document).await?;
        Ok(self.store.list_signers(document_id).await?)
    }

    // ── Placements ───────────────────────────────────────────────────

    /// Record a pending placement. Geometry is clamped, never rejected.
    /// Bearer placements are bound to the token's signer identity
    /// regardless of what the draft claims.
    pub async fn record_placement(
        &self,
        actor: &Actor,
        document_id: DocumentId,
        mut draft: PlacementDraft,
    ) -> SigningResult<Placement> {
        let document = self.require_document(document_id).await?;
        let party = self.authorize(actor, &document).await?;
        if let ActingParty::Signer(signer) = &party {
            draft.signer_email = signer.email.clone();
        }

        let placement = self.store.create_placement(document_id, draft).await?;
        self.audit(
            document_id,
            self.party_label(&party),
            AuditAction::PlacementAdded,
            format!("placement {} on page {}", placement.id, placement.page_number),
        )
        .await;
        Ok(placement)
    }

    pub async fn get_placements(
        &self,
        actor: &Actor,
        document_id: DocumentId,
    ) -> SigningResult<Vec<Placement>> {
        let document = self.require_document(document_id).await?;
        self.authorize(actor, &document).await?;
        Ok(self.store.list_placements(document_id).await?)
    }

    /// Move or resize a placement. Works before and after signing and
    /// never resets placement status.
    pub async fn update_placement_geometry(
        &self,
        actor: &Actor,
        placement_id: PlacementId,
        rect: PlacementRect,
    ) -> SigningResult<Placement> {
        let placement = self.require_placement(placement_id).await?;
        let document = self.require_document(placement.document_id).await?;
        let party = self.authorize(actor, &document).await?;

        let updated = self.store.update_geometry(placement_id, rect).await?;
        self.audit(
            document.id,
            self.party_label(&party),
            AuditAction::PlacementMoved,
            format!("placement {}", placement_id),
        )
        .await;
        Ok(updated)
    }

    pub async fn delete_placement(
        &self,
        actor: &Actor,
        placement_id: PlacementId,
    ) -> SigningResult<()> {
        let placement = self.require_placement(placement_id).await?;
        let document = self.require_document(placement.document_id).await?;
        let party = self.authorize(actor, &document).await?;

        self.store.delete_placement(placement_id).await?;
        self.audit(
            document.id,
            self.party_label(&party),
            AuditAction::PlacementDeleted,
            format!("placement {}", placement_id),
        )
        .await;
        Ok(())
    }

    // ── Sign / Reject ────────────────────────────────────────────────

    /// Sign one placement and mark the acting signer signed, then run
    /// finalization.
    ///
    /// The acting signer is the token's claimed identity for bearers, or
    /// the identity on the placement row when the owner signs. In an
    /// ordered batch the next pending signer is notified before the
    /// aggregate is recomputed.
    pub async fn sign(
        &self,
        actor: &Actor,
        placement_id: PlacementId,
        submission: SignSubmission,
    ) -> SigningResult<FinalizeOutcome> {
        let placement = self.require_placement(placement_id).await?;
        let document = self.require_document(placement.document_id).await?;
        if document.is_terminal() {
            return Err(SigningError::AlreadyFinalized(document.id));
        }

        let party = self.authorize(actor, &document).await?;
        let signer = match party {
            ActingParty::Signer(signer) => signer,
            ActingParty::Owner(_) => self
                .store
                .find_signer_by_email(document.id, &placement.signer_email)
                .await?
                .ok_or_else(|| SigningError::SignerNotFound(placement.signer_email.clone()))?,
        };

        let now = Utc::now();
        let content = self.build_content(submission).await?;
        self.store
            .sign_placement(placement_id, content, now)
            .await?;
        self.audit(
            document.id,
            signer.email.clone(),
            AuditAction::PlacementSigned,
            format!("placement {}", placement_id),
        )
        .await;

        self.store.mark_signer_signed(signer.id, now).await?;
        tracing::info!(
            document_id = %document.id,
            signer = %signer.email,
            "signer signed"
        );
        self.audit(
            document.id,
            signer.email.clone(),
            AuditAction::SignerSigned,
            String::new(),
        )
        .await;

        // Ordered batches push the workflow forward as soon as this
        // signer is done. Finalize will send its own reminder as well;
        // that duplication matches the long-standing behavior callers
        // depend on.
        if signer.signing_order > 0 {
            if let Some(next) = self.store.next_pending_signer(document.id).await? {
                self.deliver(NotificationIntent::NextSignerReminder {
                    document_id: document.id,
                    document_title: document.title.clone(),
                    signer_name: next.name.clone(),
                    signer_email: next.email.clone(),
                    token: next.token.clone(),
                })
                .await;
            }
        }

        self.finalize(document.id).await
    }

    /// Reject the workflow. One rejection vetoes the whole document,
    /// whatever the other signers' states.
    pub async fn reject(&self, actor: &Actor, reason: &str) -> SigningResult<Document> {
        let token = match actor {
            Actor::Bearer(token) => token,
            Actor::Owner(_) => return Err(SigningError::NotAuthorized),
        };
        let claims = self.issuer.verify(token)?;
        let document_id = claims.document_id;

        let lock = self.locks.for_document(document_id)?;
        let _guard = lock.lock().await;

        let document = self.require_document(document_id).await?;
        if document.is_terminal() {
            return Err(SigningError::AlreadyFinalized(document_id));
        }

        let signer = self
            .store
            .find_signer_by_email(document_id, &claims.signer_email)
            .await?
            .ok_or_else(|| SigningError::SignerNotFound(claims.signer_email.clone()))?;

        let now = Utc::now();
        self.store
            .mark_signer_rejected(signer.id, reason, now)
            .await?;
        let document = self
            .store
            .transition_document(document_id, DocumentStatus::Pending, DocumentStatus::Rejected)
            .await?;

        tracing::info!(
            document_id = %document_id,
            signer = %signer.email,
            "document rejected"
        );
        self.audit(
            document_id,
            signer.email.clone(),
            AuditAction::DocumentRejected,
            reason.to_string(),
        )
        .await;

        self.deliver(NotificationIntent::OwnerRejected {
            document_id,
            document_title: document.title.clone(),
            owner_id: document.owner_id,
            signer_email: signer.email,
            reason: reason.to_string(),
        })
        .await;

        Ok(document)
    }

    // ── Finalization ─────────────────────────────────────────────────

    /// Recompute the aggregate and finish the workflow if every signer
    /// has signed. Safe to call redundantly: a terminal document is a
    /// no-op, a still-pending one re-notifies its next signer.
    pub async fn finalize(&self, document_id: DocumentId) -> SigningResult<FinalizeOutcome> {
        let lock = self.locks.for_document(document_id)?;
        let _guard = lock.lock().await;
        self.finalize_locked(document_id).await
    }

    /// The check-then-act sequence. Callers hold the document lock.
    async fn finalize_locked(&self, document_id: DocumentId) -> SigningResult<FinalizeOutcome> {
        let document = self.require_document(document_id).await?;
        if !document.is_pending() {
            return Ok(FinalizeOutcome::AlreadyClosed {
                status: document.status,
            });
        }

        if !self.store.all_signers_signed(document_id).await? {
            // Deliberate at-least-once reminder: every finalize on a
            // still-pending document re-notifies the next signer.
            if let Some(next) = self.store.next_pending_signer(document_id).await? {
                self.deliver(NotificationIntent::NextSignerReminder {
                    document_id,
                    document_title: document.title.clone(),
                    signer_name: next.name.clone(),
                    signer_email: next.email.clone(),
                    token: next.token.clone(),
                })
                .await;
            }
            let pending_count = self.store.count_pending_signers(document_id).await?;
            return Ok(FinalizeOutcome::StillPending { pending_count });
        }

        let signed_placements = self.store.list_signed_placements(document_id).await?;
        if signed_placements.is_empty() {
            return Err(SigningError::NoSignedPlacements);
        }

        let source = self
            .blobs
            .get(&document.source_file)
            .await
            .map_err(|err| SigningError::Storage(err.to_string()))?
            .ok_or_else(|| {
                SigningError::Storage(format!(
                    "source artifact {} missing from blob store",
                    document.source_file
                ))
            })?;

        // Nothing is committed before this succeeds: a compositor
        // failure leaves the document pending and finalize retryable.
        let composite_bytes = self
            .compositor
            .compose(&source, &signed_placements)
            .await
            .map_err(|err| SigningError::Compositor(err.to_string()))?;

        let composite_file = self
            .blobs
            .put("composite", composite_bytes)
            .await
            .map_err(|err| SigningError::Storage(err.to_string()))?;
        let document = self
            .store
            .complete_document(document_id, composite_file)
            .await?;

        tracing::info!(
            document_id = %document_id,
            placements = signed_placements.len(),
            "document finalized"
        );
        self.audit(
            document_id,
            "engine".to_string(),
            AuditAction::DocumentFinalized,
            format!("{} placement(s) composited", signed_placements.len()),
        )
        .await;

        let signers = self.store.list_signers(document_id).await?;
        let last_signer_email = signers
            .iter()
            .filter(|signer| signer.signed_at.is_some())
            .max_by_key(|signer| signer.signed_at)
            .map(|signer| signer.email.clone())
            .unwrap_or_default();

        self.deliver(NotificationIntent::OwnerSigned {
            document_id,
            document_title: document.title.clone(),
            owner_id: document.owner_id,
            last_signer_email,
        })
        .await;

        // Every signer gets a download capability derived from their
        // original token.
        for signer in signers {
            self.deliver(NotificationIntent::SignerDownloadReady {
                document_id,
                document_title: document.title.clone(),
                signer_name: signer.name,
                signer_email: signer.email,
                download_token: signer.token,
            })
            .await;
        }

        Ok(FinalizeOutcome::Completed { document })
    }

    // ── Downloads and audit reads ────────────────────────────────────

    /// Fetch the composite artifact with a signing token.
    pub async fn download_composite(&self, token: &str) -> SigningResult<Vec<u8>> {
        let claims = self.issuer.verify(token)?;
        let document = self.require_document(claims.document_id).await?;

        let signer = self
            .store
            .find_signer_by_email(document.id, &claims.signer_email)
            .await?
            .ok_or_else(|| SigningError::SignerNotFound(claims.signer_email.clone()))?;

        if document.status != DocumentStatus::Signed {
            return Err(SigningError::CompositeNotReady(document.id));
        }
        let composite_file = document
            .composite_file
            .as_ref()
            .ok_or(SigningError::CompositeNotReady(document.id))?;

        let bytes = self
            .blobs
            .get(composite_file)
            .await
            .map_err(|err| SigningError::Storage(err.to_string()))?
            .ok_or_else(|| {
                SigningError::Storage(format!(
                    "composite artifact {} missing from blob store",
                    composite_file
                ))
            })?;

        self.audit(
            document.id,
            signer.email,
            AuditAction::CompositeDownloaded,
            String::new(),
        )
        .await;
        Ok(bytes)
    }

    /// The document's audit trail, owner-only.
    pub async fn audit_trail(
        &self,
        owner: OwnerId,
        document_id: DocumentId,
    ) -> SigningResult<Vec<signflow_store::AuditRecord>> {
        let document = self.require_document(document_id).await?;
        if document.owner_id != owner {
            return Err(SigningError::NotAuthorized);
        }
        Ok(self.store.list_audit(document_id).await?)
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn require_document(&self, id: DocumentId) -> SigningResult<Document> {
        self.store
            .get_document(id)
            .await?
            .ok_or(SigningError::DocumentNotFound(id))
    }

    async fn require_placement(&self, id: PlacementId) -> SigningResult<Placement> {
        self.store
            .get_placement(id)
            .await?
            .ok_or(SigningError::PlacementNotFound(id))
    }

    /// Resolve and authorize an actor against a document.
    ///
    /// Token verification itself is pure; because the issuer keeps no
    /// state, the signer row is re-checked here so a token whose row was
    /// replaced can no longer act.
    async fn authorize(&self, actor: &Actor, document: &Document) -> SigningResult<ActingParty> {
        match actor {
            Actor::Owner(owner) => {
                if document.owner_id == *owner {
                    Ok(ActingParty::Owner(*owner))
                } else {
                    Err(SigningError::NotAuthorized)
                }
            }
            Actor::Bearer(token) => {
                let claims = self.issuer.verify(token)?;
                if claims.document_id != document.id {
                    return Err(SigningError::NotAuthorized);
                }
                let signer = self
                    .store
                    .find_signer_by_email(document.id, &claims.signer_email)
                    .await?
                    .ok_or(SigningError::SignerNotFound(claims.signer_email))?;
                Ok(ActingParty::Signer(signer))
            }
        }
    }

    fn party_label(&self, party: &ActingParty) -> String {
        match party {
            ActingParty::Owner(owner) => format!("owner:{}", owner),
            ActingParty::Signer(signer) => signer.email.clone(),
        }
    }

    async fn build_content(
        &self,
        submission: SignSubmission,
    ) -> SigningResult<Option<PlacementContent>> {
        if let Some(bytes) = submission.image_bytes {
            let blob = self
                .blobs
                .put("signature", bytes)
                .await
                .map_err(|err| SigningError::Storage(err.to_string()))?;
            return Ok(Some(PlacementContent::Image { blob }));
        }
        if let Some(text) = submission.text {
            let font = submission
                .font
                .unwrap_or_else(|| self.config.default_signature_font.clone());
            return Ok(Some(PlacementContent::Text { text, font }));
        }
        Ok(None)
    }

    async fn deliver(&self, intent: NotificationIntent) {
        let kind = intent.kind();
        if !self.notifier.notify(intent).await {
            tracing::warn!(intent = kind, "notification delivery failed");
        }
    }

    async fn audit(
        &self,
        document_id: DocumentId,
        actor: String,
        action: AuditAction,
        detail: String,
    ) {
        let result = self
            .store
            .append_audit(AuditEvent {
                document_id,
                actor,
                action,
                detail,
            })
            .await;
        if let Err(err) = result {
            tracing::warn!(document_id = %document_id, error = %err, "audit append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MemoryBlobStore, MockCompositor, MockNotifier};
    use signflow_store::{DocumentStore, InMemorySignflowStore};
    use signflow_types::{FileRef, PlacementKind};

    const SECRET: &str = "engine-test-secret-0123456789-012345";

    struct Harness {
        engine: WorkflowEngine<InMemorySignflowStore>,
        store: Arc<InMemorySignflowStore>,
        notifier: Arc<MockNotifier>,
    }

    fn build(notifier: Arc<MockNotifier>) -> Harness {
        let store = Arc::new(InMemorySignflowStore::new());
        let engine = WorkflowEngine::new(
            EngineConfig {
                token_secret: SECRET.to_string(),
                ..Default::default()
            },
            store.clone(),
            Arc::new(MockCompositor::new()),
            notifier.clone(),
            Arc::new(MemoryBlobStore::new()),
        )
        .unwrap();
        Harness {
            engine,
            store,
            notifier,
        }
    }

    fn harness() -> Harness {
        build(Arc::new(MockNotifier::new()))
    }

    fn request(name: &str, email: &str, order: u32) -> SignerRequest {
        SignerRequest {
            name: name.to_string(),
            email: email.to_string(),
            signing_order: order,
        }
    }

    fn draft_for(email: &str) -> PlacementDraft {
        PlacementDraft {
            signer_email: email.to_string(),
            page_number: 1,
            rect: PlacementRect::new(0.1, 0.1, 0.3, 0.1),
            kind: PlacementKind::Signature,
        }
    }

    async fn pending_document(h: &Harness) -> Document {
        h.engine
            .create_document(OwnerId::new(1), "Offer Letter", b"%PDF-source".to_vec())
            .await
            .unwrap()
    }

    fn signing_request_emails(notifier: &MockNotifier) -> Vec<String> {
        notifier
            .intents()
            .into_iter()
            .filter_map(|intent| match intent {
                NotificationIntent::SigningRequest { signer_email, .. } => Some(signer_email),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn unordered_batch_notifies_every_signer() {
        let h = harness();
        let doc = pending_document(&h).await;

        h.engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0), request("Bob", "b@x.com", 0)],
                false,
                Some("please sign".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(
            signing_request_emails(&h.notifier),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
    }

    #[tokio::test]
    async fn ordered_batch_notifies_only_the_lowest_order_signer() {
        let h = harness();
        let doc = pending_document(&h).await;

        h.engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Bob", "b@x.com", 2), request("Alice", "a@x.com", 1)],
                true,
                None,
            )
            .await
            .unwrap();

        assert_eq!(signing_request_emails(&h.notifier), vec!["a@x.com".to_string()]);
    }

    #[tokio::test]
    async fn batch_creation_on_a_terminal_document_is_refused() {
        let h = harness();
        let doc = pending_document(&h).await;
        h.store
            .complete_document(doc.id, FileRef::new("composite-x"))
            .await
            .unwrap();

        let result = h
            .engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0)],
                false,
                None,
            )
            .await;
        assert!(matches!(result, Err(SigningError::AlreadyFinalized(_))));
    }

    #[tokio::test]
    async fn replacing_the_batch_revokes_outstanding_tokens() {
        let h = harness();
        let doc = pending_document(&h).await;

        let first = h
            .engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();
        let stale = Actor::bearer(first[0].token.clone());

        h.engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Carol", "c@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();

        // The stale token still verifies cryptographically, but its signer
        // row is gone, so it can no longer act.
        let result = h
            .engine
            .record_placement(&stale, doc.id, draft_for("a@x.com"))
            .await;
        assert!(matches!(result, Err(SigningError::SignerNotFound(_))));
    }

    #[tokio::test]
    async fn bearer_token_for_another_document_is_rejected() {
        let h = harness();
        let doc_a = pending_document(&h).await;
        let doc_b = pending_document(&h).await;

        let signers = h
            .engine
            .create_signing_batch(
                OwnerId::new(1),
                doc_a.id,
                vec![request("Alice", "a@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();

        let actor = Actor::bearer(signers[0].token.clone());
        let result = h
            .engine
            .record_placement(&actor, doc_b.id, draft_for("a@x.com"))
            .await;
        assert!(matches!(result, Err(SigningError::NotAuthorized)));
    }

    #[tokio::test]
    async fn foreign_owner_is_not_authorized() {
        let h = harness();
        let doc = pending_document(&h).await;

        let result = h
            .engine
            .get_signers(&Actor::Owner(OwnerId::new(99)), doc.id)
            .await;
        assert!(matches!(result, Err(SigningError::NotAuthorized)));
    }

    #[tokio::test]
    async fn garbage_tokens_are_invalid() {
        let h = harness();
        let doc = pending_document(&h).await;

        let result = h
            .engine
            .get_placements(&Actor::bearer("not-a-token"), doc.id)
            .await;
        assert!(matches!(result, Err(SigningError::InvalidToken)));
    }

    #[tokio::test]
    async fn recorded_geometry_is_clamped_not_rejected() {
        let h = harness();
        let doc = pending_document(&h).await;

        let placement = h
            .engine
            .record_placement(
                &Actor::Owner(OwnerId::new(1)),
                doc.id,
                PlacementDraft {
                    signer_email: "a@x.com".to_string(),
                    page_number: 1,
                    rect: PlacementRect::new(2.0, -5.0, 1.5, -0.1),
                    kind: PlacementKind::Signature,
                },
            )
            .await
            .unwrap();

        assert_eq!(placement.rect, PlacementRect::new(0.96, 0.0, 0.98, 0.02));
    }

    #[tokio::test]
    async fn bearer_placements_are_bound_to_the_token_identity() {
        let h = harness();
        let doc = pending_document(&h).await;
        let signers = h
            .engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0), request("Bob", "b@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();

        // The draft claims Bob's identity; the token wins.
        let actor = Actor::bearer(signers[0].token.clone());
        let placement = h
            .engine
            .record_placement(&actor, doc.id, draft_for("b@x.com"))
            .await
            .unwrap();
        assert_eq!(placement.signer_email, "a@x.com");
    }

    #[tokio::test]
    async fn owner_sign_resolves_the_signer_from_the_placement_row() {
        let h = harness();
        let doc = pending_document(&h).await;
        h.engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0), request("Bob", "b@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();

        let owner = Actor::Owner(OwnerId::new(1));
        let placement = h
            .engine
            .record_placement(&owner, doc.id, draft_for("a@x.com"))
            .await
            .unwrap();

        let outcome = h
            .engine
            .sign(&owner, placement.id, SignSubmission::text("Alice"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            FinalizeOutcome::StillPending { pending_count: 1 }
        ));

        let signers = h.engine.get_signers(&owner, doc.id).await.unwrap();
        let alice = signers.iter().find(|s| s.email == "a@x.com").unwrap();
        assert_eq!(alice.status, signflow_types::SignerStatus::Signed);
        assert!(alice.signed_at.is_some());
    }

    #[tokio::test]
    async fn text_content_falls_back_to_the_configured_font() {
        let h = harness();
        let doc = pending_document(&h).await;
        // Second signer keeps the document pending while Alice signs both
        // of her placements.
        let signers = h
            .engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0), request("Bob", "b@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();

        let actor = Actor::bearer(signers[0].token.clone());
        let first = h
            .engine
            .record_placement(&actor, doc.id, draft_for("a@x.com"))
            .await
            .unwrap();
        let second = h
            .engine
            .record_placement(&actor, doc.id, draft_for("a@x.com"))
            .await
            .unwrap();

        h.engine
            .sign(&actor, first.id, SignSubmission::text("Alice"))
            .await
            .unwrap();
        h.engine
            .sign(
                &actor,
                second.id,
                SignSubmission::text("A.").with_font("serif"),
            )
            .await
            .unwrap();

        let placements = h.engine.get_placements(&actor, doc.id).await.unwrap();
        match &placements[0].content {
            Some(PlacementContent::Text { font, .. }) => assert_eq!(font, "cursive"),
            other => panic!("unexpected content: {:?}", other),
        }
        match &placements[1].content {
            Some(PlacementContent::Text { font, .. }) => assert_eq!(font, "serif"),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[tokio::test]
    async fn geometry_updates_survive_signing_without_resetting_status() {
        let h = harness();
        let doc = pending_document(&h).await;
        let signers = h
            .engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0), request("Bob", "b@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();

        let actor = Actor::bearer(signers[0].token.clone());
        let placement = h
            .engine
            .record_placement(&actor, doc.id, draft_for("a@x.com"))
            .await
            .unwrap();
        h.engine
            .sign(&actor, placement.id, SignSubmission::text("Alice"))
            .await
            .unwrap();

        let moved = h
            .engine
            .update_placement_geometry(&actor, placement.id, PlacementRect::new(0.5, 0.5, 0.2, 0.1))
            .await
            .unwrap();
        assert!(moved.is_signed());
        assert_eq!(moved.rect, PlacementRect::new(0.5, 0.5, 0.2, 0.1));
    }

    #[tokio::test]
    async fn notifier_failures_never_fail_the_operation() {
        let h = build(Arc::new(MockNotifier::undeliverable()));
        let doc = pending_document(&h).await;

        let signers = h
            .engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();

        let actor = Actor::bearer(signers[0].token.clone());
        let placement = h
            .engine
            .record_placement(&actor, doc.id, draft_for("a@x.com"))
            .await
            .unwrap();
        let outcome = h
            .engine
            .sign(&actor, placement.id, SignSubmission::text("Alice"))
            .await
            .unwrap();

        // Deliveries bounced, yet the workflow completed.
        assert!(matches!(outcome, FinalizeOutcome::Completed { .. }));
        assert!(!h.notifier.intents().is_empty());
    }

    #[tokio::test]
    async fn owner_cannot_reject() {
        let h = harness();
        pending_document(&h).await;

        let result = h.engine.reject(&Actor::Owner(OwnerId::new(1)), "nope").await;
        assert!(matches!(result, Err(SigningError::NotAuthorized)));
    }

    #[tokio::test]
    async fn owners_list_their_documents_newest_first() {
        let h = harness();
        let first = pending_document(&h).await;
        let second = pending_document(&h).await;

        let docs = h.engine.list_documents(OwnerId::new(1)).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, second.id);
        assert_eq!(docs[1].id, first.id);

        assert!(h
            .engine
            .list_documents(OwnerId::new(99))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn placements_can_be_deleted_by_their_signer() {
        let h = harness();
        let doc = pending_document(&h).await;
        let signers = h
            .engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();

        let actor = Actor::bearer(signers[0].token.clone());
        let placement = h
            .engine
            .record_placement(&actor, doc.id, draft_for("a@x.com"))
            .await
            .unwrap();

        h.engine.delete_placement(&actor, placement.id).await.unwrap();
        assert!(h.engine.get_placements(&actor, doc.id).await.unwrap().is_empty());

        let result = h.engine.delete_placement(&actor, placement.id).await;
        assert!(matches!(result, Err(SigningError::PlacementNotFound(_))));
    }

    #[tokio::test]
    async fn image_submissions_are_stored_as_blobs() {
        let h = harness();
        let doc = pending_document(&h).await;
        let signers = h
            .engine
            .create_signing_batch(
                OwnerId::new(1),
                doc.id,
                vec![request("Alice", "a@x.com", 0)],
                false,
                None,
            )
            .await
            .unwrap();

        let actor = Actor::bearer(signers[0].token.clone());
        let placement = h
            .engine
            .record_placement(&actor, doc.id, draft_for("a@x.com"))
            .await
            .unwrap();
        h.engine
            .sign(&actor, placement.id, SignSubmission::image(b"png-bytes".to_vec()))
            .await
            .unwrap();

        let placements = h.engine.get_placements(&actor, doc.id).await.unwrap();
        match &placements[0].content {
            Some(PlacementContent::Image { blob }) => {
                assert!(blob.0.starts_with("signature-"));
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }
}
