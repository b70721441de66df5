//! Contracts for the external collaborators.
//!
//! The engine never rasterizes pages, renders mail or touches disk. It
//! hands those jobs to the traits below and only cares about three facts:
//! composition either yields composite bytes or fails without side
//! effects on workflow state; notification delivery is best-effort; blobs
//! are opaque bytes behind a `FileRef`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use signflow_types::{DocumentId, FileRef, OwnerId, Placement};

// ── Compositor ───────────────────────────────────────────────────────

/// Failure reported by the compositor. The workflow state is unchanged
/// when this comes back; retrying finalize is always safe.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CompositorError(pub String);

/// Overlays signed placements onto the source artifact.
///
/// Implementations scale each placement from its normalized rect to the
/// absolute dimensions of its page. Placements referencing an
/// out-of-range page, and placements without content, are skipped rather
/// than fatal. Callers only ever pass placements with signed status.
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn compose(
        &self,
        source: &[u8],
        placements: &[Placement],
    ) -> Result<Vec<u8>, CompositorError>;
}

// ── Notifier ─────────────────────────────────────────────────────────

/// A structured notification for the notifier to render and deliver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum NotificationIntent {
    /// Initial signing request for one signer of a fresh batch.
    SigningRequest {
        document_id: DocumentId,
        document_title: String,
        signer_name: String,
        signer_email: String,
        token: String,
        custom_message: Option<String>,
    },
    /// Reminder for the next pending signer of an ordered workflow.
    NextSignerReminder {
        document_id: DocumentId,
        document_title: String,
        signer_name: String,
        signer_email: String,
        token: String,
    },
    /// Tell the owner every signer has signed.
    OwnerSigned {
        document_id: DocumentId,
        document_title: String,
        owner_id: OwnerId,
        last_signer_email: String,
    },
    /// Tell the owner a signer vetoed the workflow.
    OwnerRejected {
        document_id: DocumentId,
        document_title: String,
        owner_id: OwnerId,
        signer_email: String,
        reason: String,
    },
    /// Hand a signer their personalized download capability.
    SignerDownloadReady {
        document_id: DocumentId,
        document_title: String,
        signer_name: String,
        signer_email: String,
        download_token: String,
    },
}

impl NotificationIntent {
    /// Stable label for log lines; never includes the token.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationIntent::SigningRequest { .. } => "signing_request",
            NotificationIntent::NextSignerReminder { .. } => "next_signer_reminder",
            NotificationIntent::OwnerSigned { .. } => "owner_signed",
            NotificationIntent::OwnerRejected { .. } => "owner_rejected",
            NotificationIntent::SignerDownloadReady { .. } => "signer_download_ready",
        }
    }
}

/// Delivers notification intents. Returns whether delivery succeeded;
/// the engine logs failures and always keeps moving.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, intent: NotificationIntent) -> bool;
}

// ── Blob store ───────────────────────────────────────────────────────

/// Failure in the file/blob storage collaborator.
#[derive(Debug, thiserror::Error)]
#[error("blob store failure: {0}")]
pub struct BlobError(pub String);

/// Byte storage for source and composite artifacts.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, prefix: &str, bytes: Vec<u8>) -> Result<FileRef, BlobError>;
    async fn get(&self, file: &FileRef) -> Result<Option<Vec<u8>>, BlobError>;
}
