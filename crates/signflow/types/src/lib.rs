//! Domain types for the SignFlow signing workflow engine.
//!
//! One Document collects signatures from one or more Signers. Signers act
//! through capability tokens; their visual marks are Placements that get
//! composited into the final artifact once every signer has signed.

mod document;
mod errors;
mod placement;
mod signer;

pub use document::{Document, DocumentStatus};
pub use errors::{SigningError, SigningResult};
pub use placement::{
    Placement, PlacementContent, PlacementDraft, PlacementKind, PlacementRect, PlacementStatus,
};
pub use signer::{NewSigner, Signer, SignerRequest, SignerStatus};

use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a signing document
    DocumentId
);
entity_id!(
    /// Unique identifier for a signer row
    SignerId
);
entity_id!(
    /// Unique identifier for a placement
    PlacementId
);
entity_id!(
    /// Identity of the document owner
    OwnerId
);

// ── File references ──────────────────────────────────────────────────

/// Opaque key into the external blob store (source and composite artifacts).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef(pub String);

impl FileRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Mint a fresh unique key, optionally tagged with a purpose prefix.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
