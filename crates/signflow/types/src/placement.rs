//! Placements: visual marks positioned on a document page.
//!
//! Geometry is expressed as fractions of the page width/height and is
//! always clamped to the allowed bounds before it reaches storage. A
//! placement out of bounds is silently pulled back in, never rejected.

use crate::{DocumentId, FileRef, PlacementId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminant for default rendering presentation. Never affects
/// compositing eligibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementKind {
    #[default]
    Signature,
    Initials,
    Name,
    Date,
    Text,
    Stamp,
}

/// A placement transitions pending -> signed exactly once, when its
/// content is supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStatus {
    Pending,
    Signed,
}

/// Content supplied at signing time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlacementContent {
    /// Rendered text in a named font.
    Text { text: String, font: String },
    /// Raw image bytes held in the blob store.
    Image { blob: FileRef },
}

// ── Geometry ─────────────────────────────────────────────────────────

/// Normalized placement rectangle, each field a fraction of the page
/// dimension.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlacementRect {
    pub const MIN_WIDTH: f64 = 0.04;
    pub const MAX_WIDTH: f64 = 0.98;
    pub const MIN_HEIGHT: f64 = 0.02;
    pub const MAX_HEIGHT: f64 = 0.98;
    pub const MIN_POSITION: f64 = 0.0;
    pub const MAX_POSITION: f64 = 0.96;

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Pull every axis independently to the nearest allowed bound.
    ///
    /// This is the single clamping rule for all write paths, owner and
    /// token entry points alike.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(Self::MIN_POSITION, Self::MAX_POSITION),
            y: self.y.clamp(Self::MIN_POSITION, Self::MAX_POSITION),
            width: self.width.clamp(Self::MIN_WIDTH, Self::MAX_WIDTH),
            height: self.height.clamp(Self::MIN_HEIGHT, Self::MAX_HEIGHT),
        }
    }

    pub fn is_within_bounds(&self) -> bool {
        *self == self.clamped()
    }
}

// ── Placement ────────────────────────────────────────────────────────

/// One visual mark to be applied at finalize time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Placement {
    pub id: PlacementId,
    pub document_id: DocumentId,
    /// Identity of the signer this mark belongs to.
    pub signer_email: String,
    /// 1-based page index.
    pub page_number: u32,
    pub rect: PlacementRect,
    pub kind: PlacementKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<PlacementContent>,
    pub status: PlacementStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

impl Placement {
    /// Only signed placements are eligible for compositing.
    pub fn is_signed(&self) -> bool {
        self.status == PlacementStatus::Signed
    }
}

/// Placement as submitted by an actor, before ids and timestamps exist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlacementDraft {
    pub signer_email: String,
    pub page_number: u32,
    pub rect: PlacementRect,
    #[serde(default)]
    pub kind: PlacementKind,
}
