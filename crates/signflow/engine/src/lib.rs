//! SignFlow workflow orchestrator.
//!
//! The state machine governing documents and signers through
//! pending -> signed/rejected transitions: batch creation with capability
//! token fan-out, placement recording, per-signer sign and reject actions,
//! and the idempotent finalization that composites signed placements into
//! the final artifact exactly once.
//!
//! Transport, persistence backends, page rasterization and message
//! delivery all live on the far side of this crate's traits.

mod config;
mod engine;
mod external;
mod locks;
pub mod mocks;

pub use config::EngineConfig;
pub use engine::{Actor, FinalizeOutcome, SignSubmission, WorkflowEngine};
pub use external::{
    BlobError, BlobStore, Compositor, CompositorError, NotificationIntent, Notifier,
};
