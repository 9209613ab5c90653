//! Folio Services Layer
//!
//! The file-replacement protocol and the services around it: the
//! authorization gate, the staging sweeper and the intent reconciler. HTTP
//! handling stays in folio-api; this crate owns the coordination between the
//! object store and the metadata store.

pub mod access;
pub mod reconcile;
pub mod replace;
pub mod sweep;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use access::{AuthorizationGate, RecordAccessGate};
pub use reconcile::{IntentReconciler, ReconcileReport};
pub use replace::{FileReplaceService, ReplaceError, ReplaceRequest};
pub use sweep::{StagingSweeper, SweepReport};
