//! Client-side core for a single on-chain governance contract: mirrors the
//! contract's proposals into a local snapshot, derives presentation status,
//! and coordinates the caller's create/vote/execute writes.

pub mod config;
mod coordinator;
pub mod error;
pub mod events;
pub mod session;
pub mod status;
pub mod subscription;
pub mod tracker;
pub mod view;

pub use config::{load_settings, ClientSettings};
pub use coordinator::{Outcome, RefreshTrigger, SkipReason, SyncCoordinator, WriteKind};
pub use error::ClientError;
pub use events::{ClientEvent, Notification, NotificationLevel};
pub use session::{ConnectionState, Session};
pub use status::derive_status;
pub use tracker::{BusySnapshot, OperationKind, OperationTracker};
pub use view::ProposalView;
