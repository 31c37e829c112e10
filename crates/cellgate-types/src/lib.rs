//! Shared vocabulary for the Cellgate access-control core.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! - identifiers ([`UserId`], [`ShardId`], [`Region`], ...)
//! - the [`Operation`] catalogue with its static tier / dependency tables
//! - per-request [`Dependencies`] health
//! - the data model (objects, grants, request context, cell health)
//! - the decision taxonomy ([`DenyReason`], [`FailureClass`])
//! - the [`Clock`] seam used wherever wall-clock time is read

#![deny(unsafe_code)]

pub mod clock;
pub mod decision;
pub mod dependencies;
pub mod ids;
pub mod model;
pub mod operation;

pub use clock::{span_secs, try_span_secs, Clock, ManualClock, SystemClock};
pub use decision::{DenyReason, FailureClass, PolicyDenial, RateLimitKind};
pub use dependencies::{Dependencies, Dependency};
pub use ids::{CellId, GrantId, ObjectId, Region, ShardId, TenantId, UserId};
pub use model::{CellHealth, DataObject, DataTier, Location, RequestContext, Role, ShareGrant, User};
pub use operation::{OpTier, Operation};
