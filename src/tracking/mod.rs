//! Change tracking over local stores.
//!
//! A [`ChangeTracker`] decorates any [`LocalStore`](crate::store::LocalStore)
//! for the lifetime of one logical operation (a pull, a push, a local write).
//! It classifies each row mutation, reports it as a [`SyncEvent`], and counts
//! it into an [`OperationsBatch`] that is published once at disposal.
//!
//! [`ChangeTrackerFactory`] hands out a tracker only when the options enable
//! some notification for the source; otherwise callers get a pass-through
//! [`LocalStoreProxy`] behind the same [`TrackedStore`] type.
//!
//! [`SyncEvent`]: crate::events::SyncEvent

mod batch;
mod factory;
mod tracker;

pub use batch::OperationsBatch;
pub use factory::{ChangeTrackerFactory, LocalStoreProxy, TrackedStore};
pub use tracker::ChangeTracker;
