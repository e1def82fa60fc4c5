//! Service layer: business logic orchestration.
//!
//! [`MountPointManager`] turns topology changes into active mount points,
//! delegates schema work to [`crate::schema`] and data access to
//! [`crate::tx`], and emits events through the [`super::domain::EventBus`].

pub mod mount_point_manager;

pub use mount_point_manager::{CreateOutcome, MountPointManager};
