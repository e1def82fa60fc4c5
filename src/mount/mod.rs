//! Mount-point layer: published endpoints, the resources they own, and the
//! records tracking active mount points.

pub mod record;
pub mod registration;
pub mod service;

pub use record::{ModuleSummary, MountPointRecord, MountPointSummary};
pub use registration::{Registration, release_all};
pub use service::{MountPoint, MountPointRegistration, MountPointService};
