//! Domain events reflecting mount-point lifecycle and data changes.
//!
//! Every lifecycle transition emits a [`MountPointEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::NodeId;
use crate::store::StoreKind;

/// Domain event emitted after every mount-point state change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MountPointEvent {
    /// A mount point became active and its endpoint was registered.
    Created {
        /// Device identifier.
        node_id: NodeId,
        /// Published mount path.
        mount_path: String,
        /// Number of compiled modules in the schema model.
        module_count: usize,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A mount point was torn down.
    Removed {
        /// Device identifier.
        node_id: NodeId,
        /// Number of registrations whose release failed.
        release_failures: usize,
        /// Removal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A mount point could not be created.
    Failed {
        /// Device identifier.
        node_id: NodeId,
        /// Failure description.
        reason: String,
        /// Failure timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A transaction committed data into a mount point's store.
    DataChanged {
        /// Device identifier.
        node_id: NodeId,
        /// Store partition that changed.
        store: StoreKind,
        /// Store version after the commit.
        version: u64,
        /// Paths touched by the commit.
        paths: Vec<String>,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl MountPointEvent {
    /// Returns the node ID associated with this event.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        match self {
            Self::Created { node_id, .. }
            | Self::Removed { node_id, .. }
            | Self::Failed { node_id, .. }
            | Self::DataChanged { node_id, .. } => node_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Removed { .. } => "removed",
            Self::Failed { .. } => "failed",
            Self::DataChanged { .. } => "data_changed",
        }
    }
}
