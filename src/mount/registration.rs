//! Releasable resources owned by a mount point.

use std::fmt;

use futures_util::future::BoxFuture;

use crate::error::ReleaseError;
use crate::tx::ListenerRegistration;

/// A resource a mount point holds until teardown: its published endpoint
/// or an attached change listener.
pub trait Registration: Send + Sync + fmt::Debug {
    /// Returns a name identifying the resource in logs.
    fn name(&self) -> &str;

    /// Releases the resource.
    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), ReleaseError>>;
}

impl Registration for ListenerRegistration {
    fn name(&self) -> &str {
        Self::name(self)
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), ReleaseError>> {
        Box::pin(Self::close(*self))
    }
}

/// Closes every registration, in order, without stopping at failures.
///
/// Returns the number of registrations whose release failed; each failure
/// is logged.
pub async fn release_all(registrations: Vec<Box<dyn Registration>>) -> usize {
    let mut failures = 0;
    for registration in registrations {
        let name = registration.name().to_string();
        if let Err(err) = registration.close().await {
            failures += 1;
            tracing::error!(registration = %name, error = %err, "failed to release mount point resource");
        }
    }
    failures
}
