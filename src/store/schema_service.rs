//! Schema source for a store.
//!
//! A store validates writes against whatever its [`SchemaService`] reports.
//! Pooled stores are built against a fixed, already-resolved model, so the
//! only implementation is [`StaticSchemaService`].

use std::fmt;
use std::sync::Arc;

use crate::schema::SchemaModel;

/// Callback invoked with the schema a store should use.
pub type SchemaListener = Box<dyn FnOnce(Arc<SchemaModel>) + Send>;

/// Handle returned by [`SchemaService::subscribe`]; closing it detaches the
/// listener.
pub trait SchemaSubscription: Send + Sync + fmt::Debug {
    /// Detaches the listener.
    fn close(&self);
}

/// Provides a store with its current schema and schema updates.
pub trait SchemaService: Send + Sync + fmt::Debug {
    /// Returns the schema currently in force.
    fn current_schema(&self) -> Arc<SchemaModel>;

    /// Registers a listener that receives the schema in force.
    fn subscribe(&self, listener: SchemaListener) -> Box<dyn SchemaSubscription>;
}

/// Schema service over a fixed model.
///
/// `subscribe` fires the listener once, synchronously, with the fixed
/// model; the returned subscription has nothing to detach.
#[derive(Debug, Clone)]
pub struct StaticSchemaService {
    schema: Arc<SchemaModel>,
}

impl StaticSchemaService {
    /// Wraps a resolved model.
    #[must_use]
    pub fn new(schema: Arc<SchemaModel>) -> Self {
        Self { schema }
    }
}

impl SchemaService for StaticSchemaService {
    fn current_schema(&self) -> Arc<SchemaModel> {
        Arc::clone(&self.schema)
    }

    fn subscribe(&self, listener: SchemaListener) -> Box<dyn SchemaSubscription> {
        listener(Arc::clone(&self.schema));
        Box::new(NoopSubscription)
    }
}

#[derive(Debug)]
struct NoopSubscription;

impl SchemaSubscription for NoopSubscription {
    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn subscribe_fires_once_with_fixed_model() {
        let model = Arc::new(SchemaModel::default());
        let service = StaticSchemaService::new(Arc::clone(&model));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let expected = Arc::clone(&model);

        let subscription = service.subscribe(Box::new(move |schema| {
            assert!(Arc::ptr_eq(&schema, &expected));
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        subscription.close();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&service.current_schema(), &model));
    }
}
