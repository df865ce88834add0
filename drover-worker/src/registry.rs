//! Worker type registry
//!
//! Process-wide map from worker-type string to the factory for its
//! execution backend. Populated by explicit `register` calls at startup;
//! read-only in steady state.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::warn;

use crate::backend::{ExecutionBackend, ProcessBackend};

/// Produces a fresh backend for a worker type.
pub type BackendFactory = fn() -> Arc<dyn ExecutionBackend>;

static REGISTRY: OnceLock<RwLock<HashMap<String, BackendFactory>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, BackendFactory>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers the backends shipped with the worker.
pub fn register_defaults() {
    register("process", || Arc::new(ProcessBackend::new()));
}

/// Registers a worker type. Replacing an existing registration is allowed
/// but noisy, since it only ever happens by mistake after startup.
pub fn register(worker_type: &str, factory: BackendFactory) {
    let replaced = registry()
        .write()
        .unwrap()
        .insert(worker_type.to_string(), factory);
    if replaced.is_some() {
        warn!("worker type '{}' was registered more than once", worker_type);
    }
}

/// Looks up the factory for a worker type.
pub fn lookup(worker_type: &str) -> Option<BackendFactory> {
    registry().read().unwrap().get(worker_type).copied()
}

/// Builds a backend for a worker type, if registered.
pub fn create(worker_type: &str) -> Option<Arc<dyn ExecutionBackend>> {
    lookup(worker_type).map(|factory| factory())
}

/// Every registered worker type, sorted for deterministic output.
pub fn available_types() -> Vec<String> {
    let mut types: Vec<String> = registry().read().unwrap().keys().cloned().collect();
    types.sort();
    types
}
