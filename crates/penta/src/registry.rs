//! Process-wide registry of API URL namespaces.
//!
//! Two APIs building with the same namespace would make reverse URL lookup
//! ambiguous, so the second build fails unless the check is skipped through
//! the API settings or the `PENTA_SKIP_REGISTRY` environment variable.

use parking_lot::{const_mutex, Mutex};
use penta_core::{PentaError, PentaResult};

static NAMESPACES: Mutex<Vec<String>> = const_mutex(Vec::new());

/// Fails if `namespace` is taken, without recording it.
///
/// # Errors
///
/// Returns a configuration error if the namespace is taken and the check is
/// not skipped.
pub fn check(namespace: &str, skip: bool) -> PentaResult<()> {
    ensure_free(&NAMESPACES.lock(), namespace, skip)
}

/// Records `namespace`.
///
/// # Errors
///
/// Returns a configuration error if the namespace is taken and the check is
/// not skipped.
pub fn register(namespace: &str, skip: bool) -> PentaResult<()> {
    let mut namespaces = NAMESPACES.lock();
    ensure_free(&namespaces, namespace, skip)?;
    if !namespaces.iter().any(|ns| ns == namespace) {
        namespaces.push(namespace.to_string());
    }
    Ok(())
}

fn ensure_free(namespaces: &[String], namespace: &str, skip: bool) -> PentaResult<()> {
    if !namespaces.iter().any(|ns| ns == namespace) {
        return Ok(());
    }
    if skip || penta_config::skip_registry_from_env() {
        tracing::debug!(namespace, "namespace already registered, check skipped");
        return Ok(());
    }
    Err(PentaError::configuration(format!(
        "an API with namespace '{namespace}' is already registered; give each API \
         a distinct urls_namespace or version, or set {} for tests",
        penta_config::SKIP_REGISTRY_VAR
    )))
}

/// Returns `true` if `namespace` has been registered.
#[must_use]
pub fn is_registered(namespace: &str) -> bool {
    NAMESPACES.lock().iter().any(|ns| ns == namespace)
}

/// Returns every registered namespace in registration order.
#[must_use]
pub fn namespaces() -> Vec<String> {
    NAMESPACES.lock().clone()
}

/// Forgets every namespace.
pub fn clear() {
    NAMESPACES.lock().clear();
}
