//! Where background delivery work runs
//!
//! Transports constructed inside a tokio runtime schedule onto it. Outside of
//! one, they share a lazily built single-worker runtime owned by the process.

use super::error::{LoggerError, Result};
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime};

static FALLBACK_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Handle for the ambient runtime, or the shared fallback runtime
pub(crate) fn background_handle() -> Result<Handle> {
    if let Ok(handle) = Handle::try_current() {
        return Ok(handle);
    }

    if let Some(runtime) = FALLBACK_RUNTIME.get() {
        return Ok(runtime.handle().clone());
    }

    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("logger-background")
        .enable_all()
        .build()
        .map_err(|e| {
            LoggerError::config("BackgroundRuntime", format!("cannot start runtime: {}", e))
        })?;

    // Another thread may have won the race; its runtime is kept and ours dropped.
    let _ = FALLBACK_RUNTIME.set(runtime);
    FALLBACK_RUNTIME
        .get()
        .map(|runtime| runtime.handle().clone())
        .ok_or_else(|| LoggerError::config("BackgroundRuntime", "runtime unavailable"))
}
