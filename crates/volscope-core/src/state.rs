//! Global state management for volscope.

use std::sync::{OnceLock, RwLock};

use crate::error::{Result, VolscopeError};
use crate::options::Options;
use crate::registry::Registry;

/// Global context singleton.
static CONTEXT: OnceLock<RwLock<Context>> = OnceLock::new();

/// The global context containing all volscope state.
#[derive(Default)]
pub struct Context {
    /// Whether volscope has been initialized.
    pub initialized: bool,

    /// The volume registry.
    pub registry: Registry,

    /// Global options.
    pub options: Options,
}

/// Initializes the global context with the given options.
///
/// The context can be initialized once per process. After
/// [`shutdown_context`] it may be re-initialized in place.
pub fn init_context(options: Options) -> Result<()> {
    let lock = CONTEXT.get_or_init(|| RwLock::new(Context::default()));
    let mut ctx = lock
        .write()
        .map_err(|_| VolscopeError::IllegalState("context lock poisoned".to_string()))?;

    if ctx.initialized {
        return Err(VolscopeError::AlreadyInitialized);
    }
    ctx.initialized = true;
    ctx.options = options;
    Ok(())
}

/// Returns whether the context has been initialized.
pub fn is_initialized() -> bool {
    CONTEXT
        .get()
        .and_then(|lock| lock.read().ok())
        .is_some_and(|ctx| ctx.initialized)
}

/// Access the global context for reading.
///
/// Returns [`VolscopeError::NotInitialized`] before [`init_context`].
pub fn with_context<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&Context) -> R,
{
    let lock = CONTEXT.get().ok_or(VolscopeError::NotInitialized)?;
    let guard = lock
        .read()
        .map_err(|_| VolscopeError::IllegalState("context lock poisoned".to_string()))?;
    if !guard.initialized {
        return Err(VolscopeError::NotInitialized);
    }
    Ok(f(&guard))
}

/// Access the global context for writing.
///
/// Returns [`VolscopeError::NotInitialized`] before [`init_context`].
pub fn with_context_mut<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&mut Context) -> R,
{
    let lock = CONTEXT.get().ok_or(VolscopeError::NotInitialized)?;
    let mut guard = lock
        .write()
        .map_err(|_| VolscopeError::IllegalState("context lock poisoned".to_string()))?;
    if !guard.initialized {
        return Err(VolscopeError::NotInitialized);
    }
    Ok(f(&mut guard))
}

/// Shuts down the global context, dropping every registered volume.
pub fn shutdown_context() {
    if let Some(lock) = CONTEXT.get() {
        if let Ok(mut ctx) = lock.write() {
            ctx.initialized = false;
            ctx.registry.clear();
        }
    }
}
