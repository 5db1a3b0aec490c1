//! Initialization and lifecycle management for volscope.
//!
//! This module provides the functions to initialize and shut down the
//! global volscope state.

use crate::{Options, Result};

/// Initializes volscope with default settings.
///
/// This must be called before any volume is registered.
///
/// # Errors
///
/// Returns an error if volscope has already been initialized.
///
/// # Example
///
/// ```no_run
/// use volscope::*;
///
/// fn main() -> Result<()> {
///     init()?;
///     // Now you can register volumes and stream data into them
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    init_with_options(Options::default())
}

/// Initializes volscope with the given options.
///
/// Installs an `env_logger` logger filtered by `options.log_level` (unless
/// the application already installed one, or `RUST_LOG` overrides it) and
/// sizes the global region-scatter thread pool when `options.num_threads`
/// is non-zero.
pub fn init_with_options(options: Options) -> Result<()> {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(options.log_level.as_str()),
    )
    .try_init();

    if options.num_threads > 0 {
        if let Err(err) = rayon::ThreadPoolBuilder::new()
            .num_threads(options.num_threads)
            .build_global()
        {
            log::warn!("keeping existing thread pool: {err}");
        }
    }

    volscope_core::state::init_context(options)?;
    log::info!(
        "volscope initialized ({} scatter threads)",
        rayon::current_num_threads()
    );
    Ok(())
}

/// Returns whether volscope has been initialized.
#[must_use]
pub fn is_initialized() -> bool {
    volscope_core::state::is_initialized()
}

/// Shuts down volscope and drops every registered volume.
///
/// After calling this, you can call [`init()`] again to reinitialize.
/// Cluster groups are process-wide and are not reset.
pub fn shutdown() {
    volscope_core::state::shutdown_context();
    log::info!("volscope shut down");
}
