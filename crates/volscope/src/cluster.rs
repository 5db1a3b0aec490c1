//! Process-wide cluster groups.
//!
//! Each process installs its view of the cluster once, at start-up, before
//! any rendering work. The groups are then reachable from anywhere through
//! [`world()`], [`app()`] and [`worker()`].

use std::sync::OnceLock;

use crate::{ClusterTopology, ProcessGroup, ProcessRole, Result, VolscopeError};

static CLUSTER: OnceLock<ClusterTopology> = OnceLock::new();

/// Installs this process's cluster topology.
///
/// Every group of `topology` must already be initialized. The topology can
/// be installed once per process.
pub fn init_cluster(topology: ClusterTopology) -> Result<()> {
    for group in [&topology.world, &topology.app, &topology.worker] {
        if !group.is_initialized() {
            return Err(VolscopeError::IllegalState(format!(
                "process group '{}' must be initialized before the cluster",
                group.name()
            )));
        }
    }
    let role = topology.role()?;
    let world_rank = topology.world.rank()?;

    CLUSTER.set(topology).map_err(|_| {
        VolscopeError::IllegalState("cluster groups are already initialized".to_string())
    })?;
    log::info!("cluster initialized: world rank {world_rank:?} is {role:?}");
    Ok(())
}

/// Installs the topology of a single-process run, both application and worker.
pub fn init_single_process() -> Result<()> {
    init_cluster(volscope_core::single_process()?)
}

/// Returns whether the cluster groups have been installed.
#[must_use]
pub fn is_cluster_initialized() -> bool {
    CLUSTER.get().is_some()
}

/// Returns the installed topology.
pub fn cluster() -> Result<&'static ClusterTopology> {
    CLUSTER.get().ok_or_else(|| {
        VolscopeError::IllegalState(
            "cluster groups are not initialized - call volscope::init_cluster() first".to_string(),
        )
    })
}

/// Every process in the cluster.
pub fn world() -> Result<&'static ProcessGroup> {
    cluster().map(|c| &c.world)
}

/// The application-side processes.
pub fn app() -> Result<&'static ProcessGroup> {
    cluster().map(|c| &c.app)
}

/// The data-owning worker processes.
pub fn worker() -> Result<&'static ProcessGroup> {
    cluster().map(|c| &c.worker)
}

/// The role of this process.
pub fn role() -> Result<ProcessRole> {
    cluster()?.role()
}
