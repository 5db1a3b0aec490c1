//! Process groups for distributed rendering.
//!
//! A cluster is made of three named groups: `world` (every process), `app`
//! (the processes driving the application) and `worker` (the processes that
//! own volume data). Each process sees a group either from the inside, as a
//! member with its own rank, or from the outside through an
//! intercommunicator that addresses the remote side as a single peer.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Result, VolscopeError};

/// The channel contract a process group is built on.
///
/// Implementations wrap a message-passing communicator supplied by the
/// cluster bootstrap. Every call is blocking; any failure is reported as
/// [`VolscopeError::NativeBackendFailure`].
pub trait Communicator: Send + Sync + fmt::Debug {
    /// Rank of the calling process within its local group.
    fn rank(&self) -> Result<usize>;

    /// Number of processes in the local group.
    fn size(&self) -> Result<usize>;

    /// Number of processes in the remote group of an intercommunicator.
    fn remote_size(&self) -> Result<usize>;

    /// Blocks until every process reachable through this communicator has
    /// entered the barrier.
    fn barrier(&self) -> Result<()>;
}

/// Rank of the current process as seen by a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rank {
    /// The process is a member with this rank.
    Member(usize),
    /// The process is outside the group and acts as root towards it.
    RemoteRoot,
}

impl Rank {
    /// Returns the member rank, if any.
    #[must_use]
    pub fn member(self) -> Option<usize> {
        match self {
            Self::Member(rank) => Some(rank),
            Self::RemoteRoot => None,
        }
    }
}

#[derive(Debug)]
enum Membership {
    Intra {
        comm: Arc<dyn Communicator>,
        rank: usize,
        size: usize,
    },
    Inter {
        comm: Arc<dyn Communicator>,
        remote_size: usize,
    },
}

impl Membership {
    fn comm(&self) -> &dyn Communicator {
        match self {
            Self::Intra { comm, .. } | Self::Inter { comm, .. } => comm.as_ref(),
        }
    }
}

/// One logical set of cooperating processes.
///
/// A group starts uninitialized and is initialized exactly once, either as
/// an intra group ([`ProcessGroup::init_as_intra`]) or as an inter group
/// ([`ProcessGroup::init_as_inter`]). Once initialized it is read-only and
/// may be consulted from any thread.
pub struct ProcessGroup {
    name: String,
    membership: OnceLock<Membership>,
}

impl fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("name", &self.name)
            .field("contains_me", &self.contains_me())
            .field("rank", &self.rank().ok())
            .field("size", &self.size().ok())
            .finish()
    }
}

impl ProcessGroup {
    /// Creates an uninitialized group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            membership: OnceLock::new(),
        }
    }

    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the group has been initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.membership.get().is_some()
    }

    /// Initializes the group with the current process as a member.
    ///
    /// Rank and size are resolved from the communicator.
    pub fn init_as_intra(&self, comm: Arc<dyn Communicator>) -> Result<()> {
        self.ensure_uninitialized()?;
        let rank = comm.rank()?;
        let size = comm.size()?;
        self.install(Membership::Intra { comm, rank, size })?;
        log::debug!("group '{}': intra member, rank {rank} of {size}", self.name);
        Ok(())
    }

    /// Initializes the group as seen from outside.
    ///
    /// The rank becomes [`Rank::RemoteRoot`] and the size is the remote
    /// group's size.
    pub fn init_as_inter(&self, comm: Arc<dyn Communicator>) -> Result<()> {
        self.ensure_uninitialized()?;
        let remote_size = comm.remote_size()?;
        self.install(Membership::Inter { comm, remote_size })?;
        log::debug!(
            "group '{}': inter peer, remote size {remote_size}",
            self.name
        );
        Ok(())
    }

    /// Returns whether the current process is a member of this group.
    ///
    /// Uninitialized groups contain nobody.
    #[must_use]
    pub fn contains_me(&self) -> bool {
        matches!(self.membership.get(), Some(Membership::Intra { .. }))
    }

    /// Returns the rank of the current process in this group.
    pub fn rank(&self) -> Result<Rank> {
        match self.membership()? {
            Membership::Intra { rank, .. } => Ok(Rank::Member(*rank)),
            Membership::Inter { .. } => Ok(Rank::RemoteRoot),
        }
    }

    /// Returns the local size for members, the remote size otherwise.
    pub fn size(&self) -> Result<usize> {
        match self.membership()? {
            Membership::Intra { size, .. } => Ok(*size),
            Membership::Inter { remote_size, .. } => Ok(*remote_size),
        }
    }

    /// Blocks until every member of the group has reached the barrier.
    ///
    /// A failure leaves the group in an unknown state and is not retried.
    pub fn barrier(&self) -> Result<()> {
        let membership = self.membership()?;
        membership.comm().barrier().inspect_err(|err| {
            log::error!("barrier on group '{}' failed: {err}", self.name);
        })
    }

    fn membership(&self) -> Result<&Membership> {
        self.membership.get().ok_or_else(|| {
            VolscopeError::IllegalState(format!("process group '{}' is not initialized", self.name))
        })
    }

    fn ensure_uninitialized(&self) -> Result<()> {
        if self.is_initialized() {
            return Err(self.already_initialized());
        }
        Ok(())
    }

    fn install(&self, membership: Membership) -> Result<()> {
        self.membership
            .set(membership)
            .map_err(|_| self.already_initialized())
    }

    fn already_initialized(&self) -> VolscopeError {
        VolscopeError::IllegalState(format!(
            "process group '{}' is already initialized",
            self.name
        ))
    }
}

/// The role a process plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// Coordinates rendering; owns no volume data.
    Application,
    /// Owns volume data and answers sampling work.
    Worker,
    /// Single-process run: both roles in one process.
    Both,
}

/// The three groups that make up a cluster, as seen by one process.
#[derive(Debug)]
pub struct ClusterTopology {
    /// Every process in the cluster.
    pub world: ProcessGroup,
    /// The application-side processes.
    pub app: ProcessGroup,
    /// The data-owning worker processes.
    pub worker: ProcessGroup,
}

impl Default for ClusterTopology {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterTopology {
    /// Creates an uninitialized topology.
    pub fn new() -> Self {
        Self {
            world: ProcessGroup::new("world"),
            app: ProcessGroup::new("app"),
            worker: ProcessGroup::new("worker"),
        }
    }

    /// Derives the role of the current process from group membership.
    pub fn role(&self) -> Result<ProcessRole> {
        match (self.app.contains_me(), self.worker.contains_me()) {
            (true, true) => Ok(ProcessRole::Both),
            (true, false) => Ok(ProcessRole::Application),
            (false, true) => Ok(ProcessRole::Worker),
            (false, false) => Err(VolscopeError::IllegalState(
                "process is neither an application nor a worker rank".to_string(),
            )),
        }
    }

    /// Returns whether this process owns volume data.
    #[must_use]
    pub fn is_worker(&self) -> bool {
        self.worker.contains_me()
    }
}
