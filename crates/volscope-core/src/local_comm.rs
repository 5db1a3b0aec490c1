//! In-process communicators.
//!
//! Threads stand in for processes: [`local_cluster`] wires up one
//! [`ClusterTopology`] per simulated rank, connected through channels. This
//! is what single-process runs use, and what the group contract is tested
//! against.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{Result, VolscopeError};
use crate::group::{ClusterTopology, Communicator};

#[derive(Debug, Default)]
struct BarrierState {
    generation: u64,
    // Arrivals for generations this rank has not entered yet.
    early: HashMap<u64, usize>,
}

/// An intracommunicator between threads of one process.
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    peers: Vec<Option<Sender<u64>>>,
    inbox: Receiver<u64>,
    state: Mutex<BarrierState>,
}

impl LocalComm {
    /// Creates `size` connected communicators, one per rank.
    pub fn group(size: usize) -> Vec<LocalComm> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| {
                let peers = senders
                    .iter()
                    .enumerate()
                    .map(|(peer, tx)| (peer != rank).then(|| tx.clone()))
                    .collect();
                LocalComm {
                    rank,
                    size,
                    peers,
                    inbox,
                    state: Mutex::new(BarrierState::default()),
                }
            })
            .collect()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> Result<usize> {
        Ok(self.rank)
    }

    fn size(&self) -> Result<usize> {
        Ok(self.size)
    }

    fn remote_size(&self) -> Result<usize> {
        Err(VolscopeError::NativeBackendFailure(
            "remote size requested on an intracommunicator".to_string(),
        ))
    }

    fn barrier(&self) -> Result<()> {
        let mut state = self.state.lock();
        let generation = state.generation;
        state.generation += 1;

        for (peer, tx) in self.peers.iter().enumerate() {
            if let Some(tx) = tx {
                tx.send(generation).map_err(|_| {
                    VolscopeError::NativeBackendFailure(format!(
                        "rank {peer} left before barrier {generation}"
                    ))
                })?;
            }
        }

        let mut arrived = state.early.remove(&generation).unwrap_or(0);
        while arrived + 1 < self.size {
            let seen = self.inbox.recv().map_err(|_| {
                VolscopeError::NativeBackendFailure(format!(
                    "all peers of rank {} disconnected during barrier {generation}",
                    self.rank
                ))
            })?;
            if seen == generation {
                arrived += 1;
            } else {
                *state.early.entry(seen).or_default() += 1;
            }
        }
        Ok(())
    }
}

/// An intercommunicator between the application side and the worker side.
///
/// Rank and size describe the local side. Barriers synchronize both sides.
#[derive(Debug)]
pub struct LocalInterComm {
    local_rank: usize,
    local_size: usize,
    remote_size: usize,
    bridge: LocalComm,
}

impl Communicator for LocalInterComm {
    fn rank(&self) -> Result<usize> {
        Ok(self.local_rank)
    }

    fn size(&self) -> Result<usize> {
        Ok(self.local_size)
    }

    fn remote_size(&self) -> Result<usize> {
        Ok(self.remote_size)
    }

    fn barrier(&self) -> Result<()> {
        self.bridge.barrier()
    }
}

/// Builds the topologies of a simulated cluster.
///
/// World ranks `0..app_count` are application ranks, the remaining
/// `worker_count` ranks are workers. Element `i` of the result belongs to
/// world rank `i` and should be moved to the thread playing that rank.
pub fn local_cluster(app_count: usize, worker_count: usize) -> Result<Vec<ClusterTopology>> {
    if app_count == 0 || worker_count == 0 {
        return Err(VolscopeError::InvalidArgument(format!(
            "a cluster needs at least one application and one worker rank \
             (got {app_count} and {worker_count})"
        )));
    }

    let world_size = app_count + worker_count;
    let world = LocalComm::group(world_size);
    let bridges = LocalComm::group(world_size);
    let mut apps = LocalComm::group(app_count).into_iter();
    let mut workers = LocalComm::group(worker_count).into_iter();

    let mut topologies = Vec::with_capacity(world_size);
    for (world_rank, (world_comm, bridge)) in world.into_iter().zip(bridges).enumerate() {
        let topology = ClusterTopology::new();
        topology.world.init_as_intra(Arc::new(world_comm))?;

        if world_rank < app_count {
            let app_comm = apps.next().ok_or_else(|| missing_comm("app", world_rank))?;
            topology.app.init_as_intra(Arc::new(app_comm))?;
            topology.worker.init_as_inter(Arc::new(LocalInterComm {
                local_rank: world_rank,
                local_size: app_count,
                remote_size: worker_count,
                bridge,
            }))?;
        } else {
            let worker_comm = workers
                .next()
                .ok_or_else(|| missing_comm("worker", world_rank))?;
            topology.worker.init_as_intra(Arc::new(worker_comm))?;
            topology.app.init_as_inter(Arc::new(LocalInterComm {
                local_rank: world_rank - app_count,
                local_size: worker_count,
                remote_size: app_count,
                bridge,
            }))?;
        }
        topologies.push(topology);
    }

    log::info!("local cluster: {app_count} application rank(s), {worker_count} worker rank(s)");
    Ok(topologies)
}

/// Builds the topology of a single-process run, which is both application and worker.
pub fn single_process() -> Result<ClusterTopology> {
    let topology = ClusterTopology::new();
    for group in [&topology.world, &topology.app, &topology.worker] {
        for comm in LocalComm::group(1) {
            group.init_as_intra(Arc::new(comm))?;
        }
    }
    Ok(topology)
}

fn missing_comm(group: &str, world_rank: usize) -> VolscopeError {
    VolscopeError::NativeBackendFailure(format!(
        "no {group} communicator for world rank {world_rank}"
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::group::{ProcessGroup, ProcessRole, Rank};

    #[test]
    fn test_intra_ranks_unique() {
        let comms = LocalComm::group(4);
        let mut ranks = Vec::new();
        for comm in comms {
            let group = ProcessGroup::new("worker");
            group.init_as_intra(Arc::new(comm)).unwrap();
            assert_eq!(group.size().unwrap(), 4);
            ranks.push(group.rank().unwrap().member().unwrap());
        }
        ranks.sort_unstable();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_intracomm_has_no_remote_size() {
        let comm = LocalComm::group(1).pop().unwrap();
        assert!(comm.remote_size().unwrap_err().is_fatal());
    }

    #[test]
    fn test_cluster_layout() {
        let topologies = local_cluster(1, 3).unwrap();
        assert_eq!(topologies.len(), 4);

        let app = &topologies[0];
        assert_eq!(app.role().unwrap(), ProcessRole::Application);
        assert_eq!(app.world.rank().unwrap(), Rank::Member(0));
        assert_eq!(app.worker.rank().unwrap(), Rank::RemoteRoot);
        assert_eq!(app.worker.size().unwrap(), 3);

        for (i, worker) in topologies[1..].iter().enumerate() {
            assert_eq!(worker.role().unwrap(), ProcessRole::Worker);
            assert_eq!(worker.worker.rank().unwrap(), Rank::Member(i));
            assert_eq!(worker.worker.size().unwrap(), 3);
            assert_eq!(worker.app.rank().unwrap(), Rank::RemoteRoot);
            assert_eq!(worker.app.size().unwrap(), 1);
        }
    }

    #[test]
    fn test_cluster_requires_both_sides() {
        assert!(local_cluster(0, 2).is_err());
        assert!(local_cluster(1, 0).is_err());
    }

    #[test]
    fn test_single_process_is_both() {
        let topology = single_process().unwrap();
        assert_eq!(topology.role().unwrap(), ProcessRole::Both);
        assert_eq!(topology.world.size().unwrap(), 1);
        topology.world.barrier().unwrap();
        topology.worker.barrier().unwrap();
    }

    #[test]
    fn test_barrier_releases_after_all_arrive() {
        const N: usize = 4;
        const ROUNDS: usize = 5;
        let arrivals = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = LocalComm::group(N)
            .into_iter()
            .map(|comm| {
                let arrivals = Arc::clone(&arrivals);
                thread::spawn(move || {
                    let group = ProcessGroup::new("worker");
                    group.init_as_intra(Arc::new(comm)).unwrap();
                    for round in 0..ROUNDS {
                        arrivals.fetch_add(1, Ordering::SeqCst);
                        group.barrier().unwrap();
                        // nobody leaves round `round` before everyone entered it
                        assert!(arrivals.load(Ordering::SeqCst) >= (round + 1) * N);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_inter_barrier_spans_both_sides() {
        let handles: Vec<_> = local_cluster(2, 2)
            .unwrap()
            .into_iter()
            .map(|topology| {
                thread::spawn(move || {
                    if topology.is_worker() {
                        topology.app.barrier().unwrap();
                    } else {
                        topology.worker.barrier().unwrap();
                    }
                    topology.world.barrier().unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_silent_member_blocks_others() {
        let mut comms = LocalComm::group(3);
        // rank 2 stays alive but never enters the barrier
        let silent = comms.pop().unwrap();
        let (done_tx, done_rx) = crossbeam_channel::unbounded();

        for comm in comms {
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                let result = comm.barrier();
                let _ = done_tx.send(result.is_ok());
            });
        }

        assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());

        silent.barrier().unwrap();
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap());
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn test_departed_member_fails_barrier() {
        let mut comms = LocalComm::group(2);
        drop(comms.pop());
        let err = comms[0].barrier().unwrap_err();
        assert!(err.is_fatal());
    }
}
