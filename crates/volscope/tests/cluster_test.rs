//! Cluster group integration tests.
//!
//! The process-wide groups can only be installed once, so only one test in
//! this file touches them.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use volscope::*;

#[test]
fn test_process_wide_groups() {
    assert!(!is_cluster_initialized());
    assert!(world().is_err());

    // a topology with uninitialized groups is rejected
    assert!(matches!(
        init_cluster(ClusterTopology::new()),
        Err(VolscopeError::IllegalState(_))
    ));

    init_single_process().expect("cluster init failed");
    assert!(is_cluster_initialized());
    assert_eq!(role().unwrap(), ProcessRole::Both);
    assert_eq!(world().unwrap().size().unwrap(), 1);
    assert_eq!(app().unwrap().rank().unwrap(), Rank::Member(0));
    assert!(worker().unwrap().contains_me());
    world().unwrap().barrier().unwrap();

    assert!(init_single_process().is_err());
    let group = world().unwrap();
    assert!(group.init_as_intra(Arc::new(LocalComm::group(1).remove(0))).is_err());
}

#[test]
fn test_workers_own_slabs() {
    const APPS: usize = 1;
    const WORKERS: usize = 3;

    let (tx, rx) = crossbeam_channel::unbounded();
    let handles: Vec<_> = local_cluster(APPS, WORKERS)
        .unwrap()
        .into_iter()
        .map(|topology| {
            let tx = tx.clone();
            thread::spawn(move || {
                if topology.role().unwrap() == ProcessRole::Worker {
                    let rank = topology.worker.rank().unwrap().member().unwrap();
                    let dims = IVec3::splat(8);
                    let volume = StructuredBrickVolume::with_layout(
                        format!("slab {rank}"),
                        VoxelType::Float,
                        dims,
                    )
                    .unwrap();
                    volume
                        .set_region_typed(&vec![rank as f32; 512], IVec3::ZERO, dims)
                        .unwrap();
                    let value = volume.kernel().unwrap().voxel(IVec3::splat(3)).unwrap();
                    tx.send((rank, value)).unwrap();
                    // the application side waits on its inter group for all workers
                    topology.app.barrier().unwrap();
                } else {
                    assert_eq!(topology.worker.size().unwrap(), WORKERS);
                    topology.worker.barrier().unwrap();
                }
                topology.world.barrier().unwrap();
            })
        })
        .collect();
    drop(tx);

    for handle in handles {
        handle.join().unwrap();
    }
    let mut reports: Vec<(usize, f32)> = rx.iter().collect();
    reports.sort_by_key(|(rank, _)| *rank);
    assert_eq!(reports, vec![(0, 0.0), (1, 1.0), (2, 2.0)]);
}

#[test]
fn test_barrier_waits_for_every_member() {
    let mut comms = LocalComm::group(3);
    let late = comms.pop().unwrap();
    let (done_tx, done_rx) = crossbeam_channel::unbounded();

    for comm in comms {
        let done_tx = done_tx.clone();
        thread::spawn(move || {
            let group = ProcessGroup::new("worker");
            group.init_as_intra(Arc::new(comm)).unwrap();
            group.barrier().unwrap();
            done_tx.send(()).unwrap();
        });
    }

    assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());

    let group = ProcessGroup::new("worker");
    group.init_as_intra(Arc::new(late)).unwrap();
    group.barrier().unwrap();
    for _ in 0..2 {
        done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    }
}
