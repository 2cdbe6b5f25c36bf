//! Concurrency Tests
//!
//! Portal calls arrive on every CPU at once. These tests check that:
//! - Concurrent calls on one child never lose or duplicate table entries
//! - Calls on different children do not interfere
//! - A blocked join holds no lock and no reference to its child
//! - A removed child stays usable by calls already in flight

use core_types::{CapSel, ChildId, CpuId, MemoryPerms, Qpd, ThreadId, PAGE_SIZE};
use ipc::{PortalRequest, PortalValue};
use services_child_manager::ChildError;
use sim_kernel::test_utils::create_test_semaphore;
use sim_kernel::SimulatedKernel;
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tests_resilience::test_bootstrap;

const WORKERS: usize = 8;

fn wait_for_waiter(kernel: &SimulatedKernel, sm: CapSel) {
    while kernel.semaphore_waiters(sm) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
}

fn announce(thread_id: ThreadId, cpu: usize) -> PortalRequest {
    PortalRequest::AnnounceThread {
        ec: CapSel::new(0x900 + thread_id.0 as u64),
        name: format!("t{}", thread_id.0),
        thread_id,
        cpu: CpuId(cpu),
        qpd: Qpd::default(),
    }
}

#[test]
fn test_concurrent_sessions_on_one_child() {
    let system = test_bootstrap();
    let names: Vec<String> = (0..WORKERS).map(|n| format!("svc{}", n)).collect();
    for name in &names {
        system.register_service(name).unwrap();
    }
    let id = system.spawn("app").unwrap();
    let barrier = Barrier::new(WORKERS);

    let opened: Vec<(String, CapSel)> = thread::scope(|s| {
        let workers: Vec<_> = names
            .iter()
            .map(|name| {
                let barrier = &barrier;
                let system = &system;
                s.spawn(move || {
                    barrier.wait();
                    let value = system
                        .manager
                        .dispatch(
                            id,
                            PortalRequest::OpenSession {
                                service: name.clone(),
                                args: String::new(),
                            },
                        )
                        .unwrap();
                    match value {
                        PortalValue::Session { handle } => (name.clone(), handle),
                        other => panic!("unexpected reply {:?}", other),
                    }
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let child = system.manager.child(id).unwrap();
    let unique: BTreeSet<CapSel> = opened.iter().map(|(_, handle)| *handle).collect();
    assert_eq!(unique.len(), WORKERS);
    assert_eq!(child.sessions().len(), WORKERS);
    for (name, handle) in &opened {
        assert_eq!(&child.session(*handle).unwrap().service, name);
    }
}

#[test]
fn test_concurrent_duplicate_announce_has_one_winner() {
    let system = test_bootstrap();
    let id = system.spawn("app").unwrap();
    let barrier = Barrier::new(WORKERS);

    let results: Vec<Result<PortalValue, ChildError>> = thread::scope(|s| {
        let workers: Vec<_> = (0..WORKERS)
            .map(|n| {
                let barrier = &barrier;
                let system = &system;
                s.spawn(move || {
                    barrier.wait();
                    system.manager.dispatch(id, announce(ThreadId(0x1000), n % 4))
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, ChildError::DuplicateThread { .. })));
    // main plus the winner
    assert_eq!(system.manager.child(id).unwrap().threads().len(), 2);
}

#[test]
fn test_parallel_children_do_not_interfere() {
    let system = test_bootstrap();
    let ids: Vec<ChildId> = (0..WORKERS)
        .map(|n| system.spawn(&format!("app{}", n)).unwrap())
        .collect();
    let barrier = Barrier::new(WORKERS);

    thread::scope(|s| {
        for &id in &ids {
            let barrier = &barrier;
            let system = &system;
            s.spawn(move || {
                barrier.wait();
                for n in 0..16 {
                    system
                        .manager
                        .dispatch(id, announce(ThreadId(0x1000 + n), n % 4))
                        .unwrap();
                    system
                        .manager
                        .dispatch(
                            id,
                            PortalRequest::AllocRegion {
                                size: PAGE_SIZE,
                                perms: MemoryPerms::read_write(),
                            },
                        )
                        .unwrap();
                }
            });
        }
    });

    for id in ids {
        let info = system.manager.child(id).unwrap().info();
        assert_eq!(info.threads, 17);
        // hip, main stack and utcb, then stack, utcb and data per thread
        assert_eq!(info.regions, 3 + 16 * 3);
    }
}

#[test]
fn test_join_blocks_until_terminate() {
    let system = test_bootstrap();
    let id = system.spawn("app").unwrap();
    let value = system
        .manager
        .dispatch(id, announce(ThreadId(0x1000), 1))
        .unwrap();
    let PortalValue::Thread { stack, utcb, .. } = value else {
        panic!("unexpected reply {:?}", value);
    };
    let sm = create_test_semaphore(&system.kernel).unwrap();

    thread::scope(|s| {
        let joiner = s.spawn(|| system.manager.join_thread(id, ThreadId(0x1000), sm));
        wait_for_waiter(&system.kernel, sm);

        // The blocked joiner holds no lock: other calls still go through
        system
            .manager
            .dispatch(
                id,
                PortalRequest::AllocRegion {
                    size: PAGE_SIZE,
                    perms: MemoryPerms::read_only(),
                },
            )
            .unwrap();
        assert!(!joiner.is_finished());

        system
            .manager
            .dispatch(
                id,
                PortalRequest::TerminateThread {
                    thread_id: ThreadId(0x1000),
                    stack,
                    utcb,
                },
            )
            .unwrap();
        joiner.join().unwrap().unwrap();
    });
    assert_eq!(system.kernel.semaphore_count(sm), Some(0));
}

#[test]
fn test_join_released_by_child_removal() {
    let system = test_bootstrap();
    let id = system.spawn("app").unwrap();
    system
        .manager
        .dispatch(id, announce(ThreadId(0x1000), 0))
        .unwrap();
    let sm = create_test_semaphore(&system.kernel).unwrap();

    thread::scope(|s| {
        let joiner = s.spawn(|| system.manager.join_thread(id, ThreadId(0x1000), sm));
        wait_for_waiter(&system.kernel, sm);
        system.manager.remove_child(id).unwrap();
        joiner.join().unwrap().unwrap();
    });
    assert!(system.manager.child(id).is_none());
}

#[test]
fn test_removed_child_outlives_in_flight_call() {
    let system = test_bootstrap();
    system.register_service("log").unwrap();
    let id = system.spawn("app").unwrap();
    let in_flight = system.manager.child(id).unwrap();
    let live_before = system.kernel.live_object_count();

    system.manager.remove_child(id).unwrap();
    assert!(system.manager.child(id).is_none());

    // The call already holding the child completes normally
    let handle = in_flight.open_session("log", "", None).unwrap();
    assert!(system.kernel.is_live(handle));
    assert_eq!(system.kernel.live_object_count(), live_before + 1);

    // The id is not handed out while the child is still alive
    let other = system.manager.create_child("other").unwrap();
    assert_ne!(other, id);

    drop(in_flight);
    assert!(!system.kernel.is_live(handle));
    assert_eq!(system.manager.create_child("again").unwrap(), id);
}

#[test]
fn test_concurrent_create_and_remove() {
    let system = test_bootstrap();
    let barrier = Barrier::new(WORKERS);

    thread::scope(|s| {
        for n in 0..WORKERS {
            let barrier = &barrier;
            let system = &system;
            s.spawn(move || {
                barrier.wait();
                for round in 0..8 {
                    let id = system.spawn(&format!("w{}-{}", n, round)).unwrap();
                    system
                        .manager
                        .dispatch(id, announce(ThreadId(0x2000), round % 4))
                        .unwrap();
                    system.manager.remove_child(id).unwrap();
                }
            });
        }
    });

    assert!(system.manager.is_empty());
    let platform = system.manager.platform();
    assert_eq!(platform.caps().available(), platform.caps().capacity());
    assert_eq!(system.kernel.live_object_count(), 0);
}
