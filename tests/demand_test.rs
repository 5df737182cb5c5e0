//! Tests for `DemandCounter` under contention.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use demandflow::{DemandCounter, FlowError, UNBOUNDED};

#[test]
fn zero_request_leaves_counter_unchanged() {
    let demand = DemandCounter::new();
    demand.request(3).unwrap();

    assert_eq!(demand.request(0), Err(FlowError::InvalidDemand { requested: 0 }));
    assert_eq!(demand.outstanding(), 3);
    assert_eq!(demand.granted(), 3);
}

#[test]
fn concurrent_takers_never_exceed_grant() {
    let demand = Arc::new(DemandCounter::new());
    demand.request(1_000).unwrap();
    let taken = Arc::new(AtomicU64::new(0));

    let takers: Vec<_> = (0..8)
        .map(|_| {
            let demand = demand.clone();
            let taken = taken.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    if demand.try_take() {
                        taken.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for taker in takers {
        taker.join().unwrap();
    }

    assert_eq!(taken.load(Ordering::SeqCst), 1_000);
    assert_eq!(demand.outstanding(), 0);
}

#[test]
fn concurrent_requests_and_takes_balance() {
    let demand = Arc::new(DemandCounter::new());
    let taken = Arc::new(AtomicU64::new(0));

    let requesters: Vec<_> = (0..4)
        .map(|_| {
            let demand = demand.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    demand.request(2).unwrap();
                }
            })
        })
        .collect();
    let takers: Vec<_> = (0..4)
        .map(|_| {
            let demand = demand.clone();
            let taken = taken.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    if demand.try_take() {
                        taken.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for handle in requesters.into_iter().chain(takers) {
        handle.join().unwrap();
    }

    let taken = taken.load(Ordering::SeqCst);
    assert_eq!(demand.granted(), 2_000);
    assert_eq!(taken + demand.outstanding(), 2_000);
}

#[test]
fn unbounded_demand_is_sticky() {
    let demand = DemandCounter::new();
    demand.request(UNBOUNDED).unwrap();
    demand.request(10).unwrap();

    assert!(demand.is_unbounded());
    assert!(demand.try_take());
    assert_eq!(demand.outstanding(), UNBOUNDED);
}

#[test]
fn emissions_within_grant_are_accepted() {
    let demand = DemandCounter::new();
    demand.request(2).unwrap();
    demand.record_emission();
    demand.record_emission();
    assert_eq!(demand.emitted(), 2);
}
