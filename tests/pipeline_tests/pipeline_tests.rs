//! Pipeline Tests
//!
//! Tests for FIFO request pairing and failure fan-out.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use redwire::pipeline::RequestPipeline;
use redwire::protocol::{Reply, ServerError};
use redwire::{CloseCause, RedwireError};

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_fifo_pairing_for_many_requests() {
    let pipeline = RequestPipeline::new();
    let pending: Vec<_> = (0..1000).map(|_| pipeline.enqueue()).collect();
    assert_eq!(pipeline.len(), 1000);

    for i in 0..1000 {
        pipeline.complete(Ok(Reply::Integer(i))).unwrap();
    }

    for (i, handle) in pending.into_iter().enumerate() {
        assert_eq!(handle.wait().unwrap(), Reply::Integer(i as i64));
    }
    assert!(pipeline.is_empty());
}

#[test]
fn test_callbacks_and_handles_share_one_queue() {
    let pipeline = RequestPipeline::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&seen);
    pipeline.enqueue_callback(move |outcome| log.lock().push(outcome.unwrap()));
    let handle = pipeline.enqueue();
    let log = Arc::clone(&seen);
    pipeline.enqueue_callback(move |outcome| log.lock().push(outcome.unwrap()));

    pipeline.complete(Ok(Reply::Integer(1))).unwrap();
    pipeline.complete(Ok(Reply::Integer(2))).unwrap();
    pipeline.complete(Ok(Reply::Integer(3))).unwrap();

    assert_eq!(handle.wait().unwrap(), Reply::Integer(2));
    assert_eq!(*seen.lock(), vec![Reply::Integer(1), Reply::Integer(3)]);
}

#[test]
fn test_error_reply_does_not_shift_pairing() {
    let pipeline = RequestPipeline::new();
    let a = pipeline.enqueue();
    let b = pipeline.enqueue();
    let c = pipeline.enqueue();

    pipeline.complete(Ok(Reply::bulk("one"))).unwrap();
    pipeline
        .complete(Ok(Reply::Error(ServerError::parse(b"WRONGTYPE bad"))))
        .unwrap();
    pipeline.complete(Ok(Reply::bulk("three"))).unwrap();

    assert_eq!(a.wait().unwrap(), Reply::bulk("one"));
    assert!(matches!(b.wait(), Err(RedwireError::Server(_))));
    assert_eq!(c.wait().unwrap(), Reply::bulk("three"));
}

#[test]
fn test_unsolicited_reply_is_returned() {
    let pipeline = RequestPipeline::new();
    let back = pipeline.complete(Ok(Reply::Integer(9)));
    assert_eq!(back, Err(Ok(Reply::Integer(9))));
    assert!(pipeline.is_empty());
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_fail_all_in_fifo_order() {
    let pipeline = RequestPipeline::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..5 {
        let order = Arc::clone(&order);
        pipeline.enqueue_callback(move |outcome| {
            assert!(matches!(
                outcome,
                Err(RedwireError::ConnectionClosed(CloseCause::ClosedByPeer))
            ));
            order.lock().push(i);
        });
    }

    assert_eq!(pipeline.fail_all(&CloseCause::ClosedByPeer), 5);
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    assert!(pipeline.is_empty());
}

#[test]
fn test_fail_all_idle_timeout_maps_to_timeout() {
    let pipeline = RequestPipeline::new();
    let handle = pipeline.enqueue();
    pipeline.fail_all(&CloseCause::IdleTimeout);

    let err = handle.wait().unwrap_err();
    assert!(matches!(err, RedwireError::Timeout));
    assert!(err.is_connection_error());
}

#[test]
fn test_fail_all_after_partial_completion() {
    let pipeline = RequestPipeline::new();
    let done = pipeline.enqueue();
    let stuck = pipeline.enqueue();

    pipeline.complete(Ok(Reply::status("OK"))).unwrap();
    assert_eq!(pipeline.fail_all(&CloseCause::ClosedLocally), 1);

    assert_eq!(done.wait().unwrap(), Reply::status("OK"));
    assert!(matches!(
        stuck.wait(),
        Err(RedwireError::ConnectionClosed(CloseCause::ClosedLocally))
    ));
}

// =============================================================================
// Handle Tests
// =============================================================================

#[test]
fn test_wait_timeout_then_reply() {
    let pipeline = RequestPipeline::new();
    let handle = pipeline.enqueue();

    assert!(handle.wait_timeout(Duration::from_millis(10)).is_none());
    assert!(handle.try_take().is_none());

    pipeline.complete(Ok(Reply::Integer(3))).unwrap();
    assert_eq!(handle.try_take().unwrap().unwrap(), Reply::Integer(3));
}

#[test]
fn test_wait_as_converts() {
    let pipeline = RequestPipeline::new();
    let handle = pipeline.enqueue();
    pipeline.complete(Ok(Reply::bulk("17"))).unwrap();
    assert_eq!(handle.wait_as::<i64>().unwrap(), 17);
}

#[test]
fn test_dropped_handle_still_consumes_slot() {
    let pipeline = RequestPipeline::new();
    drop(pipeline.enqueue());
    let kept = pipeline.enqueue();

    pipeline.complete(Ok(Reply::Integer(1))).unwrap();
    pipeline.complete(Ok(Reply::Integer(2))).unwrap();
    assert_eq!(kept.wait().unwrap(), Reply::Integer(2));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_enqueue_each_slot_completed_once() {
    let pipeline = Arc::new(RequestPipeline::new());
    let mut workers = Vec::new();

    for _ in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        workers.push(thread::spawn(move || {
            (0..100).map(|_| pipeline.enqueue()).collect::<Vec<_>>()
        }));
    }
    let handles: Vec<_> = workers
        .into_iter()
        .flat_map(|worker| worker.join().unwrap())
        .collect();
    assert_eq!(pipeline.len(), 800);

    for i in 0..800 {
        pipeline.complete(Ok(Reply::Integer(i))).unwrap();
    }

    let mut values: Vec<i64> = handles
        .into_iter()
        .map(|handle| handle.wait().unwrap().as_integer().unwrap())
        .collect();
    values.sort_unstable();
    assert_eq!(values, (0..800).collect::<Vec<_>>());
}
