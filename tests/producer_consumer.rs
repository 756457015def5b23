// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Producer/consumer over a mutex and condition variable, plus return-value
//! propagation through join.
//!
//! One test per file: the runtime is process-global and the harness runs
//! tests of a binary on multiple OS threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use threadux::sync::{Condvar, Mutex};
use threadux::{join, spawn, Error};

static LOCK: Mutex = Mutex::new();
static COND: Condvar = Condvar::new();
static DATA_AVAILABLE: AtomicUsize = AtomicUsize::new(0);
static GOT: AtomicUsize = AtomicUsize::new(0);

#[test]
fn producer_signals_consumer_and_join_returns_exit_value() {
    let _ = env_logger::builder().is_test(true).try_init();

    let consumer = spawn(|| {
        LOCK.lock().unwrap();
        while DATA_AVAILABLE.load(Ordering::SeqCst) == 0 {
            COND.wait(&LOCK).unwrap();
        }
        GOT.fetch_add(1, Ordering::SeqCst);
        LOCK.unlock().unwrap();
        0
    })
    .unwrap();

    let producer = spawn(|| {
        // Let the consumer run first and park on the condition.
        std::thread::sleep(Duration::from_millis(20));

        LOCK.lock().unwrap();
        DATA_AVAILABLE.store(1, Ordering::SeqCst);
        COND.signal();
        LOCK.unlock().unwrap();
        100
    })
    .unwrap();

    assert_eq!(join(producer).unwrap(), 100);
    assert_eq!(join(consumer).unwrap(), 0);

    // The consumer woke exactly once.
    assert_eq!(GOT.load(Ordering::SeqCst), 1);

    // A thread can be joined exactly once.
    assert_eq!(join(producer), Err(Error::NotFound));
}
