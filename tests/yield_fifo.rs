// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Equal-priority threads are dispatched in creation order on their first
//! pass: the ready queue is FIFO within a priority class.

use std::sync::atomic::{AtomicUsize, Ordering};
use threadux::{join, spawn, yield_now};

static ORDER: [AtomicUsize; 3] = [
    AtomicUsize::new(usize::MAX),
    AtomicUsize::new(usize::MAX),
    AtomicUsize::new(usize::MAX),
];
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

fn worker(tag: usize) -> usize {
    let slot = NEXT_SLOT.fetch_add(1, Ordering::SeqCst);
    ORDER[slot].store(tag, Ordering::SeqCst);
    yield_now();
    tag
}

#[test]
fn equal_priority_threads_run_in_creation_order() {
    let _ = env_logger::builder().is_test(true).try_init();

    let t1 = spawn(|| worker(1)).unwrap();
    let t2 = spawn(|| worker(2)).unwrap();
    let t3 = spawn(|| worker(3)).unwrap();

    assert_eq!(join(t1).unwrap(), 1);
    assert_eq!(join(t2).unwrap(), 2);
    assert_eq!(join(t3).unwrap(), 3);

    let order: Vec<usize> = ORDER.iter().map(|a| a.load(Ordering::SeqCst)).collect();
    assert_eq!(order, vec![1, 2, 3]);
}
