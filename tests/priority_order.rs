// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! A higher-priority thread created later still finishes before a
//! lower-priority thread doing identical work.

use std::sync::atomic::{AtomicUsize, Ordering};
use threadux::{join, spawn_with_priority, Priority};

static FINISH_SEQ: AtomicUsize = AtomicUsize::new(0);
static LOW_FINISHED_AT: AtomicUsize = AtomicUsize::new(usize::MAX);
static HIGH_FINISHED_AT: AtomicUsize = AtomicUsize::new(usize::MAX);

fn burn() {
    for i in 0..30_000_000u64 {
        std::hint::black_box(i);
    }
}

#[test]
fn higher_priority_thread_finishes_first() {
    let _ = env_logger::builder().is_test(true).try_init();

    let low = spawn_with_priority(
        || {
            burn();
            LOW_FINISHED_AT.store(FINISH_SEQ.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            0
        },
        Priority(0),
    )
    .unwrap();

    let high = spawn_with_priority(
        || {
            burn();
            HIGH_FINISHED_AT.store(FINISH_SEQ.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            0
        },
        Priority(10),
    )
    .unwrap();

    join(low).unwrap();
    join(high).unwrap();

    assert!(
        HIGH_FINISHED_AT.load(Ordering::SeqCst) < LOW_FINISHED_AT.load(Ordering::SeqCst),
        "high-priority thread must finish before the low-priority one"
    );
}
