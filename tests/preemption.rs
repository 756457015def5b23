// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Two CPU-bound threads that never yield must still interleave, driven
//! purely by the preemption timer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use threadux::{join, spawn, stats};

static LAST: AtomicUsize = AtomicUsize::new(0);
static TRANSITIONS: AtomicUsize = AtomicUsize::new(0);

fn burner(tag: usize) -> usize {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(400) {
        if LAST.swap(tag, Ordering::SeqCst) != tag {
            TRANSITIONS.fetch_add(1, Ordering::SeqCst);
        }
        std::hint::black_box(tag);
    }
    0
}

#[test]
fn timer_preemption_interleaves_cpu_bound_threads() {
    let _ = env_logger::builder().is_test(true).try_init();

    let a = spawn(|| burner(1)).unwrap();
    let b = spawn(|| burner(2)).unwrap();
    join(a).unwrap();
    join(b).unwrap();

    let stats = stats();
    assert!(stats.preemptions > 0, "no timer tick ever preempted a thread");
    assert!(stats.context_switches >= 4);

    // Purely cooperative execution would produce at most two transitions
    // (one per burner getting its first slice); preemption at a 50 ms
    // quantum over ~800 ms of burning produces far more.
    assert!(
        TRANSITIONS.load(Ordering::SeqCst) >= 4,
        "burners did not interleave: preemption is not working"
    );
}
