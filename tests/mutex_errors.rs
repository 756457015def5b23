// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Ownership rules: only the holder may unlock, and misuse is reported
//! without side effects.

use threadux::sync::{Condvar, Mutex};
use threadux::{join, spawn, Error};

static LOCK: Mutex = Mutex::new();
static COND: Condvar = Condvar::new();

#[test]
fn unlock_by_non_owner_is_rejected() {
    let _ = env_logger::builder().is_test(true).try_init();

    LOCK.lock().unwrap();

    // Another thread may neither unlock nor try-lock our mutex.
    let intruder = spawn(|| {
        let unlock_rejected = matches!(LOCK.unlock(), Err(Error::NotOwner));
        let try_lock_failed = !LOCK.try_lock();
        usize::from(unlock_rejected && try_lock_failed)
    })
    .unwrap();
    assert_eq!(join(intruder).unwrap(), 1);

    // The failed unlock had no side effect: still locked, still ours.
    assert!(LOCK.is_locked());
    LOCK.unlock().unwrap();
    assert!(!LOCK.is_locked());

    // Unlocking with no waiters leaves the lock clear and reusable.
    LOCK.lock().unwrap();
    LOCK.unlock().unwrap();
    assert!(LOCK.try_lock());
    LOCK.unlock().unwrap();

    // We no longer own it, so a further unlock is a usage error.
    assert_eq!(LOCK.unlock(), Err(Error::NotOwner));

    // Signaling a condition with no waiters is a stored-nowhere no-op.
    COND.signal();

    // Waiting without holding the paired mutex is rejected.
    assert_eq!(COND.wait(&LOCK), Err(Error::NotOwner));
}
