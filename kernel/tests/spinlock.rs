// Copyright 2025 The Emmer Authors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

//! Spinlock contention tests.  OS threads stand in for harts; the lock makes
//! no distinction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use kernel::sync::spinlock::{BareSpinLock, SpinLock};

const HARTS: usize = 8;
const ITERATIONS: usize = 10_000;

#[test]
fn exclusive_holders_never_overlap() {
    static LOCK: SpinLock<u64> = SpinLock::new(0);
    static INSIDE: AtomicUsize = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..HARTS {
            scope.spawn(|| {
                for _ in 0..ITERATIONS {
                    let mut guard = LOCK.lock();
                    assert_eq!(INSIDE.fetch_add(1, Ordering::SeqCst), 0);
                    *guard += 1;
                    INSIDE.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(*LOCK.lock(), (HARTS * ITERATIONS) as u64);
}

#[test]
fn shared_holders_coexist_but_exclude_writers() {
    static LOCK: BareSpinLock = BareSpinLock::new();
    static READERS: AtomicUsize = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..HARTS {
            scope.spawn(|| {
                for _ in 0..ITERATIONS {
                    let _guard = LOCK.lock_shared();
                    READERS.fetch_add(1, Ordering::SeqCst);
                    READERS.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
        for _ in 0..2 {
            scope.spawn(|| {
                for _ in 0..ITERATIONS {
                    let _guard = LOCK.lock();
                    // No shared holder may be inside while we hold exclusive.
                    assert_eq!(READERS.load(Ordering::SeqCst), 0);
                }
            });
        }
    });
}

#[test]
fn try_lock_contends_correctly() {
    let lock = SpinLock::new(());

    let exclusive = lock.lock();
    assert!(lock.try_lock().is_none());
    assert!(lock.try_lock_shared().is_none());
    drop(exclusive);

    let shared = lock.lock_shared();
    assert!(lock.try_lock().is_none());
    assert!(lock.try_lock_shared().is_some());
    drop(shared);

    assert!(lock.try_lock().is_some());
}
