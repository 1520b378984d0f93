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

//! Cross-hart busy-wait spinlock with exclusive and shared modes.
//!
//! This is the only synchronization primitive the isolation core assumes
//! exists.  Acquisition is a bounded busy-wait; a hart never suspends on a
//! lock.  There is no fairness guarantee: a steady stream of shared holders
//! can starve an exclusive waiter.
//!
//! Critical sections must not themselves take a trap that re-enters the same
//! lock; the dispatcher only takes spinlocks at its single deferred exit
//! point, which bounds reentrancy to one level.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

/// Lock word value while an exclusive holder is inside; any other non-zero
/// value is the shared holder count.
const EXCLUSIVE: usize = usize::MAX;

/// Raw lock state machine, without data.
///
/// Exclusive holder count is 0 or 1; shared holders may coexist with each
/// other but never with the exclusive holder.
pub struct BareSpinLock {
    state: AtomicUsize,
}

impl BareSpinLock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
        }
    }

    /// Try to take the lock exclusively.
    #[inline]
    pub fn try_lock(&self) -> Option<BareSpinLockGuard<'_>> {
        self.state
            .compare_exchange(0, EXCLUSIVE, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| BareSpinLockGuard { lock: self })
            .ok()
    }

    /// Take the lock exclusively, spinning until it is free.
    #[inline]
    pub fn lock(&self) -> BareSpinLockGuard<'_> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            core::hint::spin_loop();
        }
    }

    /// Try to take the lock shared.  Fails while the exclusive bit is held.
    #[inline]
    pub fn try_lock_shared(&self) -> Option<BareSharedSpinLockGuard<'_>> {
        let state = self.state.load(Ordering::Relaxed);
        if state >= EXCLUSIVE - 1 {
            // Exclusively held, or the shared count would saturate into the
            // exclusive encoding.
            return None;
        }
        self.state
            .compare_exchange_weak(state, state + 1, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| BareSharedSpinLockGuard { lock: self })
            .ok()
    }

    /// Take the lock shared, spinning while an exclusive holder is inside.
    #[inline]
    pub fn lock_shared(&self) -> BareSharedSpinLockGuard<'_> {
        loop {
            if let Some(guard) = self.try_lock_shared() {
                return guard;
            }
            core::hint::spin_loop();
        }
    }

    // Only called by the guards' drop().
    #[inline]
    fn unlock(&self) {
        self.state.store(0, Ordering::Release);
    }

    #[inline]
    fn unlock_shared(&self) {
        self.state.fetch_sub(1, Ordering::Release);
    }
}

impl Default for BareSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BareSpinLockGuard<'a> {
    lock: &'a BareSpinLock,
}

impl Drop for BareSpinLockGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

pub struct BareSharedSpinLockGuard<'a> {
    lock: &'a BareSpinLock,
}

impl Drop for BareSharedSpinLockGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock_shared();
    }
}

/// Spinlock protecting a value.
///
/// `lock` grants mutable access through an exclusive guard; `lock_shared`
/// grants read access and may be held by any number of harts at once.
pub struct SpinLock<T> {
    inner: BareSpinLock,
    data: UnsafeCell<T>,
}

// SAFETY: the lock state machine guarantees an exclusive guard is the only
// live reference, and shared guards only ever hand out `&T`.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send + Sync> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    #[must_use]
    pub const fn new(initial_value: T) -> Self {
        Self {
            inner: BareSpinLock::new(),
            data: UnsafeCell::new(initial_value),
        }
    }

    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.inner.try_lock().map(|guard| SpinLockGuard {
            lock: self,
            _inner_guard: guard,
        })
    }

    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        SpinLockGuard {
            _inner_guard: self.inner.lock(),
            lock: self,
        }
    }

    pub fn try_lock_shared(&self) -> Option<SharedSpinLockGuard<'_, T>> {
        self.inner
            .try_lock_shared()
            .map(|guard| SharedSpinLockGuard {
                lock: self,
                _inner_guard: guard,
            })
    }

    pub fn lock_shared(&self) -> SharedSpinLockGuard<'_, T> {
        SharedSpinLockGuard {
            _inner_guard: self.inner.lock_shared(),
            lock: self,
        }
    }
}

pub struct SpinLockGuard<'lock, T> {
    lock: &'lock SpinLock<T>,
    _inner_guard: BareSpinLockGuard<'lock>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding the exclusive guard.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding the exclusive guard.
        unsafe { &mut *self.lock.data.get() }
    }
}

pub struct SharedSpinLockGuard<'lock, T> {
    lock: &'lock SpinLock<T>,
    _inner_guard: BareSharedSpinLockGuard<'lock>,
}

impl<T> Deref for SharedSpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: shared guards exclude the exclusive holder.
        unsafe { &*self.lock.data.get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_try_lock_returns_correct_value() {
        let lock = BareSpinLock::new();

        {
            let _guard = lock.lock();
            assert!(lock.try_lock().is_none());
            assert!(lock.try_lock_shared().is_none());
        }

        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn bare_shared_holders_coexist() {
        let lock = BareSpinLock::new();

        let a = lock.lock_shared();
        let b = lock.lock_shared();
        assert!(lock.try_lock_shared().is_some());
        assert!(lock.try_lock().is_none());

        drop(a);
        assert!(lock.try_lock().is_none());
        drop(b);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn try_lock_returns_correct_value() {
        let lock = SpinLock::new(false);

        {
            let mut guard = lock.lock();
            *guard = true;
            assert!(lock.try_lock().is_none());
        }

        let guard = lock.lock();
        assert!(*guard);
    }

    #[test]
    fn shared_guard_reads_data() {
        let lock = SpinLock::new(17);
        let a = lock.lock_shared();
        let b = lock.lock_shared();
        assert_eq!(*a + *b, 34);
    }
}
