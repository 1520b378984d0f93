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

//! Per-hart kernel state.
//!
//! Exactly one [`KernelContext`] exists per hart for the kernel's uptime,
//! owned by the architecture backend and handed out by hart id.  A hart only
//! ever mutates its own context; the one cross-hart access is
//! [`KernelContext::request_switch`], which is why the flag is atomic.

use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

use crate::arch::ArchInterface;
use crate::scheduler::ThreadContext;

pub struct KernelContext<A: ArchInterface> {
    /// Set by `request_switch_from_isr`, consumed exactly once at trap exit.
    switch_pending: AtomicBool,

    /// Non-owning reference to the context currently running on this hart.
    /// The thread table is owned by the process management layer.
    current_thread: AtomicPtr<ThreadContext<A>>,

    /// Raw cause of the most recent trap taken on this hart.
    last_trap_cause: AtomicUsize,
}

impl<A: ArchInterface> KernelContext<A> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            switch_pending: AtomicBool::new(false),
            current_thread: AtomicPtr::new(core::ptr::null_mut()),
            last_trap_cause: AtomicUsize::new(0),
        }
    }

    /// Mark that the scheduler wants a switch before the next trap exit.
    /// Idempotent: repeated requests collapse into one switch.
    #[inline]
    pub fn request_switch(&self) {
        self.switch_pending.store(true, Ordering::Release);
    }

    /// Consume the pending-switch flag.
    #[inline]
    pub fn take_switch_pending(&self) -> bool {
        self.switch_pending.swap(false, Ordering::AcqRel)
    }

    #[must_use]
    pub fn switch_pending(&self) -> bool {
        self.switch_pending.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn current_thread(&self) -> *mut ThreadContext<A> {
        self.current_thread.load(Ordering::Acquire)
    }

    pub fn set_current_thread(&self, thread: *mut ThreadContext<A>) {
        self.current_thread.store(thread, Ordering::Release);
    }

    /// Install the thread this hart booted on.  Called once per hart before
    /// the first switch request; the boot context is never resumed once the
    /// first real switch happens.
    pub fn adopt_boot_thread(&self, thread: &'static ThreadContext<A>) {
        self.current_thread.store(
            thread as *const ThreadContext<A> as *mut ThreadContext<A>,
            Ordering::Release,
        );
    }

    pub fn set_last_trap_cause(&self, cause: usize) {
        self.last_trap_cause.store(cause, Ordering::Relaxed);
    }

    #[must_use]
    pub fn last_trap_cause(&self) -> usize {
        self.last_trap_cause.load(Ordering::Relaxed)
    }
}

impl<A: ArchInterface> Default for KernelContext<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::arch::Arch;

    type KernelContext = super::KernelContext<Arch>;

    #[test]
    fn switch_request_is_idempotent() {
        let ctx = KernelContext::new();
        assert!(!ctx.switch_pending());

        ctx.request_switch();
        ctx.request_switch();
        assert!(ctx.switch_pending());

        // Both requests collapse into a single consumed flag.
        assert!(ctx.take_switch_pending());
        assert!(!ctx.take_switch_pending());
        assert!(!ctx.switch_pending());
    }

    #[test]
    fn last_trap_cause_round_trips() {
        let ctx = KernelContext::new();
        ctx.set_last_trap_cause(0x8000_000b);
        assert_eq!(ctx.last_trap_cause(), 0x8000_000b);
    }
}
