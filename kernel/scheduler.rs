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

//! Scheduler handoff protocol.
//!
//! The ready queue and the pick-next policy live outside this core.  The
//! dispatcher only signals: [`request_switch_from_isr`] raises the current
//! hart's pending flag, and the single trap-exit point consumes it, asks the
//! registered [`Scheduler`] for the next context, and performs the protection
//! swap plus register switch.  Deferring the decision to trap exit keeps the
//! scheduler's own locks out of nested interrupt depths.

use core::cell::UnsafeCell;

use crate::arch::{ArchInterface, InterruptGuard, ThreadState};
use crate::memory::{MemoryConfig, ProcessMemoryContext};

/// Stack memory handed to a thread.  The kernel does not allocate; the
/// process management layer owns the backing storage.
#[derive(Clone, Copy)]
pub struct Stack {
    start: *const u8,
    end: *const u8,
}

impl Stack {
    #[must_use]
    pub const fn from_slice(slice: &[u8]) -> Self {
        let start: *const u8 = slice.as_ptr();
        // SAFETY: offset based on the known size of the slice.
        let end = unsafe { start.add(slice.len()) };
        Self { start, end }
    }

    #[must_use]
    pub const fn new() -> Self {
        Self {
            start: core::ptr::null(),
            end: core::ptr::null(),
        }
    }

    #[must_use]
    pub fn start(self) -> *const u8 {
        self.start
    }

    #[must_use]
    pub fn end(self) -> *const u8 {
        self.end
    }

    /// Carve an aligned `T` off the top of the stack.
    #[must_use]
    pub fn aligned_allocation_mut<T>(self, align: usize) -> *mut T {
        let top = self.end as usize;
        let addr = (top - core::mem::size_of::<T>()) & !(align - 1);
        addr as *mut T
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

/// A schedulable context: the architecture's saved register state plus a
/// non-owning reference to the process's memory protection context.  Kernel
/// threads carry no memory context and run under the kernel configuration.
pub struct ThreadContext<A: ArchInterface> {
    arch_state: UnsafeCell<A::ThreadState>,
    memory: Option<&'static ProcessMemoryContext<A>>,
}

// SAFETY: `arch_state` is only accessed by the hart performing a context
// switch involving this thread, and a thread runs on at most one hart at a
// time.
unsafe impl<A: ArchInterface> Sync for ThreadContext<A> {}

impl<A: ArchInterface> ThreadContext<A> {
    /// Create a kernel thread context.
    #[must_use]
    pub const fn new_kernel() -> Self {
        Self {
            arch_state: UnsafeCell::new(A::ThreadState::NEW),
            memory: None,
        }
    }

    /// Create a user thread context bound to a process's memory.
    #[must_use]
    pub const fn new_user(memory: &'static ProcessMemoryContext<A>) -> Self {
        Self {
            arch_state: UnsafeCell::new(A::ThreadState::NEW),
            memory: Some(memory),
        }
    }

    #[must_use]
    pub fn memory(&self) -> Option<&'static ProcessMemoryContext<A>> {
        self.memory
    }

    /// Set up the initial frame for a kernel thread.
    ///
    /// # Safety
    /// The thread must not be running; call once before it is first scheduled.
    pub unsafe fn initialize_kernel_frame(
        &self,
        kernel_stack: Stack,
        entry: extern "C" fn(usize),
        arg: usize,
    ) {
        unsafe { (*self.arch_state.get()).initialize_kernel_frame(kernel_stack, entry, arg) }
    }

    /// Set up the initial frame for a user thread that enters user mode at
    /// `initial_pc` with `initial_sp`.
    ///
    /// # Safety
    /// The thread must not be running; call once before it is first scheduled.
    pub unsafe fn initialize_user_frame(
        &self,
        kernel_stack: Stack,
        initial_sp: usize,
        initial_pc: usize,
        arg: usize,
    ) {
        unsafe {
            (*self.arch_state.get()).initialize_user_frame(
                kernel_stack,
                initial_sp,
                initial_pc,
                arg,
            )
        }
    }

    pub(crate) fn arch_state_ptr(&self) -> *mut A::ThreadState {
        self.arch_state.get()
    }

    fn memory_key(&self) -> *const ProcessMemoryContext<A> {
        match self.memory {
            Some(memory) => memory as *const ProcessMemoryContext<A>,
            None => core::ptr::null(),
        }
    }
}

/// Pick-next policy, implemented by the external scheduler.
pub trait Scheduler<A: ArchInterface>: Sync {
    /// Pick the context to resume on `hart_id`.  May return the context that
    /// is already current (a no-op switch).
    ///
    /// Runs at trap exit with interrupts disabled: spinlocks only, never
    /// suspend.
    fn pick_next(&self, hart_id: usize) -> &'static ThreadContext<A>;
}

/// Registration slot for the scheduler, owned by the architecture backend so
/// it can be a plain static per concrete arch.
pub struct SchedulerRegistry<A: ArchInterface>(UnsafeCell<Option<&'static dyn Scheduler<A>>>);

// SAFETY: written once during boot before any switch request (see
// `set_scheduler`).
unsafe impl<A: ArchInterface> Sync for SchedulerRegistry<A> {}

impl<A: ArchInterface> SchedulerRegistry<A> {
    #[must_use]
    pub const fn new() -> Self {
        Self(UnsafeCell::new(None))
    }
}

impl<A: ArchInterface> Default for SchedulerRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the scheduler.
///
/// # Safety
/// Must be called at most once, before the first switch request on any hart.
pub unsafe fn set_scheduler<A: ArchInterface>(scheduler: &'static dyn Scheduler<A>) {
    unsafe { *A::scheduler_registry().0.get() = Some(scheduler) };
}

fn scheduler<A: ArchInterface>() -> Option<&'static dyn Scheduler<A>> {
    // SAFETY: only read after the one-time write in `set_scheduler`.
    unsafe { *A::scheduler_registry().0.get() }
}

/// Request a context switch before the current trap returns.
///
/// Callable only from an active trap context on the hart to be switched.
/// Idempotent: calling it any number of times before the next trap exit
/// results in exactly one switch.
pub fn request_switch_from_isr<A: ArchInterface>() {
    A::kernel_context(A::current_hart()).request_switch();
}

/// Trap-exit switch check: the dispatcher's last action before restoring
/// registers.
///
/// Consumes the hart's pending flag, asks the scheduler for the next context,
/// swaps the memory protection configuration when it differs from the current
/// one, and switches register state.  Returns without effect when no switch
/// was requested.
pub fn trap_exit_switch<A: ArchInterface>() {
    let hart_id = A::current_hart();
    let ctx = A::kernel_context(hart_id);
    if !ctx.take_switch_pending() {
        return;
    }

    let Some(scheduler) = scheduler::<A>() else {
        emmer_assert::panic!("context switch requested with no scheduler registered");
    };

    let next = scheduler.pick_next(hart_id);
    let next_ptr = next as *const ThreadContext<A> as *mut ThreadContext<A>;
    let current_ptr = ctx.current_thread();
    if current_ptr.is_null() {
        emmer_assert::panic!("context switch requested before a boot thread was adopted");
    }
    if core::ptr::eq(current_ptr, next_ptr) {
        return;
    }

    // SAFETY: `current_ptr` was installed from a `&'static ThreadContext` by
    // `adopt_boot_thread` or a previous switch.
    let current = unsafe { &*current_ptr };

    // The protection swap is skipped for threads sharing one memory context;
    // kernel threads (no context) run under the kernel configuration.
    if !core::ptr::eq(current.memory_key(), next.memory_key()) {
        match next.memory() {
            Some(memory) => memory.swap_in(),
            None => {
                let _guard = InterruptGuard::<A>::new();
                // SAFETY: interrupts disabled by the guard above.
                unsafe { A::MemoryConfig::write_kernel() };
            }
        }
    }

    ctx.set_current_thread(next_ptr);

    // SAFETY: both pointers come from live `'static` thread contexts and the
    // next thread is not running on any other hart (scheduler contract).
    unsafe { A::context_switch(current.arch_state_ptr(), next.arch_state_ptr()) };
}
