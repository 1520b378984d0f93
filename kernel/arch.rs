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

use core::marker::PhantomData;

use crate::hart::KernelContext;
use crate::memory::MemoryConfig;
use crate::scheduler::{SchedulerRegistry, Stack};

pub mod riscv;

#[cfg(not(target_arch = "riscv32"))]
pub mod host;

#[cfg(target_arch = "riscv32")]
pub use riscv::Arch;

#[cfg(not(target_arch = "riscv32"))]
pub use host::Arch;

/// Architecturally specific thread state, saved and restored on context
/// switch.
pub trait ThreadState: Sized + Send {
    const NEW: Self;

    /// Arrange for the thread to enter `entry(arg)` in kernel mode when first
    /// switched to.
    fn initialize_kernel_frame(&mut self, kernel_stack: Stack, entry: extern "C" fn(usize), arg: usize);

    /// Arrange for the thread to enter user mode at `initial_pc` with
    /// `initial_sp` when first switched to.
    fn initialize_user_frame(
        &mut self,
        kernel_stack: Stack,
        initial_sp: usize,
        initial_pc: usize,
        arg: usize,
    );
}

/// The interface the kernel consumes from an architecture backend.
pub trait ArchInterface: Sized + 'static {
    type ThreadState: ThreadState;
    type MemoryConfig: MemoryConfig;

    /// Identity of the calling hart.
    fn current_hart() -> usize;

    /// The per-hart kernel context.  Backends own one static instance per
    /// hart; state is reached by hart identity, never through ambient
    /// globals.
    ///
    /// # Panics
    /// Panics if `hart_id` is out of range for the target.
    fn kernel_context(hart_id: usize) -> &'static KernelContext<Self>;

    /// Registration slot for the external scheduler.
    fn scheduler_registry() -> &'static SchedulerRegistry<Self>;

    /// Per-hart bring-up that must happen before interrupts are unmasked:
    /// trap vector installation.
    fn early_init() {}

    /// Bring-up that runs once the boot hart has a thread context.
    fn init() {}

    fn enable_interrupts();
    fn disable_interrupts();
    #[must_use]
    fn interrupts_enabled() -> bool;

    /// Switch register state from `old` to `new`.
    ///
    /// # Safety
    /// Both pointers must reference live thread states, `old` must belong to
    /// the thread currently executing on this hart, and `new` must not be
    /// running on any other hart.
    unsafe fn context_switch(old: *mut Self::ThreadState, new: *mut Self::ThreadState);

    /// Wait for the next interrupt.
    fn idle() {}

    /// Terminal: dump whatever diagnostics the target supports and power
    /// off.  The kernel never continues past this.
    fn panic() -> !;
}

/// RAII scope with interrupts disabled on the calling hart, restoring the
/// previous state on drop.
pub struct InterruptGuard<A: ArchInterface> {
    was_enabled: bool,
    _arch: PhantomData<A>,
}

impl<A: ArchInterface> InterruptGuard<A> {
    #[must_use]
    pub fn new() -> Self {
        let was_enabled = A::interrupts_enabled();
        A::disable_interrupts();
        Self {
            was_enabled,
            _arch: PhantomData,
        }
    }
}

impl<A: ArchInterface> Default for InterruptGuard<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ArchInterface> Drop for InterruptGuard<A> {
    fn drop(&mut self) {
        if self.was_enabled {
            A::enable_interrupts();
        }
    }
}
