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

//! Host architecture backend.
//!
//! Lets the kernel's architecture independent logic run under `cargo test` on
//! the development machine.  Hardware effects (protection writes, context
//! switches, the interrupt enable bit) become counters and flags that tests
//! can observe through [`test_support`].

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use emmer_status::{Error, Result};
use kernel_config::{KernelConfig, KernelConfigInterface};

use crate::arch::{ArchInterface, ThreadState};
use crate::hart::KernelContext;
use crate::memory::{MemoryConfig, MemoryMap};
use crate::scheduler::{SchedulerRegistry, Stack};

/// Simulated hardware slot budget, kept small so exhaustion is easy to hit in
/// tests.
pub const NUM_SLOTS: usize = 8;

static INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(true);
static PROTECTION_WRITES: AtomicUsize = AtomicUsize::new(0);
static KERNEL_PROTECTION_WRITES: AtomicUsize = AtomicUsize::new(0);
static CONTEXT_SWITCHES: AtomicUsize = AtomicUsize::new(0);

/// True while a simulated protection write observed the interrupt enable bit
/// set; latched so tests can assert swap atomicity after the fact.
static WRITE_SAW_INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(false);

pub struct HostThreadState {
    switched_to: usize,
}

impl ThreadState for HostThreadState {
    const NEW: Self = Self { switched_to: 0 };

    fn initialize_kernel_frame(
        &mut self,
        _kernel_stack: Stack,
        _entry: extern "C" fn(usize),
        _arg: usize,
    ) {
    }

    fn initialize_user_frame(
        &mut self,
        _kernel_stack: Stack,
        _initial_sp: usize,
        _initial_pc: usize,
        _arg: usize,
    ) {
    }
}

/// Region-count based stand-in for a hardware protection image.
#[derive(Clone)]
pub struct HostMemoryConfig {
    regions: usize,
}

impl HostMemoryConfig {
    /// Number of regions captured at generation time.
    #[must_use]
    pub fn regions(&self) -> usize {
        self.regions
    }
}

impl MemoryConfig for HostMemoryConfig {
    const NUM_SLOTS: usize = NUM_SLOTS;

    const KERNEL_THREAD_MEMORY_CONFIG: Self = Self { regions: 0 };

    fn generate(map: &MemoryMap) -> Result<Self> {
        if map.len() > Self::NUM_SLOTS {
            return Err(Error::ResourceExhausted);
        }
        Ok(Self {
            regions: map.len(),
        })
    }

    unsafe fn write(&self) {
        if Arch::interrupts_enabled() {
            WRITE_SAW_INTERRUPTS_ENABLED.store(true, Ordering::SeqCst);
        }
        PROTECTION_WRITES.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn write_kernel() {
        if Arch::interrupts_enabled() {
            WRITE_SAW_INTERRUPTS_ENABLED.store(true, Ordering::SeqCst);
        }
        KERNEL_PROTECTION_WRITES.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Arch;

static KERNEL_CONTEXTS: [KernelContext<Arch>; KernelConfig::MAX_HARTS] =
    [const { KernelContext::new() }; KernelConfig::MAX_HARTS];

static SCHEDULER_REGISTRY: SchedulerRegistry<Arch> = SchedulerRegistry::new();

impl ArchInterface for Arch {
    type ThreadState = HostThreadState;
    type MemoryConfig = HostMemoryConfig;

    fn current_hart() -> usize {
        0
    }

    fn kernel_context(hart_id: usize) -> &'static KernelContext<Self> {
        &KERNEL_CONTEXTS[hart_id]
    }

    fn scheduler_registry() -> &'static SchedulerRegistry<Self> {
        &SCHEDULER_REGISTRY
    }

    fn enable_interrupts() {
        INTERRUPTS_ENABLED.store(true, Ordering::SeqCst);
    }

    fn disable_interrupts() {
        INTERRUPTS_ENABLED.store(false, Ordering::SeqCst);
    }

    fn interrupts_enabled() -> bool {
        INTERRUPTS_ENABLED.load(Ordering::SeqCst)
    }

    unsafe fn context_switch(_old: *mut HostThreadState, new: *mut HostThreadState) {
        unsafe { (*new).switched_to += 1 };
        CONTEXT_SWITCHES.fetch_add(1, Ordering::SeqCst);
    }

    fn panic() -> ! {
        core::panic!("emmer kernel panic");
    }
}

/// Observation points for tests.
pub mod test_support {
    use super::*;

    #[must_use]
    pub fn protection_writes() -> usize {
        PROTECTION_WRITES.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn kernel_protection_writes() -> usize {
        KERNEL_PROTECTION_WRITES.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn context_switches() -> usize {
        CONTEXT_SWITCHES.load(Ordering::SeqCst)
    }

    /// True if any simulated protection write ever ran with interrupts
    /// enabled.
    #[must_use]
    pub fn write_saw_interrupts_enabled() -> bool {
        WRITE_SAW_INTERRUPTS_ENABLED.load(Ordering::SeqCst)
    }

    /// Times `state` was the target of a context switch.
    #[must_use]
    pub fn times_switched_to(state: &HostThreadState) -> usize {
        state.switched_to
    }
}
