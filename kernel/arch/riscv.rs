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

//! RISC-V architecture backend.
//!
//! The PMP synthesis in `regs::pmp` and `protection` is pure and compiles for
//! every target so it can be tested on the host; the trap entry, context
//! switch, and CSR access are RV32 only.

pub mod protection;
pub mod regs;

#[cfg(target_arch = "riscv32")]
pub mod exceptions;
#[cfg(target_arch = "riscv32")]
mod threads;

#[cfg(all(
    target_arch = "riscv32",
    not(any(feature = "esp32c6", feature = "esp32p4"))
))]
pub mod plic;

#[cfg(target_arch = "riscv32")]
pub use threads::ArchThreadState;

#[cfg(target_arch = "riscv32")]
mod arch_impl {
    use kernel_config::{KernelConfig, KernelConfigInterface};

    use crate::arch::ArchInterface;
    use crate::hart::KernelContext;
    use crate::scheduler::SchedulerRegistry;

    pub struct Arch;

    static KERNEL_CONTEXTS: [KernelContext<Arch>; KernelConfig::MAX_HARTS] =
        [const { KernelContext::new() }; KernelConfig::MAX_HARTS];

    static SCHEDULER_REGISTRY: SchedulerRegistry<Arch> = SchedulerRegistry::new();

    impl ArchInterface for Arch {
        type ThreadState = super::threads::ArchThreadState;
        type MemoryConfig = super::protection::MemoryConfig;

        fn current_hart() -> usize {
            riscv::register::mhartid::read()
        }

        fn kernel_context(hart_id: usize) -> &'static KernelContext<Self> {
            &KERNEL_CONTEXTS[hart_id]
        }

        fn scheduler_registry() -> &'static SchedulerRegistry<Self> {
            &SCHEDULER_REGISTRY
        }

        fn early_init() {
            // Interrupts stay masked until the board port finished handler
            // registration.
            Self::disable_interrupts();

            // Zero mscratch to mark this hart as executing kernel code; the
            // trap entry relies on it.
            riscv::register::mscratch::write(0);

            super::exceptions::early_init();
        }

        fn enable_interrupts() {
            unsafe { riscv::register::mstatus::set_mie() };
        }

        fn disable_interrupts() {
            unsafe { riscv::register::mstatus::clear_mie() };
        }

        fn interrupts_enabled() -> bool {
            riscv::register::mstatus::read().mie()
        }

        unsafe fn context_switch(
            old: *mut super::threads::ArchThreadState,
            new: *mut super::threads::ArchThreadState,
        ) {
            unsafe { super::threads::context_switch(old, new) }
        }

        fn idle() {
            riscv::asm::wfi();
        }

        fn panic() -> ! {
            super::power_off()
        }
    }
}

#[cfg(target_arch = "riscv32")]
pub use arch_impl::Arch;

/// Terminal power-off.  On the QEMU virt machine this exits the emulator
/// through the SiFive test device; elsewhere the hart parks in a `wfi` loop
/// until the board-level watchdog or supervisor cuts power.
#[cfg(target_arch = "riscv32")]
fn power_off() -> ! {
    #[cfg(not(any(feature = "esp32c6", feature = "esp32p4")))]
    {
        const TEST_FINISHER: *mut u32 = 0x0010_0000 as *mut u32;
        const FINISHER_FAIL: u32 = 0x3333;
        // SAFETY: fixed MMIO address on the QEMU virt machine.
        unsafe { TEST_FINISHER.write_volatile(FINISHER_FAIL) };
    }

    loop {
        riscv::asm::wfi();
    }
}
