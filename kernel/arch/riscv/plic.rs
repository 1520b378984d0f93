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

//! PLIC driver for the QEMU virt machine.
//!
//! [`claim_and_dispatch`] is the function the boot path registers as the
//! kernel's external interrupt handler.
//!
//! TODO: the claim/complete and enable registers are per context; route
//! per-hart contexts once secondary harts service external interrupts.
//! See Section 1.1 of the
//! [PLIC spec](https://github.com/riscv/riscv-plic-spec/blob/1.0.0/riscv-plic-1.0.0.pdf).

use core::cell::UnsafeCell;
use core::ptr;

use emmer_log::info;
use kernel_config::{KernelConfig, PlicConfigInterface};

use crate::interrupt::{InterruptController, IrqHandler};

// Per Section 3 of the spec, all registers are 32 bit.
const PLIC_SRC_PRIORITY_BASE: usize = KernelConfig::PLIC_BASE_ADDRESS;
const PLIC_TARGET_ENABLE_BASE: usize = KernelConfig::PLIC_BASE_ADDRESS + 0x2000;
const PLIC_THRESHOLD: usize = KernelConfig::PLIC_BASE_ADDRESS + 0x20_0000;
const PLIC_CLAIM: usize = KernelConfig::PLIC_BASE_ADDRESS + 0x20_0004;

struct HandlerSlot(UnsafeCell<Option<IrqHandler>>);

// SAFETY: each slot is written once, before its interrupt source is enabled.
unsafe impl Sync for HandlerSlot {}

static HANDLERS: [HandlerSlot; KernelConfig::NUM_IRQS as usize] =
    [const { HandlerSlot(UnsafeCell::new(None)) }; KernelConfig::NUM_IRQS as usize];

pub struct Plic;

pub static PLIC: Plic = Plic;

impl Plic {
    /// Register `handler` for `irq` and enable the source.
    ///
    /// # Safety
    /// Must be called at most once per irq, before that irq can assert.
    pub unsafe fn set_irq_handler(&self, irq: u32, handler: IrqHandler) {
        emmer_assert::assert!((irq as usize) < HANDLERS.len());
        unsafe { *HANDLERS[irq as usize].0.get() = Some(handler) };
        self.enable_interrupt(irq);
    }
}

impl InterruptController for Plic {
    fn early_init(&self) {
        info!("Initializing PLIC");

        const IRQ_PRIORITY: u32 = 1;

        // Source 0 does not exist; start at 1.  Everything gets a priority
        // and starts disabled until a handler is registered.
        for irq in 1..KernelConfig::NUM_IRQS {
            set_interrupt_priority(irq, IRQ_PRIORITY);
            self.disable_interrupt(irq);
        }
        set_priority_threshold(0);

        unsafe { riscv::register::mie::set_mext() };
    }

    fn enable_interrupt(&self, irq: u32) {
        set_interrupt_enable(irq, true);
    }

    fn disable_interrupt(&self, irq: u32) {
        set_interrupt_enable(irq, false);
    }
}

/// Claim the pending interrupt, run its handler, and complete the claim.
/// Registered as the kernel's external interrupt handler during boot.
pub fn claim_and_dispatch() {
    let claim_reg = ptr::with_exposed_provenance_mut::<u32>(PLIC_CLAIM);

    // SAFETY: fixed MMIO register of the QEMU virt PLIC.
    let irq = unsafe { claim_reg.read_volatile() };
    if irq == 0 {
        // Another hart or a previous claim already serviced it.
        return;
    }

    // SAFETY: an asserted irq is always below NUM_IRQS; sources were only
    // enabled through `set_irq_handler`.
    match unsafe { *HANDLERS[irq as usize].0.get() } {
        Some(handler) => handler(),
        None => {
            emmer_assert::panic!("unhandled external interrupt {}", irq);
        }
    }

    // SAFETY: as above.
    unsafe { claim_reg.write_volatile(irq) };
}

fn set_interrupt_enable(irq: u32, enable: bool) {
    let enable_reg = ptr::with_exposed_provenance_mut::<u32>(
        PLIC_TARGET_ENABLE_BASE + 4 * (irq as usize / 32),
    );
    let bitmask = 1u32 << (irq % 32);
    // SAFETY: fixed MMIO register of the QEMU virt PLIC.
    unsafe {
        let current = enable_reg.read_volatile();
        let new = if enable {
            current | bitmask
        } else {
            current & !bitmask
        };
        enable_reg.write_volatile(new);
    }
}

fn set_priority_threshold(threshold: u32) {
    let threshold_reg = ptr::with_exposed_provenance_mut::<u32>(PLIC_THRESHOLD);
    // SAFETY: fixed MMIO register of the QEMU virt PLIC.
    unsafe { threshold_reg.write_volatile(threshold) };
}

fn set_interrupt_priority(irq: u32, priority: u32) {
    let priority_reg =
        ptr::with_exposed_provenance_mut::<u32>(PLIC_SRC_PRIORITY_BASE + irq as usize * 4);
    // SAFETY: fixed MMIO register of the QEMU virt PLIC.
    unsafe { priority_reg.write_volatile(priority) };
}
