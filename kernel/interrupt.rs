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

//! Interrupt forwarding.
//!
//! The dispatcher does not own an interrupt controller; it forwards
//! asynchronous interrupts to handlers installed by the board port.  An
//! interrupt asserted with no handler registered is a kernel invariant
//! violation: the hardware was unmasked before the kernel was told who
//! services it.

use core::cell::UnsafeCell;

/// Generic interface to an architecture's external interrupt controller,
/// such as a RISC-V PLIC.
pub trait InterruptController {
    /// Called once during bring-up, before interrupts are unmasked.
    fn early_init(&self) {}

    /// Enable a specific interrupt by its IRQ number.
    fn enable_interrupt(&self, irq: u32);

    /// Disable a specific interrupt by its IRQ number.
    fn disable_interrupt(&self, irq: u32);
}

pub type IrqHandler = fn();

struct HandlerCell(UnsafeCell<Option<IrqHandler>>);

// SAFETY: written once during boot, before the corresponding interrupt is
// unmasked.
unsafe impl Sync for HandlerCell {}

impl HandlerCell {
    const fn new() -> Self {
        Self(UnsafeCell::new(None))
    }

    /// # Safety
    /// Callers serialize against concurrent reads; see the registration
    /// functions below.
    unsafe fn set(&self, handler: IrqHandler) {
        unsafe { *self.0.get() = Some(handler) };
    }

    fn get(&self) -> Option<IrqHandler> {
        // SAFETY: only read after the one-time registration write.
        unsafe { *self.0.get() }
    }
}

static EXTERNAL_HANDLER: HandlerCell = HandlerCell::new();
static TIMER_HANDLER: HandlerCell = HandlerCell::new();

/// Install the external interrupt controller handler, invoked for every
/// machine external interrupt.
///
/// # Safety
/// Must be called at most once, before external interrupts are unmasked.
pub unsafe fn set_external_interrupt_handler(handler: IrqHandler) {
    unsafe { EXTERNAL_HANDLER.set(handler) };
}

/// Install the timer tick handler, invoked for every machine timer interrupt.
///
/// # Safety
/// Must be called at most once, before the timer interrupt is unmasked.
pub unsafe fn set_timer_handler(handler: IrqHandler) {
    unsafe { TIMER_HANDLER.set(handler) };
}

/// Forward a machine external interrupt.  Fatal when no handler was
/// registered.
pub(crate) fn external_interrupt() {
    match EXTERNAL_HANDLER.get() {
        Some(handler) => handler(),
        None => {
            emmer_assert::panic!("external interrupt asserted with no handler registered");
        }
    }
}

/// Forward a machine timer interrupt.  Fatal when no handler was registered.
pub(crate) fn timer_tick() {
    match TIMER_HANDLER.get() {
        Some(handler) => handler(),
        None => {
            emmer_assert::panic!("timer interrupt asserted with no handler registered");
        }
    }
}
