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

//! Fault classification and forwarding.
//!
//! Faults taken from user mode are not kernel-fatal: the dispatcher
//! classifies them and forwards to the policy installed by the process
//! management layer (which typically terminates the offending process and
//! requests a switch).  Faults taken from kernel mode never reach this
//! module; they panic in the dispatcher.

use core::cell::UnsafeCell;

/// Synchronous trap causes a user process can be blamed for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultKind {
    InstructionMisaligned,
    InstructionAccess,
    IllegalInstruction,
    Breakpoint,
    LoadMisaligned,
    LoadAccess,
    StoreMisaligned,
    StoreAccess,
}

/// Everything the fault policy gets to see.
#[derive(Clone, Copy, Debug)]
pub struct FaultInfo {
    pub kind: FaultKind,

    /// Faulting program counter.
    pub pc: usize,

    /// Faulting data address, for causes that carry one.
    pub address: Option<usize>,
}

/// External policy for user faults.
pub trait FaultPolicy: Sync {
    /// Handle a fault taken from user mode on `hart_id`.  Runs in trap
    /// context; spinlocks only, never suspend.  On return the dispatcher
    /// proceeds to its normal exit, so a policy that kills the current
    /// process must also request a switch.
    fn handle_user_fault(&self, hart_id: usize, fault: &FaultInfo);
}

struct PolicyCell(UnsafeCell<Option<&'static dyn FaultPolicy>>);

// SAFETY: written once during boot before user processes can fault.
unsafe impl Sync for PolicyCell {}

static POLICY: PolicyCell = PolicyCell(UnsafeCell::new(None));

/// Install the fault policy.
///
/// # Safety
/// Must be called at most once, before the first user process starts.
pub unsafe fn set_fault_policy(policy: &'static dyn FaultPolicy) {
    unsafe { *POLICY.0.get() = Some(policy) };
}

/// Forward a user fault.  A fault with no registered policy means a user
/// process was started before boot finished wiring the kernel: fatal.
pub(crate) fn user_fault(hart_id: usize, fault: &FaultInfo) {
    // SAFETY: only read after the one-time write in `set_fault_policy`.
    match unsafe { *POLICY.0.get() } {
        Some(policy) => policy.handle_user_fault(hart_id, fault),
        None => {
            emmer_assert::panic!(
                "user fault {:?} at {:#010x} with no fault policy registered",
                fault.kind,
                fault.pc
            );
        }
    }
}
