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

use core::arch::naked_asm;
use core::mem;

use super::regs::{MStatusVal, PrivilegeLevel};
use crate::arch::{ArchInterface, ThreadState};
use crate::scheduler::Stack;

#[repr(C)]
struct ContextSwitchFrame {
    ra: usize,
    s0: usize,
    s1: usize,
    s2: usize,
    s3: usize,
    s4: usize,
    s5: usize,
    s6: usize,
    s7: usize,
    s8: usize,
    s9: usize,
    s10: usize,
    s11: usize,
}

/// Saved state of a thread that is not running: a pointer to its callee-saved
/// frame, parked on its kernel stack.
pub struct ArchThreadState {
    frame: *mut ContextSwitchFrame,
}

// SAFETY: the frame pointer is only dereferenced by the hart performing a
// context switch involving this thread.
unsafe impl Send for ArchThreadState {}

impl ArchThreadState {
    #[inline(never)]
    fn initialize_frame(
        &mut self,
        kernel_stack: Stack,
        trampoline: unsafe extern "C" fn() -> !,
        initial_mstatus: MStatusVal,
        initial_sp: usize,
        (s0, s1): (usize, usize),
    ) {
        let frame: *mut ContextSwitchFrame = kernel_stack.aligned_allocation_mut(8);

        // The `s` registers carry the entry state because the `a` registers
        // live in the exception frame, not the context switch frame.
        unsafe {
            (*frame) = mem::zeroed();
            (*frame).ra = trampoline as usize;
            (*frame).s0 = s0;
            (*frame).s1 = s1;
            (*frame).s5 = initial_sp;
            (*frame).s6 = initial_mstatus.0;
        }

        self.frame = frame;
    }
}

impl ThreadState for ArchThreadState {
    const NEW: Self = Self {
        frame: core::ptr::null_mut(),
    };

    fn initialize_kernel_frame(
        &mut self,
        kernel_stack: Stack,
        entry: extern "C" fn(usize),
        arg: usize,
    ) {
        self.initialize_frame(
            kernel_stack,
            asm_kernel_trampoline,
            MStatusVal::default(),
            0x0,
            (entry as usize, arg),
        );
    }

    fn initialize_user_frame(
        &mut self,
        kernel_stack: Stack,
        initial_sp: usize,
        initial_pc: usize,
        arg: usize,
    ) {
        // mret into U-mode with interrupts enabled on arrival.
        let mstatus = MStatusVal::default()
            .with_mpie(true)
            .with_spie(true)
            .with_mpp(PrivilegeLevel::User);
        self.initialize_frame(
            kernel_stack,
            asm_user_trampoline,
            mstatus,
            initial_sp,
            (initial_pc, arg),
        );
    }
}

pub(super) unsafe fn context_switch(old: *mut ArchThreadState, new: *mut ArchThreadState) {
    unsafe { riscv_context_switch(&raw mut (*old).frame, (*new).frame) }
}

#[unsafe(naked)]
extern "C" fn riscv_context_switch(
    old_frame: *mut *mut ContextSwitchFrame,
    new_frame: *mut ContextSwitchFrame,
) {
    naked_asm!(
        "
        // Push ra and the s registers onto the stack, save the stack
        // pointer into the old frame pointer.
        addi    sp, sp, -52
        sw      ra, 0(sp)
        sw      s0, 4(sp)
        sw      s1, 8(sp)
        sw      s2, 12(sp)
        sw      s3, 16(sp)
        sw      s4, 20(sp)
        sw      s5, 24(sp)
        sw      s6, 28(sp)
        sw      s7, 32(sp)
        sw      s8, 36(sp)
        sw      s9, 40(sp)
        sw      s10, 44(sp)
        sw      s11, 48(sp)
        sw      sp, (a0)

        // Pop ra and the s registers off the new frame.
        lw      ra, 0(a1)
        lw      s0, 4(a1)
        lw      s1, 8(a1)
        lw      s2, 12(a1)
        lw      s3, 16(a1)
        lw      s4, 20(a1)
        lw      s5, 24(a1)
        lw      s6, 28(a1)
        lw      s7, 32(a1)
        lw      s8, 36(a1)
        lw      s9, 40(a1)
        lw      s10, 44(a1)
        lw      s11, 48(a1)
        addi    sp, a1, 52

        ret
        "
    )
}

// The context switch frame has no argument registers; the initial function
// and argument arrive through two of the saved s registers.
#[unsafe(naked)]
unsafe extern "C" fn asm_kernel_trampoline() -> ! {
    naked_asm!(
        "
        // Zero mscratch to signify that this is a kernel thread.
        csrw    mscratch, zero

        mv      a0, s0
        mv      a1, s1
        tail    {tramp}
        ",
        tramp = sym kernel_trampoline,
    )
}

extern "C" fn kernel_trampoline(entry: extern "C" fn(usize), arg: usize) -> ! {
    // The switch into a fresh thread happened with interrupts masked.
    super::Arch::enable_interrupts();

    entry(arg);

    // Thread lifecycle belongs to the scheduler; an entry function returning
    // here instead of exiting through it is a bug.
    emmer_assert::panic!("kernel thread entry returned");
}

#[unsafe(naked)]
unsafe extern "C" fn asm_user_trampoline() -> ! {
    naked_asm!(
        "
        // Park the kernel stack pointer in mscratch for the trap entry.
        csrw    mscratch, sp

        // Initial user stack as passed to `initialize_frame`.
        mv      sp, s5

        mv      a0, s1

        // mstatus and mepc are staged for a return to U-mode.
        csrw    mstatus, s6
        csrw    mepc, s0
        mret
        ",
    )
}
