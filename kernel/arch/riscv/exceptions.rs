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

//! Trap entry and dispatch.
//!
//! Hardware transfers control to `_start_trap` with interrupts masked.  The
//! entry stub tells user from kernel origin through `mscratch` (zero while in
//! kernel mode, the kernel stack pointer while in user mode), saves the full
//! register file to the kernel stack, and calls [`trap_handler`], which
//! classifies the cause, forwards it, and runs the deferred switch check
//! before the stub restores state and returns.

use emmer_log::info;
use kernel_config::{ExceptionMode, KernelConfig, RiscVKernelConfigInterface};

use super::Arch;
use super::regs::{
    Cause, Exception, Interrupt, MCause, MCauseVal, MStatusVal, MtVal, MtVec, MtVecMode,
    PrivilegeLevel,
};
use crate::arch::ArchInterface;
use crate::fault::{FaultInfo, FaultKind};
use crate::syscall::SyscallArgs;
use crate::{fault, interrupt, scheduler, syscall};

/// Install the trap vector.  Must run on every hart before its interrupts
/// are unmasked.
pub fn early_init() {
    let (base, mode) = match KernelConfig::exception_mode() {
        ExceptionMode::Direct => (_start_trap as usize, MtVecMode::Direct),
        ExceptionMode::Vectored(vec_table) => (vec_table, MtVecMode::Vectored),
    };
    MtVec::write(MtVec::read().with_base(base).with_mode(mode));
}

/// Register file as pushed by the trap entry stub.
///
/// The field order and total size are a bit-exact contract with the assembly
/// in `_start_trap`; the offsets in the comments are the ones the stub uses.
#[repr(C)]
pub struct TrapFrame {
    epc: usize,    // 0x00
    status: usize, // 0x04
    ra: usize,     // 0x08

    // SAFETY: the `a()` accessor requires these to be in order.
    a0: usize, // 0x0c
    a1: usize, // 0x10
    a2: usize, // 0x14
    a3: usize, // 0x18
    a4: usize, // 0x1c
    a5: usize, // 0x20
    a6: usize, // 0x24
    a7: usize, // 0x28

    t0: usize, // 0x2c
    t1: usize, // 0x30
    t2: usize, // 0x34
    t3: usize, // 0x38
    t4: usize, // 0x3c
    t5: usize, // 0x40
    t6: usize, // 0x44

    // Only live when the trap came from user space.
    tp: usize, // 0x48
    gp: usize, // 0x4c
    sp: usize, // 0x50

    // Stacks stay 16 byte aligned per the RISC-V calling convention.
    _pad: [usize; 3], // 0x54-0x5f
}

const _: () = assert!(core::mem::size_of::<TrapFrame>() == 0x60);

impl TrapFrame {
    fn a(&self, index: usize) -> emmer_status::Result<usize> {
        if index > 7 {
            return Err(emmer_status::Error::InvalidArgument);
        }
        // Pointer math instead of a match: significantly smaller code.
        //
        // SAFETY: index is range checked above and the a* fields are
        // consecutive in the struct.
        let a0 = &raw const self.a0;
        Ok(unsafe { *a0.byte_add(index * core::mem::size_of::<usize>()) })
    }
}

pub struct RiscVSyscallArgs<'a> {
    frame: &'a TrapFrame,
    cur_index: usize,
}

impl<'a> RiscVSyscallArgs<'a> {
    fn new(frame: &'a TrapFrame) -> Self {
        Self {
            frame,
            cur_index: 0,
        }
    }
}

impl SyscallArgs for RiscVSyscallArgs<'_> {
    fn next_usize(&mut self) -> emmer_status::Result<usize> {
        let value = self.frame.a(self.cur_index)?;
        self.cur_index += 1;
        Ok(value)
    }
}

#[inline(never)]
fn dump_exception_frame(frame: &TrapFrame) {
    info!(
        "Exception frame {:#010x}:",
        core::ptr::from_ref(frame) as usize
    );
    info!(
        "ra  {:#010x} t0 {:#010x} t1  {:#010x} t2  {:#010x}",
        frame.ra, frame.t0, frame.t1, frame.t2
    );
    info!(
        "t3  {:#010x} t4 {:#010x} t5  {:#010x} t6  {:#010x}",
        frame.t3, frame.t4, frame.t5, frame.t6
    );
    info!(
        "a0  {:#010x} a1 {:#010x} a2  {:#010x} a3  {:#010x}",
        frame.a0, frame.a1, frame.a2, frame.a3
    );
    info!(
        "a4  {:#010x} a5 {:#010x} a6  {:#010x} a7  {:#010x}",
        frame.a4, frame.a5, frame.a6, frame.a7
    );
    info!(
        "tp  {:#010x} gp {:#010x} sp  {:#010x}",
        frame.tp, frame.gp, frame.sp
    );
    info!("mstatus {:#010x}", frame.status);
    info!("mcause  {:#010x}", MCause::read().0);
    info!("mtval   {:#010x}", MtVal::read().0);
    info!("epc     {:#010x}", frame.epc);
}

// Pulls the id and arguments out of the trap frame and calls the registered
// syscall router.
fn handle_ecall(frame: &mut TrapFrame) {
    let id = frame.t0 as u16;
    let ret_val = {
        let mut args = RiscVSyscallArgs::new(frame);
        syscall::dispatch(id, &mut args)
    };
    frame.a0 = ret_val.cast_unsigned() as usize;
    frame.a1 = (ret_val.cast_unsigned() >> 32) as usize;

    // ECALL does not retire the instruction; advance the pc past it.  ECALLs
    // are encoded as 4 byte instructions.
    //
    // Wrapping add, as section 1.4 of the RISC-V unprivileged spec states:
    // "...memory address computations done by the hardware ignore overflow
    // and instead wrap around modulo 2^XLEN".
    frame.epc = frame.epc.wrapping_add(4);
}

const fn fault_kind(exception: Exception) -> Option<FaultKind> {
    // Page fault causes cannot fire without address translation, but a
    // first-match on cause is cheap and keeps the mapping total.
    match exception {
        Exception::InstructionAddressMisaligned => Some(FaultKind::InstructionMisaligned),
        Exception::InstructionAccessFault | Exception::InstructionPageFault => {
            Some(FaultKind::InstructionAccess)
        }
        Exception::IllegalInstruction => Some(FaultKind::IllegalInstruction),
        Exception::Breakpoint => Some(FaultKind::Breakpoint),
        Exception::LoadAddressMisaligned => Some(FaultKind::LoadMisaligned),
        Exception::LoadAccessFault | Exception::LoadPageFault => Some(FaultKind::LoadAccess),
        Exception::StoreAddressMisaligned => Some(FaultKind::StoreMisaligned),
        Exception::StoreAccessFault | Exception::StorePageFault => Some(FaultKind::StoreAccess),
        _ => None,
    }
}

const fn fault_has_address(kind: FaultKind) -> bool {
    !matches!(kind, FaultKind::IllegalInstruction | FaultKind::Breakpoint)
}

fn interrupt_handler(interrupt: Interrupt, frame: &TrapFrame) {
    match interrupt {
        Interrupt::MachineTimer => interrupt::timer_tick(),
        Interrupt::MachineExternal => interrupt::external_interrupt(),
        _ => {
            dump_exception_frame(frame);
            emmer_assert::panic!("unhandled interrupt {:?}", interrupt);
        }
    }
}

fn exception_handler(exception: Exception, hart_id: usize, mepc: usize, frame: &mut TrapFrame) {
    match exception {
        Exception::EnvironmentCallFromUMode | Exception::EnvironmentCallFromMMode => {
            handle_ecall(frame);
            return;
        }
        _ => {}
    }

    let from_user = matches!(MStatusVal(frame.status).mpp(), PrivilegeLevel::User);
    let kind = fault_kind(exception);

    match (from_user, kind) {
        (true, Some(kind)) => {
            // User faults are forwarded, not fatal; the registered policy
            // decides the process's fate.
            let mtval = MtVal::read().0;
            let address = if fault_has_address(kind) && mtval != 0 {
                Some(mtval)
            } else {
                None
            };
            fault::user_fault(
                hart_id,
                &FaultInfo {
                    kind,
                    pc: mepc,
                    address,
                },
            );
        }
        _ => {
            // A faulting kernel is a bad time.
            dump_exception_frame(frame);
            emmer_assert::panic!(
                "unhandled kernel exception {:?} at {:#010x}",
                exception,
                mepc
            );
        }
    }
}

#[unsafe(no_mangle)]
unsafe extern "C" fn trap_handler(mcause: MCauseVal, mepc: usize, frame: &mut TrapFrame) {
    // Nothing that could trap again may run before the stack is known good.
    let frame_addr = core::ptr::from_mut(frame) as usize;
    if frame_addr == 0 || frame_addr % 16 != 0 {
        emmer_assert::panic!("corrupt stack pointer on trap entry: {:#010x}", frame_addr);
    }

    let hart_id = Arch::current_hart();
    Arch::kernel_context(hart_id).set_last_trap_cause(mcause.0);

    match mcause.cause() {
        Cause::Interrupt(interrupt) => interrupt_handler(interrupt, frame),
        Cause::Exception(exception) => exception_handler(exception, hart_id, mepc, frame),
        Cause::Unknown(raw) => {
            dump_exception_frame(frame);
            emmer_assert::panic!("invalid trap cause {:#010x}", raw);
        }
    }

    // Deferred scheduling decision: ready queue locks are only safe at this
    // single exit point, never at arbitrary nested interrupt depth.
    scheduler::trap_exit_switch::<Arch>();
}

/// Trap entry.
///
/// `mscratch` is zero while the hart executes kernel code and holds the
/// kernel stack pointer while it executes user code; the first three
/// instructions pick the path.  Both paths push a [`TrapFrame`], call
/// [`trap_handler`] with `(mcause, mepc, &frame)`, and restore.
#[unsafe(no_mangle)]
#[unsafe(naked)]
#[unsafe(link_section = ".trap")]
pub unsafe extern "C" fn _start_trap() -> ! {
    core::arch::naked_asm!(
        "
        // Exchange sp with mscratch: zero means the trap came from kernel
        // mode.
        csrrw   sp, mscratch, sp
        bnez    sp, 1f

        // Kernel mode: recover the original stack pointer.
        csrrw   sp, mscratch, sp

        addi    sp, sp, -0x60
        sw      t6, 0x44(sp)
        sw      t5, 0x40(sp)
        sw      t4, 0x3c(sp)
        sw      t3, 0x38(sp)
        sw      t2, 0x34(sp)
        sw      t1, 0x30(sp)
        sw      t0, 0x2c(sp)
        sw      a7, 0x28(sp)
        sw      a6, 0x24(sp)
        sw      a5, 0x20(sp)
        sw      a4, 0x1c(sp)
        sw      a3, 0x18(sp)
        sw      a2, 0x14(sp)
        sw      a1, 0x10(sp)
        sw      a0, 0x0c(sp)
        sw      ra, 0x08(sp)
        csrr    t0, mstatus
        csrr    a1, mepc
        sw      t0, 0x04(sp)
        sw      a1, 0x00(sp)
        sw      zero, 0x50(sp)

        csrr    a0, mcause
        mv      a2, sp
        call    {handler}

        lw      a1, 0x00(sp)
        lw      t0, 0x04(sp)
        csrw    mepc, a1
        csrw    mstatus, t0
        lw      ra, 0x08(sp)
        lw      a0, 0x0c(sp)
        lw      a1, 0x10(sp)
        lw      a2, 0x14(sp)
        lw      a3, 0x18(sp)
        lw      a4, 0x1c(sp)
        lw      a5, 0x20(sp)
        lw      a6, 0x24(sp)
        lw      a7, 0x28(sp)
        lw      t0, 0x2c(sp)
        lw      t1, 0x30(sp)
        lw      t2, 0x34(sp)
        lw      t3, 0x38(sp)
        lw      t4, 0x3c(sp)
        lw      t5, 0x40(sp)
        lw      t6, 0x44(sp)
        addi    sp, sp, 0x60
        mret

    1:
        // User mode: sp now holds the kernel stack pointer, mscratch the
        // user stack pointer.
        addi    sp, sp, -0x60
        sw      t6, 0x44(sp)
        sw      t5, 0x40(sp)
        sw      t4, 0x3c(sp)
        sw      t3, 0x38(sp)
        sw      t2, 0x34(sp)
        sw      t1, 0x30(sp)
        sw      t0, 0x2c(sp)
        sw      a7, 0x28(sp)
        sw      a6, 0x24(sp)
        sw      a5, 0x20(sp)
        sw      a4, 0x1c(sp)
        sw      a3, 0x18(sp)
        sw      a2, 0x14(sp)
        sw      a1, 0x10(sp)
        sw      a0, 0x0c(sp)
        sw      ra, 0x08(sp)
        csrr    t0, mstatus
        csrr    a1, mepc
        sw      t0, 0x04(sp)
        sw      a1, 0x00(sp)
        sw      gp, 0x4c(sp)
        sw      tp, 0x48(sp)

        // Save the user stack pointer to the frame and zero mscratch to
        // signify execution in kernel mode.
        csrrw   t0, mscratch, zero
        sw      t0, 0x50(sp)

        csrr    a0, mcause
        mv      a2, sp
        call    {handler}

        // Park the kernel stack pointer (without the frame) back in
        // mscratch in preparation for returning to user mode.
        addi    t0, sp, 0x60
        csrw    mscratch, t0
        lw      tp, 0x48(sp)
        lw      gp, 0x4c(sp)
        lw      a1, 0x00(sp)
        lw      t0, 0x04(sp)
        csrw    mepc, a1
        csrw    mstatus, t0
        lw      ra, 0x08(sp)
        lw      a0, 0x0c(sp)
        lw      a1, 0x10(sp)
        lw      a2, 0x14(sp)
        lw      a3, 0x18(sp)
        lw      a4, 0x1c(sp)
        lw      a5, 0x20(sp)
        lw      a6, 0x24(sp)
        lw      a7, 0x28(sp)
        lw      t0, 0x2c(sp)
        lw      t1, 0x30(sp)
        lw      t2, 0x34(sp)
        lw      t3, 0x38(sp)
        lw      t4, 0x3c(sp)
        lw      t5, 0x40(sp)
        lw      t6, 0x44(sp)

        // The user stack pointer is the last load off the kernel stack.
        lw      sp, 0x50(sp)
        mret
        ",
        handler = sym trap_handler,
    )
}
