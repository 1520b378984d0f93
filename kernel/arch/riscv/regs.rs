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

use regs::*;

pub mod pmp;

/// Define read/write access to a CSR through a typed value.
#[cfg(target_arch = "riscv32")]
#[macro_export]
macro_rules! rw_csr_reg {
    ($name:ident, $val_type:ident, $reg_name:ident, $doc:literal) => {
        #[doc=$doc]
        pub struct $name;
        impl $name {
            #[allow(dead_code)]
            #[inline]
            pub fn read() -> $val_type {
                let mut val: usize;
                unsafe {
                    core::arch::asm!(concat!("csrr {0}, ", stringify!($reg_name)), out(reg) val)
                };
                $val_type(val)
            }

            #[allow(dead_code)]
            #[inline]
            pub fn write(val: $val_type) {
                unsafe {
                    core::arch::asm!(concat!("csrw ", stringify!($reg_name), ", {0}"), in(reg) val.0)
                };
            }
        }
    };
}

/// Synchronous trap causes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Exception {
    InstructionAddressMisaligned,
    InstructionAccessFault,
    IllegalInstruction,
    Breakpoint,
    LoadAddressMisaligned,
    LoadAccessFault,
    StoreAddressMisaligned,
    StoreAccessFault,
    EnvironmentCallFromUMode,
    EnvironmentCallFromSMode,
    EnvironmentCallFromMMode,
    InstructionPageFault,
    LoadPageFault,
    StorePageFault,
}

/// Asynchronous trap causes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Interrupt {
    SupervisorSoftware,
    MachineSoftware,
    SupervisorTimer,
    MachineTimer,
    SupervisorExternal,
    MachineExternal,
    CounterOverflow,
}

/// Decoded trap cause.  `Unknown` carries the raw mcause value; the
/// dispatcher treats it as fatal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cause {
    Exception(Exception),
    Interrupt(Interrupt),
    Unknown(usize),
}

#[derive(Copy, Clone, Default)]
#[repr(transparent)]
pub struct MCauseVal(pub usize);

impl MCauseVal {
    rw_masked_field!(raw_cause, usize::MAX >> 1, usize, "raw cause");

    /// Returns `true` if the cause is an interrupt.
    #[inline]
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        // Testing the sign bit is word size independent.
        (self.0 as isize) < 0
    }

    /// Decode the trap cause.  Reserved or unimplemented encodings decode to
    /// [`Cause::Unknown`] rather than a bogus variant.
    #[must_use]
    pub const fn cause(&self) -> Cause {
        let code = self.raw_cause();
        if self.is_interrupt() {
            match code {
                1 => Cause::Interrupt(Interrupt::SupervisorSoftware),
                3 => Cause::Interrupt(Interrupt::MachineSoftware),
                5 => Cause::Interrupt(Interrupt::SupervisorTimer),
                7 => Cause::Interrupt(Interrupt::MachineTimer),
                9 => Cause::Interrupt(Interrupt::SupervisorExternal),
                11 => Cause::Interrupt(Interrupt::MachineExternal),
                13 => Cause::Interrupt(Interrupt::CounterOverflow),
                _ => Cause::Unknown(self.0),
            }
        } else {
            match code {
                0 => Cause::Exception(Exception::InstructionAddressMisaligned),
                1 => Cause::Exception(Exception::InstructionAccessFault),
                2 => Cause::Exception(Exception::IllegalInstruction),
                3 => Cause::Exception(Exception::Breakpoint),
                4 => Cause::Exception(Exception::LoadAddressMisaligned),
                5 => Cause::Exception(Exception::LoadAccessFault),
                6 => Cause::Exception(Exception::StoreAddressMisaligned),
                7 => Cause::Exception(Exception::StoreAccessFault),
                8 => Cause::Exception(Exception::EnvironmentCallFromUMode),
                9 => Cause::Exception(Exception::EnvironmentCallFromSMode),
                11 => Cause::Exception(Exception::EnvironmentCallFromMMode),
                12 => Cause::Exception(Exception::InstructionPageFault),
                13 => Cause::Exception(Exception::LoadPageFault),
                15 => Cause::Exception(Exception::StorePageFault),
                _ => Cause::Unknown(self.0),
            }
        }
    }
}

/// Execution privilege level.
///
/// Only machine mode is guaranteed to be implemented.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(usize)]
pub enum PrivilegeLevel {
    User = 0b00,
    Supervisor = 0b01,
    Reserved = 0b10,
    Machine = 0b11,
}

#[derive(Copy, Clone, Default)]
#[repr(transparent)]
pub struct MStatusVal(pub usize);

impl MStatusVal {
    rw_bool_field!(usize, sie, 1, "S-mode interrupt enable");
    rw_bool_field!(usize, mie, 3, "M-mode interrupt enable");
    rw_bool_field!(usize, spie, 5, "S-mode prior interrupt enable");
    rw_bool_field!(usize, mpie, 7, "M-mode prior interrupt enable");
    rw_bool_field!(usize, spp, 8, "S-mode previous privilege");
    rw_enum_field!(
        usize,
        mpp,
        11,
        12,
        PrivilegeLevel,
        "M-mode previous privilege"
    );
    rw_bool_field!(usize, mprv, 17, "modify privilege");
}

/// Machine Trap-Vector Base-Address Register mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(usize)]
pub enum MtVecMode {
    /// All traps set pc to `base`.
    Direct = 0b00,

    /// Interrupts set pc to `base` + 4 * cause.
    Vectored = 0b01,

    Reserved2 = 0b10,
    Reserved3 = 0b11,
}

/// Machine Trap-Vector Base-Address Register value.
#[derive(Copy, Clone, Default)]
#[repr(transparent)]
pub struct MtVecVal(pub usize);

impl MtVecVal {
    rw_masked_field!(base, !0b11, usize, "trap vector base address");
    rw_enum_field!(usize, mode, 0, 1, MtVecMode, "trap vector mode");
}

#[derive(Copy, Clone, Default)]
#[repr(transparent)]
pub struct MtValVal(pub usize);

#[cfg(target_arch = "riscv32")]
rw_csr_reg!(MCause, MCauseVal, mcause, "Machine Cause Register");
#[cfg(target_arch = "riscv32")]
rw_csr_reg!(MStatus, MStatusVal, mstatus, "Machine Status Register");
#[cfg(target_arch = "riscv32")]
rw_csr_reg!(
    MtVec,
    MtVecVal,
    mtvec,
    "Machine Trap-Vector Base-Address Register"
);
#[cfg(target_arch = "riscv32")]
rw_csr_reg!(MtVal, MtValVal, mtval, "Machine Trap Value Register");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcause_decodes_interrupts() {
        let val = MCauseVal(usize::MAX << (usize::BITS - 1) | 11);
        assert!(val.is_interrupt());
        assert_eq!(val.cause(), Cause::Interrupt(Interrupt::MachineExternal));
    }

    #[test]
    fn mcause_decodes_exceptions() {
        let val = MCauseVal(8);
        assert!(!val.is_interrupt());
        assert_eq!(
            val.cause(),
            Cause::Exception(Exception::EnvironmentCallFromUMode)
        );
    }

    #[test]
    fn mcause_reserved_encoding_is_unknown() {
        assert_eq!(MCauseVal(10).cause(), Cause::Unknown(10));
        let reserved_irq = MCauseVal(usize::MAX << (usize::BITS - 1) | 2);
        assert!(matches!(reserved_irq.cause(), Cause::Unknown(_)));
    }

    #[test]
    fn mstatus_mpp_round_trips() {
        for level in [
            PrivilegeLevel::User,
            PrivilegeLevel::Supervisor,
            PrivilegeLevel::Machine,
        ] {
            assert_eq!(MStatusVal(0).with_mpp(level).mpp(), level);
        }
        assert_eq!(MStatusVal(0).with_mpp(PrivilegeLevel::Machine).0, 0b11 << 11);
    }

    #[test]
    fn mtvec_base_is_aligned() {
        let val = MtVecVal(0)
            .with_base(0x8000_0040)
            .with_mode(MtVecMode::Direct);
        assert_eq!(val.base(), 0x8000_0040);
        assert_eq!(val.mode(), MtVecMode::Direct);
    }
}
