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

#![no_std]

/// Kernel configuration common to all targets.
pub trait KernelConfigInterface {
    /// Human readable target name, reported during boot.
    const TARGET_NAME: &'static str;

    /// Number of harts the kernel will bring up.
    const MAX_HARTS: usize;

    /// Capacity of a process memory map.
    const MAX_MEMMAP_REGIONS: usize = 16;

    /// The number of bytes allocated for each kernel stack.
    const KERNEL_STACK_SIZE_BYTES: usize = 4096;
}

/// RISC-V specific configuration.
pub trait RiscVKernelConfigInterface {
    /// Number of PMP entries.  Per the architecture spec this may be 0, 16
    /// or 64.
    const PMP_ENTRIES: usize;

    /// PMP granularity exponent G.  Regions must be multiples of
    /// `4 << PMP_GRANULARITY` bytes.
    const PMP_GRANULARITY: usize = 0;

    /// The range of PMP entries used to configure memory access for user
    /// processes.  Entries outside the range are reserved for boot-time
    /// protections (null guard, flash write protect) and are never rewritten
    /// on context switch.
    const PMP_USERSPACE_ENTRIES: core::ops::Range<usize>;

    /// mtvec exception mode.  In direct mode the trap entry symbol's address
    /// is installed as the base; vectored mode carries the vector table
    /// address, which is only known at link time.
    fn exception_mode() -> ExceptionMode {
        ExceptionMode::Direct
    }
}

/// mtvec exception mode.
pub enum ExceptionMode {
    Direct,
    Vectored(usize),
}

/// PLIC configuration for targets that have one.
pub trait PlicConfigInterface {
    /// Base address of the PLIC register block.
    const PLIC_BASE_ADDRESS: usize;

    /// Number of interrupt sources, including the nonexistent source 0.
    const NUM_IRQS: u32;
}

#[cfg(feature = "esp32c6")]
mod esp32c6;
#[cfg(feature = "esp32c6")]
pub use esp32c6::KernelConfig;

#[cfg(feature = "esp32p4")]
mod esp32p4;
#[cfg(feature = "esp32p4")]
pub use esp32p4::KernelConfig;

#[cfg(not(any(feature = "esp32c6", feature = "esp32p4")))]
mod qemu_virt_riscv;
#[cfg(not(any(feature = "esp32c6", feature = "esp32p4")))]
pub use qemu_virt_riscv::KernelConfig;
