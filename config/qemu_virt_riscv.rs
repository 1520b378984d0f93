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

//! Generic QEMU `virt` RISC-V machine.

use crate::{KernelConfigInterface, PlicConfigInterface, RiscVKernelConfigInterface};

pub struct KernelConfig;

impl KernelConfigInterface for KernelConfig {
    const TARGET_NAME: &'static str = "qemu-virt-riscv";
    const MAX_HARTS: usize = 4;
}

impl RiscVKernelConfigInterface for KernelConfig {
    const PMP_ENTRIES: usize = 16;
    // Entries 0 and 1 hold the boot-time null-pointer guard; 14 and 15 are
    // kept free for the kernel's own write protections.
    const PMP_USERSPACE_ENTRIES: core::ops::Range<usize> = 2..14;
}

impl PlicConfigInterface for KernelConfig {
    const PLIC_BASE_ADDRESS: usize = 0x0c00_0000;
    const NUM_IRQS: u32 = 96;
}
