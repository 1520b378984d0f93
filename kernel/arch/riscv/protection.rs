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

//! RISC-V memory protection configuration.
//!
//! A [`MemoryConfig`] is the fully synthesized PMP image for one process.
//! Anything not covered by an entry is denied by the hardware's default-deny
//! behavior, so a process can only ever reach what its memory map grants.

use emmer_status::Result;
use kernel_config::{KernelConfig, RiscVKernelConfigInterface};

use super::regs::pmp::{PmpCfgAddressMode, PmpCfgVal, PmpConfig};
use crate::memory::{MemoryMap, RegionPerms};

#[derive(Clone)]
pub struct MemoryConfig {
    pmp_config: PmpConfig<{ KernelConfig::PMP_ENTRIES }>,
}

/// Kernel threads run in M-mode, which bypasses non-locked PMP entries; a
/// single full-address-space NAPOT entry keeps the behavior explicit and
/// harmless if the hart ever drops privilege with this image live.
const fn kernel_pmp_config() -> PmpConfig<{ KernelConfig::PMP_ENTRIES }> {
    let mut config = PmpConfig {
        cfg: [PmpCfgVal(0); KernelConfig::PMP_ENTRIES],
        addr: [0; KernelConfig::PMP_ENTRIES],
    };
    let entry = KernelConfig::PMP_USERSPACE_ENTRIES.start;
    // All-ones pmpaddr with NAPOT selects the entire address space.
    config.cfg[entry] = PmpCfgVal::from_perms(RegionPerms::RWX, PmpCfgAddressMode::Napot);
    config.addr[entry] = usize::MAX;
    config
}

impl MemoryConfig {
    pub fn dump(&self) {
        self.pmp_config.dump();
    }
}

impl crate::memory::MemoryConfig for MemoryConfig {
    const NUM_SLOTS: usize =
        KernelConfig::PMP_USERSPACE_ENTRIES.end - KernelConfig::PMP_USERSPACE_ENTRIES.start;

    const KERNEL_THREAD_MEMORY_CONFIG: Self = Self {
        pmp_config: kernel_pmp_config(),
    };

    fn generate(map: &MemoryMap) -> Result<Self> {
        Ok(Self {
            pmp_config: PmpConfig::new(map.regions())?,
        })
    }

    #[cfg(target_arch = "riscv32")]
    unsafe fn write(&self) {
        unsafe {
            // Clear first so the following writes can't create an
            // intermediate state that grants more than either the old or the
            // new image.
            self.pmp_config.clear();
            self.pmp_config.write();

            // Make the new permissions visible to subsequent fetches and
            // accesses before returning towards the resumed process.
            core::arch::asm!("fence rw, rw");
            core::arch::asm!("fence.i");
        }
    }

    #[cfg(not(target_arch = "riscv32"))]
    unsafe fn write(&self) {
        unreachable!("RISC-V memory configuration written on a foreign host");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConfig as _, MemoryRegion, RegionKind};

    #[test]
    fn generate_round_trips_through_the_map() {
        let mut map = MemoryMap::new();
        map.insert(MemoryRegion::new(
            RegionKind::Code,
            RegionPerms::RX,
            0x8000_0000,
            0x8000_4000,
        ))
        .unwrap();

        let config = MemoryConfig::generate(&map).unwrap();
        assert_eq!(config.pmp_config.entries_used(), 1);
    }

    #[test]
    fn kernel_config_covers_everything() {
        let config = MemoryConfig::KERNEL_THREAD_MEMORY_CONFIG;
        let entry = KernelConfig::PMP_USERSPACE_ENTRIES.start;
        let cfg = config.pmp_config.cfg[entry];
        assert!(cfg.r() && cfg.w() && cfg.x());
        assert_eq!(cfg.a(), PmpCfgAddressMode::Napot);
        assert_eq!(config.pmp_config.addr[entry], usize::MAX);
    }
}
