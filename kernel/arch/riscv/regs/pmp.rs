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

use emmer_status::{Error, Result};
use kernel_config::{KernelConfig, RiscVKernelConfigInterface};
use regs::*;

use crate::memory::{MemoryRegion, RegionKind, RegionPerms};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PmpCfgAddressMode {
    /// Null region (disabled).
    Off = 0,

    /// Top of range.
    Tor = 1,

    /// Naturally aligned four-byte region.
    Na4 = 2,

    /// Naturally aligned power-of-two region, >= 8 bytes.
    Napot = 3,
}

#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PmpCfgVal(pub(crate) u8);

impl PmpCfgVal {
    rw_bool_field!(u8, r, 0, "readable");
    rw_bool_field!(u8, w, 1, "writable");
    rw_bool_field!(u8, x, 2, "executable");
    rw_enum_field!(u8, a, 3, 4, PmpCfgAddressMode, "addressing mode");
    rw_bool_field!(u8, l, 7, "locked");

    #[must_use]
    pub const fn from_perms(perms: RegionPerms, address_mode: PmpCfgAddressMode) -> Self {
        Self(0)
            .with_r(perms.is_readable())
            .with_w(perms.is_writeable())
            .with_x(perms.is_executable())
            .with_a(address_mode)
    }
}

/// A synthesized PMP image: one `pmpcfg` byte and one `pmpaddr` word per
/// entry.
///
/// Entries outside `KernelConfig::PMP_USERSPACE_ENTRIES` stay zero (OFF);
/// writing the image leaves the boot-time locked entries untouched because
/// the hardware ignores writes to locked entries.
#[derive(Clone)]
#[repr(align(4))]
pub struct PmpConfig<const NUM_ENTRIES: usize> {
    pub cfg: [PmpCfgVal; NUM_ENTRIES],
    pub addr: [usize; NUM_ENTRIES],
}

const fn kind_eq(a: RegionKind, b: RegionKind) -> bool {
    a as usize == b as usize
}

impl<const NUM_ENTRIES: usize> PmpConfig<NUM_ENTRIES> {
    /// Synthesize the PMP image representing `regions`.
    ///
    /// `regions` must be sorted by base address and non-overlapping; this is
    /// re-verified and violations fail with `InvalidArgument`.  Back-to-back
    /// regions with identical permissions are merged before encoding, then
    /// each run is encoded as a single NAPOT/NA4 entry when naturally
    /// aligned, or as a TOR pair otherwise.  A TOR run that starts where the
    /// previous TOR run ended reuses that entry as its base.
    ///
    /// Running out of entries fails with `ResourceExhausted`: the map cannot
    /// be represented on this hardware and the caller must deny the memory
    /// operation.
    ///
    /// Entry ordering follows region ordering, so the hardware's
    /// first-match-wins evaluation sees regions in map order[^pmp].
    ///
    /// [^pmp]: Section 3.7. Physical Memory Protection in
    ///   [The RISC-V Instruction Set Manual Volume II: Privileged Architecture](https://github.com/riscv/riscv-isa-manual/releases/download/20250508/riscv-privileged-20250508.pdf)
    pub const fn new(regions: &[MemoryRegion]) -> Result<Self> {
        let mut config = Self {
            cfg: [PmpCfgVal(0); NUM_ENTRIES],
            addr: [0; NUM_ENTRIES],
        };
        let granule = 4 << KernelConfig::PMP_GRANULARITY;
        let first_entry = KernelConfig::PMP_USERSPACE_ENTRIES.start;
        let last_entry = KernelConfig::PMP_USERSPACE_ENTRIES.end;

        let mut cur_region = 0;
        let mut cur_entry = first_entry;
        let mut prev_was_tor = false;
        let mut prev_end = 0usize;

        // `while` instead of `for`: iterator loops are not usable in const
        // functions.
        while cur_region < regions.len() {
            let first = &regions[cur_region];
            let start = first.start;
            let perms = first.perms;
            let kind = first.kind;
            let mut end = first.end;

            if end <= start {
                return Err(Error::InvalidArgument);
            }
            if cur_region > 0 && regions[cur_region - 1].end > start {
                // Unsorted or overlapping input.
                return Err(Error::InvalidArgument);
            }

            // Greedily merge back-to-back regions carrying the same
            // permissions so they consume a single run of entries.
            while cur_region + 1 < regions.len()
                && regions[cur_region + 1].start == end
                && regions[cur_region + 1].perms.bits() == perms.bits()
                && kind_eq(regions[cur_region + 1].kind, kind)
            {
                cur_region += 1;
                end = regions[cur_region].end;
            }

            if start % granule != 0 || (end - start) % granule != 0 {
                // Run boundaries must land on the PMP granularity.
                return Err(Error::InvalidArgument);
            }

            if cur_entry >= last_entry {
                return Err(Error::ResourceExhausted);
            }

            let run = MemoryRegion::new(kind, perms, start, end);
            let size = end - start;

            if run.is_napot() {
                let mode = if KernelConfig::PMP_GRANULARITY == 0 && size == 4 {
                    PmpCfgAddressMode::Na4
                } else {
                    PmpCfgAddressMode::Napot
                };
                let address = (start >> 2) | ((size - 1) >> 3);
                if let Err(e) =
                    config.entry(cur_entry, PmpCfgVal::from_perms(perms, mode), address)
                {
                    return Err(e);
                }
                cur_entry += 1;
                cur_region += 1;
                prev_was_tor = false;
                prev_end = end;
                continue;
            }

            if prev_was_tor && prev_end == start {
                // The run starts where the previous TOR run ended; its top
                // entry doubles as our base.
            } else if start == 0 && cur_entry == 0 {
                // A TOR entry at index 0 has an implicit base of zero.
            } else {
                // Spend an OFF entry to carry the base address.
                if let Err(e) = config.entry(
                    cur_entry,
                    PmpCfgVal::from_perms(perms, PmpCfgAddressMode::Off),
                    start >> 2,
                ) {
                    return Err(e);
                }
                cur_entry += 1;
                if cur_entry >= last_entry {
                    return Err(Error::ResourceExhausted);
                }
            }

            if let Err(e) = config.entry(
                cur_entry,
                PmpCfgVal::from_perms(perms, PmpCfgAddressMode::Tor),
                end >> 2,
            ) {
                return Err(e);
            }
            cur_entry += 1;
            cur_region += 1;
            prev_was_tor = true;
            prev_end = end;
        }

        Ok(config)
    }

    pub const fn entry(
        &mut self,
        index: usize,
        config: PmpCfgVal,
        address: usize,
    ) -> Result<&mut Self> {
        if index >= NUM_ENTRIES {
            return Err(Error::ResourceExhausted);
        }
        self.cfg[index] = config;
        self.addr[index] = address;
        Ok(self)
    }

    /// Number of non-OFF entries in the image.
    #[must_use]
    pub fn entries_used(&self) -> usize {
        self.cfg
            .iter()
            .filter(|cfg| cfg.a() != PmpCfgAddressMode::Off || cfg.0 != 0)
            .count()
    }

    /// Clear the PMPCFG registers, disabling the current configuration.
    ///
    /// # Safety
    /// Interrupts must be disabled; the hart is without user protections
    /// until the following `write`.
    #[cfg(target_arch = "riscv32")]
    pub unsafe fn clear(&self) {
        unsafe {
            core::arch::asm!("csrw pmpcfg0, x0");
            core::arch::asm!("csrw pmpcfg1, x0");
            core::arch::asm!("csrw pmpcfg2, x0");
            core::arch::asm!("csrw pmpcfg3, x0");
        }
    }

    /// Write this PMP image to the registers.
    ///
    /// # Safety
    /// Interrupts must be disabled.  `clear` must have been issued first so
    /// no transient combination of old addresses and new configuration bytes
    /// becomes reachable (consider zeroing the lower address register of a
    /// TOR region: a stale TOR byte would briefly describe a region down to
    /// address zero).
    #[cfg(target_arch = "riscv32")]
    pub unsafe fn write(&self) {
        // Only 16 entry rv32 PMPs are supported.
        emmer_assert::debug_assert!(NUM_ENTRIES == 16);

        unsafe {
            core::arch::asm!("csrw pmpaddr0, {addr}", addr = in(reg) self.addr[0]);
            core::arch::asm!("csrw pmpaddr1, {addr}", addr = in(reg) self.addr[1]);
            core::arch::asm!("csrw pmpaddr2, {addr}", addr = in(reg) self.addr[2]);
            core::arch::asm!("csrw pmpaddr3, {addr}", addr = in(reg) self.addr[3]);
            core::arch::asm!("csrw pmpaddr4, {addr}", addr = in(reg) self.addr[4]);
            core::arch::asm!("csrw pmpaddr5, {addr}", addr = in(reg) self.addr[5]);
            core::arch::asm!("csrw pmpaddr6, {addr}", addr = in(reg) self.addr[6]);
            core::arch::asm!("csrw pmpaddr7, {addr}", addr = in(reg) self.addr[7]);
            core::arch::asm!("csrw pmpaddr8, {addr}", addr = in(reg) self.addr[8]);
            core::arch::asm!("csrw pmpaddr9, {addr}", addr = in(reg) self.addr[9]);
            core::arch::asm!("csrw pmpaddr10, {addr}", addr = in(reg) self.addr[10]);
            core::arch::asm!("csrw pmpaddr11, {addr}", addr = in(reg) self.addr[11]);
            core::arch::asm!("csrw pmpaddr12, {addr}", addr = in(reg) self.addr[12]);
            core::arch::asm!("csrw pmpaddr13, {addr}", addr = in(reg) self.addr[13]);
            core::arch::asm!("csrw pmpaddr14, {addr}", addr = in(reg) self.addr[14]);
            core::arch::asm!("csrw pmpaddr15, {addr}", addr = in(reg) self.addr[15]);

            let config: &[u32; 4] = core::mem::transmute(&self.cfg);
            core::arch::asm!("csrw pmpcfg0, {cfg}", cfg = in(reg) config[0]);
            core::arch::asm!("csrw pmpcfg1, {cfg}", cfg = in(reg) config[1]);
            core::arch::asm!("csrw pmpcfg2, {cfg}", cfg = in(reg) config[2]);
            core::arch::asm!("csrw pmpcfg3, {cfg}", cfg = in(reg) config[3]);
        }
    }

    /// Log the entries of this PMP image.
    pub fn dump(&self) {
        let mut prev_addr = 0usize;
        for (i, (cfg, address)) in self.cfg.iter().zip(self.addr.iter()).enumerate() {
            let mut size = 0usize;
            let mut addr = *address;
            let mode = match cfg.a() {
                PmpCfgAddressMode::Off => "---",
                PmpCfgAddressMode::Tor => {
                    size = (addr - prev_addr) << 2;
                    "TOR"
                }
                PmpCfgAddressMode::Na4 => {
                    size = 4;
                    "NA4"
                }
                PmpCfgAddressMode::Napot => {
                    size = 1 << (!addr).trailing_zeros();
                    addr &= !(size - 1);
                    size <<= 3;
                    "NPT"
                }
            };
            prev_addr = *address;
            addr <<= 2;
            emmer_log::debug!(
                "{:2}: {:#010x} {} {}{}{}{} sz={:#010x}",
                i,
                addr,
                mode,
                if cfg.l() { 'L' } else { '-' },
                if cfg.x() { 'X' } else { '-' },
                if cfg.w() { 'W' } else { '-' },
                if cfg.r() { 'R' } else { '-' },
                size,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryMap, MemoryRegion, RegionKind, RegionPerms};

    const FIRST: usize = KernelConfig::PMP_USERSPACE_ENTRIES.start;
    const BUDGET: usize =
        KernelConfig::PMP_USERSPACE_ENTRIES.end - KernelConfig::PMP_USERSPACE_ENTRIES.start;

    fn region(start: usize, end: usize, perms: RegionPerms) -> MemoryRegion {
        MemoryRegion::new(RegionKind::Data, perms, start, end)
    }

    /// First-match-wins model of the hardware's PMP evaluation: walk the
    /// entries in order and return the permissions of the first match, or
    /// `None` (access fault) when nothing matches.
    fn evaluate<const N: usize>(pmp: &PmpConfig<N>, addr: usize) -> Option<RegionPerms> {
        let mut prev_top = 0usize;
        for i in 0..N {
            let cfg = pmp.cfg[i];
            let pmpaddr = pmp.addr[i];
            let matched = match cfg.a() {
                PmpCfgAddressMode::Off => false,
                PmpCfgAddressMode::Tor => {
                    // The base is the preceding entry's address register,
                    // whatever its mode.
                    addr >= prev_top && addr < pmpaddr << 2
                }
                PmpCfgAddressMode::Na4 => addr >> 2 == pmpaddr,
                PmpCfgAddressMode::Napot => {
                    let t = (!pmpaddr).trailing_zeros();
                    let size = 8usize << t;
                    let base = (pmpaddr & !((1 << t) - 1)) << 2;
                    addr >= base && addr < base + size
                }
            };
            prev_top = pmpaddr << 2;
            if matched {
                let mut perms = RegionPerms::empty();
                if cfg.r() {
                    perms |= RegionPerms::READ;
                }
                if cfg.w() {
                    perms |= RegionPerms::WRITE;
                }
                if cfg.x() {
                    perms |= RegionPerms::EXECUTE;
                }
                return Some(perms);
            }
        }
        None
    }

    #[test]
    fn rejects_misaligned_sizes() {
        let pmp = PmpConfig::<16>::new(&[region(0, 0xffff_ffff, RegionPerms::RWX)]);
        assert_eq!(pmp.err(), Some(Error::InvalidArgument));

        let pmp = PmpConfig::<16>::new(&[region(0, 2, RegionPerms::RWX)]);
        assert_eq!(pmp.err(), Some(Error::InvalidArgument));
    }

    #[test]
    fn rejects_unsorted_input() {
        let pmp = PmpConfig::<16>::new(&[
            region(0x2000, 0x3000, RegionPerms::RW),
            region(0x1000, 0x2000, RegionPerms::RW),
        ]);
        assert_eq!(pmp.err(), Some(Error::InvalidArgument));
    }

    #[test]
    fn single_na4_region() {
        let pmp = PmpConfig::<16>::new(&[region(0x1000, 0x1004, RegionPerms::RW)]).unwrap();
        assert_eq!(
            pmp.cfg[FIRST],
            PmpCfgVal::from_perms(RegionPerms::RW, PmpCfgAddressMode::Na4)
        );
        assert_eq!(pmp.addr[FIRST], 0x400);
        assert_eq!(pmp.entries_used(), 1);
    }

    #[test]
    fn single_napot_region() {
        let pmp = PmpConfig::<16>::new(&[region(0x1_0000, 0x2_0000, RegionPerms::RW)]).unwrap();
        assert_eq!(
            pmp.cfg[FIRST],
            PmpCfgVal::from_perms(RegionPerms::RW, PmpCfgAddressMode::Napot)
        );
        assert_eq!(pmp.addr[FIRST], 0x5fff);
        assert_eq!(pmp.entries_used(), 1);
    }

    #[test]
    fn code_page_is_one_napot_entry() {
        // A 4 KiB RX code page costs exactly one entry.
        let pmp = PmpConfig::<16>::new(&[MemoryRegion::new(
            RegionKind::Code,
            RegionPerms::RX,
            0x1000,
            0x2000,
        )])
        .unwrap();
        assert_eq!(pmp.entries_used(), 1);
        assert_eq!(
            pmp.cfg[FIRST],
            PmpCfgVal::from_perms(RegionPerms::RX, PmpCfgAddressMode::Napot)
        );
        assert_eq!(evaluate(&pmp, 0x1000), Some(RegionPerms::RX));
        assert_eq!(evaluate(&pmp, 0x1fff), Some(RegionPerms::RX));
        assert_eq!(evaluate(&pmp, 0x0fff), None);
        assert_eq!(evaluate(&pmp, 0x2000), None);
    }

    #[test]
    fn single_tor_region() {
        let pmp = PmpConfig::<16>::new(&[region(0x1_0000, 0x1_3330, RegionPerms::RW)]).unwrap();
        assert_eq!(
            pmp.cfg[FIRST],
            PmpCfgVal::from_perms(RegionPerms::RW, PmpCfgAddressMode::Off)
        );
        assert_eq!(pmp.addr[FIRST], 0x4000);
        assert_eq!(
            pmp.cfg[FIRST + 1],
            PmpCfgVal::from_perms(RegionPerms::RW, PmpCfgAddressMode::Tor)
        );
        assert_eq!(pmp.addr[FIRST + 1], 0x4ccc);
    }

    #[test]
    fn contiguous_tor_runs_share_entries() {
        let pmp = PmpConfig::<16>::new(&[
            region(0x1_0000, 0x1_3330, RegionPerms::READ),
            region(0x1_3330, 0x1_ccc0, RegionPerms::RW),
            region(0x1_ccc0, 0x2_0000, RegionPerms::RWX),
        ])
        .unwrap();
        assert_eq!(
            pmp.cfg[FIRST],
            PmpCfgVal::from_perms(RegionPerms::READ, PmpCfgAddressMode::Off)
        );
        assert_eq!(pmp.addr[FIRST], 0x4000);
        assert_eq!(
            pmp.cfg[FIRST + 1],
            PmpCfgVal::from_perms(RegionPerms::READ, PmpCfgAddressMode::Tor)
        );
        assert_eq!(pmp.addr[FIRST + 1], 0x4ccc);
        assert_eq!(
            pmp.cfg[FIRST + 2],
            PmpCfgVal::from_perms(RegionPerms::RW, PmpCfgAddressMode::Tor)
        );
        assert_eq!(pmp.addr[FIRST + 2], 0x7330);
        assert_eq!(
            pmp.cfg[FIRST + 3],
            PmpCfgVal::from_perms(RegionPerms::RWX, PmpCfgAddressMode::Tor)
        );
        assert_eq!(pmp.addr[FIRST + 3], 0x8000);
    }

    #[test]
    fn napot_does_not_anchor_tor() {
        let pmp = PmpConfig::<16>::new(&[
            region(0x1_0000, 0x2_0000, RegionPerms::READ),
            region(0x2_0000, 0x3_0000, RegionPerms::RW),
            region(0x3_0000, 0x3_3300, RegionPerms::RWX),
        ])
        .unwrap();
        assert_eq!(
            pmp.cfg[FIRST],
            PmpCfgVal::from_perms(RegionPerms::READ, PmpCfgAddressMode::Napot)
        );
        assert_eq!(pmp.addr[FIRST], 0x5fff);
        assert_eq!(
            pmp.cfg[FIRST + 1],
            PmpCfgVal::from_perms(RegionPerms::RW, PmpCfgAddressMode::Napot)
        );
        assert_eq!(pmp.addr[FIRST + 1], 0x9fff);
        // The third region cannot extend a NAPOT neighbor; it pays for its
        // own base entry.
        assert_eq!(
            pmp.cfg[FIRST + 2],
            PmpCfgVal::from_perms(RegionPerms::RWX, PmpCfgAddressMode::Off)
        );
        assert_eq!(pmp.addr[FIRST + 2], 0xc000);
        assert_eq!(
            pmp.cfg[FIRST + 3],
            PmpCfgVal::from_perms(RegionPerms::RWX, PmpCfgAddressMode::Tor)
        );
        assert_eq!(pmp.addr[FIRST + 3], 0xccc0);
    }

    #[test]
    fn adjacent_identical_regions_merge() {
        // Two back-to-back read-only regions collapse into one entry
        // covering both.
        let pmp = PmpConfig::<16>::new(&[
            region(0, 0x1000, RegionPerms::READ),
            region(0x1000, 0x2000, RegionPerms::READ),
        ])
        .unwrap();
        assert_eq!(pmp.entries_used(), 1);
        assert_eq!(
            pmp.cfg[FIRST],
            PmpCfgVal::from_perms(RegionPerms::READ, PmpCfgAddressMode::Napot)
        );
        assert_eq!(pmp.addr[FIRST], 0x3ff);
        assert_eq!(evaluate(&pmp, 0), Some(RegionPerms::READ));
        assert_eq!(evaluate(&pmp, 0x1fff), Some(RegionPerms::READ));
        assert_eq!(evaluate(&pmp, 0x2000), None);
    }

    #[test]
    fn differing_permissions_do_not_merge() {
        let pmp = PmpConfig::<16>::new(&[
            region(0x1000, 0x2000, RegionPerms::READ),
            region(0x2000, 0x3000, RegionPerms::RW),
        ])
        .unwrap();
        assert_eq!(evaluate(&pmp, 0x1fff), Some(RegionPerms::READ));
        assert_eq!(evaluate(&pmp, 0x2000), Some(RegionPerms::RW));
    }

    #[test]
    fn merged_tor_run() {
        // Adjacent, same permissions, merged size 0x2300 is not a power of
        // two: one OFF + one TOR entry.
        let pmp = PmpConfig::<16>::new(&[
            region(0x1000, 0x3000, RegionPerms::READ),
            region(0x3000, 0x3300, RegionPerms::READ),
        ])
        .unwrap();
        assert_eq!(pmp.entries_used(), 2);
        assert_eq!(evaluate(&pmp, 0x1000), Some(RegionPerms::READ));
        assert_eq!(evaluate(&pmp, 0x32ff), Some(RegionPerms::READ));
        assert_eq!(evaluate(&pmp, 0x3300), None);
    }

    #[test]
    fn entry_budget_boundary() {
        // `BUDGET` disjoint NAPOT pages fit exactly; one more must fail.
        // Pages are spaced apart so no merge is possible.
        let mut regions = [region(0, 0, RegionPerms::READ); BUDGET + 1];
        for (i, slot) in regions.iter_mut().enumerate() {
            let base = 0x1_0000 + i * 0x2000;
            *slot = region(
                base,
                base + 0x1000,
                if i % 2 == 0 {
                    RegionPerms::READ
                } else {
                    RegionPerms::RW
                },
            );
        }

        let exact = PmpConfig::<16>::new(&regions[..BUDGET]).unwrap();
        assert_eq!(exact.entries_used(), BUDGET);

        let over = PmpConfig::<16>::new(&regions);
        assert_eq!(over.err(), Some(Error::ResourceExhausted));
    }

    #[test]
    fn synthesis_is_idempotent() {
        let regions = [
            region(0x1_0000, 0x2_0000, RegionPerms::RX),
            region(0x2_0000, 0x2_4000, RegionPerms::RW),
            region(0x8_0000, 0x8_1000, RegionPerms::READ),
        ];
        let a = PmpConfig::<16>::new(&regions).unwrap();
        let b = PmpConfig::<16>::new(&regions).unwrap();
        assert_eq!(a.cfg, b.cfg);
        assert_eq!(a.addr, b.addr);
    }

    #[test]
    fn coverage_matches_the_map_exactly() {
        let mut map = MemoryMap::new();
        map.insert(MemoryRegion::new(
            RegionKind::Code,
            RegionPerms::RX,
            0x2_0000,
            0x3_0000,
        ))
        .unwrap();
        map.insert(MemoryRegion::new(
            RegionKind::Data,
            RegionPerms::RW,
            0x3_0000,
            0x3_2000,
        ))
        .unwrap();
        map.insert(MemoryRegion::new(
            RegionKind::Stack,
            RegionPerms::RW,
            0x5_0000,
            0x5_4000,
        ))
        .unwrap();
        map.insert(MemoryRegion::new(
            RegionKind::Device,
            RegionPerms::RW,
            0x1000_0000,
            0x1000_0100,
        ))
        .unwrap();

        let pmp = PmpConfig::<16>::new(map.regions()).unwrap();

        // Every byte inside a region gets exactly that region's permissions.
        for region in map.regions() {
            for addr in [region.start, region.start + 4, region.end - 1] {
                assert_eq!(evaluate(&pmp, addr), Some(region.perms), "addr {addr:#x}");
            }
        }

        // Every probed byte outside all regions is denied by default.
        for addr in [
            0x0usize,
            0x1_ffff,
            0x3_2000,
            0x4_ffff,
            0x5_4000,
            0x1000_0100,
            0xffff_f000,
        ] {
            assert_eq!(evaluate(&pmp, addr), None, "addr {addr:#x}");
        }
    }

    #[test]
    fn entries_preserve_region_order() {
        let pmp = PmpConfig::<16>::new(&[
            region(0x1000, 0x2000, RegionPerms::READ),
            region(0x4000, 0x5000, RegionPerms::RW),
        ])
        .unwrap();

        // Lower region first, matching map order.
        let first_used = pmp.cfg[FIRST];
        assert!(first_used.r() && !first_used.w());
    }
}
