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

use emmer_status::Error;
use kernel::arch::host;
use kernel::{Arch, MemoryRegion, ProcessMemoryContext, RegionKind, RegionPerms};

fn region(start: usize, end: usize, perms: RegionPerms) -> MemoryRegion {
    MemoryRegion::new(RegionKind::Data, perms, start, end)
}

#[test]
fn perms_accessors_return_correct_values() {
    assert!(RegionPerms::READ.is_readable());
    assert!(!RegionPerms::READ.is_writeable());
    assert!(!RegionPerms::READ.is_executable());

    assert!(RegionPerms::RW.is_readable());
    assert!(RegionPerms::RW.is_writeable());
    assert!(!RegionPerms::RW.is_executable());

    assert!(RegionPerms::RX.is_readable());
    assert!(!RegionPerms::RX.is_writeable());
    assert!(RegionPerms::RX.is_executable());

    assert!(RegionPerms::RWX.is_readable());
    assert!(RegionPerms::RWX.is_writeable());
    assert!(RegionPerms::RWX.is_executable());
}

#[test]
fn region_allows_access_to_full_region() {
    assert!(
        region(0x1000_0000, 0x2000_0000, RegionPerms::READ)
            .has_access(&region(0x1000_0000, 0x2000_0000, RegionPerms::READ))
    );
}

#[test]
fn region_allows_access_to_subset_regions() {
    let outer = region(0x1000_0000, 0x2000_0000, RegionPerms::READ);
    assert!(outer.has_access(&region(0x1000_0000, 0x1500_0000, RegionPerms::READ)));
    assert!(outer.has_access(&region(0x1200_0000, 0x1500_0000, RegionPerms::READ)));
    assert!(outer.has_access(&region(0x1500_0000, 0x2000_0000, RegionPerms::READ)));
}

#[test]
fn region_disallows_access_outside_bounds() {
    let outer = region(0x1000_0000, 0x2000_0000, RegionPerms::READ);
    assert!(!outer.has_access(&region(0x0fff_ffff, 0x2000_0000, RegionPerms::READ)));
    assert!(!outer.has_access(&region(0x1000_0000, 0x2000_0001, RegionPerms::READ)));
    assert!(!outer.has_access(&region(0x0fff_ffff, 0x2000_0001, RegionPerms::READ)));
}

#[test]
fn region_disallows_wider_permissions() {
    let readable = region(0x1000_0000, 0x2000_0000, RegionPerms::READ);
    assert!(!readable.has_access(&region(0x1000_0000, 0x2000_0000, RegionPerms::RW)));
    assert!(!readable.has_access(&region(0x1000_0000, 0x2000_0000, RegionPerms::RX)));

    let rwx = region(0x1000_0000, 0x2000_0000, RegionPerms::RWX);
    assert!(rwx.has_access(&region(0x1000_0000, 0x2000_0000, RegionPerms::RW)));
}

#[test]
fn context_update_map_applies_mutation() {
    let ctx = ProcessMemoryContext::<Arch>::new();
    ctx.update_map(|map| map.insert(region(0x1000, 0x2000, RegionPerms::RW)))
        .unwrap();

    assert!(ctx.range_has_access(RegionPerms::RW, 0x1000, 0x2000));
    assert!(!ctx.range_has_access(RegionPerms::RX, 0x1000, 0x2000));
    assert!(!ctx.range_has_access(RegionPerms::READ, 0x2000, 0x3000));
}

#[test]
fn context_denies_unrepresentable_maps() {
    // The host backend models `host::NUM_SLOTS` hardware slots.  Filling
    // them succeeds; one more region must be denied and must leave the
    // previous map fully intact.
    let ctx = ProcessMemoryContext::<Arch>::new();
    for i in 0..host::NUM_SLOTS {
        ctx.update_map(|map| {
            map.insert(region(
                i * 0x2000,
                i * 0x2000 + 0x1000,
                RegionPerms::RW,
            ))
        })
        .unwrap();
    }

    let result = ctx.update_map(|map| {
        map.insert(region(0x100_0000, 0x100_1000, RegionPerms::RW))
    });
    assert_eq!(result, Err(Error::ResourceExhausted));

    // The denied region is not reachable, the prior ones still are.
    assert!(!ctx.range_has_access(RegionPerms::RW, 0x100_0000, 0x100_1000));
    assert!(ctx.range_has_access(RegionPerms::RW, 0, 0x1000));
}

#[test]
fn swap_in_regenerates_an_invalid_cache() {
    let writes_before = host::test_support::protection_writes();

    // A fresh context starts with an invalid cache; swap-in must synthesize
    // it before touching the hardware.
    let ctx = ProcessMemoryContext::<Arch>::new();
    ctx.swap_in();

    assert!(host::test_support::protection_writes() > writes_before);
    // The swap itself must never run with interrupts enabled.
    assert!(!host::test_support::write_saw_interrupts_enabled());
}

#[test]
fn object_access_uses_object_extent() {
    let ctx = ProcessMemoryContext::<Arch>::new();
    ctx.update_map(|map| map.insert(region(0x1000, 0x1010, RegionPerms::RW)))
        .unwrap();

    let inside = 0x1000 as *const u64;
    let straddling = 0x100c as *const u64;
    assert!(ctx.has_access(RegionPerms::RW, inside));
    assert!(!ctx.has_access(RegionPerms::RW, straddling));
}
