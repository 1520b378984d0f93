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

//! Architecture independent process memory model.
//!
//! A process's address space is described by a [`MemoryMap`]: an ordered set
//! of non-overlapping [`MemoryRegion`]s.  The map is the source of truth; the
//! hardware protection image derived from it (the arch's [`MemoryConfig`]) is
//! a cache that is invalidated whenever the map changes and regenerated before
//! the next swap-in.

use bitflags::bitflags;
use emmer_status::{Error, Result};
use kernel_config::{KernelConfig, KernelConfigInterface};

use crate::arch::{ArchInterface, InterruptGuard};
use crate::sync::spinlock::SpinLock;

bitflags! {
    /// Access permissions of a memory region.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct RegionPerms: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

impl RegionPerms {
    pub const RW: Self = Self::READ.union(Self::WRITE);
    pub const RX: Self = Self::READ.union(Self::EXECUTE);
    pub const RWX: Self = Self::READ.union(Self::WRITE).union(Self::EXECUTE);

    #[must_use]
    pub const fn is_readable(&self) -> bool {
        self.contains(Self::READ)
    }

    #[must_use]
    pub const fn is_writeable(&self) -> bool {
        self.contains(Self::WRITE)
    }

    #[must_use]
    pub const fn is_executable(&self) -> bool {
        self.contains(Self::EXECUTE)
    }
}

/// What a memory region is used for.
///
/// The kind does not affect the synthesized hardware permissions; it exists
/// so the process manager can tell regions apart.  `Shared` marks a region
/// backed by memory visible to more than one process; such regions are only
/// ever described here, never mutated through this module.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegionKind {
    Code,
    Data,
    Stack,
    Device,
    Shared,
}

/// Architecture independent memory region description.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    /// Start address of the memory region (inclusive).
    pub start: usize,

    /// End address of the memory region (exclusive).
    pub end: usize,

    pub perms: RegionPerms,

    pub kind: RegionKind,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(kind: RegionKind, perms: RegionPerms, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            perms,
            kind,
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the region is naturally aligned and power-of-two
    /// sized, i.e. representable by a single NAPOT (or NA4) protection entry.
    #[must_use]
    pub const fn is_napot(&self) -> bool {
        let size = self.size();
        size >= 4 && size.is_power_of_two() && self.start % size == 0
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns `true` if this region fully contains `request` and grants at
    /// least its permissions.
    #[must_use]
    pub fn has_access(&self, request: &Self) -> bool {
        if !(self.start..self.end).contains(&request.start)
            || !(self.start..self.end).contains(&(request.end - 1))
        {
            return false;
        }

        self.perms.contains(request.perms)
    }

    /// Returns `true` if any single region in `regions` grants access to
    /// `request`.  A request spanning two regions is denied even when they
    /// are adjacent; the synthesizer may merge such regions but the model
    /// stays conservative.
    #[must_use]
    pub fn regions_have_access(regions: &[Self], request: &Self) -> bool {
        regions
            .iter()
            .fold(false, |acc, region| acc | region.has_access(request))
    }
}

/// Ordered, non-overlapping set of regions describing one process.
///
/// Mutated only by the process management layer (through
/// [`ProcessMemoryContext::update_map`]); the isolation core reads it to
/// synthesize the hardware configuration.
#[derive(Clone, Copy)]
pub struct MemoryMap {
    regions: [MemoryRegion; KernelConfig::MAX_MEMMAP_REGIONS],
    len: usize,
}

const EMPTY_REGION: MemoryRegion =
    MemoryRegion::new(RegionKind::Data, RegionPerms::empty(), 0, 0);

impl MemoryMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: [EMPTY_REGION; KernelConfig::MAX_MEMMAP_REGIONS],
            len: 0,
        }
    }

    #[must_use]
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions[..self.len]
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a region, keeping the map sorted by base address.
    ///
    /// Zero sized regions and regions overlapping an existing entry are
    /// rejected.
    pub fn insert(&mut self, region: MemoryRegion) -> Result<()> {
        if region.end <= region.start {
            return Err(Error::InvalidArgument);
        }
        if self.len == self.regions.len() {
            return Err(Error::ResourceExhausted);
        }
        for existing in self.regions() {
            if existing.overlaps(&region) {
                return Err(Error::AlreadyExists);
            }
        }

        // Find the insertion point and shift the tail up.
        let mut index = self.len;
        for (i, existing) in self.regions().iter().enumerate() {
            if region.start < existing.start {
                index = i;
                break;
            }
        }
        self.regions.copy_within(index..self.len, index + 1);
        self.regions[index] = region;
        self.len += 1;
        Ok(())
    }

    /// Remove the region starting at `start`.
    pub fn remove(&mut self, start: usize) -> Result<MemoryRegion> {
        for i in 0..self.len {
            if self.regions[i].start == start {
                let region = self.regions[i];
                self.regions.copy_within(i + 1..self.len, i);
                self.len -= 1;
                return Ok(region);
            }
        }
        Err(Error::NotFound)
    }

    /// Check for access to the specified address range.
    #[must_use]
    pub fn has_access(&self, perms: RegionPerms, start_addr: usize, end_addr: usize) -> bool {
        let request = MemoryRegion::new(RegionKind::Data, perms, start_addr, end_addr);
        MemoryRegion::regions_have_access(self.regions(), &request)
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Architecture side of the memory protection cache.
///
/// Implementations hold a fully synthesized hardware image that `write` can
/// install without further computation.
pub trait MemoryConfig: Sized + Send + Sync + 'static {
    /// Number of hardware slots available to one process.
    const NUM_SLOTS: usize;

    /// Configuration installed for kernel threads.
    const KERNEL_THREAD_MEMORY_CONFIG: Self;

    /// Synthesize a hardware configuration from `map`.
    ///
    /// Fails with [`Error::ResourceExhausted`] when the map cannot be
    /// expressed in `NUM_SLOTS` entries.  This is a recoverable error: the
    /// caller denies the memory operation and nothing else is affected.
    fn generate(map: &MemoryMap) -> Result<Self>;

    /// Install this configuration into the live hardware state of the
    /// calling hart.
    ///
    /// # Safety
    /// Interrupts must be disabled on the calling hart for the full duration
    /// of the write; a trap taken against a half-written configuration would
    /// run with inconsistent protections.
    unsafe fn write(&self);

    /// Install the kernel thread configuration.
    ///
    /// # Safety
    /// Same contract as [`MemoryConfig::write`].
    unsafe fn write_kernel() {
        unsafe { Self::KERNEL_THREAD_MEMORY_CONFIG.write() }
    }
}

struct MemoryContextState<A: ArchInterface> {
    map: MemoryMap,
    config: A::MemoryConfig,

    /// When false the config must be regenerated from the map before it may
    /// be swapped in.
    valid: bool,
}

/// Per-process memory protection context: the memory map plus the cached
/// hardware configuration derived from it.
///
/// Shared by every hart that may run the process's threads.  The inner lock
/// is held shared for swap-in and exclusively for map mutation and cache
/// regeneration, so a swap can never observe a half-regenerated image.
pub struct ProcessMemoryContext<A: ArchInterface> {
    state: SpinLock<MemoryContextState<A>>,
}

impl<A: ArchInterface> ProcessMemoryContext<A> {
    /// Create an empty context.  The cache starts invalid; it is synthesized
    /// when the first regions are added, or at the latest on first swap-in.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SpinLock::new(MemoryContextState {
                map: MemoryMap::new(),
                config: A::MemoryConfig::KERNEL_THREAD_MEMORY_CONFIG,
                valid: false,
            }),
        }
    }

    /// Mutate the memory map and regenerate the cached configuration.
    ///
    /// The mutation is staged against a copy of the map: if `mutate` fails or
    /// the resulting map cannot be synthesized, the previous map and cache
    /// stay in effect and the error is returned for the caller to deny the
    /// operation.
    pub fn update_map<R>(
        &self,
        mutate: impl FnOnce(&mut MemoryMap) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.lock();
        let mut staged = state.map;
        let result = mutate(&mut staged)?;
        let config = A::MemoryConfig::generate(&staged)?;
        state.map = staged;
        state.config = config;
        state.valid = true;
        Ok(result)
    }

    /// Regenerate the cached configuration from the current map.
    pub fn generate(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.config = A::MemoryConfig::generate(&state.map)?;
        state.valid = true;
        Ok(())
    }

    /// Install this context's protections on the calling hart.
    ///
    /// Interrupts are disabled across the hardware write.  An invalid cache
    /// is regenerated first; failing to regenerate a map that was already
    /// granted to a running process violates a kernel invariant and panics.
    pub fn swap_in(&self) {
        loop {
            {
                let state = self.state.lock_shared();
                if state.valid {
                    let _guard = InterruptGuard::<A>::new();
                    // SAFETY: interrupts are disabled for the duration of the
                    // write by the guard above.
                    unsafe { state.config.write() };
                    return;
                }
            }

            // Stale cache: regenerate under the exclusive lock, then retry.
            let mut state = self.state.lock();
            if !state.valid {
                match A::MemoryConfig::generate(&state.map) {
                    Ok(config) => {
                        state.config = config;
                        state.valid = true;
                    }
                    Err(e) => {
                        emmer_assert::panic!(
                            "un-mappable memory map for an active process: {:?}",
                            e
                        );
                    }
                }
            }
        }
    }

    /// Check for access to the specified address range.
    #[must_use]
    pub fn range_has_access(
        &self,
        perms: RegionPerms,
        start_addr: usize,
        end_addr: usize,
    ) -> bool {
        self.state
            .lock_shared()
            .map
            .has_access(perms, start_addr, end_addr)
    }

    /// Check for access to the memory holding `object`.
    #[must_use]
    pub fn has_access<T: Sized>(&self, perms: RegionPerms, object: *const T) -> bool {
        self.range_has_access(
            perms,
            object as usize,
            object as usize + core::mem::size_of::<T>(),
        )
    }
}

impl<A: ArchInterface> Default for ProcessMemoryContext<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(start: usize, end: usize, perms: RegionPerms) -> MemoryRegion {
        MemoryRegion::new(RegionKind::Data, perms, start, end)
    }

    #[test]
    fn map_keeps_regions_sorted() {
        let mut map = MemoryMap::new();
        map.insert(region(0x4000, 0x5000, RegionPerms::RW)).unwrap();
        map.insert(region(0x1000, 0x2000, RegionPerms::RX)).unwrap();
        map.insert(region(0x8000, 0x9000, RegionPerms::READ))
            .unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.regions()[0].start, 0x1000);
        assert_eq!(map.regions()[1].start, 0x4000);
        assert_eq!(map.regions()[2].start, 0x8000);
    }

    #[test]
    fn map_rejects_overlap() {
        let mut map = MemoryMap::new();
        map.insert(region(0x1000, 0x3000, RegionPerms::RW)).unwrap();
        assert_eq!(
            map.insert(region(0x2000, 0x4000, RegionPerms::RW)),
            Err(Error::AlreadyExists)
        );
        // Adjacent is fine.
        map.insert(region(0x3000, 0x4000, RegionPerms::RW)).unwrap();
    }

    #[test]
    fn map_rejects_zero_size() {
        let mut map = MemoryMap::new();
        assert_eq!(
            map.insert(region(0x1000, 0x1000, RegionPerms::RW)),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn map_capacity_is_bounded() {
        let mut map = MemoryMap::new();
        for i in 0..KernelConfig::MAX_MEMMAP_REGIONS {
            map.insert(region(i * 0x1000, i * 0x1000 + 0x1000, RegionPerms::RW))
                .unwrap();
        }
        assert_eq!(
            map.insert(region(0x100_0000, 0x100_1000, RegionPerms::RW)),
            Err(Error::ResourceExhausted)
        );
    }

    #[test]
    fn remove_compacts_the_map() {
        let mut map = MemoryMap::new();
        map.insert(region(0x1000, 0x2000, RegionPerms::RW)).unwrap();
        map.insert(region(0x3000, 0x4000, RegionPerms::RW)).unwrap();
        let removed = map.remove(0x1000).unwrap();
        assert_eq!(removed.start, 0x1000);
        assert_eq!(map.len(), 1);
        assert_eq!(map.regions()[0].start, 0x3000);
        assert_eq!(map.remove(0x1000), Err(Error::NotFound));
    }

    #[test]
    fn region_is_napot() {
        assert!(region(0x1000, 0x2000, RegionPerms::RX).is_napot());
        assert!(region(0, 0x2000, RegionPerms::RX).is_napot());
        // Not power-of-two sized.
        assert!(!region(0x1000, 0x2800, RegionPerms::RX).is_napot());
        // Not naturally aligned.
        assert!(!region(0x800, 0x2800, RegionPerms::RX).is_napot());
    }

    #[test]
    fn access_requires_containment_and_permissions() {
        let r = region(0x1000, 0x2000, RegionPerms::RW);
        assert!(r.has_access(&region(0x1000, 0x2000, RegionPerms::RW)));
        assert!(r.has_access(&region(0x1400, 0x1800, RegionPerms::READ)));
        assert!(!r.has_access(&region(0x1400, 0x1800, RegionPerms::RX)));
        assert!(!r.has_access(&region(0x0c00, 0x1800, RegionPerms::READ)));
        assert!(!r.has_access(&region(0x1800, 0x2400, RegionPerms::READ)));
    }

    #[test]
    fn access_does_not_span_regions() {
        let mut map = MemoryMap::new();
        map.insert(region(0x1000, 0x2000, RegionPerms::RW)).unwrap();
        map.insert(region(0x2000, 0x3000, RegionPerms::RW)).unwrap();
        assert!(map.has_access(RegionPerms::RW, 0x1000, 0x2000));
        assert!(map.has_access(RegionPerms::RW, 0x2000, 0x3000));
        assert!(!map.has_access(RegionPerms::RW, 0x1800, 0x2800));
    }
}
