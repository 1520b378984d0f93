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

//! # Emmer kernel core
//!
//! Process isolation and trap dispatch for MMU-less embedded RISC-V targets
//! (QEMU virt, ESP32-C6, ESP32-P4).  Isolation is enforced through the PMP:
//! a process's [`memory::MemoryMap`] is synthesized into a cached hardware
//! image that is swapped atomically when the dispatcher hands the hart to
//! another process.
//!
//! The ready queue, syscall tables, fault policy, and board bring-up live
//! outside this crate and attach through the registration points in
//! [`scheduler`], [`syscall`], [`fault`], and [`interrupt`].

#![no_std]

pub mod arch;
pub mod fault;
pub mod hart;
pub mod interrupt;
pub mod memory;
pub mod scheduler;
pub mod sync;
pub mod syscall;

#[cfg(target_os = "none")]
mod panic;

pub use arch::{Arch, ArchInterface};
pub use hart::KernelContext;
pub use memory::{
    MemoryConfig, MemoryMap, MemoryRegion, ProcessMemoryContext, RegionKind, RegionPerms,
};
pub use scheduler::{
    Scheduler, Stack, ThreadContext, request_switch_from_isr, trap_exit_switch,
};

/// Terminal failure hook for `emmer_assert`: dump and power off, never
/// continue.
#[unsafe(no_mangle)]
pub extern "C" fn emmer_assert_handle_failure() -> ! {
    Arch::panic()
}
