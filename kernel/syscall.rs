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

//! System call routing.
//!
//! Argument marshalling and the syscall table live outside this core.  The
//! dispatcher recognizes that a trap is a system call, wraps the trap frame
//! in a [`SyscallArgs`] cursor, and hands both to the registered router.

use core::cell::UnsafeCell;

use emmer_status::Result;

/// Architecture independent view of the arguments in a trap frame.
pub trait SyscallArgs {
    /// Fetch the next argument register.
    fn next_usize(&mut self) -> Result<usize>;
}

/// Fetch a 64 bit argument.
///
/// Per the RISC-V psABI integer calling convention a `u64` occupies two
/// consecutive argument registers, low word first.
pub fn next_u64(args: &mut dyn SyscallArgs) -> Result<u64> {
    let low = args.next_usize()? as u64;
    let high = args.next_usize()? as u64;
    Ok(low | high << 32)
}

/// The external syscall router.
pub trait SyscallRouter: Sync {
    /// Dispatch one system call.  The returned value is packed into the
    /// trap frame's return registers.
    fn dispatch(&self, id: u16, args: &mut dyn SyscallArgs) -> i64;
}

struct RouterCell(UnsafeCell<Option<&'static dyn SyscallRouter>>);

// SAFETY: written once during boot before user processes can trap.
unsafe impl Sync for RouterCell {}

static ROUTER: RouterCell = RouterCell(UnsafeCell::new(None));

/// Install the syscall router.
///
/// # Safety
/// Must be called at most once, before the first user process starts.
pub unsafe fn set_syscall_router(router: &'static dyn SyscallRouter) {
    unsafe { *ROUTER.0.get() = Some(router) };
}

/// Route one system call.  A syscall with no registered router means a user
/// process was started before boot finished wiring the kernel: fatal.
pub(crate) fn dispatch(id: u16, args: &mut dyn SyscallArgs) -> i64 {
    // SAFETY: only read after the one-time write in `set_syscall_router`.
    match unsafe { *ROUTER.0.get() } {
        Some(router) => router.dispatch(id, args),
        None => {
            emmer_assert::panic!("system call {} with no router registered", id);
        }
    }
}
