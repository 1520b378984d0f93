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

//! # emmer_log
//!
//! Logging facade for the kernel.  Clients import the macros and log; message
//! formatting and transport are the backend's problem.  The backend is
//! installed once during boot (before secondary harts are released) by the
//! board port, or by a test harness on the host.
//!
//! ```
//! use emmer_log::info;
//!
//! info!("boot hart {} online", 0);
//! ```

#![no_std]

use core::cell::UnsafeCell;
use core::fmt::Arguments;

/// Severity of a log message.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

/// Sink for log messages.  Implementations must be interrupt-safe: the kernel
/// logs from trap context, including the panic path.
pub trait LogBackend: Sync {
    fn log(&self, level: LogLevel, args: Arguments<'_>);
}

struct BackendCell(UnsafeCell<Option<&'static dyn LogBackend>>);

// SAFETY: written once, before any concurrent logging (see `set_backend`).
unsafe impl Sync for BackendCell {}

static BACKEND: BackendCell = BackendCell(UnsafeCell::new(None));

/// Install the log backend.
///
/// # Safety
/// Must be called at most once, before any other hart or interrupt handler
/// can log.
pub unsafe fn set_backend(backend: &'static dyn LogBackend) {
    unsafe { *BACKEND.0.get() = Some(backend) };
}

/// Forward one message to the backend.  Messages logged before a backend is
/// installed are dropped; the logger itself never faults.
#[doc(hidden)]
pub fn write_log(level: LogLevel, args: Arguments<'_>) {
    // SAFETY: only read after the one-time write in `set_backend`.
    if let Some(backend) = unsafe { *BACKEND.0.get() } {
        backend.log(level, args);
    }
}

/// Emit a log message at an explicit level using `core::fmt` semantics.
#[macro_export]
macro_rules! log {
    ($level:expr, $($args:tt)*) => {
        $crate::write_log($level, core::format_args!($($args)*))
    };
}

/// Emit a debug level log message.
#[macro_export]
macro_rules! debug {
    ($($args:tt)*) => { $crate::log!($crate::LogLevel::Debug, $($args)*) };
}

/// Emit an info level log message.
#[macro_export]
macro_rules! info {
    ($($args:tt)*) => { $crate::log!($crate::LogLevel::Info, $($args)*) };
}

/// Emit a warn level log message.
#[macro_export]
macro_rules! warn {
    ($($args:tt)*) => { $crate::log!($crate::LogLevel::Warn, $($args)*) };
}

/// Emit an error level log message.
#[macro_export]
macro_rules! error {
    ($($args:tt)*) => { $crate::log!($crate::LogLevel::Error, $($args)*) };
}

/// Emit a fatal level log message.
///
/// *Note*: `fatal!` only emits a log message; it does not halt.  Halting is
/// `emmer_assert::panic!`'s job.
#[macro_export]
macro_rules! fatal {
    ($($args:tt)*) => { $crate::log!($crate::LogLevel::Fatal, $($args)*) };
}

/// Emit a debug level log message when `condition` is true.
///
/// The condition is expected to be a `const` so verbose per-module logging
/// compiles out entirely when disabled.
#[macro_export]
macro_rules! debug_if {
    ($condition:expr, $($args:tt)*) => {
        if $condition {
            $crate::debug!($($args)*)
        }
    };
}
